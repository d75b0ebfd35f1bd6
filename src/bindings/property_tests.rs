//! 绑定属性测试
//!
//! 使用proptest检验编组的往返律、越界拒绝和无部分写入

use crate::bindings::test_support::Fixture;
use crate::bindings::{
    AnyBinding, ArrayBinding, BoolBinding, ByteBinding, Float32Binding, Int16Binding,
    Int32Binding, Int8Binding, PropertyBinding, PropertyCapabilities, ScriptValue,
    UInt16Binding, UInt32Binding, UInt64Binding,
};
use crate::cache::{HandleKey, RemoteObjectCache, StrongSlots};
use crate::core::error::BindingError;
use property_bridge_reflection::{ClassBuilder, PropertyId};
use proptest::prelude::*;
use std::rc::Rc;
use std::sync::Arc;

fn numbers() -> Fixture {
    let class = ClassBuilder::new("Numbers")
        .int8("I8")
        .int16("I16")
        .int32("I32")
        .byte("U8")
        .uint16("U16")
        .uint32("U32")
        .uint64("U64")
        .float("F32")
        .bitfield("bA")
        .bitfield("bB")
        .bitfield("bC")
        .array("Counts", "UInt16Property", 2)
        .build();
    Fixture::new(&class)
}

fn assert_round_trip<B: PropertyBinding>(fx: &Fixture, name: &str, value: ScriptValue) {
    let cx = fx.cx();
    let binding: B = fx.bind(name);
    binding.set(&value, &cx).unwrap();
    assert_eq!(binding.get(&cx).unwrap(), value);
}

proptest! {
    #[test]
    fn integer_round_trip_within_width(
        i8v in any::<i8>(),
        i16v in any::<i16>(),
        i32v in any::<i32>(),
        u8v in any::<u8>(),
        u16v in any::<u16>(),
        u32v in any::<u32>(),
        u64v in 0u64..=i64::MAX as u64,
    ) {
        let fx = numbers();
        assert_round_trip::<Int8Binding>(&fx, "I8", ScriptValue::Integer(i8v.into()));
        assert_round_trip::<Int16Binding>(&fx, "I16", ScriptValue::Integer(i16v.into()));
        assert_round_trip::<Int32Binding>(&fx, "I32", ScriptValue::Integer(i32v.into()));
        assert_round_trip::<ByteBinding>(&fx, "U8", ScriptValue::Integer(u8v.into()));
        assert_round_trip::<UInt16Binding>(&fx, "U16", ScriptValue::Integer(u16v.into()));
        assert_round_trip::<UInt32Binding>(&fx, "U32", ScriptValue::Integer(u32v.into()));
        assert_round_trip::<UInt64Binding>(&fx, "U64", ScriptValue::Integer(u64v as i64));
    }

    #[test]
    fn float_round_trip(value in any::<f32>().prop_filter("finite", |v| v.is_finite())) {
        let fx = numbers();
        assert_round_trip::<Float32Binding>(&fx, "F32", ScriptValue::Number(value as f64));
    }

    #[test]
    fn out_of_range_write_changes_nothing(
        start in any::<i8>(),
        rejected in prop_oneof![-100_000i64..-129, 128i64..100_000],
    ) {
        let fx = numbers();
        let cx = fx.cx();
        let binding: Int8Binding = fx.bind("I8");
        binding.set(&ScriptValue::Integer(start.into()), &cx).unwrap();
        let before = fx.bytes(fx.offset_of("I8"), 1);

        let err = binding.set(&ScriptValue::Integer(rejected), &cx).unwrap_err();
        let is_out_of_range = matches!(err, BindingError::ValueOutOfRange { .. });
        prop_assert!(is_out_of_range);
        prop_assert_eq!(fx.bytes(fx.offset_of("I8"), 1), before);
    }

    #[test]
    fn bitfield_writes_leave_siblings_alone(flags in proptest::collection::vec(any::<(u8, bool)>(), 1..32)) {
        let fx = numbers();
        let cx = fx.cx();
        let names = ["bA", "bB", "bC"];
        let bindings: Vec<BoolBinding> = names.iter().map(|name| fx.bind(name)).collect();
        let mut expected = [false; 3];

        for (which, value) in flags {
            let which = usize::from(which) % names.len();
            bindings[which].set(&ScriptValue::Boolean(value), &cx).unwrap();
            expected[which] = value;
            for (binding, want) in bindings.iter().zip(expected) {
                prop_assert_eq!(binding.get(&cx).unwrap(), ScriptValue::Boolean(want));
            }
        }
    }

    #[test]
    fn array_set_is_all_or_nothing(
        kept in proptest::collection::vec(any::<u16>(), 0..8),
        mut attempted in proptest::collection::vec(any::<u16>(), 0..8),
        bad_at in any::<prop::sample::Index>(),
    ) {
        let fx = numbers();
        let cx = fx.cx();
        let counts: ArrayBinding = fx.bind("Counts");
        let original = ScriptValue::List(kept.iter().map(|v| ScriptValue::Integer((*v).into())).collect());
        counts.set(&original, &cx).unwrap();

        attempted.push(0);
        let bad = bad_at.index(attempted.len());
        let mut values: Vec<ScriptValue> = attempted.iter().map(|v| ScriptValue::Integer((*v).into())).collect();
        values[bad] = ScriptValue::Integer(70_000);

        prop_assert!(counts.set(&ScriptValue::List(values), &cx).is_err());
        prop_assert_eq!(counts.get(&cx).unwrap(), original);
    }

    #[test]
    fn one_handle_per_identity(lookups in proptest::collection::vec(0usize..4, 1..64)) {
        let fx = numbers();
        let names = ["I8", "I16", "U8", "bA"];
        let mut cache: RemoteObjectCache<StrongSlots<Rc<AnyBinding>>> =
            RemoteObjectCache::new(StrongSlots::new());
        let mut first: Vec<Option<Rc<AnyBinding>>> = vec![None; names.len()];

        for which in lookups {
            let meta = Arc::clone(fx.class.find_property(names[which]).unwrap());
            let key = HandleKey::property(fx.object, meta.id);
            let handle = cache
                .lookup_or_create(key, || {
                    AnyBinding::resolve(fx.host.clone(), fx.object, meta).map(Rc::new)
                })
                .unwrap();
            prop_assert_eq!(handle.identity().key(), key);
            match &first[which] {
                Some(existing) => prop_assert!(Rc::ptr_eq(existing, &handle)),
                None => first[which] = Some(handle),
            }
        }
        prop_assert!(cache.len() <= names.len());
    }
}

#[test]
fn test_identities_never_collide_across_properties() {
    let fx = numbers();
    let ids: Vec<PropertyId> = fx.class.properties.iter().map(|p| p.id).collect();
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}
