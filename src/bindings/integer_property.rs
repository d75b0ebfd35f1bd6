//! 整数属性绑定
//!
//! 八种整数宽度共用一个泛型实现，由 [`NativeInteger`] 描述宽度和符号。

use crate::bindings::marshal::{check_range, integer_to_script, parse_decimal, script_to_integer};
use crate::bindings::{
    BindingBase, ElementCodec, ElementContext, GenericDataType, MarshalContext, PropertyBinding,
    PropertyCapabilities, PropertyKind, ScriptValue,
};
use crate::core::error::{BindingError, BindingResult};
use crate::scripting::{BindingRuntime, Handle};
use mlua::UserDataMethods;
use std::fmt;
use std::marker::PhantomData;

/// A fixed-width native integer type.
pub trait NativeInteger: Copy + fmt::Debug + 'static {
    const KIND: PropertyKind;
    const DATA_TYPE: GenericDataType;
    const WIDTH: usize;
    const MIN: i128;
    const MAX: i128;

    fn decode(bytes: &[u8]) -> Option<Self>;
    fn encode(self) -> Vec<u8>;
    fn to_i128(self) -> i128;
    fn from_i128(value: i128) -> Option<Self>;
}

macro_rules! native_integer {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl NativeInteger for $ty {
                const KIND: PropertyKind = PropertyKind::$kind;
                const DATA_TYPE: GenericDataType = GenericDataType::for_width(
                    std::mem::size_of::<$ty>(),
                    <$ty>::MIN != 0,
                );
                const WIDTH: usize = std::mem::size_of::<$ty>();
                const MIN: i128 = <$ty>::MIN as i128;
                const MAX: i128 = <$ty>::MAX as i128;

                fn decode(bytes: &[u8]) -> Option<Self> {
                    let raw = bytes.get(..Self::WIDTH)?.try_into().ok()?;
                    Some(<$ty>::from_le_bytes(raw))
                }

                fn encode(self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }

                fn to_i128(self) -> i128 {
                    i128::from(self)
                }

                fn from_i128(value: i128) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }
            }
        )*
    };
}

native_integer! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Byte,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
}

pub struct IntegerBinding<T: NativeInteger> {
    base: BindingBase,
    _native: PhantomData<T>,
}

pub type Int8Binding = IntegerBinding<i8>;
pub type Int16Binding = IntegerBinding<i16>;
pub type Int32Binding = IntegerBinding<i32>;
pub type Int64Binding = IntegerBinding<i64>;
pub type ByteBinding = IntegerBinding<u8>;
pub type UInt16Binding = IntegerBinding<u16>;
pub type UInt32Binding = IntegerBinding<u32>;
pub type UInt64Binding = IntegerBinding<u64>;

impl<T: NativeInteger> fmt::Debug for IntegerBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegerBinding")
            .field("base", &self.base)
            .field("width", &T::WIDTH)
            .finish()
    }
}

impl<T: NativeInteger> IntegerBinding<T> {
    /// Exact native value.
    pub fn read_exact(&self) -> BindingResult<i128> {
        let mut buf = vec![0u8; T::WIDTH];
        self.base.read_field(0, &mut buf)?;
        T::decode(&buf)
            .map(T::to_i128)
            .ok_or_else(|| self.base.out_of_range(format!("{buf:?}")))
    }

    /// Range-checked exact write.
    pub fn write_exact(&self, value: i128) -> BindingResult<()> {
        let native = Self::narrow(&self.base, value)?;
        self.base.write_field(0, &native.encode())
    }

    pub fn decimal(&self) -> BindingResult<String> {
        self.read_exact().map(|value| value.to_string())
    }

    pub fn set_decimal(&self, text: &str) -> BindingResult<()> {
        let value = parse_decimal(text).map_err(|fault| self.base.conversion_error(fault))?;
        self.write_exact(value)
    }

    fn narrow(base: &BindingBase, value: i128) -> BindingResult<T> {
        check_range(value, T::MIN, T::MAX)
            .ok()
            .and_then(T::from_i128)
            .ok_or_else(|| base.out_of_range(value))
    }

    fn from_script(base: &BindingBase, value: &ScriptValue) -> BindingResult<T> {
        let wide = script_to_integer(value).map_err(|fault| base.conversion_error(fault))?;
        Self::narrow(base, wide)
    }
}

impl<T: NativeInteger> PropertyCapabilities for IntegerBinding<T> {
    fn base(&self) -> &BindingBase {
        &self.base
    }
}

impl<T: NativeInteger> PropertyBinding for IntegerBinding<T> {
    const KIND: PropertyKind = T::KIND;

    fn from_base(base: BindingBase) -> BindingResult<Self> {
        base.expect_kind(Self::KIND)?;
        Ok(Self {
            base,
            _native: PhantomData,
        })
    }

    fn get(&self, cx: &MarshalContext<'_>) -> BindingResult<ScriptValue> {
        let value = self.read_exact()?;
        Ok(integer_to_script(value, self.identity(), cx))
    }

    fn set(&self, value: &ScriptValue, _cx: &MarshalContext<'_>) -> BindingResult<()> {
        let native = Self::from_script(&self.base, value)?;
        self.base.write_field(0, &native.encode())
    }

    fn add_member_functions<M: UserDataMethods<Handle<Self>>>(methods: &mut M) {
        methods.add_method("GetDataType", |_, _, ()| Ok(T::DATA_TYPE.name()));
        methods.add_method("GetWidth", |_, _, ()| Ok(T::WIDTH));
        methods.add_method("IsSigned", |_, _, ()| Ok(T::DATA_TYPE.is_signed()));
        methods.add_method("GetDecimal", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.observe(this.binding().decimal())
        });
        methods.add_method("SetDecimal", |lua, this, text: String| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.observe(this.binding().set_decimal(&text))
        });
    }
}

impl<T: NativeInteger> ElementCodec for IntegerBinding<T> {
    fn decode_element(element: &ElementContext<'_>, bytes: &[u8]) -> BindingResult<ScriptValue> {
        let value = T::decode(bytes).ok_or_else(|| BindingError::TypeMismatch {
            identity: element.container.identity(),
            property: element.inner.name.clone(),
            kind: T::KIND,
            expected: format!("{} bytes", T::WIDTH),
            got: format!("{} bytes", bytes.len()),
        })?;
        Ok(integer_to_script(
            value.to_i128(),
            element.container.identity(),
            element.cx,
        ))
    }

    fn encode_element(element: &ElementContext<'_>, value: &ScriptValue) -> BindingResult<Vec<u8>> {
        Self::from_script(element.container, value).map(T::encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::test_support::Fixture;
    use crate::bindings::UnsignedOverflowPolicy;
    use property_bridge_reflection::ClassBuilder;

    fn numbers() -> Fixture {
        let class = ClassBuilder::new("Numbers")
            .int8("I8")
            .int16("I16")
            .int32("I32")
            .int64("I64")
            .byte("U8")
            .uint16("U16")
            .uint32("U32")
            .uint64("U64")
            .build();
        Fixture::new(&class)
    }

    #[test]
    fn test_signed_round_trip_and_bytes() {
        let fx = numbers();
        let cx = fx.cx();
        let binding: Int16Binding = fx.bind("I16");

        binding.set(&ScriptValue::Integer(-2), &cx).unwrap();
        assert_eq!(binding.get(&cx).unwrap(), ScriptValue::Integer(-2));
        assert_eq!(fx.bytes(fx.offset_of("I16"), 2), vec![0xFE, 0xFF]);
    }

    #[test]
    fn test_out_of_width_write_is_rejected() {
        let fx = numbers();
        let cx = fx.cx();
        let binding: Int8Binding = fx.bind("I8");
        binding.set(&ScriptValue::Integer(100), &cx).unwrap();

        let err = binding.set(&ScriptValue::Integer(300), &cx).unwrap_err();
        assert_eq!(err.code(), "ValueOutOfRange");
        assert!(err.to_string().contains("300"));
        assert!(err.to_string().contains("Int8Property 'I8'"));
        assert_eq!(binding.get(&cx).unwrap(), ScriptValue::Integer(100));

        let byte: ByteBinding = fx.bind("U8");
        assert_eq!(
            byte.set(&ScriptValue::Integer(-1), &cx).unwrap_err().code(),
            "ValueOutOfRange"
        );
    }

    #[test]
    fn test_number_must_be_integral() {
        let fx = numbers();
        let cx = fx.cx();
        let binding: Int32Binding = fx.bind("I32");

        binding.set(&ScriptValue::Number(12.0), &cx).unwrap();
        assert_eq!(binding.get(&cx).unwrap(), ScriptValue::Integer(12));
        assert_eq!(
            binding.set(&ScriptValue::Number(12.5), &cx).unwrap_err().code(),
            "ValueOutOfRange"
        );
        assert_eq!(
            binding.set(&ScriptValue::Boolean(true), &cx).unwrap_err().code(),
            "TypeMismatch"
        );
        assert_eq!(binding.get(&cx).unwrap(), ScriptValue::Integer(12));
    }

    #[test]
    fn test_u64_overflow_policies() {
        let mut fx = numbers();
        let binding: UInt64Binding = fx.bind("U64");
        binding.set_decimal("18446744073709551615").unwrap();
        assert_eq!(binding.decimal().unwrap(), "18446744073709551615");

        assert_eq!(
            binding.get(&fx.cx()).unwrap(),
            ScriptValue::Number(u64::MAX as f64)
        );
        fx.overflow = UnsignedOverflowPolicy::Saturate;
        assert_eq!(
            binding.get(&fx.cx()).unwrap(),
            ScriptValue::Integer(i64::MAX)
        );
        assert_eq!(fx.diagnostics.overflow_events(), 2);

        binding.set(&ScriptValue::Integer(i64::MAX), &fx.cx()).unwrap();
        assert_eq!(
            binding.get(&fx.cx()).unwrap(),
            ScriptValue::Integer(i64::MAX)
        );
        assert_eq!(fx.diagnostics.overflow_events(), 2);
    }

    #[test]
    fn test_set_decimal_is_range_checked() {
        let fx = numbers();
        let binding: UInt32Binding = fx.bind("U32");
        binding.set_decimal("4294967295").unwrap();
        assert_eq!(
            binding.set_decimal("4294967296").unwrap_err().code(),
            "ValueOutOfRange"
        );
        assert_eq!(binding.decimal().unwrap(), "4294967295");
    }

    #[test]
    fn test_native_integer_constants() {
        assert_eq!(<i8 as NativeInteger>::DATA_TYPE, GenericDataType::SignedLong);
        assert_eq!(<u32 as NativeInteger>::DATA_TYPE, GenericDataType::UnsignedLong);
        assert_eq!(<i64 as NativeInteger>::DATA_TYPE, GenericDataType::SignedLongLong);
        assert_eq!(<u64 as NativeInteger>::DATA_TYPE, GenericDataType::UnsignedLongLong);
        assert_eq!(<u16 as NativeInteger>::MAX, 65535);
        assert_eq!(<u8 as NativeInteger>::KIND, PropertyKind::Byte);
        assert_eq!(Int32Binding::KIND, PropertyKind::Int32);
    }
}
