//! 布尔属性绑定
//!
//! 同时支持原生 `bool` 字段和与其他标志共享字节的位域布尔值。

use crate::bindings::marshal::script_to_bool;
use crate::bindings::{
    BindingBase, ElementCodec, ElementContext, MarshalContext, PropertyBinding,
    PropertyCapabilities, PropertyKind, ScriptValue,
};
use crate::core::error::BindingResult;
use crate::scripting::Handle;
use mlua::UserDataMethods;
use property_bridge_reflection::BoolLayout;

/// Reads test `field_mask`; writes set or clear `byte_mask` and leave the
/// other bits of a packed byte alone.
#[derive(Debug, Clone)]
pub struct BoolBinding {
    base: BindingBase,
    layout: BoolLayout,
}

impl BoolBinding {
    pub fn layout(&self) -> BoolLayout {
        self.layout
    }

    pub(crate) fn decode(layout: BoolLayout, byte: u8) -> bool {
        byte & layout.field_mask != 0
    }

    pub(crate) fn encode(layout: BoolLayout, current: u8, value: bool) -> u8 {
        if layout.is_native_bool() {
            u8::from(value)
        } else if value {
            current | layout.byte_mask
        } else {
            current & !layout.byte_mask
        }
    }
}

impl PropertyCapabilities for BoolBinding {
    fn base(&self) -> &BindingBase {
        &self.base
    }
}

impl PropertyBinding for BoolBinding {
    const KIND: PropertyKind = PropertyKind::Bool;

    fn from_base(base: BindingBase) -> BindingResult<Self> {
        base.expect_kind(Self::KIND)?;
        let layout = base.meta().bool_layout.unwrap_or(BoolLayout::NATIVE);
        Ok(Self { base, layout })
    }

    fn get(&self, _cx: &MarshalContext<'_>) -> BindingResult<ScriptValue> {
        let mut byte = [0u8; 1];
        self.base
            .read_field(usize::from(self.layout.byte_offset), &mut byte)?;
        Ok(ScriptValue::Boolean(Self::decode(self.layout, byte[0])))
    }

    fn set(&self, value: &ScriptValue, _cx: &MarshalContext<'_>) -> BindingResult<()> {
        let value = script_to_bool(value).map_err(|fault| self.base.conversion_error(fault))?;
        let offset = usize::from(self.layout.byte_offset);
        let mut byte = [0u8; 1];
        self.base.read_field(offset, &mut byte)?;
        self.base
            .write_field(offset, &[Self::encode(self.layout, byte[0], value)])
    }

    fn add_member_functions<M: UserDataMethods<Handle<Self>>>(methods: &mut M) {
        methods.add_method("GetByteMask", |_, this, ()| {
            Ok(this.binding().layout.byte_mask)
        });
        methods.add_method("GetFieldMask", |_, this, ()| {
            Ok(this.binding().layout.field_mask)
        });
        methods.add_method("GetByteOffset", |_, this, ()| {
            Ok(this.binding().layout.byte_offset)
        });
        methods.add_method("GetFieldSize", |_, this, ()| {
            Ok(this.binding().layout.field_size)
        });
        methods.add_method("IsNativeBool", |_, this, ()| {
            Ok(this.binding().layout.is_native_bool())
        });
    }
}

impl ElementCodec for BoolBinding {
    fn decode_element(element: &ElementContext<'_>, bytes: &[u8]) -> BindingResult<ScriptValue> {
        let layout = element.inner.bool_layout.unwrap_or(BoolLayout::NATIVE);
        let byte = bytes.get(usize::from(layout.byte_offset)).copied().unwrap_or(0);
        Ok(ScriptValue::Boolean(Self::decode(layout, byte)))
    }

    fn encode_element(element: &ElementContext<'_>, value: &ScriptValue) -> BindingResult<Vec<u8>> {
        let layout = element.inner.bool_layout.unwrap_or(BoolLayout::NATIVE);
        let value =
            script_to_bool(value).map_err(|fault| element.container.conversion_error(fault))?;
        let mut bytes = vec![0u8; element.inner.size.max(1)];
        let index = usize::from(layout.byte_offset).min(bytes.len() - 1);
        bytes[index] = Self::encode(layout, 0, value);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::test_support::Fixture;
    use property_bridge_reflection::{ClassBuilder, ObjectId};

    #[test]
    fn test_native_bool_round_trip() {
        let class = ClassBuilder::new("Actor").bool("bHidden").build();
        let fx = Fixture::at(ObjectId(0xABCD), &class);
        let cx = fx.cx();

        let binding: BoolBinding = fx.bind("bHidden");
        assert_eq!(binding.get(&cx).unwrap(), ScriptValue::Boolean(false));
        binding.set(&ScriptValue::Boolean(true), &cx).unwrap();
        assert_ne!(fx.bytes(0, 1)[0], 0);
        assert_eq!(binding.get(&cx).unwrap(), ScriptValue::Boolean(true));
        binding.set(&ScriptValue::Boolean(false), &cx).unwrap();
        assert_eq!(fx.bytes(0, 1)[0], 0);
    }

    #[test]
    fn test_bitfield_only_touches_its_bit() {
        let class = ClassBuilder::new("Pawn")
            .bitfield("bCanJump")
            .bitfield("bCanCrouch")
            .bitfield("bCanSwim")
            .build();
        let fx = Fixture::new(&class);
        let cx = fx.cx();

        let jump: BoolBinding = fx.bind("bCanJump");
        let crouch: BoolBinding = fx.bind("bCanCrouch");
        let swim: BoolBinding = fx.bind("bCanSwim");

        swim.set(&ScriptValue::Boolean(true), &cx).unwrap();
        crouch.set(&ScriptValue::Boolean(true), &cx).unwrap();
        assert_eq!(fx.bytes(0, 1)[0], 0b110);
        assert_eq!(jump.get(&cx).unwrap(), ScriptValue::Boolean(false));

        crouch.set(&ScriptValue::Boolean(false), &cx).unwrap();
        assert_eq!(fx.bytes(0, 1)[0], 0b100);
        assert_eq!(swim.get(&cx).unwrap(), ScriptValue::Boolean(true));
        assert_eq!(crouch.layout().byte_mask, 0b010);
    }

    #[test]
    fn test_wrong_type_leaves_value_unchanged() {
        let class = ClassBuilder::new("Actor").bool("bHidden").build();
        let fx = Fixture::new(&class);
        let cx = fx.cx();
        let binding: BoolBinding = fx.bind("bHidden");

        let err = binding
            .set(&ScriptValue::String("yes".to_string()), &cx)
            .unwrap_err();
        assert_eq!(err.code(), "TypeMismatch");
        assert_eq!(fx.bytes(0, 1)[0], 0);
    }

    #[test]
    fn test_stale_after_destroy() {
        let class = ClassBuilder::new("Actor").bool("bHidden").build();
        let fx = Fixture::new(&class);
        let cx = fx.cx();
        let binding: BoolBinding = fx.bind("bHidden");

        fx.destroy();
        assert!(!binding.is_valid());
        assert!(binding.get(&cx).unwrap_err().is_stale());
        assert!(binding
            .set(&ScriptValue::Boolean(true), &cx)
            .unwrap_err()
            .is_stale());
    }

    #[test]
    fn test_encode_masks() {
        let layout = BoolLayout::bit(2);
        assert_eq!(BoolBinding::encode(layout, 0b0000_0011, true), 0b0000_0111);
        assert_eq!(BoolBinding::encode(layout, 0b0000_0111, false), 0b0000_0011);
        assert!(BoolBinding::decode(layout, 0b100));
        assert!(!BoolBinding::decode(layout, 0b011));
        assert!(BoolBinding::decode(BoolLayout::NATIVE, 0x80));
    }
}
