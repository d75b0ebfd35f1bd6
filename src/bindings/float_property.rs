//! 浮点属性绑定

use crate::bindings::marshal::script_to_float;
use crate::bindings::{
    BindingBase, ElementCodec, ElementContext, MarshalContext, PropertyBinding,
    PropertyCapabilities, PropertyKind, ScriptValue,
};
use crate::core::error::BindingResult;
use std::fmt;
use std::marker::PhantomData;

pub trait NativeFloat: Copy + 'static {
    const KIND: PropertyKind;
    const WIDTH: usize;

    fn decode(bytes: &[u8]) -> Option<f64>;
    /// `None` when a finite value does not fit the native range.
    fn encode(value: f64) -> Option<Vec<u8>>;
}

impl NativeFloat for f32 {
    const KIND: PropertyKind = PropertyKind::Float;
    const WIDTH: usize = 4;

    fn decode(bytes: &[u8]) -> Option<f64> {
        let raw = bytes.get(..4)?.try_into().ok()?;
        Some(f64::from(f32::from_le_bytes(raw)))
    }

    fn encode(value: f64) -> Option<Vec<u8>> {
        if value.is_finite() && value.abs() > f64::from(f32::MAX) {
            return None;
        }
        Some((value as f32).to_le_bytes().to_vec())
    }
}

impl NativeFloat for f64 {
    const KIND: PropertyKind = PropertyKind::Double;
    const WIDTH: usize = 8;

    fn decode(bytes: &[u8]) -> Option<f64> {
        let raw = bytes.get(..8)?.try_into().ok()?;
        Some(f64::from_le_bytes(raw))
    }

    fn encode(value: f64) -> Option<Vec<u8>> {
        Some(value.to_le_bytes().to_vec())
    }
}

pub struct FloatBinding<T: NativeFloat> {
    base: BindingBase,
    _native: PhantomData<T>,
}

pub type Float32Binding = FloatBinding<f32>;
pub type DoubleBinding = FloatBinding<f64>;

impl<T: NativeFloat> fmt::Debug for FloatBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FloatBinding")
            .field("base", &self.base)
            .field("width", &T::WIDTH)
            .finish()
    }
}

impl<T: NativeFloat> FloatBinding<T> {
    fn to_native(base: &BindingBase, value: &ScriptValue) -> BindingResult<Vec<u8>> {
        let value = script_to_float(value).map_err(|fault| base.conversion_error(fault))?;
        T::encode(value).ok_or_else(|| base.out_of_range(value))
    }
}

impl<T: NativeFloat> PropertyCapabilities for FloatBinding<T> {
    fn base(&self) -> &BindingBase {
        &self.base
    }
}

impl<T: NativeFloat> PropertyBinding for FloatBinding<T> {
    const KIND: PropertyKind = T::KIND;

    fn from_base(base: BindingBase) -> BindingResult<Self> {
        base.expect_kind(Self::KIND)?;
        Ok(Self {
            base,
            _native: PhantomData,
        })
    }

    fn get(&self, _cx: &MarshalContext<'_>) -> BindingResult<ScriptValue> {
        let mut buf = vec![0u8; T::WIDTH];
        self.base.read_field(0, &mut buf)?;
        let value = T::decode(&buf).unwrap_or(f64::NAN);
        Ok(ScriptValue::Number(value))
    }

    fn set(&self, value: &ScriptValue, _cx: &MarshalContext<'_>) -> BindingResult<()> {
        let bytes = Self::to_native(&self.base, value)?;
        self.base.write_field(0, &bytes)
    }
}

impl<T: NativeFloat> ElementCodec for FloatBinding<T> {
    fn decode_element(_element: &ElementContext<'_>, bytes: &[u8]) -> BindingResult<ScriptValue> {
        Ok(ScriptValue::Number(T::decode(bytes).unwrap_or(f64::NAN)))
    }

    fn encode_element(element: &ElementContext<'_>, value: &ScriptValue) -> BindingResult<Vec<u8>> {
        Self::to_native(element.container, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::test_support::Fixture;
    use property_bridge_reflection::ClassBuilder;

    fn physics() -> Fixture {
        let class = ClassBuilder::new("Body")
            .float("Mass")
            .double("Drag")
            .build();
        Fixture::new(&class)
    }

    #[test]
    fn test_float_round_trip() {
        let fx = physics();
        let cx = fx.cx();
        let mass: Float32Binding = fx.bind("Mass");
        let drag: DoubleBinding = fx.bind("Drag");

        mass.set(&ScriptValue::Number(1.5), &cx).unwrap();
        drag.set(&ScriptValue::Integer(3), &cx).unwrap();
        assert_eq!(mass.get(&cx).unwrap(), ScriptValue::Number(1.5));
        assert_eq!(drag.get(&cx).unwrap(), ScriptValue::Number(3.0));
        assert_eq!(fx.bytes(fx.offset_of("Mass"), 4), 1.5f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_f32_range_is_enforced() {
        let fx = physics();
        let cx = fx.cx();
        let mass: Float32Binding = fx.bind("Mass");
        mass.set(&ScriptValue::Number(2.0), &cx).unwrap();

        let err = mass.set(&ScriptValue::Number(1e39), &cx).unwrap_err();
        assert_eq!(err.code(), "ValueOutOfRange");
        assert_eq!(mass.get(&cx).unwrap(), ScriptValue::Number(2.0));

        mass.set(&ScriptValue::Number(f64::INFINITY), &cx).unwrap();
        assert_eq!(mass.get(&cx).unwrap(), ScriptValue::Number(f64::INFINITY));
    }

    #[test]
    fn test_string_is_type_mismatch() {
        let fx = physics();
        let cx = fx.cx();
        let drag: DoubleBinding = fx.bind("Drag");
        let err = drag
            .set(&ScriptValue::String("fast".to_string()), &cx)
            .unwrap_err();
        assert_eq!(err.code(), "TypeMismatch");
        assert!(err.to_string().contains("expects number, got string"));
    }
}
