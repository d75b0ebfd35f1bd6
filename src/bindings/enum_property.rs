//! 枚举属性绑定
//!
//! 底层按无符号整数存储，存在负值枚举项时按有符号整数存储。写入可以是
//! 整数值，也可以是枚举项名称。

use crate::bindings::marshal::{
    check_range, decode_unsigned_le, encode_unsigned_le, integer_to_script, script_to_integer,
    unsigned_max,
};
use crate::bindings::{
    BindingBase, ElementCodec, ElementContext, MarshalContext, PropertyBinding,
    PropertyCapabilities, PropertyKind, ScriptValue,
};
use crate::core::error::BindingResult;
use crate::scripting::{BindingRuntime, Handle};
use mlua::UserDataMethods;
use property_bridge_reflection::{EnumEntry, PropertyMeta};

#[derive(Debug, Clone)]
pub struct EnumBinding {
    base: BindingBase,
}

fn width_of(meta: &PropertyMeta) -> usize {
    meta.size.clamp(1, 8)
}

fn is_signed(meta: &PropertyMeta) -> bool {
    meta.enum_entries.iter().any(|e| e.value < 0)
}

/// Inclusive range of values the native field can hold.
fn value_range(meta: &PropertyMeta) -> (i128, i128) {
    let max = unsigned_max(width_of(meta));
    if is_signed(meta) {
        let half = (max + 1) / 2;
        (-half, half - 1)
    } else {
        (0, max)
    }
}

fn decode_value(meta: &PropertyMeta, bytes: &[u8]) -> i128 {
    let width = width_of(meta);
    let raw = decode_unsigned_le(&bytes[..bytes.len().min(width)]);
    if !is_signed(meta) {
        return i128::from(raw);
    }
    let shift = 64 - (width * 8) as u32;
    i128::from(((raw << shift) as i64) >> shift)
}

fn entry_value(entries: &[EnumEntry], name: &str) -> Option<i64> {
    entries.iter().find(|e| e.name == name).map(|e| e.value)
}

impl EnumBinding {
    pub fn entries(&self) -> &[EnumEntry] {
        &self.base.meta().enum_entries
    }

    pub fn value(&self) -> BindingResult<i128> {
        let mut buf = vec![0u8; width_of(self.base.meta())];
        self.base.read_field(0, &mut buf)?;
        Ok(decode_value(self.base.meta(), &buf))
    }

    /// Name of the entry matching the current value.
    pub fn current_name(&self) -> BindingResult<Option<String>> {
        let value = self.value()?;
        Ok(self
            .entries()
            .iter()
            .find(|e| i128::from(e.value) == value)
            .map(|e| e.name.clone()))
    }

    fn encode(
        container: &BindingBase,
        meta: &PropertyMeta,
        value: &ScriptValue,
    ) -> BindingResult<Vec<u8>> {
        let width = width_of(meta);
        let wide = match value {
            ScriptValue::String(name) => entry_value(&meta.enum_entries, name)
                .map(i128::from)
                .ok_or_else(|| container.out_of_range(format!("{name:?}")))?,
            other => script_to_integer(other).map_err(|fault| container.conversion_error(fault))?,
        };
        let (min, max) = value_range(meta);
        let checked =
            check_range(wide, min, max).map_err(|fault| container.conversion_error(fault))?;
        // 截断为补码
        Ok(encode_unsigned_le(checked as u64, width))
    }
}

impl PropertyCapabilities for EnumBinding {
    fn base(&self) -> &BindingBase {
        &self.base
    }
}

impl PropertyBinding for EnumBinding {
    const KIND: PropertyKind = PropertyKind::Enum;

    fn from_base(base: BindingBase) -> BindingResult<Self> {
        base.expect_kind(Self::KIND)?;
        Ok(Self { base })
    }

    fn get(&self, cx: &MarshalContext<'_>) -> BindingResult<ScriptValue> {
        let value = self.value()?;
        Ok(integer_to_script(value, self.identity(), cx))
    }

    fn set(&self, value: &ScriptValue, _cx: &MarshalContext<'_>) -> BindingResult<()> {
        let bytes = Self::encode(&self.base, self.base.meta(), value)?;
        self.base.write_field(0, &bytes)
    }

    fn add_member_functions<M: UserDataMethods<Handle<Self>>>(methods: &mut M) {
        methods.add_method("GetEnumName", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.observe(this.binding().current_name())
        });
        methods.add_method("GetEnumEntries", |lua, this, ()| {
            let table = lua.create_table()?;
            for entry in this.binding().entries() {
                table.raw_set(entry.name.as_str(), entry.value)?;
            }
            Ok(table)
        });
    }
}

impl ElementCodec for EnumBinding {
    fn decode_element(element: &ElementContext<'_>, bytes: &[u8]) -> BindingResult<ScriptValue> {
        Ok(integer_to_script(
            decode_value(element.inner, bytes),
            element.container.identity(),
            element.cx,
        ))
    }

    fn encode_element(element: &ElementContext<'_>, value: &ScriptValue) -> BindingResult<Vec<u8>> {
        Self::encode(element.container, element.inner, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::test_support::Fixture;
    use property_bridge_reflection::ClassBuilder;

    fn fixture() -> Fixture {
        let class = ClassBuilder::new("Light")
            .enumeration("Color", &[("Red", 0), ("Green", 1), ("Blue", 2)])
            .build();
        Fixture::new(&class)
    }

    #[test]
    fn test_set_by_value_and_name() {
        let fx = fixture();
        let cx = fx.cx();
        let color: EnumBinding = fx.bind("Color");

        color.set(&ScriptValue::Integer(2), &cx).unwrap();
        assert_eq!(color.get(&cx).unwrap(), ScriptValue::Integer(2));
        assert_eq!(color.current_name().unwrap().as_deref(), Some("Blue"));

        color.set(&ScriptValue::from("Green"), &cx).unwrap();
        assert_eq!(color.get(&cx).unwrap(), ScriptValue::Integer(1));
    }

    #[test]
    fn test_unknown_name_and_wide_value_are_rejected() {
        let fx = fixture();
        let cx = fx.cx();
        let color: EnumBinding = fx.bind("Color");
        color.set(&ScriptValue::from("Red"), &cx).unwrap();

        assert_eq!(
            color.set(&ScriptValue::from("Purple"), &cx).unwrap_err().code(),
            "ValueOutOfRange"
        );
        assert_eq!(
            color.set(&ScriptValue::Integer(256), &cx).unwrap_err().code(),
            "ValueOutOfRange"
        );
        assert_eq!(
            color.set(&ScriptValue::Boolean(true), &cx).unwrap_err().code(),
            "TypeMismatch"
        );
        assert_eq!(color.get(&cx).unwrap(), ScriptValue::Integer(0));
    }

    #[test]
    fn test_negative_entries_are_stored_signed() {
        let class = ClassBuilder::new("Door")
            .enumeration("Swing", &[("Inward", -1), ("Closed", 0), ("Outward", 1)])
            .build();
        let fx = Fixture::new(&class);
        let cx = fx.cx();
        let swing: EnumBinding = fx.bind("Swing");

        swing.set(&ScriptValue::from("Inward"), &cx).unwrap();
        assert_eq!(fx.bytes(fx.offset_of("Swing"), 1), vec![0xFF]);
        assert_eq!(swing.get(&cx).unwrap(), ScriptValue::Integer(-1));
        assert_eq!(swing.current_name().unwrap().as_deref(), Some("Inward"));

        swing.set(&ScriptValue::Integer(-128), &cx).unwrap();
        assert_eq!(swing.value().unwrap(), -128);
        assert_eq!(
            swing.set(&ScriptValue::Integer(200), &cx).unwrap_err().code(),
            "ValueOutOfRange"
        );
        assert_eq!(swing.value().unwrap(), -128);
    }

    #[test]
    fn test_value_outside_entries_has_no_name() {
        let fx = fixture();
        let cx = fx.cx();
        let color: EnumBinding = fx.bind("Color");
        color.set(&ScriptValue::Integer(7), &cx).unwrap();
        assert_eq!(color.current_name().unwrap(), None);
    }
}
