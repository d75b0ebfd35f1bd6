//! 对象引用属性绑定
//!
//! 原生字段保存被引用对象的ID（小端 u64，0 表示空）。

use crate::bindings::marshal::{decode_unsigned_le, encode_unsigned_le};
use crate::bindings::{
    BindingBase, ElementCodec, ElementContext, MarshalContext, PropertyBinding,
    PropertyCapabilities, PropertyKind, ScriptValue,
};
use crate::core::error::BindingResult;
use crate::scripting::{BindingRuntime, Handle};
use mlua::UserDataMethods;
use property_bridge_reflection::{ObjectId, PropertyMeta};

const REFERENCE_SIZE: usize = 8;

#[derive(Debug, Clone)]
pub struct ObjectBinding {
    base: BindingBase,
}

impl ObjectBinding {
    pub fn target(&self) -> BindingResult<ObjectId> {
        let mut buf = [0u8; REFERENCE_SIZE];
        self.base.read_field(0, &mut buf)?;
        Ok(ObjectId(decode_unsigned_le(&buf)))
    }

    pub fn declared_class(&self) -> Option<&str> {
        self.base.meta().class_name.as_deref()
    }

    fn decode(bytes: &[u8]) -> ScriptValue {
        match decode_unsigned_le(bytes) {
            0 => ScriptValue::Nil,
            id => ScriptValue::Object(ObjectId(id)),
        }
    }

    /// Null, or a live object of the declared class.
    fn encode(
        container: &BindingBase,
        declared: &PropertyMeta,
        value: &ScriptValue,
    ) -> BindingResult<Vec<u8>> {
        let target = match value {
            ScriptValue::Nil => return Ok(encode_unsigned_le(0, REFERENCE_SIZE)),
            ScriptValue::Object(id) => *id,
            other => return Err(container.type_mismatch("object or nil", other)),
        };
        let expected = match declared.class_name.as_deref() {
            Some(class_name) => format!("{class_name} object"),
            None => "live object".to_string(),
        };
        let descriptor = container
            .host()
            .describe(target)
            .ok_or_else(|| container.type_mismatch_described(&expected, "destroyed object"))?;
        if let Some(class_name) = declared.class_name.as_deref() {
            if descriptor.class.name != class_name {
                return Err(container.type_mismatch_described(
                    expected,
                    format!("{} object", descriptor.class.name),
                ));
            }
        }
        Ok(encode_unsigned_le(target.raw(), REFERENCE_SIZE))
    }
}

impl PropertyCapabilities for ObjectBinding {
    fn base(&self) -> &BindingBase {
        &self.base
    }
}

impl PropertyBinding for ObjectBinding {
    const KIND: PropertyKind = PropertyKind::Object;

    fn from_base(base: BindingBase) -> BindingResult<Self> {
        base.expect_kind(Self::KIND)?;
        Ok(Self { base })
    }

    fn get(&self, _cx: &MarshalContext<'_>) -> BindingResult<ScriptValue> {
        let mut buf = [0u8; REFERENCE_SIZE];
        self.base.read_field(0, &mut buf)?;
        Ok(Self::decode(&buf))
    }

    fn set(&self, value: &ScriptValue, _cx: &MarshalContext<'_>) -> BindingResult<()> {
        self.base.ensure_valid()?;
        let bytes = Self::encode(&self.base, self.base.meta(), value)?;
        self.base.write_field(0, &bytes)
    }

    fn add_member_functions<M: UserDataMethods<Handle<Self>>>(methods: &mut M) {
        methods.add_method("GetPropertyClass", |_, this, ()| {
            Ok(this.binding().declared_class().map(str::to_string))
        });
        methods.add_method("IsNull", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.observe(this.binding().target().map(ObjectId::is_null))
        });
    }
}

impl ElementCodec for ObjectBinding {
    fn decode_element(_element: &ElementContext<'_>, bytes: &[u8]) -> BindingResult<ScriptValue> {
        Ok(Self::decode(bytes))
    }

    fn encode_element(element: &ElementContext<'_>, value: &ScriptValue) -> BindingResult<Vec<u8>> {
        Self::encode(element.container, element.inner, value)
    }
}
