//! 动态数组属性绑定
//!
//! 元素存放在宿主管理的容器中，内部元素必须是标量种类。脚本侧使用
//! 1 起始的下标。整表写入先校验全部元素再落盘，不会出现部分写入。

use crate::bindings::dispatch;
use crate::bindings::{
    BindingBase, ElementCodec, ElementContext, MarshalContext, PropertyBinding,
    PropertyCapabilities, PropertyKind, ScriptValue,
};
use crate::core::error::{BindingError, BindingResult};
use crate::scripting::{convert, BindingRuntime, Handle};
use mlua::{Function, Lua, MetaMethod, UserDataMethods, Value};
use property_bridge_reflection::PropertyMeta;
use std::sync::Arc;

/// 脚本可设置的最大元素个数
pub const MAX_ARRAY_LEN: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct ArrayBinding {
    base: BindingBase,
    inner: Arc<PropertyMeta>,
    inner_kind: PropertyKind,
}

/// 1-based script index as a 0-based element index.
fn element_index(key: &Value) -> Option<usize> {
    let index = match key {
        Value::Integer(i) => *i,
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => *n as i64,
        _ => return None,
    };
    usize::try_from(index).ok()?.checked_sub(1)
}

impl ArrayBinding {
    pub fn inner_kind(&self) -> PropertyKind {
        self.inner_kind
    }

    fn element_context<'a>(&'a self, cx: &'a MarshalContext<'a>) -> ElementContext<'a> {
        ElementContext {
            container: &self.base,
            inner: &self.inner,
            cx,
        }
    }

    pub fn len(&self) -> BindingResult<usize> {
        self.base.ensure_valid()?;
        self.base
            .host()
            .array_len(self.base.object(), self.base.meta().id)
            .map_err(|err| self.base.host_error(err))
    }

    pub fn is_empty(&self) -> BindingResult<bool> {
        self.len().map(|len| len == 0)
    }

    pub fn resize(&self, len: usize) -> BindingResult<()> {
        self.base.ensure_valid()?;
        if len > MAX_ARRAY_LEN {
            return Err(self.base.out_of_range(format!("length {len}")));
        }
        self.base
            .host()
            .array_resize(self.base.object(), self.base.meta().id, len)
            .map_err(|err| self.base.host_error(err))
    }

    pub fn element(&self, index: usize, cx: &MarshalContext<'_>) -> BindingResult<ScriptValue> {
        self.base.ensure_valid()?;
        let mut buf = vec![0u8; self.inner.size];
        self.base
            .host()
            .array_read(self.base.object(), self.base.meta().id, index, &mut buf)
            .map_err(|err| self.base.host_error(err))?;
        dispatch::decode_element(self.inner_kind, &self.element_context(cx), &buf)
    }

    /// Writes element `index`; `index == len` appends.
    pub fn set_element(
        &self,
        index: usize,
        value: &ScriptValue,
        cx: &MarshalContext<'_>,
    ) -> BindingResult<()> {
        let bytes = dispatch::encode_element(self.inner_kind, &self.element_context(cx), value)?;
        let len = self.len()?;
        if index > len {
            return Err(self.base.out_of_range(format!("index {}", index + 1)));
        }
        if index == len {
            self.resize(len + 1)?;
        }
        self.write_raw(index, &bytes)
    }

    fn write_raw(&self, index: usize, bytes: &[u8]) -> BindingResult<()> {
        self.base
            .host()
            .array_write(self.base.object(), self.base.meta().id, index, bytes)
            .map_err(|err| self.base.host_error(err))
    }

    fn index_value(
        &self,
        lua: &Lua,
        runtime: &BindingRuntime,
        index: usize,
    ) -> mlua::Result<Value> {
        let len = runtime.observe(self.len())?;
        if index >= len {
            return Ok(Value::Nil);
        }
        let value = runtime.observe(self.element(index, &runtime.marshal_context()))?;
        convert::to_lua(lua, runtime, value)
    }
}

impl PropertyCapabilities for ArrayBinding {
    fn base(&self) -> &BindingBase {
        &self.base
    }
}

impl PropertyBinding for ArrayBinding {
    const KIND: PropertyKind = PropertyKind::Array;

    fn from_base(base: BindingBase) -> BindingResult<Self> {
        base.expect_kind(Self::KIND)?;
        let Some(inner) = base.meta().inner.clone() else {
            return Err(BindingError::UnsupportedKind {
                identity: base.identity(),
                property: base.name().to_string(),
                expected: Self::KIND,
                type_name: "ArrayProperty without element metadata".to_string(),
            });
        };
        let inner_kind = PropertyKind::from_type_name(&inner.type_name).ok_or_else(|| {
            BindingError::UnknownPropertyKind {
                identity: base.identity(),
                property: inner.name.clone(),
                type_name: inner.type_name.clone(),
            }
        })?;
        if !inner_kind.is_element_kind() {
            let err = BindingError::UnsupportedKind {
                identity: base.identity(),
                property: inner.name.clone(),
                expected: Self::KIND,
                type_name: format!("nested {}", inner.type_name),
            };
            tracing::error!(target: "bindings", error = %err, "Nested containers are not bindable");
            return Err(err);
        }
        Ok(Self {
            base,
            inner,
            inner_kind,
        })
    }

    fn get(&self, cx: &MarshalContext<'_>) -> BindingResult<ScriptValue> {
        let len = self.len()?;
        let items = (0..len)
            .map(|index| self.element(index, cx))
            .collect::<BindingResult<Vec<_>>>()?;
        Ok(ScriptValue::List(items))
    }

    fn set(&self, value: &ScriptValue, cx: &MarshalContext<'_>) -> BindingResult<()> {
        let ScriptValue::List(items) = value else {
            return Err(self.base.type_mismatch("table", value));
        };
        let element = self.element_context(cx);
        let encoded = items
            .iter()
            .map(|item| dispatch::encode_element(self.inner_kind, &element, item))
            .collect::<BindingResult<Vec<_>>>()?;

        self.resize(encoded.len())?;
        for (index, bytes) in encoded.iter().enumerate() {
            self.write_raw(index, bytes)?;
        }
        Ok(())
    }

    fn add_member_functions<M: UserDataMethods<Handle<Self>>>(methods: &mut M) {
        methods.add_method("GetArrayNum", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.observe(this.binding().len())
        });
        methods.add_method("Empty", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.observe(this.binding().resize(0))
        });
        methods.add_method("Resize", |lua, this, len: usize| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.observe(this.binding().resize(len))
        });
        methods.add_method("GetInnerKind", |_, this, ()| {
            Ok(this.binding().inner_kind.type_name())
        });
        // 回调返回 true 时提前结束
        methods.add_method("ForEach", |lua, this, callback: Function| {
            let runtime = BindingRuntime::from_lua(lua)?;
            let len = runtime.observe(this.binding().len())?;
            for index in 0..len {
                let value = this.binding().index_value(lua, &runtime, index)?;
                let stop: Value = callback.call((index + 1, value))?;
                if matches!(stop, Value::Boolean(true)) {
                    break;
                }
            }
            Ok(())
        });
        methods.add_meta_method(MetaMethod::Len, |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.observe(this.binding().len())
        });
    }

    fn index(&self, lua: &Lua, runtime: &BindingRuntime, key: &Value) -> mlua::Result<Option<Value>> {
        match element_index(key) {
            Some(index) => self.index_value(lua, runtime, index).map(Some),
            None => Ok(None),
        }
    }

    fn new_index(
        &self,
        _lua: &Lua,
        runtime: &BindingRuntime,
        key: &Value,
        value: &Value,
    ) -> mlua::Result<bool> {
        let Some(index) = element_index(key) else {
            return Ok(false);
        };
        let value = convert::from_lua(value)?;
        runtime.observe(self.set_element(index, &value, &runtime.marshal_context()))?;
        Ok(true)
    }
}

impl ElementCodec for ArrayBinding {
    fn decode_element(element: &ElementContext<'_>, _bytes: &[u8]) -> BindingResult<ScriptValue> {
        Err(nested_container(element))
    }

    fn encode_element(element: &ElementContext<'_>, _value: &ScriptValue) -> BindingResult<Vec<u8>> {
        Err(nested_container(element))
    }
}

fn nested_container(element: &ElementContext<'_>) -> BindingError {
    BindingError::UnsupportedKind {
        identity: element.container.identity(),
        property: element.inner.name.clone(),
        expected: PropertyKind::Array,
        type_name: format!("nested {}", element.inner.type_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::test_support::Fixture;
    use property_bridge_reflection::ClassBuilder;

    fn inventory() -> Fixture {
        let class = ClassBuilder::new("Inventory")
            .array("Counts", "UInt16Property", 2)
            .array("Flags", "BoolProperty", 1)
            .array("Grid", "ArrayProperty", 16)
            .array("Tags", "MapProperty", 16)
            .build();
        Fixture::new(&class)
    }

    #[test]
    fn test_whole_array_round_trip() {
        let fx = inventory();
        let cx = fx.cx();
        let counts: ArrayBinding = fx.bind("Counts");
        assert_eq!(counts.get(&cx).unwrap(), ScriptValue::List(vec![]));

        let value = ScriptValue::List(vec![
            ScriptValue::Integer(1),
            ScriptValue::Integer(65535),
            ScriptValue::Integer(3),
        ]);
        counts.set(&value, &cx).unwrap();
        assert_eq!(counts.len().unwrap(), 3);
        assert_eq!(counts.get(&cx).unwrap(), value);
        assert_eq!(counts.element(1, &cx).unwrap(), ScriptValue::Integer(65535));
    }

    #[test]
    fn test_invalid_element_means_no_partial_write() {
        let fx = inventory();
        let cx = fx.cx();
        let counts: ArrayBinding = fx.bind("Counts");
        let original = ScriptValue::List(vec![ScriptValue::Integer(7)]);
        counts.set(&original, &cx).unwrap();

        let err = counts
            .set(
                &ScriptValue::List(vec![ScriptValue::Integer(1), ScriptValue::Integer(70000)]),
                &cx,
            )
            .unwrap_err();
        assert_eq!(err.code(), "ValueOutOfRange");
        assert_eq!(counts.get(&cx).unwrap(), original);
    }

    #[test]
    fn test_set_element_appends_at_end_only() {
        let fx = inventory();
        let cx = fx.cx();
        let flags: ArrayBinding = fx.bind("Flags");

        flags.set_element(0, &ScriptValue::Boolean(true), &cx).unwrap();
        flags.set_element(1, &ScriptValue::Boolean(false), &cx).unwrap();
        assert_eq!(flags.len().unwrap(), 2);
        assert_eq!(
            flags
                .set_element(5, &ScriptValue::Boolean(true), &cx)
                .unwrap_err()
                .code(),
            "ValueOutOfRange"
        );
        flags.resize(0).unwrap();
        assert!(flags.is_empty().unwrap());
    }

    #[test]
    fn test_resize_is_bounded() {
        let fx = inventory();
        let cx = fx.cx();
        let counts: ArrayBinding = fx.bind("Counts");
        counts
            .set(&ScriptValue::List(vec![ScriptValue::Integer(5)]), &cx)
            .unwrap();

        for len in [usize::MAX, 1 << 40, MAX_ARRAY_LEN + 1] {
            let err = counts.resize(len).unwrap_err();
            assert_eq!(err.code(), "ValueOutOfRange");
        }
        assert_eq!(counts.len().unwrap(), 1);
        counts.resize(MAX_ARRAY_LEN).unwrap();
        assert_eq!(counts.len().unwrap(), MAX_ARRAY_LEN);
    }

    #[test]
    fn test_unsupported_inner_kinds() {
        let fx = inventory();
        let nested = ArrayBinding::from_base(fx.base("Grid")).unwrap_err();
        assert_eq!(nested.code(), "UnsupportedKind");
        let unknown = ArrayBinding::from_base(fx.base("Tags")).unwrap_err();
        assert_eq!(unknown.code(), "UnknownPropertyKind");
    }

    #[test]
    fn test_stale_array() {
        let fx = inventory();
        let cx = fx.cx();
        let counts: ArrayBinding = fx.bind("Counts");
        fx.destroy();
        assert!(counts.len().unwrap_err().is_stale());
        assert!(counts.get(&cx).unwrap_err().is_stale());
    }

    #[test]
    fn test_script_index_is_one_based() {
        assert_eq!(element_index(&Value::Integer(1)), Some(0));
        assert_eq!(element_index(&Value::Number(3.0)), Some(2));
        assert_eq!(element_index(&Value::Integer(0)), None);
        assert_eq!(element_index(&Value::Integer(-4)), None);
        assert_eq!(element_index(&Value::Boolean(true)), None);
    }
}
