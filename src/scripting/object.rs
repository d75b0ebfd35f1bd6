//! 对象句柄
//!
//! 一个原生对象在脚本中的代表。按属性名索引读写属性值，`GetProperty`
//! 返回缓存中的属性句柄。

use crate::bindings::dispatch::{self, AnyBinding};
use crate::bindings::BindingBase;
use crate::scripting::handle::{OpaqueHandle, PropertyInfo};
use crate::scripting::{convert, BindingRuntime};
use mlua::{AnyUserData, Function, Lua, MetaMethod, UserData, UserDataMethods, Value};
use property_bridge_reflection::ObjectId;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHandle {
    object: ObjectId,
}

impl ObjectHandle {
    pub fn new(object: ObjectId) -> Self {
        Self { object }
    }

    pub fn id(&self) -> ObjectId {
        self.object
    }
}

fn property_value(lua: &Lua, object: ObjectId, name: &str) -> mlua::Result<Value> {
    let runtime = BindingRuntime::from_lua(lua)?;
    let meta = runtime.observe(runtime.property_meta(object, name))?;
    let binding = runtime.observe(AnyBinding::resolve(Arc::clone(runtime.host()), object, meta))?;
    let value = runtime.observe(binding.get(&runtime.marshal_context()))?;
    convert::to_lua(lua, &runtime, value)
}

fn set_property_value(lua: &Lua, object: ObjectId, name: &str, value: &Value) -> mlua::Result<()> {
    let runtime = BindingRuntime::from_lua(lua)?;
    let meta = runtime.observe(runtime.property_meta(object, name))?;
    let binding = runtime.observe(AnyBinding::resolve(Arc::clone(runtime.host()), object, meta))?;
    let value = convert::from_lua(value)?;
    runtime.observe(binding.set(&value, &runtime.marshal_context()))
}

impl UserData for ObjectHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("GetName", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            Ok(runtime.observe(runtime.describe(this.object))?.name)
        });
        methods.add_method("GetClassName", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            Ok(runtime.observe(runtime.describe(this.object))?.class.name.clone())
        });
        methods.add_method("GetAddress", |_, this, ()| Ok(this.object.raw()));
        methods.add_method("IsValid", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            Ok(runtime.host().is_live(this.object))
        });
        methods.add_method("IsDefaultObject", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            let descriptor = runtime.observe(runtime.describe(this.object))?;
            Ok(descriptor.flags.is_default_or_archetype())
        });
        methods.add_method("GetPropertyValue", |lua, this, name: String| {
            property_value(lua, this.object, &name)
        });
        methods.add_method(
            "SetPropertyValue",
            |lua, this, (name, value): (String, Value)| {
                set_property_value(lua, this.object, &name, &value)
            },
        );
        methods.add_method("GetProperty", |lua, this, name: String| {
            let runtime = BindingRuntime::from_lua(lua)?;
            let meta = runtime.observe(runtime.property_meta(this.object, &name))?;
            dispatch::bind_or_opaque(lua, &runtime, this.object, &meta)
        });
        methods.add_method("GetPropertyInfo", |lua, this, name: String| {
            let runtime = BindingRuntime::from_lua(lua)?;
            let meta = runtime.observe(runtime.property_meta(this.object, &name))?;
            let base = runtime.observe(BindingBase::new(
                Arc::clone(runtime.host()),
                this.object,
                meta,
            ))?;
            lua.create_userdata(PropertyInfo::new(base))
        });
        // 回调返回 true 时停止遍历
        methods.add_method("ForEachProperty", |lua, this, callback: Function| {
            let runtime = BindingRuntime::from_lua(lua)?;
            let descriptor = runtime.observe(runtime.describe(this.object))?;
            for meta in &descriptor.class.properties {
                let info: AnyUserData =
                    match BindingBase::new(Arc::clone(runtime.host()), this.object, Arc::clone(meta)) {
                        Ok(base) => lua.create_userdata(PropertyInfo::new(base))?,
                        Err(_) => lua.create_userdata(OpaqueHandle::new(
                            Arc::clone(runtime.host()),
                            this.object,
                            Arc::clone(meta),
                        ))?,
                    };
                let stop: Value = callback.call(info)?;
                if let Value::Boolean(true) = stop {
                    break;
                }
            }
            Ok(())
        });

        methods.add_meta_method(MetaMethod::Index, |lua, this, name: String| {
            property_value(lua, this.object, &name)
        });
        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (name, value): (String, Value)| {
                set_property_value(lua, this.object, &name, &value)
            },
        );
        methods.add_meta_method(MetaMethod::ToString, |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            Ok(match runtime.host().describe(this.object) {
                Some(descriptor) => format!(
                    "{} {} ({})",
                    descriptor.class.name, descriptor.name, this.object
                ),
                None => format!("<destroyed object {}>", this.object),
            })
        });
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: AnyUserData| {
            Ok(other
                .borrow::<ObjectHandle>()
                .map(|other| other.object == this.object)
                .unwrap_or(false))
        });
    }
}
