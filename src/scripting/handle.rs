//! 属性句柄
//!
//! 所有种类共享的脚本句柄：`get`/`set`、通用成员函数、元方法和缓存路由。
//! 种类特有的成员函数由 [`PropertyBinding::add_member_functions`] 追加。

use crate::bindings::dispatch::{self, resolve_kind};
use crate::bindings::{BindingBase, PropertyBinding, PropertyCapabilities, PropertyIdentity};
use crate::core::error::BindingError;
use crate::scripting::{convert, BindingRuntime};
use mlua::{AnyUserData, Lua, MetaMethod, UserData, UserDataMethods, Value};
use property_bridge_reflection::{ObjectId, PropertyMeta, ReflectionHost};
use std::sync::Arc;

/// Field name that reads or writes the bound value (`handle.Value`).
pub const VALUE_KEY: &str = "Value";

pub(crate) fn is_value_key(key: &Value) -> bool {
    match key {
        Value::String(text) => text.to_str().is_ok_and(|text| &*text == VALUE_KEY),
        _ => false,
    }
}

pub(crate) fn describe_key(key: &Value) -> String {
    match key {
        Value::String(text) => match text.to_str() {
            Ok(text) => format!("'{}'", &*text),
            Err(_) => "<binary string>".to_string(),
        },
        Value::Integer(index) => index.to_string(),
        Value::Number(index) => index.to_string(),
        other => format!("<{}>", other.type_name()),
    }
}

/// Script handle around one concrete binding.
pub struct Handle<B: PropertyBinding> {
    binding: B,
}

impl<B: PropertyBinding> Handle<B> {
    pub fn new(binding: B) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }
}

fn read_value<B: PropertyBinding>(lua: &Lua, binding: &B) -> mlua::Result<Value> {
    let runtime = BindingRuntime::from_lua(lua)?;
    let value = runtime.observe(binding.get(&runtime.marshal_context()))?;
    convert::to_lua(lua, &runtime, value)
}

fn write_value<B: PropertyBinding>(lua: &Lua, binding: &B, value: &Value) -> mlua::Result<()> {
    let runtime = BindingRuntime::from_lua(lua)?;
    let value = convert::from_lua(value)?;
    runtime.observe(binding.set(&value, &runtime.marshal_context()))
}

impl<B: PropertyBinding> UserData for Handle<B> {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("get", |lua, this, ()| read_value(lua, &this.binding));
        methods.add_method("set", |lua, this, value: Value| {
            write_value(lua, &this.binding, &value)
        });
        methods.add_method("GetName", |_, this, ()| {
            Ok(this.binding.base().name().to_string())
        });
        methods.add_method("GetKind", |_, this, ()| Ok(this.binding.kind().type_name()));
        methods.add_method("GetOffset", |_, this, ()| Ok(this.binding.base().offset()));
        methods.add_method("IsValid", |_, this, ()| Ok(this.binding.is_valid()));
        methods.add_method("GetIdentity", |_, this, ()| {
            let identity = this.binding.identity();
            Ok((identity.object.raw(), identity.property.0))
        });
        methods.add_method("GetOwner", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            runtime.object_handle(lua, this.binding.base().object())
        });

        B::add_member_functions(methods);

        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            if is_value_key(&key) {
                return read_value(lua, &this.binding);
            }
            let runtime = BindingRuntime::from_lua(lua)?;
            Ok(this.binding.index(lua, &runtime, &key)?.unwrap_or(Value::Nil))
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, value): (Value, Value)| {
                if is_value_key(&key) {
                    return write_value(lua, &this.binding, &value);
                }
                let runtime = BindingRuntime::from_lua(lua)?;
                if this.binding.new_index(lua, &runtime, &key, &value)? {
                    return Ok(());
                }
                Err(mlua::Error::RuntimeError(format!(
                    "cannot assign field {} of {} '{}'",
                    describe_key(&key),
                    B::KIND,
                    this.binding.base().name()
                )))
            },
        );

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!(
                "{}({} @ {})",
                B::KIND,
                this.binding.base().name(),
                this.binding.identity()
            ))
        });
    }
}

/// Creates, or fetches from the cache, the handle for `base`.
pub(crate) fn construct_cached<B: PropertyBinding>(
    lua: &Lua,
    runtime: &BindingRuntime,
    base: BindingBase,
) -> mlua::Result<AnyUserData> {
    let key = base.key();
    runtime.cached(key, || {
        let binding = runtime.observe(B::from_base(base))?;
        let kind = B::KIND;
        tracing::trace!(target: "bindings", %key, %kind, "Constructed property handle");
        lua.create_userdata(Handle::new(binding))
    })
}

/// Kind-erased metadata handle; `Specialize` turns it into a typed handle.
pub struct PropertyInfo {
    base: BindingBase,
}

impl PropertyInfo {
    pub fn new(base: BindingBase) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BindingBase {
        &self.base
    }
}

impl UserData for PropertyInfo {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("GetName", |_, this, ()| Ok(this.base.name().to_string()));
        methods.add_method("GetKind", |_, this, ()| Ok(this.base.kind().type_name()));
        methods.add_method("GetTypeName", |_, this, ()| {
            Ok(this.base.meta().type_name.clone())
        });
        methods.add_method("GetOffset", |_, this, ()| Ok(this.base.offset()));
        methods.add_method("GetSize", |_, this, ()| Ok(this.base.meta().size));
        methods.add_method("IsValid", |_, this, ()| Ok(this.base.is_valid()));
        methods.add_method("Specialize", |lua, this, ()| {
            let runtime = BindingRuntime::from_lua(lua)?;
            dispatch::rewrap(lua, &runtime, &this.base)
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("PropertyInfo({} : {})", this.base.name(), this.base.kind()))
        });
    }
}

/// Stand-in handle for a property whose kind has no binding.
///
/// Metadata queries work; reading or writing the value fails with
/// `UnknownPropertyKind`.
pub struct OpaqueHandle {
    host: Arc<dyn ReflectionHost>,
    object: ObjectId,
    meta: Arc<PropertyMeta>,
}

impl OpaqueHandle {
    pub fn new(host: Arc<dyn ReflectionHost>, object: ObjectId, meta: Arc<PropertyMeta>) -> Self {
        Self { host, object, meta }
    }

    fn refuse(&self, lua: &Lua) -> mlua::Error {
        let err = match resolve_kind(self.object, &self.meta) {
            Err(err) => err,
            Ok(kind) => BindingError::UnsupportedKind {
                identity: PropertyIdentity::new(self.object, self.meta.id),
                property: self.meta.name.clone(),
                expected: kind,
                type_name: self.meta.type_name.clone(),
            },
        };
        match BindingRuntime::from_lua(lua) {
            Ok(runtime) => runtime.reject(err),
            Err(missing) => missing,
        }
    }
}

impl UserData for OpaqueHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("GetName", |_, this, ()| Ok(this.meta.name.clone()));
        methods.add_method("GetTypeName", |_, this, ()| Ok(this.meta.type_name.clone()));
        methods.add_method("GetOffset", |_, this, ()| Ok(this.meta.offset));
        methods.add_method("IsValid", |_, this, ()| Ok(this.host.is_live(this.object)));
        methods.add_method("get", |lua, this, ()| Err::<(), _>(this.refuse(lua)));
        methods.add_method("set", |lua, this, _value: Value| Err::<(), _>(this.refuse(lua)));
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            if is_value_key(&key) {
                return Err::<Value, _>(this.refuse(lua));
            }
            Ok(Value::Nil)
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("Opaque({} : {} @ {})", this.meta.name, this.meta.type_name, this.object))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{BoolBinding, Int32Binding};
    use crate::cache::HandleKey;
    use crate::config::BridgeConfig;
    use property_bridge_reflection::{ClassBuilder, InMemoryHost};
    use std::rc::Rc;

    fn setup() -> (Lua, Rc<BindingRuntime>, Arc<InMemoryHost>, ObjectId) {
        let lua = Lua::new();
        let host = Arc::new(InMemoryHost::new());
        let class = ClassBuilder::new("Actor").bool("bHidden").int32("Health").build();
        let actor = host.spawn(&class, "Actor_0");
        let runtime = Rc::new(BindingRuntime::new(&lua, host.clone(), BridgeConfig::default()).unwrap());
        lua.set_app_data(Rc::clone(&runtime));
        (lua, runtime, host, actor)
    }

    fn meta(runtime: &BindingRuntime, actor: ObjectId, name: &str) -> Arc<PropertyMeta> {
        runtime.property_meta(actor, name).unwrap()
    }

    #[test]
    fn test_construct_from_native_checks_kind() {
        let (lua, runtime, _host, actor) = setup();
        let health = meta(&runtime, actor, "Health");

        let err = BoolBinding::construct_from_native(&lua, &runtime, actor, &health).unwrap_err();
        assert!(err.to_string().contains("UnsupportedKind"));
        assert!(runtime.lookup(HandleKey::property(actor, health.id)).unwrap().is_none());

        let handle = Int32Binding::construct_from_native(&lua, &runtime, actor, &health).unwrap();
        assert!(handle.is::<Handle<Int32Binding>>());
    }

    #[test]
    fn test_rewrap_reuses_cached_handle() {
        let (lua, runtime, host, actor) = setup();
        let health = meta(&runtime, actor, "Health");
        let first = dispatch::bind(&lua, &runtime, actor, &health).unwrap();

        let base = BindingBase::new(host, actor, health).unwrap();
        let again = Int32Binding::construct_from_existing_base(&lua, &runtime, &base).unwrap();
        let same: bool = lua
            .load("local a, b = ...; return rawequal(a, b)")
            .call((first, again))
            .unwrap();
        assert!(same);

        let err = BoolBinding::construct_from_existing_base(&lua, &runtime, &base).unwrap_err();
        assert!(err.to_string().contains("KindMismatch"));
        assert_eq!(runtime.diagnostics().error_count("KindMismatch"), 1);
    }

    #[test]
    fn test_value_key_and_tostring() {
        let (lua, runtime, _host, actor) = setup();
        let hidden = meta(&runtime, actor, "bHidden");
        let handle = dispatch::bind(&lua, &runtime, actor, &hidden).unwrap();

        let (value, text): (bool, String) = lua
            .load("local h = ...; h.Value = true; return h:get(), tostring(h)")
            .call(handle)
            .unwrap();
        assert!(value);
        assert!(text.starts_with("BoolProperty(bHidden @ "), "{text}");
        assert!(is_value_key(&Value::String(lua.create_string("Value").unwrap())));
        assert!(!is_value_key(&Value::Integer(1)));
    }

    #[test]
    fn test_unknown_field_assignment_fails() {
        let (lua, runtime, _host, actor) = setup();
        let health = meta(&runtime, actor, "Health");
        let handle = dispatch::bind(&lua, &runtime, actor, &health).unwrap();

        let ok: bool = lua
            .load("local h = ...; return pcall(function() h.Bogus = 1 end)")
            .call(handle)
            .unwrap();
        assert!(!ok);
    }
}
