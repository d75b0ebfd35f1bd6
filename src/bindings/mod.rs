//! 属性绑定层
//!
//! 每种反射属性种类对应一个绑定类型，负责在原生字节与 [`ScriptValue`]
//! 之间编组，并向脚本句柄注册该种类特有的成员函数。
//!
//! ## 模块
//!
//! - [`kind`] - 属性种类标签与整数编组族
//! - [`base`] - 种类擦除的 [`BindingBase`] 与能力集 trait
//! - [`marshal`] - 共享的编组辅助函数
//! - [`dispatch`] - 种类标签到绑定的唯一分派点
//! - 各种类的具体绑定：布尔、整数、浮点、对象引用、数组、枚举

pub mod array_property;
pub mod base;
pub mod bool_property;
pub mod dispatch;
pub mod enum_property;
pub mod float_property;
pub mod integer_property;
pub mod kind;
pub mod marshal;
pub mod object_property;
pub mod value;

#[cfg(test)]
mod property_tests;
#[cfg(test)]
pub(crate) mod test_support;

pub use array_property::ArrayBinding;
pub use base::{BindingBase, PropertyCapabilities, PropertyIdentity};
pub use bool_property::BoolBinding;
pub use dispatch::AnyBinding;
pub use enum_property::EnumBinding;
pub use float_property::{DoubleBinding, FloatBinding, Float32Binding, NativeFloat};
pub use integer_property::{
    ByteBinding, Int16Binding, Int32Binding, Int64Binding, Int8Binding, IntegerBinding,
    NativeInteger, UInt16Binding, UInt32Binding, UInt64Binding,
};
pub use kind::{GenericDataType, PropertyKind};
pub use marshal::{MarshalContext, UnsignedOverflowPolicy};
pub use object_property::ObjectBinding;
pub use value::ScriptValue;

use crate::core::error::BindingResult;
use crate::scripting::{handle, BindingRuntime, Handle};
use mlua::{AnyUserData, Lua, UserDataMethods, Value};
use property_bridge_reflection::{ObjectId, PropertyMeta};
use std::sync::Arc;

/// A concrete binding for one property kind.
///
/// Implementations only describe marshalling and their member functions;
/// the script handle, metamethods and cache routing are shared.
pub trait PropertyBinding: PropertyCapabilities + Sized + 'static {
    const KIND: PropertyKind;

    /// Specializes a kind-erased base. Fails with `KindMismatch` when the
    /// base is of another kind.
    fn from_base(base: BindingBase) -> BindingResult<Self>;

    /// Marshals native to script. Fails with `StaleReference` for a
    /// destroyed object.
    fn get(&self, cx: &MarshalContext<'_>) -> BindingResult<ScriptValue>;

    /// Validates and marshals script to native. Nothing is written when
    /// validation fails.
    fn set(&self, value: &ScriptValue, cx: &MarshalContext<'_>) -> BindingResult<()>;

    fn add_member_functions<M: UserDataMethods<Handle<Self>>>(_methods: &mut M) {}

    /// `__index` for keys that are neither methods nor `Value`.
    fn index(
        &self,
        _lua: &Lua,
        _runtime: &BindingRuntime,
        _key: &Value,
    ) -> mlua::Result<Option<Value>> {
        Ok(None)
    }

    /// `__newindex` for keys other than `Value`; `false` if unhandled.
    fn new_index(
        &self,
        _lua: &Lua,
        _runtime: &BindingRuntime,
        _key: &Value,
        _value: &Value,
    ) -> mlua::Result<bool> {
        Ok(false)
    }

    /// Script handle for `meta` of `object`, through the cache.
    ///
    /// Fails with `UnsupportedKind` if the property is not of this kind.
    fn construct_from_native(
        lua: &Lua,
        runtime: &BindingRuntime,
        object: ObjectId,
        meta: &Arc<PropertyMeta>,
    ) -> mlua::Result<AnyUserData> {
        let base = runtime.observe(BindingBase::new_as(
            Arc::clone(runtime.host()),
            object,
            Arc::clone(meta),
            Self::KIND,
        ))?;
        handle::construct_cached::<Self>(lua, runtime, base)
    }

    /// Re-wraps a kind-erased base, through the cache.
    ///
    /// Fails with `KindMismatch` if the kinds disagree.
    fn construct_from_existing_base(
        lua: &Lua,
        runtime: &BindingRuntime,
        base: &BindingBase,
    ) -> mlua::Result<AnyUserData> {
        runtime.observe(base.expect_kind(Self::KIND))?;
        handle::construct_cached::<Self>(lua, runtime, base.clone())
    }
}

/// What an element codec needs to know about its container.
pub struct ElementContext<'a> {
    /// The container property; errors are reported against it.
    pub container: &'a BindingBase,
    pub inner: &'a PropertyMeta,
    pub cx: &'a MarshalContext<'a>,
}

/// Marshalling of one container element.
pub trait ElementCodec {
    fn decode_element(element: &ElementContext<'_>, bytes: &[u8]) -> BindingResult<ScriptValue>;

    fn encode_element(element: &ElementContext<'_>, value: &ScriptValue) -> BindingResult<Vec<u8>>;
}
