//! 绑定构造分派
//!
//! 种类标签到具体绑定的唯一映射在 `kind_table!` 中登记。生成的 `match`
//! 没有通配分支，新增 [`PropertyKind`] 变体而未登记绑定时无法通过编译。

use crate::bindings::{
    ArrayBinding, BindingBase, BoolBinding, ByteBinding, DoubleBinding, ElementCodec,
    ElementContext, EnumBinding, Float32Binding, Int16Binding, Int32Binding, Int64Binding,
    Int8Binding, MarshalContext, ObjectBinding, PropertyBinding, PropertyCapabilities,
    PropertyIdentity, PropertyKind, ScriptValue, UInt16Binding, UInt32Binding, UInt64Binding,
};
use crate::config::UnknownKindPolicy;
use crate::core::error::{BindingError, BindingResult};
use crate::scripting::{BindingRuntime, OpaqueHandle};
use mlua::{AnyUserData, Lua};
use property_bridge_reflection::{ObjectId, PropertyMeta, ReflectionHost};
use std::sync::Arc;

macro_rules! kind_table {
    ($($kind:ident => $binding:ty),* $(,)?) => {
        /// Kind-erased binding, one variant per supported kind.
        #[derive(Debug)]
        pub enum AnyBinding {
            $($kind($binding)),*
        }

        impl AnyBinding {
            pub fn from_base(base: BindingBase) -> BindingResult<Self> {
                Ok(match base.kind() {
                    $(PropertyKind::$kind => {
                        AnyBinding::$kind(<$binding as PropertyBinding>::from_base(base)?)
                    })*
                })
            }

            pub fn get(&self, cx: &MarshalContext<'_>) -> BindingResult<ScriptValue> {
                match self {
                    $(AnyBinding::$kind(binding) => binding.get(cx)),*
                }
            }

            pub fn set(&self, value: &ScriptValue, cx: &MarshalContext<'_>) -> BindingResult<()> {
                match self {
                    $(AnyBinding::$kind(binding) => binding.set(value, cx)),*
                }
            }
        }

        impl PropertyCapabilities for AnyBinding {
            fn base(&self) -> &BindingBase {
                match self {
                    $(AnyBinding::$kind(binding) => binding.base()),*
                }
            }
        }

        fn construct_for_kind(
            kind: PropertyKind,
            lua: &Lua,
            runtime: &BindingRuntime,
            object: ObjectId,
            meta: &Arc<PropertyMeta>,
        ) -> mlua::Result<AnyUserData> {
            match kind {
                $(PropertyKind::$kind => {
                    <$binding as PropertyBinding>::construct_from_native(lua, runtime, object, meta)
                })*
            }
        }

        fn rewrap_for_kind(
            kind: PropertyKind,
            lua: &Lua,
            runtime: &BindingRuntime,
            base: &BindingBase,
        ) -> mlua::Result<AnyUserData> {
            match kind {
                $(PropertyKind::$kind => {
                    <$binding as PropertyBinding>::construct_from_existing_base(lua, runtime, base)
                })*
            }
        }

        pub(crate) fn decode_element(
            kind: PropertyKind,
            element: &ElementContext<'_>,
            bytes: &[u8],
        ) -> BindingResult<ScriptValue> {
            match kind {
                $(PropertyKind::$kind => <$binding as ElementCodec>::decode_element(element, bytes)),*
            }
        }

        pub(crate) fn encode_element(
            kind: PropertyKind,
            element: &ElementContext<'_>,
            value: &ScriptValue,
        ) -> BindingResult<Vec<u8>> {
            match kind {
                $(PropertyKind::$kind => <$binding as ElementCodec>::encode_element(element, value)),*
            }
        }
    };
}

kind_table! {
    Bool => BoolBinding,
    Int8 => Int8Binding,
    Int16 => Int16Binding,
    Int32 => Int32Binding,
    Int64 => Int64Binding,
    Byte => ByteBinding,
    UInt16 => UInt16Binding,
    UInt32 => UInt32Binding,
    UInt64 => UInt64Binding,
    Float => Float32Binding,
    Double => DoubleBinding,
    Object => ObjectBinding,
    Array => ArrayBinding,
    Enum => EnumBinding,
}

impl AnyBinding {
    /// Binds `meta` of `object` without a script handle.
    pub fn resolve(
        host: Arc<dyn ReflectionHost>,
        object: ObjectId,
        meta: Arc<PropertyMeta>,
    ) -> BindingResult<Self> {
        Self::from_base(BindingBase::new(host, object, meta)?)
    }
}

/// Kind of `meta`, or `UnknownPropertyKind`.
pub fn resolve_kind(object: ObjectId, meta: &PropertyMeta) -> BindingResult<PropertyKind> {
    PropertyKind::from_type_name(&meta.type_name).ok_or_else(|| {
        BindingError::UnknownPropertyKind {
            identity: PropertyIdentity::new(object, meta.id),
            property: meta.name.clone(),
            type_name: meta.type_name.clone(),
        }
    })
}

/// Script handle for a native property, routed through the cache.
///
/// An unknown kind fails before the cache is touched.
pub fn bind(
    lua: &Lua,
    runtime: &BindingRuntime,
    object: ObjectId,
    meta: &Arc<PropertyMeta>,
) -> mlua::Result<AnyUserData> {
    let kind = runtime.observe(resolve_kind(object, meta))?;
    construct_for_kind(kind, lua, runtime, object, meta)
}

/// Re-wraps a kind-erased base as its concrete binding.
pub fn rewrap(lua: &Lua, runtime: &BindingRuntime, base: &BindingBase) -> mlua::Result<AnyUserData> {
    rewrap_for_kind(base.kind(), lua, runtime, base)
}

/// Like [`bind`], but honours [`UnknownKindPolicy::Opaque`].
pub fn bind_or_opaque(
    lua: &Lua,
    runtime: &BindingRuntime,
    object: ObjectId,
    meta: &Arc<PropertyMeta>,
) -> mlua::Result<AnyUserData> {
    match resolve_kind(object, meta) {
        Ok(kind) => construct_for_kind(kind, lua, runtime, object, meta),
        Err(err) if runtime.config().bindings.unknown_kind == UnknownKindPolicy::Opaque => {
            tracing::debug!(target: "bindings", error = %err, "Substituting opaque handle");
            lua.create_userdata(OpaqueHandle::new(
                Arc::clone(runtime.host()),
                object,
                Arc::clone(meta),
            ))
        }
        Err(err) => Err(runtime.reject(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::test_support::Fixture;
    use property_bridge_reflection::{ClassBuilder, ClassMeta};

    fn every_kind() -> Arc<ClassMeta> {
        ClassBuilder::new("Everything")
            .bool("Bool")
            .int8("Int8")
            .int16("Int16")
            .int32("Int32")
            .int64("Int64")
            .byte("Byte")
            .uint16("UInt16")
            .uint32("UInt32")
            .uint64("UInt64")
            .float("Float")
            .double("Double")
            .object("Object", None)
            .array("Array", "IntProperty", 4)
            .enumeration("Enum", &[("A", 0)])
            .custom("Map", "MapProperty", 16, 8)
            .build()
    }

    #[test]
    fn test_every_kind_has_a_binding() {
        let fx = Fixture::new(&every_kind());
        for kind in PropertyKind::ALL {
            let name = format!("{kind:?}");
            let binding = AnyBinding::from_base(fx.base(&name)).unwrap();
            assert_eq!(binding.kind(), kind, "{name}");
            assert_eq!(binding.identity().object, fx.object);
        }
    }

    #[test]
    fn test_resolve_kind_rejects_unknown_tags() {
        let class = every_kind();
        let map = class.find_property("Map").unwrap();
        let err = resolve_kind(ObjectId(1), map).unwrap_err();
        assert_eq!(err.code(), "UnknownPropertyKind");
        assert!(err.is_recoverable());
        assert_eq!(
            resolve_kind(ObjectId(1), class.find_property("Double").unwrap()),
            Ok(PropertyKind::Double)
        );
    }

    #[test]
    fn test_any_binding_get_set() {
        let fx = Fixture::new(&every_kind());
        let cx = fx.cx();
        let meta = Arc::clone(fx.class.find_property("UInt16").unwrap());
        let binding = AnyBinding::resolve(fx.host.clone(), fx.object, meta).unwrap();

        binding.set(&ScriptValue::Integer(513), &cx).unwrap();
        assert_eq!(binding.get(&cx).unwrap(), ScriptValue::Integer(513));
        assert!(matches!(binding, AnyBinding::UInt16(_)));
    }

    #[test]
    fn test_element_dispatch_follows_inner_kind() {
        let fx = Fixture::new(&every_kind());
        let cx = fx.cx();
        let array = fx.base("Array");
        let inner = PropertyMeta::new("Array.Inner", "IntProperty", 0, 4);
        let element = ElementContext {
            container: &array,
            inner: &inner,
            cx: &cx,
        };
        let bytes = encode_element(PropertyKind::Int32, &element, &ScriptValue::Integer(-1)).unwrap();
        assert_eq!(bytes, vec![0xFF; 4]);
        assert_eq!(
            decode_element(PropertyKind::Int32, &element, &bytes).unwrap(),
            ScriptValue::Integer(-1)
        );
        assert_eq!(
            encode_element(PropertyKind::Array, &element, &ScriptValue::Nil)
                .unwrap_err()
                .code(),
            "UnsupportedKind"
        );
    }
}
