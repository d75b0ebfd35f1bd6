//! 统一错误处理模块
//!
//! ## 错误类型分层
//!
//! - **绑定层错误** ([`BindingError`]): 单个属性句柄上的 get/set/构造失败，
//!   会以可捕获的脚本错误形式出现在 Lua 中
//! - **桥接层错误** ([`BridgeError`]): 对外门面，额外包含脚本运行时、配置和IO错误
//!
//! 宿主访问错误 ([`HostError`]) 来自反射子crate，通过 `BindingError::Host` 传递。

use crate::bindings::{PropertyIdentity, PropertyKind};
use crate::config::ConfigError;
use property_bridge_reflection::{HostError, ObjectId};
use std::convert::Infallible;
use thiserror::Error;

/// Failure of a property binding operation.
///
/// Messages always name the property and its identity so that a script
/// author can tell which handle failed from the `pcall` error text alone.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("StaleReference: {kind} '{property}' at {identity} refers to a destroyed native object")]
    StaleReference {
        identity: PropertyIdentity,
        property: String,
        kind: PropertyKind,
    },

    #[error("StaleReference: native object {object} is no longer valid")]
    StaleObject { object: ObjectId },

    #[error("UnknownPropertyKind: property '{property}' at {identity} has unsupported type '{type_name}'")]
    UnknownPropertyKind {
        identity: PropertyIdentity,
        property: String,
        type_name: String,
    },

    #[error("KindMismatch: cannot re-wrap {actual} '{property}' at {identity} as {expected}")]
    KindMismatch {
        identity: PropertyIdentity,
        property: String,
        expected: PropertyKind,
        actual: PropertyKind,
    },

    #[error("ValueOutOfRange: {value} does not fit {kind} '{property}' at {identity}")]
    ValueOutOfRange {
        identity: PropertyIdentity,
        property: String,
        kind: PropertyKind,
        value: String,
    },

    #[error("UnsupportedKind: {expected} binding cannot wrap '{type_name}' property '{property}' at {identity}")]
    UnsupportedKind {
        identity: PropertyIdentity,
        property: String,
        expected: PropertyKind,
        type_name: String,
    },

    #[error("TypeMismatch: {kind} '{property}' at {identity} expects {expected}, got {got}")]
    TypeMismatch {
        identity: PropertyIdentity,
        property: String,
        kind: PropertyKind,
        expected: String,
        got: String,
    },

    #[error("NoSuchProperty: class '{class}' of object {object} has no property '{property}'")]
    NoSuchProperty {
        object: ObjectId,
        class: String,
        property: String,
    },

    #[error("Host access failed: {0}")]
    Host(#[from] HostError),
}

impl BindingError {
    /// Stable code used as the diagnostics counter key.
    pub fn code(&self) -> &'static str {
        match self {
            BindingError::StaleReference { .. } | BindingError::StaleObject { .. } => {
                "StaleReference"
            }
            BindingError::UnknownPropertyKind { .. } => "UnknownPropertyKind",
            BindingError::KindMismatch { .. } => "KindMismatch",
            BindingError::ValueOutOfRange { .. } => "ValueOutOfRange",
            BindingError::UnsupportedKind { .. } => "UnsupportedKind",
            BindingError::TypeMismatch { .. } => "TypeMismatch",
            BindingError::NoSuchProperty { .. } => "NoSuchProperty",
            BindingError::Host(_) => "Host",
        }
    }

    /// `false` for programming errors in the binding layer itself.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            BindingError::KindMismatch { .. } | BindingError::UnsupportedKind { .. }
        )
    }

    /// Property the error was raised for, when there is one.
    pub fn identity(&self) -> Option<PropertyIdentity> {
        match self {
            BindingError::StaleReference { identity, .. }
            | BindingError::UnknownPropertyKind { identity, .. }
            | BindingError::KindMismatch { identity, .. }
            | BindingError::ValueOutOfRange { identity, .. }
            | BindingError::UnsupportedKind { identity, .. }
            | BindingError::TypeMismatch { identity, .. } => Some(*identity),
            BindingError::StaleObject { .. }
            | BindingError::NoSuchProperty { .. }
            | BindingError::Host(_) => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            BindingError::StaleReference { .. } | BindingError::StaleObject { .. }
        )
    }
}

impl From<Infallible> for BindingError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// 桥接层错误类型
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("Script error: {0}")]
    Script(#[from] mlua::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),
}

impl BridgeError {
    /// The binding error behind this failure, looking through script
    /// callback wrappers.
    pub fn binding_error(&self) -> Option<&BindingError> {
        match self {
            BridgeError::Binding(err) => Some(err),
            BridgeError::Script(err) => binding_error_of(err),
            _ => None,
        }
    }
}

/// Finds the [`BindingError`] carried by a script error, if any.
pub fn binding_error_of(err: &mlua::Error) -> Option<&BindingError> {
    match err {
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<BindingError>(),
        mlua::Error::CallbackError { cause, .. } => binding_error_of(cause),
        mlua::Error::WithContext { cause, .. } => binding_error_of(cause),
        _ => None,
    }
}

pub type BindingResult<T> = Result<T, BindingError>;
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::ExternalError;
    use property_bridge_reflection::PropertyId;

    fn identity() -> PropertyIdentity {
        PropertyIdentity::new(ObjectId(0xABCD), PropertyId(7))
    }

    #[test]
    fn test_error_display_names_identity_and_kind() {
        let err = BindingError::ValueOutOfRange {
            identity: identity(),
            property: "Ammo".to_string(),
            kind: PropertyKind::Int8,
            value: "300".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ValueOutOfRange: 300 does not fit Int8Property 'Ammo' at 0xABCD/#7"
        );
    }

    #[test]
    fn test_recoverability() {
        let stale = BindingError::StaleReference {
            identity: identity(),
            property: "bAlive".to_string(),
            kind: PropertyKind::Bool,
        };
        let mismatch = BindingError::KindMismatch {
            identity: identity(),
            property: "bAlive".to_string(),
            expected: PropertyKind::Int32,
            actual: PropertyKind::Bool,
        };
        assert!(stale.is_recoverable());
        assert!(stale.is_stale());
        assert!(!mismatch.is_recoverable());
        assert_eq!(mismatch.code(), "KindMismatch");
    }

    #[test]
    fn test_error_conversion() {
        let host_err = HostError::ObjectNotFound(ObjectId(1));
        let binding_err: BindingError = host_err.into();
        let bridge_err: BridgeError = binding_err.into();
        assert!(matches!(bridge_err, BridgeError::Binding(BindingError::Host(_))));
    }

    #[test]
    fn test_binding_error_survives_script_wrapping() {
        let err = BindingError::StaleObject {
            object: ObjectId(5),
        };
        let lua_err = mlua::Error::CallbackError {
            traceback: String::new(),
            cause: std::sync::Arc::new(err.clone().into_lua_err()),
        };
        assert_eq!(binding_error_of(&lua_err), Some(&err));
        let bridge: BridgeError = lua_err.into();
        assert_eq!(bridge.binding_error().map(BindingError::code), Some("StaleReference"));
    }
}
