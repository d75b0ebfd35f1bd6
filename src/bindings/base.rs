//! 属性绑定基类
//!
//! 所有对宿主内存的读写都经过 [`BindingBase`]，先探测对象存活再访问。

use crate::bindings::marshal::ConversionFault;
use crate::bindings::{PropertyKind, ScriptValue};
use crate::cache::HandleKey;
use crate::core::error::{BindingError, BindingResult};
use property_bridge_reflection::{HostError, ObjectId, PropertyId, PropertyMeta, ReflectionHost};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// (object identity, property metadata id) pair naming one native field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyIdentity {
    pub object: ObjectId,
    pub property: PropertyId,
}

impl PropertyIdentity {
    pub fn new(object: ObjectId, property: PropertyId) -> Self {
        Self { object, property }
    }

    /// Cache key of the handle for this property.
    pub fn key(&self) -> HandleKey {
        HandleKey::property(self.object, self.property)
    }
}

impl fmt::Display for PropertyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.object, self.property)
    }
}

/// Kind-erased, non-owning reference to one property of one native object.
#[derive(Clone)]
pub struct BindingBase {
    identity: PropertyIdentity,
    meta: Arc<PropertyMeta>,
    kind: PropertyKind,
    host: Arc<dyn ReflectionHost>,
}

impl fmt::Debug for BindingBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingBase")
            .field("identity", &self.identity)
            .field("name", &self.meta.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl BindingBase {
    /// Resolves the kind from the metadata's type tag.
    pub fn new(
        host: Arc<dyn ReflectionHost>,
        object: ObjectId,
        meta: Arc<PropertyMeta>,
    ) -> BindingResult<Self> {
        let identity = PropertyIdentity::new(object, meta.id);
        let kind = PropertyKind::from_type_name(&meta.type_name).ok_or_else(|| {
            BindingError::UnknownPropertyKind {
                identity,
                property: meta.name.clone(),
                type_name: meta.type_name.clone(),
            }
        })?;
        Ok(Self {
            identity,
            meta,
            kind,
            host,
        })
    }

    /// Like [`BindingBase::new`], but the property must be of `expected` kind.
    pub fn new_as(
        host: Arc<dyn ReflectionHost>,
        object: ObjectId,
        meta: Arc<PropertyMeta>,
        expected: PropertyKind,
    ) -> BindingResult<Self> {
        if meta.type_name != expected.type_name() {
            let err = BindingError::UnsupportedKind {
                identity: PropertyIdentity::new(object, meta.id),
                property: meta.name.clone(),
                expected,
                type_name: meta.type_name.clone(),
            };
            tracing::error!(target: "bindings", error = %err, "Binding constructed for the wrong property kind");
            return Err(err);
        }
        Self::new(host, object, meta)
    }

    pub fn meta(&self) -> &Arc<PropertyMeta> {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn object(&self) -> ObjectId {
        self.identity.object
    }

    pub fn offset(&self) -> usize {
        self.meta.offset
    }

    pub fn host(&self) -> &Arc<dyn ReflectionHost> {
        &self.host
    }

    pub fn key(&self) -> HandleKey {
        self.identity.key()
    }

    pub fn ensure_valid(&self) -> BindingResult<()> {
        if self.host.is_live(self.identity.object) {
            Ok(())
        } else {
            Err(self.stale())
        }
    }

    /// Reads `buf.len()` bytes at `relative` past the property offset.
    pub fn read_field(&self, relative: usize, buf: &mut [u8]) -> BindingResult<()> {
        self.ensure_valid()?;
        self.host
            .read(self.identity.object, self.meta.offset + relative, buf)
            .map_err(|err| self.host_error(err))
    }

    pub fn write_field(&self, relative: usize, bytes: &[u8]) -> BindingResult<()> {
        self.ensure_valid()?;
        self.host
            .write(self.identity.object, self.meta.offset + relative, bytes)
            .map_err(|err| self.host_error(err))
    }

    /// 对象在探测之后被销毁时，宿主报告的 ObjectNotFound 同样视为失效引用
    pub fn host_error(&self, err: HostError) -> BindingError {
        match err {
            HostError::ObjectNotFound(object) if object == self.identity.object => self.stale(),
            other => BindingError::Host(other),
        }
    }

    pub fn stale(&self) -> BindingError {
        BindingError::StaleReference {
            identity: self.identity,
            property: self.meta.name.clone(),
            kind: self.kind,
        }
    }

    pub fn out_of_range(&self, value: impl fmt::Display) -> BindingError {
        BindingError::ValueOutOfRange {
            identity: self.identity,
            property: self.meta.name.clone(),
            kind: self.kind,
            value: value.to_string(),
        }
    }

    pub fn type_mismatch(&self, expected: impl Into<String>, got: &ScriptValue) -> BindingError {
        self.type_mismatch_described(expected, got.type_name())
    }

    /// Like [`type_mismatch`](Self::type_mismatch) with a free-form `got`.
    pub fn type_mismatch_described(
        &self,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> BindingError {
        BindingError::TypeMismatch {
            identity: self.identity,
            property: self.meta.name.clone(),
            kind: self.kind,
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn conversion_error(&self, fault: ConversionFault) -> BindingError {
        match fault {
            ConversionFault::WrongType { expected, got } => BindingError::TypeMismatch {
                identity: self.identity,
                property: self.meta.name.clone(),
                kind: self.kind,
                expected: expected.to_string(),
                got: got.to_string(),
            },
            ConversionFault::OutOfRange(value) => self.out_of_range(value),
        }
    }

    /// Fails with `KindMismatch` unless this base is of `expected` kind.
    pub fn expect_kind(&self, expected: PropertyKind) -> BindingResult<()> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(self.kind_mismatch(expected))
        }
    }

    fn kind_mismatch(&self, expected: PropertyKind) -> BindingError {
        let err = BindingError::KindMismatch {
            identity: self.identity,
            property: self.meta.name.clone(),
            expected,
            actual: self.kind,
        };
        tracing::error!(target: "bindings", error = %err, "Kind-erased binding re-wrapped as the wrong kind");
        err
    }
}

/// Capability set shared by every binding.
pub trait PropertyCapabilities {
    fn base(&self) -> &BindingBase;

    fn identity(&self) -> PropertyIdentity {
        self.base().identity
    }

    /// Best-effort liveness probe; never touches native memory.
    fn is_valid(&self) -> bool {
        self.base().host.is_live(self.base().identity.object)
    }

    fn kind(&self) -> PropertyKind {
        self.base().kind
    }
}

impl PropertyCapabilities for BindingBase {
    fn base(&self) -> &BindingBase {
        self
    }
}
