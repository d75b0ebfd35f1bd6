//! The host reflection boundary.

use crate::error::HostResult;
use crate::meta::{ObjectDescriptor, ObjectId, PropertyId};
use crossbeam_channel::Receiver;

/// What the binding layer needs from the host's object system.
///
/// Implementations are shared with the host engine's own threads, hence
/// `Send + Sync`. Every accessor must fail with
/// [`HostError::ObjectNotFound`](crate::HostError::ObjectNotFound) rather than
/// touch memory of a destroyed object.
pub trait ReflectionHost: Send + Sync {
    /// Liveness probe ("is this object still allocated").
    fn is_live(&self, object: ObjectId) -> bool;

    fn describe(&self, object: ObjectId) -> Option<ObjectDescriptor>;

    fn find_object(&self, name: &str) -> Option<ObjectId>;

    /// Copies `buf.len()` bytes starting at `offset` inside `object`.
    fn read(&self, object: ObjectId, offset: usize, buf: &mut [u8]) -> HostResult<()>;

    fn write(&self, object: ObjectId, offset: usize, bytes: &[u8]) -> HostResult<()>;

    fn array_len(&self, object: ObjectId, property: PropertyId) -> HostResult<usize>;

    fn array_read(
        &self,
        object: ObjectId,
        property: PropertyId,
        index: usize,
        buf: &mut [u8],
    ) -> HostResult<()>;

    fn array_write(
        &self,
        object: ObjectId,
        property: PropertyId,
        index: usize,
        bytes: &[u8],
    ) -> HostResult<()>;

    /// Resizes a container; new elements are zeroed.
    fn array_resize(&self, object: ObjectId, property: PropertyId, len: usize) -> HostResult<()>;

    /// Channel of destruction notifications, if the host publishes them.
    fn subscribe_destroyed(&self) -> Option<Receiver<ObjectId>> {
        None
    }
}
