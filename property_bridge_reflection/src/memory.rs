//! 内存宿主
//!
//! 以字节缓冲区模拟宿主引擎的原生对象图。对象内存零初始化，
//! 容器属性的元素单独存放。所有访问都先检查对象是否存活。

use crate::error::{HostError, HostResult};
use crate::host::ReflectionHost;
use crate::meta::{ClassMeta, ObjectDescriptor, ObjectFlags, ObjectId, PropertyId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 自动分配ID的起始值与步长（模拟对象地址）
const FIRST_OBJECT_ID: u64 = 0x1_0000;
const OBJECT_ID_STRIDE: u64 = 0x100;

/// 单个容器的字节上限
pub const MAX_CONTAINER_BYTES: usize = 1 << 30;

struct NativeObject {
    descriptor: ObjectDescriptor,
    memory: Vec<u8>,
    containers: HashMap<PropertyId, Vec<u8>>,
}

impl NativeObject {
    fn check_range(&self, offset: usize, len: usize) -> HostResult<()> {
        let end = offset.checked_add(len);
        match end {
            Some(end) if end <= self.memory.len() => Ok(()),
            _ => Err(HostError::OutOfBounds {
                object: self.descriptor.id,
                offset,
                len,
                size: self.memory.len(),
            }),
        }
    }

    fn element_size(&self, property: PropertyId) -> HostResult<usize> {
        self.descriptor
            .class
            .property_by_id(property)
            .and_then(|meta| meta.inner.as_ref())
            .map(|inner| inner.size)
            .ok_or(HostError::NotAContainer {
                object: self.descriptor.id,
                property,
            })
    }

    fn container(&self, property: PropertyId) -> HostResult<(&[u8], usize)> {
        let element_size = self.element_size(property)?;
        let data = self
            .containers
            .get(&property)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Ok((data, element_size))
    }
}

/// In-process host whose objects are plain byte buffers.
///
/// Thread-safe: host threads may mutate or destroy objects while the script
/// thread reads them.
pub struct InMemoryHost {
    objects: RwLock<HashMap<ObjectId, NativeObject>>,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Sender<ObjectId>>>,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(FIRST_OBJECT_ID),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn objects(&self) -> RwLockReadGuard<'_, HashMap<ObjectId, NativeObject>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn objects_mut(&self) -> RwLockWriteGuard<'_, HashMap<ObjectId, NativeObject>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 以自动分配的ID创建对象
    pub fn spawn(&self, class: &Arc<ClassMeta>, name: impl Into<String>) -> ObjectId {
        let mut objects = self.objects_mut();
        let id = loop {
            let candidate = ObjectId(self.next_id.fetch_add(OBJECT_ID_STRIDE, Ordering::Relaxed));
            if !objects.contains_key(&candidate) {
                break candidate;
            }
        };
        objects.insert(id, Self::allocate(id, class, name.into(), ObjectFlags::default()));
        tracing::trace!(target: "host", "Spawned object {}", id);
        id
    }

    /// 在指定ID处创建对象
    pub fn spawn_at(
        &self,
        id: ObjectId,
        class: &Arc<ClassMeta>,
        name: impl Into<String>,
    ) -> HostResult<ObjectId> {
        self.spawn_with_flags(id, class, name, ObjectFlags::default())
    }

    pub fn spawn_with_flags(
        &self,
        id: ObjectId,
        class: &Arc<ClassMeta>,
        name: impl Into<String>,
        flags: ObjectFlags,
    ) -> HostResult<ObjectId> {
        if id.is_null() {
            return Err(HostError::ObjectNotFound(id));
        }
        let mut objects = self.objects_mut();
        if objects.contains_key(&id) {
            return Err(HostError::DuplicateObject(id));
        }
        objects.insert(id, Self::allocate(id, class, name.into(), flags));
        tracing::trace!(target: "host", "Spawned object {}", id);
        Ok(id)
    }

    fn allocate(id: ObjectId, class: &Arc<ClassMeta>, name: String, flags: ObjectFlags) -> NativeObject {
        NativeObject {
            descriptor: ObjectDescriptor {
                id,
                name,
                class: Arc::clone(class),
                flags,
            },
            memory: vec![0; class.size],
            containers: HashMap::new(),
        }
    }

    /// 销毁对象并通知订阅者，对象不存在时返回false
    pub fn destroy(&self, id: ObjectId) -> bool {
        let removed = self.objects_mut().remove(&id).is_some();
        if removed {
            tracing::trace!(target: "host", "Destroyed object {}", id);
            let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            subscribers.retain(|tx| tx.send(id).is_ok());
        }
        removed
    }

    pub fn live_count(&self) -> usize {
        self.objects().len()
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.objects().keys().copied().collect();
        ids.sort();
        ids
    }

    /// 直接读取对象内存（用于检查和测试）
    pub fn raw_bytes(&self, id: ObjectId, offset: usize, len: usize) -> HostResult<Vec<u8>> {
        let mut buf = vec![0; len];
        self.read(id, offset, &mut buf)?;
        Ok(buf)
    }
}

impl ReflectionHost for InMemoryHost {
    fn is_live(&self, object: ObjectId) -> bool {
        self.objects().contains_key(&object)
    }

    fn describe(&self, object: ObjectId) -> Option<ObjectDescriptor> {
        self.objects().get(&object).map(|o| o.descriptor.clone())
    }

    fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects()
            .values()
            .filter(|o| o.descriptor.name == name)
            .map(|o| o.descriptor.id)
            .min()
    }

    fn read(&self, object: ObjectId, offset: usize, buf: &mut [u8]) -> HostResult<()> {
        let objects = self.objects();
        let native = objects.get(&object).ok_or(HostError::ObjectNotFound(object))?;
        native.check_range(offset, buf.len())?;
        buf.copy_from_slice(&native.memory[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&self, object: ObjectId, offset: usize, bytes: &[u8]) -> HostResult<()> {
        let mut objects = self.objects_mut();
        let native = objects.get_mut(&object).ok_or(HostError::ObjectNotFound(object))?;
        native.check_range(offset, bytes.len())?;
        native.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn array_len(&self, object: ObjectId, property: PropertyId) -> HostResult<usize> {
        let objects = self.objects();
        let native = objects.get(&object).ok_or(HostError::ObjectNotFound(object))?;
        let (data, element_size) = native.container(property)?;
        Ok(if element_size == 0 { 0 } else { data.len() / element_size })
    }

    fn array_read(
        &self,
        object: ObjectId,
        property: PropertyId,
        index: usize,
        buf: &mut [u8],
    ) -> HostResult<()> {
        let objects = self.objects();
        let native = objects.get(&object).ok_or(HostError::ObjectNotFound(object))?;
        let (data, element_size) = native.container(property)?;
        let len = if element_size == 0 { 0 } else { data.len() / element_size };
        if index >= len || buf.len() != element_size {
            return Err(HostError::IndexOutOfBounds { index, len });
        }
        let start = index * element_size;
        buf.copy_from_slice(&data[start..start + element_size]);
        Ok(())
    }

    fn array_write(
        &self,
        object: ObjectId,
        property: PropertyId,
        index: usize,
        bytes: &[u8],
    ) -> HostResult<()> {
        let mut objects = self.objects_mut();
        let native = objects.get_mut(&object).ok_or(HostError::ObjectNotFound(object))?;
        let element_size = native.element_size(property)?;
        let data = native.containers.entry(property).or_default();
        let len = if element_size == 0 { 0 } else { data.len() / element_size };
        if index >= len || bytes.len() != element_size {
            return Err(HostError::IndexOutOfBounds { index, len });
        }
        let start = index * element_size;
        data[start..start + element_size].copy_from_slice(bytes);
        Ok(())
    }

    fn array_resize(&self, object: ObjectId, property: PropertyId, len: usize) -> HostResult<()> {
        let mut objects = self.objects_mut();
        let native = objects.get_mut(&object).ok_or(HostError::ObjectNotFound(object))?;
        let element_size = native.element_size(property)?;
        let bytes = len
            .checked_mul(element_size)
            .filter(|bytes| *bytes <= MAX_CONTAINER_BYTES)
            .ok_or(HostError::CapacityExceeded { len, element_size })?;
        native
            .containers
            .entry(property)
            .or_default()
            .resize(bytes, 0);
        Ok(())
    }

    fn subscribe_destroyed(&self) -> Option<Receiver<ObjectId>> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Some(rx)
    }
}
