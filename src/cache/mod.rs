//! 远程对象缓存
//!
//! 保证每个原生身份（对象或对象上的某个属性）最多只有一个存活的脚本句柄。
//! 索引映射到槽位数组；每个槽位记录占用者和代数，驱逐时撤销占用并递增代数，
//! 空闲槽位复用。句柄本身存放在 [`SlotStorage`] 中，Lua 实现使用弱值表，
//! 因此缓存不会延长句柄的生命周期。

mod lua_slots;

pub use lua_slots::LuaSlots;

use property_bridge_reflection::{ObjectId, PropertyId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;

/// Cache key: a native object, optionally narrowed to one of its properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleKey {
    pub object: ObjectId,
    /// `None` for the object handle itself.
    pub property: Option<PropertyId>,
}

impl HandleKey {
    pub fn object(object: ObjectId) -> Self {
        Self {
            object,
            property: None,
        }
    }

    pub fn property(object: ObjectId, property: PropertyId) -> Self {
        Self {
            object,
            property: Some(property),
        }
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.property {
            Some(property) => write!(f, "{}/{}", self.object, property),
            None => write!(f, "{}", self.object),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotIndex(pub u32);

impl SlotIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A slot together with the generation it was observed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRef {
    pub index: SlotIndex,
    pub generation: u32,
}

/// Where the cache keeps its handles.
pub trait SlotStorage {
    type Handle: Clone;
    type Error;

    /// `Ok(None)` when the slot is empty or its handle was reclaimed.
    fn load(&self, slot: SlotIndex) -> Result<Option<Self::Handle>, Self::Error>;

    fn store(&mut self, slot: SlotIndex, handle: &Self::Handle) -> Result<(), Self::Error>;

    fn release(&mut self, slot: SlotIndex) -> Result<(), Self::Error>;
}

/// Strong in-process storage.
#[derive(Debug)]
pub struct StrongSlots<H> {
    handles: Vec<Option<H>>,
}

impl<H> Default for StrongSlots<H> {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
        }
    }
}

impl<H> StrongSlots<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the handle in `slot` as if it had been garbage collected.
    pub fn reclaim(&mut self, slot: SlotIndex) {
        if let Some(handle) = self.handles.get_mut(slot.as_usize()) {
            *handle = None;
        }
    }
}

impl<H: Clone> SlotStorage for StrongSlots<H> {
    type Handle = H;
    type Error = Infallible;

    fn load(&self, slot: SlotIndex) -> Result<Option<H>, Infallible> {
        Ok(self.handles.get(slot.as_usize()).cloned().flatten())
    }

    fn store(&mut self, slot: SlotIndex, handle: &H) -> Result<(), Infallible> {
        let index = slot.as_usize();
        if self.handles.len() <= index {
            self.handles.resize_with(index + 1, || None);
        }
        self.handles[index] = Some(handle.clone());
        Ok(())
    }

    fn release(&mut self, slot: SlotIndex) -> Result<(), Infallible> {
        self.reclaim(slot);
        Ok(())
    }
}

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    /// Slots found empty because the script runtime collected the handle.
    pub reclaimed: u64,
    /// Occupied slots.
    pub live: usize,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    occupant: Option<HandleKey>,
    generation: u32,
}

pub struct RemoteObjectCache<S: SlotStorage> {
    index: HashMap<HandleKey, SlotIndex>,
    slots: Vec<Slot>,
    free: Vec<SlotIndex>,
    storage: S,
    stats: CacheStats,
}

impl<S: SlotStorage> RemoteObjectCache<S> {
    pub fn new(storage: S) -> Self {
        Self::with_capacity(storage, 0)
    }

    pub fn with_capacity(storage: S, capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            storage,
            stats: CacheStats::default(),
        }
    }

    /// Existing handle for `key`, else the factory's, stored under `key`.
    ///
    /// A failed factory inserts nothing.
    pub fn lookup_or_create<E, F>(&mut self, key: HandleKey, factory: F) -> Result<S::Handle, E>
    where
        E: From<S::Error>,
        F: FnOnce() -> Result<S::Handle, E>,
    {
        if let Some(&slot) = self.index.get(&key) {
            if let Some(handle) = self.storage.load(slot)? {
                self.stats.hits += 1;
                return Ok(handle);
            }
            self.stats.reclaimed += 1;
            self.revoke(key, slot)?;
        }

        self.stats.misses += 1;
        let handle = factory()?;
        let slot = self.allocate(key);
        if let Err(err) = self.storage.store(slot, &handle) {
            self.revoke(key, slot)?;
            return Err(err.into());
        }
        self.stats.inserts += 1;
        tracing::trace!(target: "cache", %key, slot = slot.0, "Cached handle");
        Ok(handle)
    }

    /// Non-creating query.
    pub fn lookup(&self, key: HandleKey) -> Result<Option<S::Handle>, S::Error> {
        match self.index.get(&key) {
            Some(&slot) => self.storage.load(slot),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: HandleKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Removes the entry for `key`; `false` if there was none.
    pub fn evict(&mut self, key: HandleKey) -> Result<bool, S::Error> {
        match self.index.get(&key).copied() {
            Some(slot) => {
                self.revoke(key, slot)?;
                self.stats.evictions += 1;
                tracing::trace!(target: "cache", %key, "Evicted handle");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Evicts the object handle and every property handle of `object`.
    pub fn evict_object(&mut self, object: ObjectId) -> Result<usize, S::Error> {
        let keys: Vec<HandleKey> = self
            .index
            .keys()
            .filter(|key| key.object == object)
            .copied()
            .collect();
        let mut evicted = 0;
        for key in keys {
            if self.evict(key)? {
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::debug!(target: "cache", %object, evicted, "Evicted destroyed object");
        }
        Ok(evicted)
    }

    /// Revokes every slot whose handle was reclaimed; returns how many.
    pub fn sweep(&mut self) -> Result<usize, S::Error> {
        let mut reclaimed = Vec::new();
        for (&key, &slot) in &self.index {
            if self.storage.load(slot)?.is_none() {
                reclaimed.push((key, slot));
            }
        }
        for &(key, slot) in &reclaimed {
            self.revoke(key, slot)?;
        }
        self.stats.reclaimed += reclaimed.len() as u64;
        Ok(reclaimed.len())
    }

    /// Keys in a stable order.
    pub fn keys(&self) -> Vec<HandleKey> {
        let mut keys: Vec<HandleKey> = self.index.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn slot_of(&self, key: HandleKey) -> Option<SlotRef> {
        let index = *self.index.get(&key)?;
        let slot = self.slots.get(index.as_usize())?;
        Some(SlotRef {
            index,
            generation: slot.generation,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            live: self.index.len(),
            ..self.stats
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn allocate(&mut self, key: HandleKey) -> SlotIndex {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    occupant: None,
                    generation: 0,
                });
                SlotIndex((self.slots.len() - 1) as u32)
            }
        };
        self.slots[index.as_usize()].occupant = Some(key);
        self.index.insert(key, index);
        index
    }

    fn revoke(&mut self, key: HandleKey, index: SlotIndex) -> Result<(), S::Error> {
        self.index.remove(&key);
        if let Some(slot) = self.slots.get_mut(index.as_usize()) {
            slot.occupant = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
        }
        self.storage.release(index)
    }
}
