//! 绑定运行时
//!
//! 每个 Lua 状态一个实例，保存在 Lua 的 app data 中。持有宿主、远程对象
//! 缓存、配置、诊断和帧队列。只在脚本线程上使用。

use crate::bindings::MarshalContext;
use crate::cache::{CacheStats, HandleKey, LuaSlots, RemoteObjectCache};
use crate::config::BridgeConfig;
use crate::core::deferred::FrameQueue;
use crate::core::error::{BindingError, BindingResult};
use crate::diagnostics::BindingDiagnostics;
use crate::live_view::{LiveEntry, LiveView, LiveViewFilter};
use crate::scripting::ObjectHandle;
use crossbeam_channel::Receiver;
use mlua::{AnyUserData, ExternalError, Lua};
use property_bridge_reflection::{ObjectDescriptor, ObjectId, PropertyMeta, ReflectionHost};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub struct BindingRuntime {
    host: Arc<dyn ReflectionHost>,
    cache: RefCell<RemoteObjectCache<LuaSlots>>,
    config: BridgeConfig,
    diagnostics: BindingDiagnostics,
    frame: FrameQueue,
    destroyed: Option<Receiver<ObjectId>>,
}

fn cache_busy() -> mlua::Error {
    mlua::Error::RuntimeError("remote object cache is already in use".to_string())
}

impl BindingRuntime {
    pub fn new(lua: &Lua, host: Arc<dyn ReflectionHost>, config: BridgeConfig) -> mlua::Result<Self> {
        let storage = LuaSlots::new(lua)?;
        let destroyed = host.subscribe_destroyed();
        if destroyed.is_none() {
            tracing::warn!(target: "bridge", "Host publishes no destruction events; stale handles are only detected on access");
        }
        Ok(Self {
            cache: RefCell::new(RemoteObjectCache::with_capacity(
                storage,
                config.cache.initial_capacity,
            )),
            diagnostics: BindingDiagnostics::new(config.diagnostics.max_recent_records),
            frame: FrameQueue::new(),
            destroyed,
            host,
            config,
        })
    }

    /// The runtime installed in `lua` by the script bridge.
    pub fn from_lua(lua: &Lua) -> mlua::Result<Rc<Self>> {
        lua.app_data_ref::<Rc<BindingRuntime>>()
            .map(|runtime| Rc::clone(&*runtime))
            .ok_or_else(|| {
                mlua::Error::RuntimeError("no binding runtime is installed in this Lua state".to_string())
            })
    }

    pub fn host(&self) -> &Arc<dyn ReflectionHost> {
        &self.host
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &BindingDiagnostics {
        &self.diagnostics
    }

    pub fn frame(&self) -> &FrameQueue {
        &self.frame
    }

    pub fn marshal_context(&self) -> MarshalContext<'_> {
        MarshalContext::new(self.config.marshal.unsigned_overflow, &self.diagnostics)
    }

    /// Converts a binding failure into a catchable script error, recording it.
    pub fn observe<T>(&self, result: BindingResult<T>) -> mlua::Result<T> {
        result.map_err(|err| self.reject(err))
    }

    pub fn reject(&self, err: BindingError) -> mlua::Error {
        self.diagnostics.record_error(&err);
        tracing::debug!(target: "bindings", code = err.code(), error = %err, "Binding operation failed");
        err.into_lua_err()
    }

    pub fn describe(&self, object: ObjectId) -> BindingResult<ObjectDescriptor> {
        self.host
            .describe(object)
            .ok_or(BindingError::StaleObject { object })
    }

    pub fn property_meta(&self, object: ObjectId, name: &str) -> BindingResult<Arc<PropertyMeta>> {
        let descriptor = self.describe(object)?;
        descriptor
            .class
            .find_property(name)
            .cloned()
            .ok_or_else(|| BindingError::NoSuchProperty {
                object,
                class: descriptor.class.name.clone(),
                property: name.to_string(),
            })
    }

    /// Cached handle for `key`, created by `factory` on a miss.
    pub fn cached<F>(&self, key: HandleKey, factory: F) -> mlua::Result<AnyUserData>
    where
        F: FnOnce() -> mlua::Result<AnyUserData>,
    {
        let mut cache = self.cache.try_borrow_mut().map_err(|_| cache_busy())?;
        cache.lookup_or_create(key, factory)
    }

    pub fn lookup(&self, key: HandleKey) -> mlua::Result<Option<AnyUserData>> {
        let cache = self.cache.try_borrow().map_err(|_| cache_busy())?;
        cache.lookup(key)
    }

    /// The canonical handle of a native object.
    pub fn object_handle(&self, lua: &Lua, object: ObjectId) -> mlua::Result<AnyUserData> {
        self.cached(HandleKey::object(object), || {
            lua.create_userdata(ObjectHandle::new(object))
        })
    }

    pub fn evict(&self, key: HandleKey) -> mlua::Result<bool> {
        let mut cache = self.cache.try_borrow_mut().map_err(|_| cache_busy())?;
        cache.evict(key)
    }

    pub fn evict_object(&self, object: ObjectId) -> mlua::Result<usize> {
        let mut cache = self.cache.try_borrow_mut().map_err(|_| cache_busy())?;
        cache.evict_object(object)
    }

    /// Evicts every object the host reported destroyed since the last call.
    pub fn drain_destroyed(&self) -> mlua::Result<usize> {
        let Some(destroyed) = &self.destroyed else {
            return Ok(0);
        };
        let mut evicted = 0;
        for object in destroyed.try_iter() {
            evicted += self.evict_object(object)?;
        }
        Ok(evicted)
    }

    pub fn sweep(&self) -> mlua::Result<usize> {
        let mut cache = self.cache.try_borrow_mut().map_err(|_| cache_busy())?;
        let reclaimed = cache.sweep()?;
        if reclaimed > 0 {
            tracing::debug!(target: "cache", reclaimed, "Swept collected handles");
        }
        Ok(reclaimed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .try_borrow()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }

    pub fn live_view(&self, filters: &[&dyn LiveViewFilter]) -> Vec<LiveEntry> {
        match self.cache.try_borrow() {
            Ok(cache) => LiveView::entries(&cache, self.host.as_ref(), filters),
            Err(_) => Vec::new(),
        }
    }
}
