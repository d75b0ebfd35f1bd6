//! 脚本桥接层
//!
//! 将反射属性绑定暴露给嵌入的 Lua 运行时。
//!
//! ## 模块
//!
//! - [`runtime`] - 每个 Lua 状态一个的 [`BindingRuntime`]
//! - [`handle`] - 属性句柄、元数据句柄和不透明句柄
//! - [`object`] - 原生对象句柄
//! - [`convert`] - Lua 值转换
//! - [`globals`] - `FindObject`、`ExecuteAtEndOfFrame` 等全局函数
//!
//! 所有类型都只在脚本线程上使用，不实现 `Send`。

pub mod convert;
pub mod globals;
pub mod handle;
pub mod object;
pub mod runtime;

pub use handle::{Handle, OpaqueHandle, PropertyInfo};
pub use object::ObjectHandle;
pub use runtime::BindingRuntime;

use crate::bindings::dispatch;
use crate::cache::{CacheStats, HandleKey};
use crate::config::BridgeConfig;
use crate::core::deferred::FrameReport;
use crate::core::error::{BridgeError, BridgeResult};
use crate::diagnostics::{DiagnosticsSink, DiagnosticsSnapshot, PersistOptions};
use crate::live_view::{IncludeDefaultObjects, LiveEntry, LiveViewFilter};
use mlua::{AnyUserData, FromLuaMulti, Lua};
use property_bridge_reflection::{ObjectId, ReflectionHost};
use std::rc::Rc;
use std::sync::Arc;

/// A Lua state wired to a reflection host.
///
/// ```rust
/// use property_bridge::{BridgeConfig, ScriptBridge};
/// use property_bridge_reflection::{ClassBuilder, InMemoryHost};
/// use std::sync::Arc;
///
/// let host = Arc::new(InMemoryHost::new());
/// let class = ClassBuilder::new("Door").bool("bOpen").build();
/// host.spawn(&class, "FrontDoor");
///
/// let bridge = ScriptBridge::new(host, BridgeConfig::default()).unwrap();
/// bridge.exec("open", "FindObject('FrontDoor').bOpen = true").unwrap();
/// let open: bool = bridge.eval("return FindObject('FrontDoor').bOpen").unwrap();
/// assert!(open);
/// ```
pub struct ScriptBridge {
    runtime: Rc<BindingRuntime>,
    lua: Lua,
}

impl ScriptBridge {
    pub fn new(host: Arc<dyn ReflectionHost>, config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;
        crate::core::logging::init(&config.logging);

        let lua = Lua::new();
        let runtime = Rc::new(BindingRuntime::new(&lua, host, config)?);
        lua.set_app_data(Rc::clone(&runtime));
        globals::install(&lua)?;

        tracing::info!(target: "bridge", "Script bridge initialized");
        Ok(Self { runtime, lua })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn runtime(&self) -> &Rc<BindingRuntime> {
        &self.runtime
    }

    pub fn config(&self) -> &BridgeConfig {
        self.runtime.config()
    }

    /// Runs a chunk; `name` appears in error tracebacks.
    pub fn exec(&self, name: &str, code: &str) -> BridgeResult<()> {
        self.lua.load(code).set_name(name).exec()?;
        Ok(())
    }

    pub fn eval<T: FromLuaMulti>(&self, code: &str) -> BridgeResult<T> {
        Ok(self.lua.load(code).eval::<T>()?)
    }

    /// Script handle for `property` of `object`, through the cache.
    pub fn bind(&self, object: ObjectId, property: &str) -> BridgeResult<AnyUserData> {
        let meta = self.runtime.property_meta(object, property)?;
        Ok(dispatch::bind(&self.lua, &self.runtime, object, &meta)?)
    }

    pub fn object(&self, object: ObjectId) -> BridgeResult<AnyUserData> {
        self.runtime.describe(object)?;
        Ok(self.runtime.object_handle(&self.lua, object)?)
    }

    /// Handle of the named live object.
    pub fn find_object(&self, name: &str) -> BridgeResult<AnyUserData> {
        let object = self
            .runtime
            .host()
            .find_object(name)
            .ok_or_else(|| BridgeError::ObjectNotFound(name.to_string()))?;
        Ok(self.runtime.object_handle(&self.lua, object)?)
    }

    pub fn evict(&self, key: HandleKey) -> BridgeResult<bool> {
        Ok(self.runtime.evict(key)?)
    }

    /// End-of-frame sync point.
    ///
    /// Evicts handles of objects the host destroyed, reclaims collected slots
    /// when configured, then runs the callbacks queued during the frame.
    pub fn end_frame(&self) -> FrameReport {
        let frame = self.runtime.frame();
        let evicted = frame
            .try_in_frame("evict_destroyed", || self.runtime.drain_destroyed())
            .unwrap_or(0);
        let reclaimed = if self.config().cache.sweep_on_end_frame {
            frame
                .try_in_frame("sweep", || self.runtime.sweep())
                .unwrap_or(0)
        } else {
            0
        };

        let mut report = frame.end_frame();
        report.evicted = evicted;
        report.reclaimed = reclaimed;
        for failure in &report.failures {
            self.runtime.diagnostics().record_frame_failure(failure);
        }
        tracing::trace!(
            target: "frame",
            ran = report.ran,
            failures = report.failures.len(),
            evicted,
            reclaimed,
            "Frame ended"
        );
        report
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.runtime.cache_stats()
    }

    /// Cached handles, with default objects hidden unless configured.
    pub fn live_view(&self, filters: &[&dyn LiveViewFilter]) -> Vec<LiveEntry> {
        let defaults = IncludeDefaultObjects {
            enabled: self.config().live_view.include_default_objects,
        };
        let mut all: Vec<&dyn LiveViewFilter> = vec![&defaults];
        all.extend_from_slice(filters);
        self.runtime.live_view(&all)
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.runtime.diagnostics().snapshot(self.cache_stats())
    }

    /// Sink at the configured diagnostics path.
    pub fn diagnostics_sink(&self, options: PersistOptions) -> DiagnosticsSink {
        DiagnosticsSink::new(&self.config().diagnostics.persist_path, options)
    }

    pub fn persist_diagnostics(&self, sink: &DiagnosticsSink) -> BridgeResult<()> {
        sink.persist(&self.diagnostics_snapshot())
    }
}
