//! # Property Bridge
//!
//! Reflected property bindings between a native object graph and an
//! embedded Lua runtime.
//!
//! ## Features
//!
//! - **Typed bindings**: one binding per property kind (bool, sized integers,
//!   floats, object references, arrays, enums) with range-checked marshalling
//! - **Single dispatch**: every kind tag resolves to its binding in one table
//! - **Handle identity**: a weak remote-object cache guarantees one live script
//!   handle per native identity, so `rawequal` holds between lookups
//! - **Stale safety**: every access probes liveness first; destroyed objects
//!   fail with a catchable `StaleReference` error
//! - **Frame sync point**: deferred script callbacks, destruction eviction and
//!   cache sweeping run at `end_frame`
//! - **Diagnostics**: per-code error counts, overflow events and a live view of
//!   cached handles, persistable as JSON
//!
//! ## Architecture
//!
//! 绑定层不拥有原生内存，所有访问都经过 [`ReflectionHost`]：
//! - **bindings**: 原生字节与 [`ScriptValue`] 之间的编组
//! - **scripting**: Lua 句柄、元方法和全局函数
//! - **cache**: 原生身份到脚本句柄的弱缓存
//!
//! ### Example
//!
//! ```rust
//! use property_bridge::{BridgeConfig, ScriptBridge};
//! use property_bridge_reflection::{ClassBuilder, InMemoryHost};
//! use std::sync::Arc;
//!
//! let host = Arc::new(InMemoryHost::new());
//! let class = ClassBuilder::new("Pawn").int32("Health").build();
//! host.spawn(&class, "Hero");
//!
//! let bridge = ScriptBridge::new(host, BridgeConfig::default()).unwrap();
//! let health: i64 = bridge
//!     .eval("local h = FindObject('Hero'):GetProperty('Health'); h.Value = 75; return h:get()")
//!     .unwrap();
//! assert_eq!(health, 75);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: errors, logging and the frame queue
//! - [`config`]: TOML/JSON configuration with environment overrides
//! - [`bindings`]: property kinds and their bindings
//! - [`cache`]: the remote-object cache
//! - [`scripting`]: the Lua surface
//! - [`diagnostics`]: error accounting and persistence
//! - [`live_view`]: read-only listing of cached handles

/// Errors, logging, macros and the end-of-frame queue
pub mod core;
/// Configuration system
pub mod config;
/// Property kinds and their bindings
pub mod bindings;
/// Remote-object cache
pub mod cache;
/// Lua runtime integration
pub mod scripting;
/// Binding diagnostics
pub mod diagnostics;
/// Debug listing of cached handles
pub mod live_view;

pub use bindings::{
    AnyBinding, BindingBase, PropertyBinding, PropertyCapabilities, PropertyIdentity,
    PropertyKind, ScriptValue, UnsignedOverflowPolicy,
};
pub use cache::{CacheStats, HandleKey, RemoteObjectCache};
pub use config::{BridgeConfig, UnknownKindPolicy};
pub use core::{BindingError, BindingResult, BridgeError, BridgeResult, FrameReport};
pub use diagnostics::{BindingDiagnostics, DiagnosticsSink, DiagnosticsSnapshot, PersistOptions};
pub use live_view::{LiveEntry, LiveViewFilter, SearchFilter};
pub use scripting::{BindingRuntime, ObjectHandle, ScriptBridge};

pub use property_bridge_reflection::{ObjectId, ReflectionHost};
