//! # Property Bridge Reflection
//!
//! Host-side reflection model used by the `property_bridge` binding layer.
//!
//! The binding layer never owns native memory. Everything it knows about a
//! native object comes through the [`ReflectionHost`] trait: a liveness probe,
//! an object descriptor (name, class, flags) and raw byte access at the offsets
//! described by [`PropertyMeta`].
//!
//! ## Modules
//!
//! - [`meta`] - identities and metadata records (objects, classes, properties)
//! - [`host`] - the [`ReflectionHost`] trait
//! - [`memory`] - [`InMemoryHost`], an in-process object graph backed by byte buffers
//! - [`builder`] - [`ClassBuilder`] for laying out classes with aligned offsets
//!
//! ## Example
//!
//! ```rust
//! use property_bridge_reflection::{ClassBuilder, InMemoryHost, ReflectionHost};
//!
//! let class = ClassBuilder::new("Actor").bool("bHidden").int32("Health").build();
//! let host = InMemoryHost::new();
//! let actor = host.spawn(&class, "Actor_0");
//! assert!(host.is_live(actor));
//! ```

pub mod builder;
pub mod error;
pub mod host;
pub mod memory;
pub mod meta;

pub use builder::ClassBuilder;
pub use error::{HostError, HostResult};
pub use host::ReflectionHost;
pub use memory::InMemoryHost;
pub use meta::{
    BoolLayout, ClassMeta, EnumEntry, ObjectDescriptor, ObjectFlags, ObjectId, PropertyId,
    PropertyMeta,
};
