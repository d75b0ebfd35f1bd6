//! 实时视图
//!
//! 调试界面用的只读查询：列出缓存中的句柄及其原生对象信息，不修改缓存。

pub mod filter;

pub use filter::{IncludeDefaultObjects, LiveViewFilter, SearchFilter};

use crate::bindings::PropertyKind;
use crate::cache::{HandleKey, RemoteObjectCache, SlotStorage};
use property_bridge_reflection::{ObjectDescriptor, ReflectionHost};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveEntry {
    pub key: HandleKey,
    pub slot: u32,
    pub generation: u32,
    pub object_name: Option<String>,
    pub class_name: Option<String>,
    /// `None` for object handles.
    pub property_name: Option<String>,
    pub kind: Option<PropertyKind>,
    pub is_default_object: bool,
    pub alive: bool,
}

pub struct LiveView;

impl LiveView {
    /// Lists cache entries in key order.
    ///
    /// Entries of destroyed objects are listed with `alive == false`; filters
    /// only see live objects.
    pub fn entries<S: SlotStorage>(
        cache: &RemoteObjectCache<S>,
        host: &dyn ReflectionHost,
        filters: &[&dyn LiveViewFilter],
    ) -> Vec<LiveEntry> {
        cache
            .keys()
            .into_iter()
            .filter_map(|key| {
                let slot = cache.slot_of(key)?;
                let descriptor = host.describe(key.object);
                if let Some(object) = &descriptor {
                    if filters.iter().any(|filter| filter.pre_eval(object)) {
                        return None;
                    }
                }
                Some(Self::entry(key, slot.index.0, slot.generation, descriptor.as_ref()))
            })
            .collect()
    }

    fn entry(
        key: HandleKey,
        slot: u32,
        generation: u32,
        descriptor: Option<&ObjectDescriptor>,
    ) -> LiveEntry {
        let property = descriptor.zip(key.property).and_then(|(object, property)| {
            object.class.property_by_id(property).cloned()
        });
        LiveEntry {
            key,
            slot,
            generation,
            object_name: descriptor.map(|d| d.name.clone()),
            class_name: descriptor.map(|d| d.class.name.clone()),
            property_name: property.as_ref().map(|p| p.name.clone()),
            kind: property
                .as_ref()
                .and_then(|p| PropertyKind::from_type_name(&p.type_name)),
            is_default_object: descriptor.is_some_and(|d| d.flags.is_default_or_archetype()),
            alive: descriptor.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StrongSlots;
    use property_bridge_reflection::{ClassBuilder, InMemoryHost, ObjectFlags, ObjectId};
    use std::convert::Infallible;

    #[test]
    fn test_entries_describe_cached_handles() {
        let class = ClassBuilder::new("Actor").bool("bHidden").int32("Health").build();
        let host = InMemoryHost::new();
        let actor = host.spawn(&class, "Actor_0");
        let cdo = host
            .spawn_with_flags(ObjectId(0x10), &class, "Default__Actor", ObjectFlags::DEFAULT_OBJECT)
            .unwrap();
        let doomed = host.spawn(&class, "Actor_1");
        let health = class.find_property("Health").unwrap().id;

        let mut cache = RemoteObjectCache::new(StrongSlots::<u32>::new());
        for key in [
            HandleKey::object(actor),
            HandleKey::property(actor, health),
            HandleKey::object(cdo),
            HandleKey::object(doomed),
        ] {
            cache.lookup_or_create(key, || Ok::<_, Infallible>(0)).unwrap();
        }
        host.destroy(doomed);

        let hide_defaults = IncludeDefaultObjects { enabled: false };
        let entries = LiveView::entries(&cache, &host, &[&hide_defaults]);
        assert_eq!(entries.len(), 3);
        let property = entries
            .iter()
            .find(|e| e.key == HandleKey::property(actor, health))
            .unwrap();
        assert_eq!(property.property_name.as_deref(), Some("Health"));
        assert_eq!(property.kind, Some(PropertyKind::Int32));
        let dead = entries.iter().find(|e| e.key.object == doomed).unwrap();
        assert!(!dead.alive);

        let everything = LiveView::entries(&cache, &host, &[]);
        assert_eq!(everything.len(), 4);
        assert!(everything.iter().any(|e| e.is_default_object));

        let search = SearchFilter::new("actor_0");
        let found = LiveView::entries(&cache, &host, &[&search]);
        assert!(found
            .iter()
            .filter(|e| e.alive)
            .all(|e| e.object_name.as_deref() == Some("Actor_0")));
        assert_eq!(cache.len(), 4);
    }
}
