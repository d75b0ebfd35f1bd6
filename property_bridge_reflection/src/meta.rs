//! Identities and metadata records for reflected objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Stable identity of a native object (an address or an engine-assigned id).
///
/// `0` is reserved for the null object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub const NULL: ObjectId = ObjectId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Identity of a property metadata record.
///
/// Stands in for the metadata pointer: two properties never share an id,
/// even across classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub u32);

static NEXT_PROPERTY_ID: AtomicU32 = AtomicU32::new(1);

impl PropertyId {
    /// 分配一个进程内唯一的属性ID
    pub fn next() -> Self {
        PropertyId(NEXT_PROPERTY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bit layout of a boolean property.
///
/// Native `bool` fields use [`BoolLayout::NATIVE`]; packed bit-field flags
/// share a byte and are distinguished by their masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolLayout {
    /// 相对属性偏移的字节偏移
    pub byte_offset: u8,
    /// 写入时置位/清除的掩码
    pub byte_mask: u8,
    /// 读取时测试的掩码
    pub field_mask: u8,
    /// 字段大小（字节）
    pub field_size: u8,
}

impl BoolLayout {
    pub const NATIVE: BoolLayout = BoolLayout {
        byte_offset: 0,
        byte_mask: 0x01,
        field_mask: 0xFF,
        field_size: 1,
    };

    /// Layout for the packed flag at `bit` (0..8) of its byte.
    pub fn bit(bit: u8) -> Self {
        let mask = 1u8 << (bit & 7);
        BoolLayout {
            byte_offset: 0,
            byte_mask: mask,
            field_mask: mask,
            field_size: 1,
        }
    }

    pub fn is_native_bool(&self) -> bool {
        self.field_mask == 0xFF
    }
}

/// One named value of an enumeration property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumEntry {
    pub name: String,
    pub value: i64,
}

/// Reflection metadata for one property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMeta {
    pub id: PropertyId,
    pub name: String,
    /// Runtime kind tag, e.g. `"BoolProperty"` or `"MapProperty"`.
    pub type_name: String,
    /// Byte offset inside the owning object.
    pub offset: usize,
    /// Size in bytes of the field (for containers, of the in-object header).
    pub size: usize,
    pub bool_layout: Option<BoolLayout>,
    /// Element metadata for container properties.
    pub inner: Option<Arc<PropertyMeta>>,
    pub enum_entries: Vec<EnumEntry>,
    /// Declared class of an object reference (`None` accepts any class).
    pub class_name: Option<String>,
}

impl PropertyMeta {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        offset: usize,
        size: usize,
    ) -> Self {
        Self {
            id: PropertyId::next(),
            name: name.into(),
            type_name: type_name.into(),
            offset,
            size,
            bool_layout: None,
            inner: None,
            enum_entries: Vec::new(),
            class_name: None,
        }
    }

    pub fn with_bool_layout(mut self, layout: BoolLayout) -> Self {
        self.bool_layout = Some(layout);
        self
    }

    pub fn with_inner(mut self, inner: PropertyMeta) -> Self {
        self.inner = Some(Arc::new(inner));
        self
    }

    pub fn with_enum_entries(mut self, entries: Vec<EnumEntry>) -> Self {
        self.enum_entries = entries;
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }
}

/// Reflection metadata for a class: its size and ordered properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMeta {
    pub name: String,
    pub size: usize,
    pub properties: Vec<Arc<PropertyMeta>>,
}

impl ClassMeta {
    pub fn find_property(&self, name: &str) -> Option<&Arc<PropertyMeta>> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_by_id(&self, id: PropertyId) -> Option<&Arc<PropertyMeta>> {
        self.properties.iter().find(|p| p.id == id)
    }
}

/// 对象标志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFlags {
    /// 类默认对象 (CDO)
    pub class_default_object: bool,
    /// 原型对象
    pub archetype_object: bool,
}

impl ObjectFlags {
    pub const DEFAULT_OBJECT: ObjectFlags = ObjectFlags {
        class_default_object: true,
        archetype_object: false,
    };

    pub fn is_default_or_archetype(&self) -> bool {
        self.class_default_object || self.archetype_object
    }
}

/// Snapshot of what the host knows about a live object.
#[derive(Debug, Clone)]
pub struct ObjectDescriptor {
    pub id: ObjectId,
    pub name: String,
    pub class: Arc<ClassMeta>,
    pub flags: ObjectFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_ids_are_unique() {
        let a = PropertyMeta::new("A", "IntProperty", 0, 4);
        let b = PropertyMeta::new("A", "IntProperty", 0, 4);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_bool_layout_masks() {
        let layout = BoolLayout::bit(3);
        assert_eq!(layout.byte_mask, 0b1000);
        assert_eq!(layout.field_mask, 0b1000);
        assert!(!layout.is_native_bool());
        assert!(BoolLayout::NATIVE.is_native_bool());
    }

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId(0xABCD).to_string(), "0xABCD");
        assert!(ObjectId::NULL.is_null());
    }
}
