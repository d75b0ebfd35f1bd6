//! 类布局构建器
//!
//! 按声明顺序计算对齐偏移，连续的位域布尔值共享同一个字节。

use crate::meta::{BoolLayout, ClassMeta, EnumEntry, PropertyMeta};
use std::sync::Arc;

/// 容器属性在对象内的头部大小（数据指针 + 长度 + 容量）
const CONTAINER_HEADER_SIZE: usize = 16;

/// Builds a [`ClassMeta`] with aligned property offsets.
///
/// ```rust
/// use property_bridge_reflection::ClassBuilder;
///
/// let class = ClassBuilder::new("Pawn")
///     .bitfield("bCanJump")
///     .bitfield("bCanCrouch")
///     .uint64("NetGuid")
///     .build();
/// let jump = class.find_property("bCanJump").unwrap();
/// let crouch = class.find_property("bCanCrouch").unwrap();
/// assert_eq!(jump.offset, crouch.offset);
/// ```
pub struct ClassBuilder {
    name: String,
    properties: Vec<PropertyMeta>,
    cursor: usize,
    max_align: usize,
    /// 当前未填满的位域字节：(偏移, 下一个位)
    open_bitfield: Option<(usize, u8)>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            cursor: 0,
            max_align: 1,
            open_bitfield: None,
        }
    }

    fn reserve(&mut self, size: usize, align: usize) -> usize {
        let align = align.max(1);
        self.cursor = (self.cursor + align - 1) / align * align;
        let offset = self.cursor;
        self.cursor += size;
        self.max_align = self.max_align.max(align);
        self.open_bitfield = None;
        offset
    }

    fn scalar(mut self, name: &str, type_name: &str, size: usize) -> Self {
        let offset = self.reserve(size, size);
        self.properties
            .push(PropertyMeta::new(name, type_name, offset, size));
        self
    }

    /// 原生bool字段
    pub fn bool(mut self, name: &str) -> Self {
        let offset = self.reserve(1, 1);
        self.properties.push(
            PropertyMeta::new(name, "BoolProperty", offset, 1).with_bool_layout(BoolLayout::NATIVE),
        );
        self
    }

    /// 位域bool，与相邻的位域共享字节
    pub fn bitfield(mut self, name: &str) -> Self {
        let open = self.open_bitfield;
        let (offset, bit) = match open {
            Some((offset, bit)) if bit < 8 => (offset, bit),
            _ => (self.reserve(1, 1), 0),
        };
        self.open_bitfield = Some((offset, bit + 1));
        self.properties.push(
            PropertyMeta::new(name, "BoolProperty", offset, 1).with_bool_layout(BoolLayout::bit(bit)),
        );
        self
    }

    pub fn int8(self, name: &str) -> Self {
        self.scalar(name, "Int8Property", 1)
    }

    pub fn int16(self, name: &str) -> Self {
        self.scalar(name, "Int16Property", 2)
    }

    pub fn int32(self, name: &str) -> Self {
        self.scalar(name, "IntProperty", 4)
    }

    pub fn int64(self, name: &str) -> Self {
        self.scalar(name, "Int64Property", 8)
    }

    pub fn byte(self, name: &str) -> Self {
        self.scalar(name, "ByteProperty", 1)
    }

    pub fn uint16(self, name: &str) -> Self {
        self.scalar(name, "UInt16Property", 2)
    }

    pub fn uint32(self, name: &str) -> Self {
        self.scalar(name, "UInt32Property", 4)
    }

    pub fn uint64(self, name: &str) -> Self {
        self.scalar(name, "UInt64Property", 8)
    }

    pub fn float(self, name: &str) -> Self {
        self.scalar(name, "FloatProperty", 4)
    }

    pub fn double(self, name: &str) -> Self {
        self.scalar(name, "DoubleProperty", 8)
    }

    /// 对象引用（存储被引用对象的ID，0为空）
    pub fn object(mut self, name: &str, class_name: Option<&str>) -> Self {
        let offset = self.reserve(8, 8);
        let mut meta = PropertyMeta::new(name, "ObjectProperty", offset, 8);
        if let Some(class_name) = class_name {
            meta = meta.with_class_name(class_name);
        }
        self.properties.push(meta);
        self
    }

    /// 单字节枚举
    pub fn enumeration(mut self, name: &str, entries: &[(&str, i64)]) -> Self {
        let offset = self.reserve(1, 1);
        let entries = entries
            .iter()
            .map(|(name, value)| EnumEntry {
                name: (*name).to_string(),
                value: *value,
            })
            .collect();
        self.properties
            .push(PropertyMeta::new(name, "EnumProperty", offset, 1).with_enum_entries(entries));
        self
    }

    /// 动态数组，元素由宿主单独存放
    pub fn array(mut self, name: &str, inner_type: &str, inner_size: usize) -> Self {
        let offset = self.reserve(CONTAINER_HEADER_SIZE, 8);
        let mut inner = PropertyMeta::new(format!("{name}.Inner"), inner_type, 0, inner_size);
        if inner_type == "BoolProperty" {
            inner = inner.with_bool_layout(BoolLayout::NATIVE);
        }
        self.properties.push(
            PropertyMeta::new(name, "ArrayProperty", offset, CONTAINER_HEADER_SIZE)
                .with_inner(inner),
        );
        self
    }

    /// 任意类型标签的属性（包括绑定层不支持的类型）
    pub fn custom(mut self, name: &str, type_name: &str, size: usize, align: usize) -> Self {
        let offset = self.reserve(size, align);
        self.properties
            .push(PropertyMeta::new(name, type_name, offset, size));
        self
    }

    pub fn build(self) -> Arc<ClassMeta> {
        let size = (self.cursor + self.max_align - 1) / self.max_align * self.max_align;
        Arc::new(ClassMeta {
            name: self.name,
            size: size.max(1),
            properties: self.properties.into_iter().map(Arc::new).collect(),
        })
    }
}
