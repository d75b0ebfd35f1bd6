//! 属性种类标签
//!
//! 闭合集合：新增一种属性必须同时在分派表中登记绑定，否则编译失败。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer marshalling family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericDataType {
    UnsignedLong,
    SignedLong,
    UnsignedLongLong,
    SignedLongLong,
}

impl GenericDataType {
    pub fn is_signed(self) -> bool {
        match self {
            GenericDataType::SignedLong | GenericDataType::SignedLongLong => true,
            GenericDataType::UnsignedLong | GenericDataType::UnsignedLongLong => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GenericDataType::UnsignedLong => "UnsignedLong",
            GenericDataType::SignedLong => "SignedLong",
            GenericDataType::UnsignedLongLong => "UnsignedLongLong",
            GenericDataType::SignedLongLong => "SignedLongLong",
        }
    }

    /// Family of a native integer of `width` bytes.
    pub const fn for_width(width: usize, signed: bool) -> Self {
        match (width > 4, signed) {
            (false, false) => GenericDataType::UnsignedLong,
            (false, true) => GenericDataType::SignedLong,
            (true, false) => GenericDataType::UnsignedLongLong,
            (true, true) => GenericDataType::SignedLongLong,
        }
    }
}

impl fmt::Display for GenericDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime kind tag of a reflected property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Byte,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Object,
    Array,
    Enum,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 14] = [
        PropertyKind::Bool,
        PropertyKind::Int8,
        PropertyKind::Int16,
        PropertyKind::Int32,
        PropertyKind::Int64,
        PropertyKind::Byte,
        PropertyKind::UInt16,
        PropertyKind::UInt32,
        PropertyKind::UInt64,
        PropertyKind::Float,
        PropertyKind::Double,
        PropertyKind::Object,
        PropertyKind::Array,
        PropertyKind::Enum,
    ];

    /// Host type tag, e.g. `"BoolProperty"`.
    pub fn type_name(self) -> &'static str {
        match self {
            PropertyKind::Bool => "BoolProperty",
            PropertyKind::Int8 => "Int8Property",
            PropertyKind::Int16 => "Int16Property",
            PropertyKind::Int32 => "IntProperty",
            PropertyKind::Int64 => "Int64Property",
            PropertyKind::Byte => "ByteProperty",
            PropertyKind::UInt16 => "UInt16Property",
            PropertyKind::UInt32 => "UInt32Property",
            PropertyKind::UInt64 => "UInt64Property",
            PropertyKind::Float => "FloatProperty",
            PropertyKind::Double => "DoubleProperty",
            PropertyKind::Object => "ObjectProperty",
            PropertyKind::Array => "ArrayProperty",
            PropertyKind::Enum => "EnumProperty",
        }
    }

    pub fn from_type_name(type_name: &str) -> Option<Self> {
        PropertyKind::ALL
            .into_iter()
            .find(|kind| kind.type_name() == type_name)
    }

    /// Integer family, for integer kinds only.
    pub fn data_type(self) -> Option<GenericDataType> {
        match self {
            PropertyKind::Int8 | PropertyKind::Int16 | PropertyKind::Int32 => {
                Some(GenericDataType::SignedLong)
            }
            PropertyKind::Int64 => Some(GenericDataType::SignedLongLong),
            PropertyKind::Byte | PropertyKind::UInt16 | PropertyKind::UInt32 => {
                Some(GenericDataType::UnsignedLong)
            }
            PropertyKind::UInt64 => Some(GenericDataType::UnsignedLongLong),
            PropertyKind::Bool
            | PropertyKind::Float
            | PropertyKind::Double
            | PropertyKind::Object
            | PropertyKind::Array
            | PropertyKind::Enum => None,
        }
    }

    /// Whether values of this kind can live inside a container.
    pub fn is_element_kind(self) -> bool {
        self != PropertyKind::Array
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_round_trip() {
        for kind in PropertyKind::ALL {
            assert_eq!(PropertyKind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(PropertyKind::from_type_name("MapProperty"), None);
        assert_eq!(PropertyKind::from_type_name("boolproperty"), None);
    }

    #[test]
    fn test_integer_families() {
        assert_eq!(PropertyKind::Int8.data_type(), Some(GenericDataType::SignedLong));
        assert_eq!(PropertyKind::UInt32.data_type(), Some(GenericDataType::UnsignedLong));
        assert_eq!(
            PropertyKind::Int64.data_type(),
            Some(GenericDataType::SignedLongLong)
        );
        assert_eq!(
            PropertyKind::UInt64.data_type(),
            Some(GenericDataType::UnsignedLongLong)
        );
        assert_eq!(PropertyKind::Float.data_type(), None);
        assert_eq!(GenericDataType::for_width(2, true), GenericDataType::SignedLong);
        assert_eq!(GenericDataType::for_width(8, false), GenericDataType::UnsignedLongLong);
    }

    #[test]
    fn test_kind_display_is_type_name() {
        assert_eq!(PropertyKind::Int32.to_string(), "IntProperty");
        assert_eq!(GenericDataType::UnsignedLong.to_string(), "UnsignedLong");
    }
}
