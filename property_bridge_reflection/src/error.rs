//! 宿主反射层错误类型

use crate::meta::{ObjectId, PropertyId};
use thiserror::Error;

/// 宿主访问错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Native object {0} does not exist")]
    ObjectNotFound(ObjectId),

    #[error("Access of {len} bytes at offset {offset} is outside object {object} ({size} bytes)")]
    OutOfBounds {
        object: ObjectId,
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Property {property} of object {object} is not a container")]
    NotAContainer {
        object: ObjectId,
        property: PropertyId,
    },

    #[error("Index {index} is out of bounds for container of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Container of {len} elements of {element_size} bytes exceeds the host limit")]
    CapacityExceeded { len: usize, element_size: usize },

    #[error("Native object {0} already exists")]
    DuplicateObject(ObjectId),
}

pub type HostResult<T> = Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HostError::ObjectNotFound(ObjectId(0xABCD));
        assert_eq!(err.to_string(), "Native object 0xABCD does not exist");
    }
}
