//! Value-layer errors. These compose into the runtime's host-facing error
//! bitmask one level up; this crate only needs to distinguish them from
//! each other, not carry bit positions.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValueError {
    #[error("value is sealed under a different key")]
    DataSealed,
    #[error("linear value cannot be copied or dropped implicitly")]
    Linearity,
    #[error("value does not have the expected shape")]
    DataType,
    #[error("value does not have the expected quantity of elements")]
    DataQuantity,
    #[error("index or prefix length exceeds the value's length")]
    Underflow,
}
