//! Signature types shared between the compiler side and the runtime side of Tessel.
//!
//! This crate describes what a compiled function expects at its boundary:
//! - Element types, including the `Dynamic` placeholder (`ElementType`)
//! - Partial shapes with unknown ranks or dimensions (`PartialShape`, `Dimension`)
//! - The relaxation predicate used to match call-time shapes against declared ones
//! - Function signatures (`Function`, `Parameter`, `FunctionResult`)
//!
//! # Example
//!
//! ```
//! use tessel_core::{Dimension, PartialShape};
//!
//! let declared = PartialShape::new(vec![Dimension::Dynamic, Dimension::Static(3)]);
//! assert!(declared.relaxes(&PartialShape::from_static(&[5, 3])));
//! assert!(!declared.relaxes(&PartialShape::from_static(&[5, 4])));
//! ```

pub mod function;
pub mod shape;
pub mod types;

pub use function::{Function, FunctionResult, Parameter, ParameterVector, ResultVector};
pub use shape::{Dimension, PartialShape, checked_element_count};
pub use types::{ElementType, HostScalar};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tessel-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid function: {0}")]
    InvalidFunction(String),

    #[error("Cannot parse element type '{0}'")]
    ParseElementType(String),

    #[error("Cannot parse shape '{0}'")]
    ParseShape(String),
}
