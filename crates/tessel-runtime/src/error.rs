//! Error types for the runtime crate.

use std::fmt;
use tessel_core::{ElementType, PartialShape};
use thiserror::Error;

/// Which side of a function signature a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// Call inputs, checked against parameters.
    Input,

    /// Call outputs, checked against results.
    Output,
}

impl Port {
    /// Name of the declared slot on this side of the signature.
    pub fn slot_name(&self) -> &'static str {
        match self {
            Port::Input => "parameter",
            Port::Output => "result",
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Input => f.write_str("input"),
            Port::Output => f.write_str("output"),
        }
    }
}

/// Runtime execution errors.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Number of call tensors differs from the signature.
    #[error("call {port} count {actual} does not match function's {} count {expected}", .port.slot_name())]
    CountMismatch {
        port: Port,
        expected: usize,
        actual: usize,
    },

    /// A tensor's element type differs from the declared one.
    #[error("{port} {index} type '{actual}' does not match {} type '{expected}'", .port.slot_name())]
    TypeMismatch {
        port: Port,
        index: usize,
        expected: ElementType,
        actual: ElementType,
    },

    /// A tensor's shape is incompatible with the declared one.
    ///
    /// For outputs `expected` holds the result's maximum shape.
    #[error("{port} {index} shape {actual} does not match {} shape {expected}", .port.slot_name())]
    ShapeMismatch {
        port: Port,
        index: usize,
        expected: PartialShape,
        actual: PartialShape,
    },

    /// The backend does not provide this operation.
    #[error("{operation} unimplemented")]
    Unimplemented { operation: &'static str },

    /// Slot index beyond the signature.
    #[error("{port} index {index} out of range for {count} {}s", .port.slot_name())]
    IndexOutOfRange {
        port: Port,
        index: usize,
        count: usize,
    },

    /// Executable configuration rejected.
    #[error("Invalid executable configuration: {0}")]
    InvalidConfig(String),

    /// Tensor allocation failed.
    #[error("Tensor allocation failed: {0}")]
    Allocation(String),

    /// Pipelined buffer bookkeeping violated.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Execution failed.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Invalid tensor.
    #[error("Invalid tensor: {0}")]
    Tensor(String),

    /// Signature construction failed.
    #[error(transparent)]
    Core(#[from] tessel_core::Error),

    /// Writing to an output stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    pub(crate) fn unimplemented(operation: &'static str) -> Self {
        ExecError::Unimplemented { operation }
    }
}

/// Specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, ExecError>;
