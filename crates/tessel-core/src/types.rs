//! Element types for parameters, results and tensors.

use crate::Error;
use std::fmt;
use std::str::FromStr;

/// Element types a compiled function can declare.
///
/// `Dynamic` is only meaningful on the declaration side: a parameter or result
/// whose element type is left open. Tensors always carry a static type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Unspecified element type, matches any tensor type.
    Dynamic,
    Bool,
    F16,
    F32,
    F64,
    I8,
    I32,
    I64,
    U8,
    U32,
}

impl ElementType {
    /// Check if the element type is known.
    pub fn is_static(&self) -> bool {
        !matches!(self, ElementType::Dynamic)
    }

    /// Check if the element type is left open.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ElementType::Dynamic)
    }

    /// Size of one element in bytes.
    ///
    /// `Dynamic` has no storage size and reports 0. `Bool` is stored as one byte.
    pub fn size(&self) -> usize {
        match self {
            ElementType::Dynamic => 0,
            ElementType::Bool | ElementType::I8 | ElementType::U8 => 1,
            ElementType::F16 => 2,
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 4,
            ElementType::F64 | ElementType::I64 => 8,
        }
    }

    /// Element type of a host scalar type.
    pub fn of<T: HostScalar>() -> Self {
        T::ELEMENT_TYPE
    }

    fn name(&self) -> &'static str {
        match self {
            ElementType::Dynamic => "dynamic",
            ElementType::Bool => "bool",
            ElementType::F16 => "f16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::I8 => "i8",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::U8 => "u8",
            ElementType::U32 => "u32",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim() {
            "dynamic" | "?" => ElementType::Dynamic,
            "bool" => ElementType::Bool,
            "f16" => ElementType::F16,
            "f32" => ElementType::F32,
            "f64" => ElementType::F64,
            "i8" => ElementType::I8,
            "i32" => ElementType::I32,
            "i64" => ElementType::I64,
            "u8" => ElementType::U8,
            "u32" => ElementType::U32,
            other => return Err(Error::ParseElementType(other.to_string())),
        };
        Ok(ty)
    }
}

/// Rust scalar types that map directly onto an element type.
pub trait HostScalar: Copy + Send + Sync + 'static {
    const ELEMENT_TYPE: ElementType;
}

macro_rules! host_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl HostScalar for $ty {
                const ELEMENT_TYPE: ElementType = ElementType::$variant;
            }
        )*
    };
}

host_scalar! {
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u32 => U32,
}
