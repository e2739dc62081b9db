//! Partial shapes and the relaxation predicate.
//!
//! A declared shape may leave its rank or individual dimensions unknown.
//! Call-time shapes are checked against declared ones with
//! [`PartialShape::relaxes`], the single compatibility rule used by the
//! runtime for both inputs and outputs.

use crate::Error;
use std::fmt;
use std::str::FromStr;

/// A single dimension in a partial shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Dimension with known length.
    Static(usize),

    /// Dimension whose length is only known at call time.
    Dynamic,
}

impl Dimension {
    /// Upper bound reported for a dynamic dimension.
    pub const MAX_LENGTH: usize = usize::MAX;

    /// Check if the length is known.
    pub fn is_static(&self) -> bool {
        matches!(self, Dimension::Static(_))
    }

    /// Get the length if known.
    pub fn length(&self) -> Option<usize> {
        match self {
            Dimension::Static(n) => Some(*n),
            Dimension::Dynamic => None,
        }
    }

    /// Largest length this dimension admits.
    pub fn max_length(&self) -> usize {
        self.length().unwrap_or(Self::MAX_LENGTH)
    }

    /// Check whether `self` is at least as general as `other`.
    ///
    /// A dynamic dimension relaxes anything. A static dimension only relaxes
    /// the same static length; it does not relax a dynamic one.
    pub fn relaxes(&self, other: &Dimension) -> bool {
        match (self, other) {
            (Dimension::Dynamic, _) => true,
            (Dimension::Static(a), Dimension::Static(b)) => a == b,
            (Dimension::Static(_), Dimension::Dynamic) => false,
        }
    }
}

impl From<usize> for Dimension {
    fn from(n: usize) -> Self {
        Dimension::Static(n)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Static(n) => write!(f, "{n}"),
            Dimension::Dynamic => write!(f, "?"),
        }
    }
}

/// Tensor shape whose rank and dimensions may be partially unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartialShape {
    /// Known rank, each dimension static or dynamic.
    Ranked(Vec<Dimension>),

    /// Unknown rank.
    Dynamic,
}

impl PartialShape {
    /// Create a shape of known rank.
    pub fn new(dims: Vec<Dimension>) -> Self {
        PartialShape::Ranked(dims)
    }

    /// Create a shape of unknown rank.
    pub fn dynamic() -> Self {
        PartialShape::Dynamic
    }

    /// Create a fully static shape.
    pub fn from_static(dims: &[usize]) -> Self {
        PartialShape::Ranked(dims.iter().copied().map(Dimension::Static).collect())
    }

    /// Number of dimensions, if known.
    pub fn rank(&self) -> Option<usize> {
        self.dims().map(<[Dimension]>::len)
    }

    /// Dimensions, if the rank is known.
    pub fn dims(&self) -> Option<&[Dimension]> {
        match self {
            PartialShape::Ranked(dims) => Some(dims),
            PartialShape::Dynamic => None,
        }
    }

    /// Check if rank and every dimension are known.
    pub fn is_static(&self) -> bool {
        self.dims()
            .is_some_and(|dims| dims.iter().all(Dimension::is_static))
    }

    /// Get the concrete dimensions if the shape is fully static.
    pub fn to_shape(&self) -> Option<Vec<usize>> {
        self.dims()?.iter().map(Dimension::length).collect()
    }

    /// Number of elements, if the shape is fully static and the count fits
    /// in a `usize`.
    pub fn element_count(&self) -> Option<usize> {
        checked_element_count(&self.to_shape()?)
    }

    /// Largest concrete shape compatible with this one.
    ///
    /// Dynamic dimensions report [`Dimension::MAX_LENGTH`]. Returns `None`
    /// when the rank is unknown.
    pub fn max_shape(&self) -> Option<Vec<usize>> {
        self.dims()
            .map(|dims| dims.iter().map(Dimension::max_length).collect())
    }

    /// Check whether `self` is at least as general as `other`.
    ///
    /// Holds when `self` has unknown rank, or when both ranks are known and
    /// equal and every dimension of `self` relaxes the matching dimension of
    /// `other`. A ranked shape never relaxes a shape of unknown rank.
    pub fn relaxes(&self, other: &PartialShape) -> bool {
        match (self, other) {
            (PartialShape::Dynamic, _) => true,
            (PartialShape::Ranked(_), PartialShape::Dynamic) => false,
            (PartialShape::Ranked(ours), PartialShape::Ranked(theirs)) => {
                ours.len() == theirs.len()
                    && ours.iter().zip(theirs).all(|(a, b)| a.relaxes(b))
            }
        }
    }
}

/// Product of `dims`, or `None` on overflow.
pub fn checked_element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl From<Vec<usize>> for PartialShape {
    fn from(dims: Vec<usize>) -> Self {
        PartialShape::from_static(&dims)
    }
}

impl From<&[usize]> for PartialShape {
    fn from(dims: &[usize]) -> Self {
        PartialShape::from_static(dims)
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialShape::Dynamic => write!(f, "[...]"),
            PartialShape::Ranked(dims) => {
                write!(f, "[")?;
                for (i, dim) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{dim}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Parses `[2, ?, 3]`, `[]` (scalar) and `[...]` or `?` (unknown rank).
impl FromStr for PartialShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "?" || trimmed == "[...]" {
            return Ok(PartialShape::Dynamic);
        }

        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| Error::ParseShape(s.to_string()))?;

        if inner.trim().is_empty() {
            return Ok(PartialShape::Ranked(Vec::new()));
        }

        inner
            .split(',')
            .map(|token| match token.trim() {
                "?" => Ok(Dimension::Dynamic),
                n => n
                    .parse::<usize>()
                    .map(Dimension::Static)
                    .map_err(|_| Error::ParseShape(s.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(PartialShape::Ranked)
    }
}
