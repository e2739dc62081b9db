//! Compiled function signatures.
//!
//! A [`Function`] is the compiler's view of a compiled graph at its boundary:
//! an ordered list of parameters and an ordered list of results. Executables
//! bind to these lists by position.

use crate::shape::PartialShape;
use crate::types::ElementType;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered parameters of a function.
pub type ParameterVector = Vec<Arc<Parameter>>;

/// Ordered results of a function.
pub type ResultVector = Vec<Arc<FunctionResult>>;

/// A declared function input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    element_type: ElementType,
    shape: PartialShape,
}

impl Parameter {
    pub fn new(name: impl Into<String>, element_type: ElementType, shape: PartialShape) -> Self {
        Self {
            name: name.into(),
            element_type,
            shape,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared element type, possibly `Dynamic`.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Declared shape, possibly partial.
    pub fn partial_shape(&self) -> &PartialShape {
        &self.shape
    }
}

/// A declared function output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionResult {
    name: String,
    element_type: ElementType,
    shape: PartialShape,
}

impl FunctionResult {
    pub fn new(name: impl Into<String>, element_type: ElementType, shape: PartialShape) -> Self {
        Self {
            name: name.into(),
            element_type,
            shape,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared element type, possibly `Dynamic`.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Declared shape, possibly partial.
    pub fn partial_shape(&self) -> &PartialShape {
        &self.shape
    }
}

/// A compiled function's boundary: ordered parameters and results.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    parameters: ParameterVector,
    results: ResultVector,
}

impl Function {
    /// Create a function signature.
    ///
    /// # Errors
    /// Returns an error if two parameters or two results share a non-empty name.
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<Parameter>,
        results: Vec<FunctionResult>,
    ) -> Result<Self> {
        let name = name.into();

        check_unique_names(&name, "parameter", parameters.iter().map(Parameter::name))?;
        check_unique_names(&name, "result", results.iter().map(FunctionResult::name))?;

        tracing::debug!(
            function = %name,
            num_parameters = parameters.len(),
            num_results = results.len(),
            "function signature created"
        );

        Ok(Self {
            name,
            parameters: parameters.into_iter().map(Arc::new).collect(),
            results: results.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &ParameterVector {
        &self.parameters
    }

    pub fn results(&self) -> &ResultVector {
        &self.results
    }
}

fn check_unique_names<'a>(
    function: &str,
    kind: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names.filter(|n| !n.is_empty()) {
        if !seen.insert(name) {
            return Err(Error::InvalidFunction(format!(
                "function '{function}' declares {kind} '{name}' more than once"
            )));
        }
    }
    Ok(())
}
