//! Bound parameter/result signature and call validation.

use crate::error::{ExecError, Port, Result};
use crate::tensor::Tensor;
use tessel_core::{Function, ParameterVector, PartialShape, ResultVector};

/// Parameters and results an executable was compiled for.
///
/// Backends embed a `Signature` and hand it out through
/// [`Executable::signature`](crate::Executable::signature). Call tensors are
/// matched against it by position.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    parameters: ParameterVector,
    results: ResultVector,
}

impl Signature {
    /// Create an empty signature (no parameters, no results).
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the signature of a compiled function.
    pub fn from_function(function: &Function) -> Self {
        let mut signature = Self::new();
        signature.set_parameters_and_results(function);
        signature
    }

    /// Replace the stored parameters and results with the function's.
    pub fn set_parameters_and_results(&mut self, function: &Function) {
        self.parameters = function.parameters().clone();
        self.results = function.results().clone();

        tracing::debug!(
            function = function.name(),
            num_parameters = self.parameters.len(),
            num_results = self.results.len(),
            "signature bound"
        );
    }

    pub fn parameters(&self) -> &ParameterVector {
        &self.parameters
    }

    pub fn results(&self) -> &ResultVector {
        &self.results
    }

    /// Check a call binding against the signature.
    ///
    /// Counts are checked first, then each input (type, then shape), then
    /// each output (type, then shape). The first mismatch is returned.
    ///
    /// An input type mismatch only needs a static parameter type; an output
    /// type mismatch needs both the result type and the tensor type static.
    /// Input shapes must be admitted by the parameter shape, while output
    /// tensors must admit the result shape.
    ///
    /// # Errors
    /// Returns `CountMismatch`, `TypeMismatch` or `ShapeMismatch`.
    pub fn validate(&self, outputs: &[&Tensor], inputs: &[&Tensor]) -> Result<()> {
        if self.parameters.len() != inputs.len() {
            return Err(ExecError::CountMismatch {
                port: Port::Input,
                expected: self.parameters.len(),
                actual: inputs.len(),
            });
        }
        if self.results.len() != outputs.len() {
            return Err(ExecError::CountMismatch {
                port: Port::Output,
                expected: self.results.len(),
                actual: outputs.len(),
            });
        }

        for (index, (parameter, input)) in self.parameters.iter().zip(inputs).enumerate() {
            let declared = parameter.element_type();
            if declared.is_static() && declared != input.element_type() {
                return Err(ExecError::TypeMismatch {
                    port: Port::Input,
                    index,
                    expected: declared,
                    actual: input.element_type(),
                });
            }

            if !parameter.partial_shape().relaxes(input.partial_shape()) {
                return Err(ExecError::ShapeMismatch {
                    port: Port::Input,
                    index,
                    expected: parameter.partial_shape().clone(),
                    actual: input.partial_shape().clone(),
                });
            }

            tracing::trace!(index, parameter = parameter.name(), "input accepted");
        }

        for (index, (result, output)) in self.results.iter().zip(outputs).enumerate() {
            let declared = result.element_type();
            if output.element_type().is_static()
                && declared.is_static()
                && declared != output.element_type()
            {
                return Err(ExecError::TypeMismatch {
                    port: Port::Output,
                    index,
                    expected: declared,
                    actual: output.element_type(),
                });
            }

            if !output.partial_shape().relaxes(result.partial_shape()) {
                let max_shape = result
                    .partial_shape()
                    .max_shape()
                    .map_or_else(PartialShape::dynamic, PartialShape::from);
                return Err(ExecError::ShapeMismatch {
                    port: Port::Output,
                    index,
                    expected: max_shape,
                    actual: output.partial_shape().clone(),
                });
            }

            tracing::trace!(index, result = result.name(), "output accepted");
        }

        Ok(())
    }
}
