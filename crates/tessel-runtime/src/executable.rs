//! The executable contract.

use crate::error::{ExecError, Result};
use crate::signature::Signature;
use crate::tensor::Tensor;
use std::io::Write;
use tessel_core::{Function, ParameterVector, ResultVector};

/// Pipeline depth hinted by executables that don't ask for more (double-buffering).
pub const DEFAULT_PIPELINE_DEPTH: usize = 2;

/// Optional operations a backend may provide.
///
/// Callers can query [`Executable::supports`] before using one; calling an
/// unsupported operation returns [`ExecError::Unimplemented`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `save`
    Save,
    /// `create_input_tensor` / `create_output_tensor`
    CreateTensor,
    /// `create_input_tensor_with_memory` / `create_output_tensor_with_memory`
    CreateTensorWithMemory,
    /// `create_input_tensors` / `create_output_tensors`
    CreatePipelinedTensors,
    /// `create_input_tensors_with_memory` / `create_output_tensors_with_memory`
    CreatePipelinedTensorsWithMemory,
}

/// A compiled function bound to a fixed parameter/result signature.
///
/// Implementors provide storage for the signature and the backend-specific
/// [`call`](Executable::call). Everything else has a default: signature
/// access and validation are shared, and the optional operations return
/// [`ExecError::Unimplemented`] until a backend overrides them.
///
/// Tensors are borrowed for the duration of a call. Inputs are only read;
/// outputs are fully written when `call` reports success.
///
/// # Example
///
/// ```
/// use tessel_core::{ElementType, Function, FunctionResult, Parameter, PartialShape};
/// use tessel_runtime::{Executable, Result, Signature, Tensor};
///
/// struct Identity {
///     signature: Signature,
/// }
///
/// impl Executable for Identity {
///     fn signature(&self) -> &Signature {
///         &self.signature
///     }
///
///     fn signature_mut(&mut self) -> &mut Signature {
///         &mut self.signature
///     }
///
///     fn call(&mut self, outputs: &mut [&mut Tensor], inputs: &[&Tensor]) -> Result<bool> {
///         let data = inputs[0].to_vec::<f32>()?;
///         outputs[0].write(&data, &[data.len()])?;
///         Ok(true)
///     }
/// }
///
/// # fn main() -> anyhow::Result<()> {
/// let function = Function::new(
///     "identity",
///     vec![Parameter::new("x", ElementType::F32, PartialShape::from_static(&[3]))],
///     vec![FunctionResult::new("y", ElementType::F32, PartialShape::from_static(&[3]))],
/// )?;
/// let mut exe = Identity { signature: Default::default() };
/// exe.set_parameters_and_results(&function);
///
/// let x = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], &[3]);
/// let mut y = Tensor::zeros(ElementType::F32, &[3])?;
/// assert!(exe.call_with_validate(&mut [&mut y], &[&x])?);
/// assert_eq!(y.to_vec::<f32>()?, vec![1.0, 2.0, 3.0]);
/// # Ok(())
/// # }
/// ```
pub trait Executable {
    /// Stored signature.
    fn signature(&self) -> &Signature;

    /// Mutable access to the stored signature, used when binding a function.
    fn signature_mut(&mut self) -> &mut Signature;

    /// Run the compiled function.
    ///
    /// Implementations may assume the binding has been validated when called
    /// through [`call_with_validate`](Executable::call_with_validate).
    /// Returns whether execution succeeded.
    fn call(&mut self, outputs: &mut [&mut Tensor], inputs: &[&Tensor]) -> Result<bool>;

    /// Operations this backend provides beyond `call`.
    fn capabilities(&self) -> &[Capability] {
        &[]
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Replace the stored signature with the function's parameters and results.
    fn set_parameters_and_results(&mut self, function: &Function) {
        self.signature_mut().set_parameters_and_results(function);
    }

    fn get_parameters(&self) -> &ParameterVector {
        self.signature().parameters()
    }

    fn get_results(&self) -> &ResultVector {
        self.signature().results()
    }

    /// Number of in-flight tensor sets callers should allocate for pipelining.
    fn get_preferred_pipeline_depth(&self) -> usize {
        DEFAULT_PIPELINE_DEPTH
    }

    /// Check a call binding against the stored signature.
    ///
    /// See [`Signature::validate`] for the rules.
    fn validate(&self, outputs: &[&Tensor], inputs: &[&Tensor]) -> Result<()> {
        self.signature().validate(outputs, inputs)
    }

    /// Validate the binding, then run [`call`](Executable::call).
    ///
    /// `call` is never reached when validation fails.
    #[tracing::instrument(skip_all, fields(num_inputs = inputs.len(), num_outputs = outputs.len()))]
    fn call_with_validate(
        &mut self,
        outputs: &mut [&mut Tensor],
        inputs: &[&Tensor],
    ) -> Result<bool> {
        {
            let output_views: Vec<&Tensor> = outputs.iter().map(|t| &**t).collect();
            self.validate(&output_views, inputs).inspect_err(|e| {
                tracing::warn!(error = %e, "call rejected");
            })?;
        }
        self.call(outputs, inputs)
    }

    /// Serialize the executable.
    fn save(&self, _writer: &mut dyn Write) -> Result<()> {
        Err(ExecError::unimplemented("save"))
    }

    /// Allocate a tensor for input `index`.
    fn create_input_tensor(&self, _index: usize) -> Result<Tensor> {
        Err(ExecError::unimplemented("create_input_tensor"))
    }

    /// Wrap caller-supplied memory as a tensor for input `index`.
    fn create_input_tensor_with_memory(&self, _index: usize, _memory: Vec<u8>) -> Result<Tensor> {
        Err(ExecError::unimplemented("create_input_tensor_with_memory"))
    }

    /// Allocate a tensor for output `index`.
    fn create_output_tensor(&self, _index: usize) -> Result<Tensor> {
        Err(ExecError::unimplemented("create_output_tensor"))
    }

    /// Wrap caller-supplied memory as a tensor for output `index`.
    fn create_output_tensor_with_memory(
        &self,
        _index: usize,
        _memory: Vec<u8>,
    ) -> Result<Tensor> {
        Err(ExecError::unimplemented("create_output_tensor_with_memory"))
    }

    /// Allocate `pipeline_depth` independent tensors for input `index`.
    fn create_input_tensors(&self, _index: usize, _pipeline_depth: usize) -> Result<Vec<Tensor>> {
        Err(ExecError::unimplemented("create_input_tensors"))
    }

    /// Wrap one caller-supplied buffer per pipeline stage for input `index`.
    fn create_input_tensors_with_memory(
        &self,
        _index: usize,
        _pipeline_depth: usize,
        _memory: Vec<Vec<u8>>,
    ) -> Result<Vec<Tensor>> {
        Err(ExecError::unimplemented("create_input_tensors_with_memory"))
    }

    /// Allocate `pipeline_depth` independent tensors for output `index`.
    fn create_output_tensors(&self, _index: usize, _pipeline_depth: usize) -> Result<Vec<Tensor>> {
        Err(ExecError::unimplemented("create_output_tensors"))
    }

    /// Wrap one caller-supplied buffer per pipeline stage for output `index`.
    fn create_output_tensors_with_memory(
        &self,
        _index: usize,
        _pipeline_depth: usize,
        _memory: Vec<Vec<u8>>,
    ) -> Result<Vec<Tensor>> {
        Err(ExecError::unimplemented("create_output_tensors_with_memory"))
    }
}
