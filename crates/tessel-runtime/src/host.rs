//! Host-memory backend.
//!
//! `HostExecutable` runs a compiled function as a Rust closure over host
//! tensors. It supports every optional operation of the executable contract,
//! which makes it the reference for what a device backend has to provide.

use crate::error::{ExecError, Port, Result};
use crate::executable::{Capability, DEFAULT_PIPELINE_DEPTH, Executable};
use crate::signature::Signature;
use crate::tensor::{Tensor, byte_len};
use std::io::Write;
use tessel_core::{ElementType, Function, PartialShape};

/// Kernel run by a [`HostExecutable`]: writes `outputs` from `inputs`.
pub type HostKernel = Box<dyn FnMut(&mut [&mut Tensor], &[&Tensor]) -> Result<()> + Send>;

const HOST_CAPABILITIES: &[Capability] = &[
    Capability::Save,
    Capability::CreateTensor,
    Capability::CreateTensorWithMemory,
    Capability::CreatePipelinedTensors,
    Capability::CreatePipelinedTensorsWithMemory,
];

/// Executable backed by a host closure.
///
/// # Example
///
/// ```
/// use tessel_core::{ElementType, Function, FunctionResult, Parameter, PartialShape};
/// use tessel_runtime::{Executable, HostExecutableBuilder};
///
/// # fn main() -> anyhow::Result<()> {
/// let function = Function::new(
///     "double",
///     vec![Parameter::new("x", ElementType::F32, "[?]".parse()?)],
///     vec![FunctionResult::new("y", ElementType::F32, "[?]".parse()?)],
/// )?;
///
/// let mut exe = HostExecutableBuilder::new(&function)
///     .kernel(|outputs, inputs| {
///         let x = inputs[0].to_vec::<f32>()?;
///         let y: Vec<f32> = x.iter().map(|v| v * 2.0).collect();
///         outputs[0].write(&y, &[y.len()])
///     })
///     .build()?;
///
/// let x = tessel_runtime::Tensor::from_vec(vec![1.0f32, 2.0], &[2]);
/// let mut y = exe.create_output_tensor(0)?;
/// assert!(exe.call_with_validate(&mut [&mut y], &[&x])?);
/// assert_eq!(y.to_vec::<f32>()?, vec![2.0, 4.0]);
/// # Ok(())
/// # }
/// ```
pub struct HostExecutable {
    name: String,
    signature: Signature,
    pipeline_depth: usize,
    kernel: HostKernel,
}

impl std::fmt::Debug for HostExecutable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostExecutable")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("pipeline_depth", &self.pipeline_depth)
            .finish_non_exhaustive()
    }
}

impl HostExecutable {
    /// Name of the compiled function.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn parameter_slot(&self, index: usize) -> Result<(ElementType, &PartialShape)> {
        let parameters = self.signature.parameters();
        let parameter = parameters.get(index).ok_or(ExecError::IndexOutOfRange {
            port: Port::Input,
            index,
            count: parameters.len(),
        })?;
        Ok((parameter.element_type(), parameter.partial_shape()))
    }

    fn result_slot(&self, index: usize) -> Result<(ElementType, &PartialShape)> {
        let results = self.signature.results();
        let result = results.get(index).ok_or(ExecError::IndexOutOfRange {
            port: Port::Output,
            index,
            count: results.len(),
        })?;
        Ok((result.element_type(), result.partial_shape()))
    }
}

impl Executable for HostExecutable {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut Signature {
        &mut self.signature
    }

    /// Run the kernel.
    ///
    /// Returns `Ok(false)` if the kernel did not write every output during
    /// this call. Data an output already held does not count.
    #[tracing::instrument(skip_all, fields(function = %self.name))]
    fn call(&mut self, outputs: &mut [&mut Tensor], inputs: &[&Tensor]) -> Result<bool> {
        for output in outputs.iter_mut() {
            output.begin_call();
        }

        (self.kernel)(outputs, inputs)
            .map_err(|e| ExecError::Execution(format!("kernel '{}' failed: {e}", self.name)))?;

        if let Some(index) = outputs.iter().position(|t| !t.is_written()) {
            tracing::warn!(index, "kernel returned without writing output");
            return Ok(false);
        }
        Ok(true)
    }

    fn capabilities(&self) -> &[Capability] {
        HOST_CAPABILITIES
    }

    fn get_preferred_pipeline_depth(&self) -> usize {
        self.pipeline_depth
    }

    /// Write a text manifest of the signature, one line per slot.
    fn save(&self, writer: &mut dyn Write) -> Result<()> {
        writeln!(writer, "function {}", display_name(&self.name))?;
        for (index, parameter) in self.signature.parameters().iter().enumerate() {
            writeln!(
                writer,
                "parameter {index} {} {} {}",
                display_name(parameter.name()),
                parameter.element_type(),
                parameter.partial_shape()
            )?;
        }
        for (index, result) in self.signature.results().iter().enumerate() {
            writeln!(
                writer,
                "result {index} {} {} {}",
                display_name(result.name()),
                result.element_type(),
                result.partial_shape()
            )?;
        }
        Ok(())
    }

    fn create_input_tensor(&self, index: usize) -> Result<Tensor> {
        let (element_type, shape) = self.parameter_slot(index)?;
        let dims = static_dims(Port::Input, index, element_type, shape)?;
        allocation_size(Port::Input, index, element_type, &dims)?;
        tracing::debug!(index, %element_type, ?dims, "allocating input tensor");
        Tensor::zeros(element_type, &dims)
    }

    fn create_input_tensor_with_memory(&self, index: usize, memory: Vec<u8>) -> Result<Tensor> {
        let (element_type, shape) = self.parameter_slot(index)?;
        let dims = static_dims(Port::Input, index, element_type, shape)?;
        wrap_memory(Port::Input, index, element_type, &dims, memory)
    }

    fn create_output_tensor(&self, index: usize) -> Result<Tensor> {
        let (element_type, shape) = self.result_slot(index)?;
        if element_type.is_dynamic() {
            return Err(ExecError::Allocation(format!(
                "output {index} has a dynamic element type"
            )));
        }

        match shape.to_shape() {
            Some(dims) => {
                allocation_size(Port::Output, index, element_type, &dims)?;
                tracing::debug!(index, %element_type, ?dims, "allocating output tensor");
                Tensor::zeros(element_type, &dims)
            }
            None => {
                tracing::debug!(index, %element_type, %shape, "deferring output allocation");
                Ok(Tensor::unallocated(element_type, shape.clone()))
            }
        }
    }

    fn create_output_tensor_with_memory(&self, index: usize, memory: Vec<u8>) -> Result<Tensor> {
        let (element_type, shape) = self.result_slot(index)?;
        let dims = static_dims(Port::Output, index, element_type, shape)?;
        wrap_memory(Port::Output, index, element_type, &dims, memory)
    }

    fn create_input_tensors(&self, index: usize, pipeline_depth: usize) -> Result<Vec<Tensor>> {
        check_depth(pipeline_depth)?;
        (0..pipeline_depth)
            .map(|_| self.create_input_tensor(index))
            .collect()
    }

    fn create_input_tensors_with_memory(
        &self,
        index: usize,
        pipeline_depth: usize,
        memory: Vec<Vec<u8>>,
    ) -> Result<Vec<Tensor>> {
        check_buffers(pipeline_depth, memory.len())?;
        memory
            .into_iter()
            .map(|buffer| self.create_input_tensor_with_memory(index, buffer))
            .collect()
    }

    fn create_output_tensors(&self, index: usize, pipeline_depth: usize) -> Result<Vec<Tensor>> {
        check_depth(pipeline_depth)?;
        (0..pipeline_depth)
            .map(|_| self.create_output_tensor(index))
            .collect()
    }

    fn create_output_tensors_with_memory(
        &self,
        index: usize,
        pipeline_depth: usize,
        memory: Vec<Vec<u8>>,
    ) -> Result<Vec<Tensor>> {
        check_buffers(pipeline_depth, memory.len())?;
        memory
            .into_iter()
            .map(|buffer| self.create_output_tensor_with_memory(index, buffer))
            .collect()
    }
}

/// Builder for [`HostExecutable`].
pub struct HostExecutableBuilder {
    name: String,
    signature: Signature,
    pipeline_depth: usize,
    kernel: Option<HostKernel>,
}

impl HostExecutableBuilder {
    /// Start building an executable for `function`.
    pub fn new(function: &Function) -> Self {
        Self {
            name: function.name().to_string(),
            signature: Signature::from_function(function),
            pipeline_depth: DEFAULT_PIPELINE_DEPTH,
            kernel: None,
        }
    }

    /// Pipeline depth reported by the executable (default 2).
    pub fn pipeline_depth(mut self, depth: usize) -> Self {
        self.pipeline_depth = depth;
        self
    }

    /// Closure run on every call.
    pub fn kernel<F>(mut self, kernel: F) -> Self
    where
        F: FnMut(&mut [&mut Tensor], &[&Tensor]) -> Result<()> + Send + 'static,
    {
        self.kernel = Some(Box::new(kernel));
        self
    }

    /// Finish the executable.
    ///
    /// # Errors
    /// Returns an error if no kernel was given or the pipeline depth is 0.
    pub fn build(self) -> Result<HostExecutable> {
        let kernel = self.kernel.ok_or_else(|| {
            ExecError::InvalidConfig(format!("no kernel given for '{}'", self.name))
        })?;
        if self.pipeline_depth == 0 {
            return Err(ExecError::InvalidConfig(
                "pipeline depth must be at least 1".to_string(),
            ));
        }

        tracing::debug!(
            function = %self.name,
            pipeline_depth = self.pipeline_depth,
            "host executable built"
        );

        Ok(HostExecutable {
            name: self.name,
            signature: self.signature,
            pipeline_depth: self.pipeline_depth,
            kernel,
        })
    }
}

fn static_dims(
    port: Port,
    index: usize,
    element_type: ElementType,
    shape: &PartialShape,
) -> Result<Vec<usize>> {
    if element_type.is_dynamic() {
        return Err(ExecError::Allocation(format!(
            "{port} {index} has a dynamic element type"
        )));
    }
    shape.to_shape().ok_or_else(|| {
        ExecError::Allocation(format!("{port} {index} has non-static shape {shape}"))
    })
}

fn wrap_memory(
    port: Port,
    index: usize,
    element_type: ElementType,
    dims: &[usize],
    memory: Vec<u8>,
) -> Result<Tensor> {
    let expected = allocation_size(port, index, element_type, dims)?;
    if memory.len() != expected {
        return Err(ExecError::Allocation(format!(
            "{port} {index} needs {expected} bytes, {} supplied",
            memory.len()
        )));
    }
    Tensor::from_bytes(memory, dims, element_type)
}

fn allocation_size(
    port: Port,
    index: usize,
    element_type: ElementType,
    dims: &[usize],
) -> Result<usize> {
    byte_len(element_type, dims)
        .map_err(|e| ExecError::Allocation(format!("{port} {index}: {e}")))
}

fn check_depth(pipeline_depth: usize) -> Result<()> {
    if pipeline_depth == 0 {
        return Err(ExecError::Allocation(
            "pipeline depth must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn check_buffers(pipeline_depth: usize, supplied: usize) -> Result<()> {
    check_depth(pipeline_depth)?;
    if supplied != pipeline_depth {
        return Err(ExecError::Allocation(format!(
            "{supplied} buffers supplied for pipeline depth {pipeline_depth}"
        )));
    }
    Ok(())
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "_" } else { name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::{FunctionResult, Parameter};

    fn function() -> Function {
        Function::new(
            "axpy",
            vec![
                Parameter::new("x", ElementType::F32, "[2, 2]".parse().unwrap()),
                Parameter::new("n", ElementType::F32, "[?]".parse().unwrap()),
            ],
            vec![
                FunctionResult::new("y", ElementType::F32, "[2]".parse().unwrap()),
                FunctionResult::new("z", ElementType::I64, "[?, 2]".parse().unwrap()),
            ],
        )
        .unwrap()
    }

    fn noop() -> HostExecutable {
        HostExecutableBuilder::new(&function())
            .kernel(|_, _| Ok(()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_kernel() {
        let result = HostExecutableBuilder::new(&function()).build();
        assert!(matches!(result, Err(ExecError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_rejects_zero_depth() {
        let result = HostExecutableBuilder::new(&function())
            .pipeline_depth(0)
            .kernel(|_, _| Ok(()))
            .build();
        assert!(matches!(result, Err(ExecError::InvalidConfig(_))));
    }

    #[test]
    fn test_pipeline_depth() {
        assert_eq!(noop().get_preferred_pipeline_depth(), 2);

        let deep = HostExecutableBuilder::new(&function())
            .pipeline_depth(4)
            .kernel(|_, _| Ok(()))
            .build()
            .unwrap();
        assert_eq!(deep.get_preferred_pipeline_depth(), 4);
    }

    #[test]
    fn test_capabilities() {
        let exe = noop();
        assert!(exe.supports(Capability::Save));
        assert!(exe.supports(Capability::CreateTensor));
        assert!(exe.supports(Capability::CreatePipelinedTensorsWithMemory));
    }

    #[test]
    fn test_create_input_tensor() {
        let exe = noop();
        let x = exe.create_input_tensor(0).unwrap();
        assert_eq!(x.element_type(), ElementType::F32);
        assert_eq!(x.shape(), Some(&[2, 2][..]));
        assert_eq!(x.as_bytes().unwrap().len(), 16);
    }

    #[test]
    fn test_create_input_tensor_needs_static_shape() {
        let exe = noop();
        assert!(matches!(
            exe.create_input_tensor(1),
            Err(ExecError::Allocation(_))
        ));
        assert!(matches!(
            exe.create_input_tensor(2),
            Err(ExecError::IndexOutOfRange {
                port: Port::Input,
                index: 2,
                count: 2
            })
        ));
    }

    #[test]
    fn test_create_output_tensor() {
        let exe = noop();
        let y = exe.create_output_tensor(0).unwrap();
        assert_eq!(y.shape(), Some(&[2][..]));

        let z = exe.create_output_tensor(1).unwrap();
        assert!(!z.is_allocated());
        assert_eq!(z.element_type(), ElementType::I64);
        assert_eq!(z.partial_shape().to_string(), "[?, 2]");
    }

    #[test]
    fn test_create_tensor_with_memory() {
        let exe = noop();
        let x = exe.create_input_tensor_with_memory(0, vec![0; 16]).unwrap();
        assert_eq!(x.shape(), Some(&[2, 2][..]));

        assert!(matches!(
            exe.create_input_tensor_with_memory(0, vec![0; 15]),
            Err(ExecError::Allocation(_))
        ));
        assert!(matches!(
            exe.create_output_tensor_with_memory(1, vec![0; 16]),
            Err(ExecError::Allocation(_))
        ));
        assert!(exe.create_output_tensor_with_memory(0, vec![0; 8]).is_ok());
    }

    #[test]
    fn test_create_pipelined_tensors() {
        let exe = noop();
        let inputs = exe.create_input_tensors(0, 3).unwrap();
        assert_eq!(inputs.len(), 3);

        let outputs = exe.create_output_tensors(1, 2).unwrap();
        assert_eq!(outputs.len(), 2);
        assert!(outputs.iter().all(|t| !t.is_allocated()));

        assert!(exe.create_input_tensors(0, 0).is_err());
    }

    #[test]
    fn test_create_pipelined_tensors_with_memory() {
        let exe = noop();
        let tensors = exe
            .create_input_tensors_with_memory(0, 2, vec![vec![0; 16], vec![1; 16]])
            .unwrap();
        assert_eq!(tensors.len(), 2);
        assert_eq!(tensors[1].as_bytes().unwrap()[0], 1);

        assert!(matches!(
            exe.create_output_tensors_with_memory(0, 2, vec![vec![0; 8]]),
            Err(ExecError::Allocation(_))
        ));
    }

    #[test]
    fn test_save_manifest() {
        let exe = noop();
        let mut buf = Vec::new();
        exe.save(&mut buf).unwrap();
        let manifest = String::from_utf8(buf).unwrap();
        assert_eq!(
            manifest,
            "function axpy\n\
             parameter 0 x f32 [2, 2]\n\
             parameter 1 n f32 [?]\n\
             result 0 y f32 [2]\n\
             result 1 z i64 [?, 2]\n"
        );
    }

    #[test]
    fn test_call_reports_unwritten_output() {
        let mut exe = noop();
        let x = exe.create_input_tensor(0).unwrap();
        let n = Tensor::from_vec(vec![1.0f32], &[1]);
        let mut y = exe.create_output_tensor(0).unwrap();
        let mut z = exe.create_output_tensor(1).unwrap();
        let ok = exe
            .call_with_validate(&mut [&mut y, &mut z], &[&x, &n])
            .unwrap();
        assert!(!ok);
    }

    fn single_output(shape: &str) -> Function {
        Function::new(
            "fill",
            vec![],
            vec![FunctionResult::new("y", ElementType::F32, shape.parse().unwrap())],
        )
        .unwrap()
    }

    #[test]
    fn test_zero_filled_output_is_not_a_write() {
        let mut exe = HostExecutableBuilder::new(&single_output("[2]"))
            .kernel(|_, _| Ok(()))
            .build()
            .unwrap();
        let mut y = exe.create_output_tensor(0).unwrap();
        assert!(y.is_allocated());

        assert!(!exe.call_with_validate(&mut [&mut y], &[]).unwrap());
    }

    #[test]
    fn test_stale_output_is_not_a_write() {
        let mut calls = 0;
        let mut exe = HostExecutableBuilder::new(&single_output("[?]"))
            .kernel(move |outputs, _| {
                calls += 1;
                if calls == 1 {
                    outputs[0].write(&[1.0f32], &[1])?;
                }
                Ok(())
            })
            .build()
            .unwrap();
        let mut y = exe.create_output_tensor(0).unwrap();

        assert!(exe.call_with_validate(&mut [&mut y], &[]).unwrap());
        assert!(y.is_written());

        // Second call writes nothing; the data from the first call remains.
        assert!(!exe.call_with_validate(&mut [&mut y], &[]).unwrap());
        assert!(!y.is_written());
        assert_eq!(y.to_vec::<f32>().unwrap(), vec![1.0]);
    }

    #[test]
    fn test_overflowing_declared_shapes() {
        let huge = format!("[{}, 4]", usize::MAX / 2 + 1);
        let function = Function::new(
            "huge",
            vec![Parameter::new("x", ElementType::F32, huge.parse().unwrap())],
            vec![FunctionResult::new("y", ElementType::F32, huge.parse().unwrap())],
        )
        .unwrap();
        let exe = HostExecutableBuilder::new(&function)
            .kernel(|_, _| Ok(()))
            .build()
            .unwrap();

        assert!(matches!(
            exe.create_input_tensor(0),
            Err(ExecError::Allocation(_))
        ));
        assert!(matches!(
            exe.create_output_tensor(0),
            Err(ExecError::Allocation(_))
        ));
        assert!(matches!(
            exe.create_input_tensor_with_memory(0, vec![]),
            Err(ExecError::Allocation(_))
        ));
        assert!(matches!(
            exe.create_output_tensors(0, 2),
            Err(ExecError::Allocation(_))
        ));
    }

    #[test]
    fn test_kernel_error_becomes_execution_error() {
        let mut exe = HostExecutableBuilder::new(&function())
            .kernel(|_, _| Err(ExecError::Tensor("boom".to_string())))
            .build()
            .unwrap();
        let err = exe.call(&mut [], &[]).unwrap_err();
        assert!(matches!(err, ExecError::Execution(msg) if msg.contains("boom")));
    }
}
