//! Executable contract for compiled Tessel functions.
//!
//! This crate sits between a compiler that produces a [`Function`](tessel_core::Function)
//! and the backend that runs it.
//!
//! # Architecture
//!
//! The runtime has three responsibilities:
//! 1. **Signature binding** - Keep the parameters and results an executable was compiled for
//! 2. **Call validation** - Check every call's tensors against that signature before dispatch
//! 3. **Buffer management** - Allocate single and pipelined tensor sets through the backend
//!
//! Backends implement [`Executable`]; [`HostExecutable`] runs a closure on host memory.
//!
//! # Example
//!
//! ```
//! use tessel_core::{ElementType, Function, FunctionResult, Parameter, PartialShape};
//! use tessel_runtime::{Executable, HostExecutableBuilder, PipelinedTensors};
//!
//! # fn main() -> anyhow::Result<()> {
//! let function = Function::new(
//!     "add",
//!     vec![
//!         Parameter::new("a", ElementType::F32, PartialShape::from_static(&[4])),
//!         Parameter::new("b", ElementType::F32, PartialShape::from_static(&[4])),
//!     ],
//!     vec![FunctionResult::new("c", ElementType::F32, PartialShape::from_static(&[4]))],
//! )?;
//!
//! let mut executable = HostExecutableBuilder::new(&function)
//!     .kernel(|outputs, inputs| {
//!         let a = inputs[0].to_vec::<f32>()?;
//!         let b = inputs[1].to_vec::<f32>()?;
//!         let c: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
//!         outputs[0].write(&c, &[4])
//!     })
//!     .build()?;
//!
//! // Double-buffered tensor sets
//! let pipeline = PipelinedTensors::for_executable(&executable)?;
//! let mut slot = pipeline.acquire().expect("a free slot");
//! slot.inputs_mut()[0].write(&[1.0f32, 2.0, 3.0, 4.0], &[4])?;
//! slot.inputs_mut()[1].write(&[10.0f32, 20.0, 30.0, 40.0], &[4])?;
//!
//! assert!(slot.call(&mut executable)?);
//! assert_eq!(slot.outputs()[0].to_vec::<f32>()?, vec![11.0, 22.0, 33.0, 44.0]);
//! pipeline.release(slot)?;
//! # Ok(())
//! # }
//! ```

mod error;
mod executable;
mod host;
mod pipeline;
mod signature;
mod tensor;

// Public exports
pub use error::{ExecError, Port, Result};
pub use executable::{Capability, DEFAULT_PIPELINE_DEPTH, Executable};
pub use host::{HostExecutable, HostExecutableBuilder, HostKernel};
pub use pipeline::{IndexLibrary, PipelineSlot, PipelinedTensors};
pub use signature::Signature;
pub use tensor::Tensor;
