//! Common test utilities for executable integration tests.
//!
//! Shared signature builders and an instrumented executable used across the
//! test files in this directory.

#![allow(dead_code)]

use tessel_core::{ElementType, Function, FunctionResult, Parameter};
use tessel_runtime::{Executable, Result, Signature, Tensor};

/// Install a tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_test_writer()
        .try_init();
}

/// Build a function from `(name, type, shape)` triples.
///
/// Shapes use the `[2, ?, 3]` notation; `[...]` is an unknown rank.
pub fn make_function(
    name: &str,
    parameters: &[(&str, ElementType, &str)],
    results: &[(&str, ElementType, &str)],
) -> Function {
    Function::new(
        name,
        parameters
            .iter()
            .map(|(n, ty, shape)| Parameter::new(*n, *ty, shape.parse().expect("valid shape")))
            .collect(),
        results
            .iter()
            .map(|(n, ty, shape)| {
                FunctionResult::new(*n, *ty, shape.parse().expect("valid shape"))
            })
            .collect(),
    )
    .expect("valid function")
}

/// Two f32 parameters `[2, 2]` and `[?]`, one f32 result `[2]`.
pub fn make_mixed_function() -> Function {
    make_function(
        "mixed",
        &[("a", ElementType::F32, "[2, 2]"), ("b", ElementType::F32, "[?]")],
        &[("out", ElementType::F32, "[2]")],
    )
}

/// Zero-filled f32 tensor of the given shape.
pub fn f32_zeros(shape: &[usize]) -> Tensor {
    Tensor::zeros(ElementType::F32, shape).expect("static element type")
}

/// Executable whose `call` only counts invocations.
#[derive(Debug, Default)]
pub struct InstrumentedExecutable {
    signature: Signature,
    pub calls: usize,
}

impl InstrumentedExecutable {
    pub fn new(function: &Function) -> Self {
        let mut exe = Self::default();
        exe.set_parameters_and_results(function);
        exe
    }
}

impl Executable for InstrumentedExecutable {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut Signature {
        &mut self.signature
    }

    fn call(&mut self, _outputs: &mut [&mut Tensor], _inputs: &[&Tensor]) -> Result<bool> {
        self.calls += 1;
        Ok(true)
    }
}
