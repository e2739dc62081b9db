//! Multi-buffered tensor sets for pipelined calls.
//!
//! An executable hints how many tensor sets a caller should keep in flight
//! ([`Executable::get_preferred_pipeline_depth`]). `PipelinedTensors`
//! allocates that many sets through the executable and hands them out one at
//! a time, so the next set can be filled on the host while the current one is
//! being executed. Scheduling the overlap is left to the caller.

use crate::error::{ExecError, Result};
use crate::executable::Executable;
use crate::tensor::Tensor;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe pool of pipeline indices `0..depth`.
#[derive(Debug)]
pub struct IndexLibrary {
    depth: usize,
    free: Mutex<BTreeSet<usize>>,
}

impl IndexLibrary {
    /// Create a library with every index in `0..depth` free.
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            free: Mutex::new((0..depth).collect()),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Take the lowest free index, or `None` if all are checked out.
    pub fn get_index(&self) -> Option<usize> {
        self.free.lock().pop_first()
    }

    /// Give a checked-out index back.
    ///
    /// # Errors
    /// Returns an error if the index is out of range or already free.
    pub fn return_index(&self, index: usize) -> Result<()> {
        if index >= self.depth {
            return Err(ExecError::Pipeline(format!(
                "index {index} returned to a library of depth {}",
                self.depth
            )));
        }
        if !self.free.lock().insert(index) {
            return Err(ExecError::Pipeline(format!(
                "index {index} returned twice"
            )));
        }
        Ok(())
    }

    /// Number of free indices.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }
}

/// One checked-out tensor set: an input tensor per parameter and an output
/// tensor per result.
///
/// A slot only goes back to its store through [`PipelinedTensors::release`].
/// Dropping it instead keeps its index checked out for the life of the store.
#[derive(Debug)]
pub struct PipelineSlot {
    store: u64,
    index: usize,
    inputs: Vec<Tensor>,
    outputs: Vec<Tensor>,
}

impl PipelineSlot {
    /// Position of this set in the pipeline.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn inputs(&self) -> &[Tensor] {
        &self.inputs
    }

    pub fn inputs_mut(&mut self) -> &mut [Tensor] {
        &mut self.inputs
    }

    pub fn outputs(&self) -> &[Tensor] {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut [Tensor] {
        &mut self.outputs
    }

    /// Run `executable` on this set through `call_with_validate`.
    pub fn call<E: Executable + ?Sized>(&mut self, executable: &mut E) -> Result<bool> {
        let inputs: Vec<&Tensor> = self.inputs.iter().collect();
        let mut outputs: Vec<&mut Tensor> = self.outputs.iter_mut().collect();
        executable.call_with_validate(&mut outputs, &inputs)
    }
}

/// `depth` tensor sets for one executable, checked out and returned by index.
#[derive(Debug)]
pub struct PipelinedTensors {
    id: u64,
    library: IndexLibrary,
    slots: Mutex<Vec<Option<PipelineSlot>>>,
}

impl PipelinedTensors {
    /// Allocate `depth` tensor sets through the executable's pipelined
    /// creation operations.
    ///
    /// # Errors
    /// Returns an error if `depth` is 0 or the executable cannot create
    /// pipelined tensors for one of its slots.
    pub fn new<E: Executable + ?Sized>(executable: &E, depth: usize) -> Result<Self> {
        if depth == 0 {
            return Err(ExecError::Pipeline(
                "pipeline depth must be at least 1".to_string(),
            ));
        }

        static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(0);
        let id = NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed);

        let num_inputs = executable.get_parameters().len();
        let num_outputs = executable.get_results().len();
        let mut sets: Vec<PipelineSlot> = (0..depth)
            .map(|index| PipelineSlot {
                store: id,
                index,
                inputs: Vec::with_capacity(num_inputs),
                outputs: Vec::with_capacity(num_outputs),
            })
            .collect();

        for input in 0..num_inputs {
            let tensors = executable.create_input_tensors(input, depth)?;
            check_count(tensors.len(), depth)?;
            for (set, tensor) in sets.iter_mut().zip(tensors) {
                set.inputs.push(tensor);
            }
        }
        for output in 0..num_outputs {
            let tensors = executable.create_output_tensors(output, depth)?;
            check_count(tensors.len(), depth)?;
            for (set, tensor) in sets.iter_mut().zip(tensors) {
                set.outputs.push(tensor);
            }
        }

        tracing::debug!(depth, num_inputs, num_outputs, "pipelined tensors allocated");

        Ok(Self {
            id,
            library: IndexLibrary::new(depth),
            slots: Mutex::new(sets.into_iter().map(Some).collect()),
        })
    }

    /// Allocate as many sets as the executable prefers.
    pub fn for_executable<E: Executable + ?Sized>(executable: &E) -> Result<Self> {
        Self::new(executable, executable.get_preferred_pipeline_depth())
    }

    pub fn depth(&self) -> usize {
        self.library.depth()
    }

    /// Number of sets not currently checked out.
    pub fn available(&self) -> usize {
        self.library.available()
    }

    /// Check out the lowest free set, or `None` if every set is in flight.
    ///
    /// The set stays checked out until it is passed to
    /// [`release`](PipelinedTensors::release); a dropped slot is never
    /// returned.
    pub fn acquire(&self) -> Option<PipelineSlot> {
        let index = self.library.get_index()?;
        let slot = self.slots.lock()[index].take();
        tracing::trace!(index, "pipeline slot acquired");
        slot
    }

    /// Return a checked-out set.
    ///
    /// # Errors
    /// Returns an error if the slot was acquired from another store or its
    /// index is not checked out from this one.
    pub fn release(&self, slot: PipelineSlot) -> Result<()> {
        let index = slot.index;
        if slot.store != self.id {
            return Err(ExecError::Pipeline(format!(
                "slot {index} belongs to a different pipeline"
            )));
        }
        {
            let mut slots = self.slots.lock();
            let entry = slots.get_mut(index).ok_or_else(|| {
                ExecError::Pipeline(format!("slot {index} does not belong to this pipeline"))
            })?;
            if entry.is_some() {
                return Err(ExecError::Pipeline(format!(
                    "slot {index} released while not checked out"
                )));
            }
            *entry = Some(slot);
        }
        self.library.return_index(index)?;
        tracing::trace!(index, "pipeline slot released");
        Ok(())
    }
}

fn check_count(created: usize, depth: usize) -> Result<()> {
    if created != depth {
        return Err(ExecError::Pipeline(format!(
            "executable created {created} tensors for pipeline depth {depth}"
        )));
    }
    Ok(())
}
