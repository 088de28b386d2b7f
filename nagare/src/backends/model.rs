use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use super::{
    error::BackendError,
    tensor::{Tensor, TensorName},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Default for Device {
    fn default() -> Self {
        Device::Cpu
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub device: Device,
    /// Worker threads for inference; `None` lets the engine decide.
    pub thread_count: Option<usize>,
}

/// Dimensions the generation loop needs to drive a compiled decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    pub layer_count: usize,
    pub kv_head_count: usize,
    pub head_dim: usize,
    pub vocab_size: usize,
}

impl ModelShape {
    /// `[batch, kv_heads, positions, head_dim]` for one cached key or value.
    pub fn kv_shape(
        &self,
        positions: usize,
    ) -> [usize; 4] {
        [1, self.kv_head_count, positions, self.head_dim]
    }
}

/// Shared flag used to abort an in-flight inference from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

pub trait Model: Send + Sync {
    fn compile(
        &self,
        path: &Path,
        options: &CompileOptions,
    ) -> Result<Box<dyn CompiledModel>, BackendError>;
}

pub trait CompiledModel: Send {
    fn shape(&self) -> ModelShape;

    /// Thread count the model was compiled with, if one was requested.
    fn thread_count(&self) -> Option<usize> {
        None
    }

    fn create_request(&self) -> Result<Box<dyn InferRequest>, BackendError>;
}

/// One inference session on a compiled model.
///
/// `infer` blocks until the outputs are available. It returns
/// [`BackendError::Cancelled`] if `cancellation` fires while it runs.
/// Bound inputs stay in the request after a failed `infer`, so callers can
/// take them back.
pub trait InferRequest: Send {
    fn set_tensor(
        &mut self,
        name: TensorName,
        tensor: Tensor,
    ) -> Result<(), BackendError>;

    fn tensor(
        &self,
        name: TensorName,
    ) -> Result<&Tensor, BackendError>;

    /// Moves a tensor out of the request, output or still-bound input.
    fn take_tensor(
        &mut self,
        name: TensorName,
    ) -> Result<Tensor, BackendError>;

    fn infer(
        &mut self,
        cancellation: &CancellationToken,
    ) -> Result<(), BackendError>;

    /// Drops any state the engine keeps between calls.
    fn reset_state(&mut self);
}
