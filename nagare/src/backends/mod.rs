mod error;
mod model;
pub mod reference;
mod tensor;

pub use error::BackendError;
pub use model::{
    CancellationToken, CompileOptions, CompiledModel, Device, InferRequest,
    Model, ModelShape,
};
pub use tensor::{Tensor, TensorName};
