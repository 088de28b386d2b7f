use std::path::PathBuf;

use super::tensor::TensorName;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Model not found at {0}")]
    ModelNotFound(PathBuf),
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    #[error("Missing tensor {0}")]
    MissingTensor(TensorName),
    #[error("Tensor {name} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: TensorName,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Tensor {0} has unexpected element type")]
    TypeMismatch(TensorName),
    #[error("Inference cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
