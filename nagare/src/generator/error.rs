use crate::backends::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Prompt must contain at least one token")]
    EmptyPrompt,
    #[error("Session has not been prefilled")]
    NotPrefilled,
    #[error("Context length of {limit} tokens exceeded")]
    ContextLengthExceeded {
        limit: usize,
    },
    #[error("Model exposes {actual} cache layers, expected {expected}")]
    LayerCountMismatch {
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl GeneratorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GeneratorError::Backend(BackendError::Cancelled))
    }
}
