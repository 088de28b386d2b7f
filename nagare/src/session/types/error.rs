use crate::{
    backends::BackendError, generator::GeneratorError,
    session::types::ControllerState,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error("Tokenizer not loaded")]
    TokenizerNotLoaded,
    #[error("Unable to load tokenizer")]
    UnableToLoadTokenizer,
    #[error("Unable to load generation config: {0}")]
    UnableToLoadConfig(String),
    #[error("Unable to encode text")]
    UnableToEncodeText,
    #[error("Unable to decode text")]
    UnableToDecodeText,
    #[error("Invalid sampling config: {0}")]
    InvalidSamplingConfig(String),
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ControllerState,
    },
    #[error(
        "Draft and target models disagree on vocabulary size ({draft} vs {target})"
    )]
    IncompatibleModels {
        draft: usize,
        target: usize,
    },
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}
