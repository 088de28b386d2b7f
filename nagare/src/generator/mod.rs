pub mod argmax;
mod error;
pub mod generation_session;
pub mod kv_cache;
pub mod result;
pub mod sampler;

pub use error::GeneratorError;
pub use generation_session::{GenerationSession, InferenceState};
pub use kv_cache::{KvCache, KvLayer};
pub use sampler::{Sampler, TokenIdScore};
