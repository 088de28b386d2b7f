#[cfg(test)]
#[macro_use]
extern crate is_close;

pub mod backends;
pub mod generator;
pub mod prelude;
pub mod session;
pub mod speculators;
pub mod streamer;
pub mod tokenizer;
pub mod utils;
pub use utils::*;

/// Token identifier as produced by a [`tokenizer::TextCodec`] and consumed
/// by model inputs.
pub type TokenId = i64;
