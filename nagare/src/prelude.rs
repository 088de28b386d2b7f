//! Prelude module containing commonly used types from the nagare crate.
//!
//! This module can be imported with `use nagare::prelude::*;` to bring the most
//! frequently used types into scope.

pub use crate::{
    TokenId,
    backends::{Device, Model, reference::ReferenceModel},
    generator::{GenerationSession, Sampler},
    session::{
        GenerationController, StopHandle, TokenStream,
        config::{ControllerConfig, SamplingConfig},
        parameter::{ContextLength, SamplingSeed},
        types::{
            ControllerState, Error, FinishReason, Output,
            PerformanceStatistics, Stats, StreamEvent,
        },
    },
    speculators::{
        SpeculativeConfig, SpeculativeCoordinator, SpeculativeOutput,
        VerificationPolicy,
    },
    streamer::IncrementalTextDecoder,
    tokenizer::{HuggingFaceCodec, TextCodec},
};
