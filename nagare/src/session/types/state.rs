use std::fmt;

use serde::Serialize;

/// Lifecycle of a [`GenerationController`](crate::session::GenerationController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Uninitialized,
    ModelLoaded,
    TokenizerLoaded,
    Ready,
    Generating,
    Stopped,
    Unloaded,
}

impl ControllerState {
    pub fn can_generate(&self) -> bool {
        matches!(self, ControllerState::Ready | ControllerState::Stopped)
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        ControllerState::Uninitialized
    }
}

impl fmt::Display for ControllerState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            ControllerState::Uninitialized => "uninitialized",
            ControllerState::ModelLoaded => "model loaded",
            ControllerState::TokenizerLoaded => "tokenizer loaded",
            ControllerState::Ready => "ready",
            ControllerState::Generating => "generating",
            ControllerState::Stopped => "stopped",
            ControllerState::Unloaded => "unloaded",
        };
        write!(f, "{name}")
    }
}
