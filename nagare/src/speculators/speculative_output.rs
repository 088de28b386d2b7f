use serde::{Deserialize, Serialize};

use crate::{TokenId, session::types::FinishReason};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpeculativeStats {
    pub iterations: u64,
    /// Iterations where draft and target picked the same token.
    pub agreed: u64,
    pub disagreed: u64,
}

impl SpeculativeStats {
    pub fn agreement_rate(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.agreed as f64 / self.iterations as f64
    }
}

#[derive(Debug, Clone)]
pub struct SpeculativeOutput {
    pub text: String,
    pub tokens: Vec<TokenId>,
    pub finish_reason: FinishReason,
    pub stats: SpeculativeStats,
}
