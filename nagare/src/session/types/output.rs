use serde::{Deserialize, Serialize};

use crate::{TokenId, session::types::Stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
    Cancelled,
    ContextLimitReached,
}

/// One produced token and the text it revealed, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub token_id: TokenId,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Output {
    pub text: String,
    pub token_ids: Vec<TokenId>,
    pub stats: Stats,
    pub finish_reason: FinishReason,
}
