use serde::Deserialize;

use crate::{TokenId, session::config::common::ValueOrList};

/// Shape of a `generation_config.json` file. Every key is optional and
/// unknown keys are rejected.
#[derive(Clone, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    pub max_new_tokens: Option<usize>,
    pub do_sample: Option<bool>,
    pub temperature: Option<f32>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
    #[serde(alias = "repetition_penalty")]
    pub repeat_penalty: Option<f32>,
    pub repeat_last_n: Option<usize>,
    pub seed: Option<i64>,
    #[serde(alias = "eos_token_ids")]
    pub eos_token_id: Option<ValueOrList<TokenId>>,
}
