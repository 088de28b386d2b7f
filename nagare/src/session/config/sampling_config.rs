use std::path::Path;

use crate::{
    TokenId,
    session::{
        config::generation_config::GenerationConfig, parameter::SamplingSeed,
        types::Error,
    },
};

/// Per-generation decoding settings.
///
/// With `do_sample` off the sampling fields are ignored and decoding is
/// a deterministic argmax.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub do_sample: bool,
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub repeat_last_n: usize,
    pub seed: SamplingSeed,
    pub max_new_tokens: usize,
    pub eos_token_ids: Vec<TokenId>,
}

impl SamplingConfig {
    pub fn greedy() -> Self {
        Self {
            do_sample: false,
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| Error::UnableToLoadConfig(err.to_string()))?;
        Self::from_json_str(&contents)
    }

    /// Applies a `generation_config.json` document over the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let file: GenerationConfig = serde_json::from_str(json)
            .map_err(|err| Error::UnableToLoadConfig(err.to_string()))?;
        let defaults = Self::default();
        let config = Self {
            do_sample: file.do_sample.unwrap_or(defaults.do_sample),
            temperature: file.temperature.unwrap_or(defaults.temperature),
            top_k: file.top_k.unwrap_or(defaults.top_k),
            top_p: file.top_p.unwrap_or(defaults.top_p),
            repeat_penalty: file
                .repeat_penalty
                .unwrap_or(defaults.repeat_penalty),
            repeat_last_n: file.repeat_last_n.unwrap_or(defaults.repeat_last_n),
            seed: file.seed.map(SamplingSeed::from_signed).unwrap_or(defaults.seed),
            max_new_tokens: file
                .max_new_tokens
                .unwrap_or(defaults.max_new_tokens),
            eos_token_ids: file
                .eos_token_id
                .map(|eos| eos.to_list())
                .unwrap_or(defaults.eos_token_ids),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.do_sample {
            return Ok(());
        }
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(Error::InvalidSamplingConfig(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(Error::InvalidSamplingConfig(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }
        if !(self.repeat_penalty.is_finite() && self.repeat_penalty >= 1.0) {
            return Err(Error::InvalidSamplingConfig(format!(
                "repeat_penalty must be at least 1, got {}",
                self.repeat_penalty
            )));
        }
        Ok(())
    }

    pub fn is_eos(
        &self,
        token_id: TokenId,
    ) -> bool {
        self.eos_token_ids.contains(&token_id)
    }

    pub fn do_sample(
        mut self,
        do_sample: bool,
    ) -> Self {
        self.do_sample = do_sample;
        self
    }

    pub fn temperature(
        mut self,
        temperature: f32,
    ) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn top_k(
        mut self,
        top_k: usize,
    ) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_p(
        mut self,
        top_p: f32,
    ) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn repeat_penalty(
        mut self,
        repeat_penalty: f32,
    ) -> Self {
        self.repeat_penalty = repeat_penalty;
        self
    }

    pub fn repeat_last_n(
        mut self,
        repeat_last_n: usize,
    ) -> Self {
        self.repeat_last_n = repeat_last_n;
        self
    }

    pub fn seed(
        mut self,
        seed: SamplingSeed,
    ) -> Self {
        self.seed = seed;
        self
    }

    pub fn max_new_tokens(
        mut self,
        max_new_tokens: usize,
    ) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    pub fn eos_token_ids(
        mut self,
        eos_token_ids: Vec<TokenId>,
    ) -> Self {
        self.eos_token_ids = eos_token_ids;
        self
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            do_sample: true,
            temperature: 0.2,
            top_k: 40,
            top_p: 0.9,
            repeat_penalty: 1.1,
            repeat_last_n: 32,
            seed: SamplingSeed::Default,
            max_new_tokens: 512,
            eos_token_ids: Vec::new(),
        }
    }
}
