use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::backends::{BackendError, ModelShape};

pub const MODEL_FILE_NAME: &str = "model.json";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ScoredToken {
    pub token: i64,
    pub score: f32,
}

/// Contents of a reference model's `model.json`.
///
/// The next-token scores are a bigram table keyed by the previous token.
/// `repeat_bonus` is added to every token already present in the key
/// cache, so outputs depend on the cache that was fed back in.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReferenceModelConfig {
    pub layer_count: usize,
    pub kv_head_count: usize,
    pub head_dim: usize,
    pub vocab_size: usize,
    #[serde(default)]
    pub default_score: f32,
    #[serde(default)]
    pub repeat_bonus: f32,
    #[serde(default)]
    pub transitions: HashMap<i64, Vec<ScoredToken>>,
}

impl ReferenceModelConfig {
    pub fn new(
        layer_count: usize,
        kv_head_count: usize,
        head_dim: usize,
        vocab_size: usize,
    ) -> Self {
        Self {
            layer_count,
            kv_head_count,
            head_dim,
            vocab_size,
            default_score: 0.0,
            repeat_bonus: 0.0,
            transitions: HashMap::new(),
        }
    }

    pub fn transition(
        mut self,
        from: i64,
        to: i64,
        score: f32,
    ) -> Self {
        self.transitions.entry(from).or_default().push(ScoredToken {
            token: to,
            score,
        });
        self
    }

    pub fn repeat_bonus(
        mut self,
        repeat_bonus: f32,
    ) -> Self {
        self.repeat_bonus = repeat_bonus;
        self
    }

    pub fn shape(&self) -> ModelShape {
        ModelShape {
            layer_count: self.layer_count,
            kv_head_count: self.kv_head_count,
            head_dim: self.head_dim,
            vocab_size: self.vocab_size,
        }
    }

    /// Accepts either a model directory or the `model.json` file itself.
    pub fn resolve_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(MODEL_FILE_NAME)
        } else {
            path.to_path_buf()
        }
    }

    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let model_path = Self::resolve_path(path);
        if !model_path.exists() {
            return Err(BackendError::ModelNotFound(model_path));
        }
        let file = File::open(&model_path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| BackendError::InvalidModel(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(
        &self,
        directory: &Path,
    ) -> Result<(), BackendError> {
        let file = File::create(directory.join(MODEL_FILE_NAME))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|err| BackendError::InvalidModel(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        if self.layer_count == 0 || self.vocab_size == 0 {
            return Err(BackendError::InvalidModel(String::from(
                "layer_count and vocab_size must be positive",
            )));
        }
        if self.kv_head_count == 0 || self.head_dim == 0 {
            return Err(BackendError::InvalidModel(String::from(
                "kv_head_count and head_dim must be positive",
            )));
        }
        let vocab_size = self.vocab_size as i64;
        for (from, targets) in &self.transitions {
            let out_of_range = !(0..vocab_size).contains(from)
                || targets
                    .iter()
                    .any(|target| !(0..vocab_size).contains(&target.token));
            if out_of_range {
                return Err(BackendError::InvalidModel(format!(
                    "transition from token {from} leaves the vocabulary"
                )));
            }
        }
        Ok(())
    }
}
