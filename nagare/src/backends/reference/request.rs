use std::{collections::HashMap, sync::Arc};

use ndarray::{Array3, ArrayD, Axis, IxDyn, concatenate};

use super::config::ReferenceModelConfig;
use crate::backends::{
    BackendError, CancellationToken, InferRequest, Tensor, TensorName,
};

/// Executes the reference model with the same tensor contract as a
/// KV-cached decoder graph.
///
/// Keys cache the token id at each position and values cache the position,
/// which lets tests inspect exactly what was fed back between calls.
pub struct ReferenceRequest {
    config: Arc<ReferenceModelConfig>,
    inputs: HashMap<TensorName, Tensor>,
    outputs: HashMap<TensorName, Tensor>,
}

impl ReferenceRequest {
    pub fn new(config: Arc<ReferenceModelConfig>) -> Self {
        Self {
            config,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    fn input(
        &self,
        name: TensorName,
    ) -> Result<&Tensor, BackendError> {
        self.inputs.get(&name).ok_or(BackendError::MissingTensor(name))
    }

    fn input_i64(
        &self,
        name: TensorName,
    ) -> Result<&ArrayD<i64>, BackendError> {
        self.input(name)?.as_i64().ok_or(BackendError::TypeMismatch(name))
    }

    fn input_f32(
        &self,
        name: TensorName,
    ) -> Result<&ArrayD<f32>, BackendError> {
        self.input(name)?.as_f32().ok_or(BackendError::TypeMismatch(name))
    }

    fn check_shape(
        name: TensorName,
        actual: &[usize],
        expected: &[usize],
    ) -> Result<(), BackendError> {
        if actual != expected {
            return Err(BackendError::ShapeMismatch {
                name,
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(())
    }

    /// Length shared by every past key/value, validated across layers.
    fn past_length(&self) -> Result<usize, BackendError> {
        let first_key = self.input_f32(TensorName::PastKey(0))?;
        let past_length = first_key.shape().get(2).copied().unwrap_or(0);
        let expected = self.config.shape().kv_shape(past_length);
        for layer in 0..self.config.layer_count {
            for name in [TensorName::PastKey(layer), TensorName::PastValue(layer)]
            {
                Self::check_shape(name, self.input_f32(name)?.shape(), &expected)?;
            }
        }
        Ok(past_length)
    }

    fn grow_cache(
        &self,
        layer: usize,
        token_ids: &[i64],
        past_length: usize,
    ) -> Result<(ArrayD<f32>, ArrayD<f32>), BackendError> {
        let shape = self.config.shape();
        let positions = token_ids.len();
        let new_keys = Array3::from_shape_fn(
            (shape.kv_head_count, positions, shape.head_dim),
            |(_, position, _)| token_ids[position] as f32,
        )
        .insert_axis(Axis(0))
        .into_dyn();
        let new_values = Array3::from_shape_fn(
            (shape.kv_head_count, positions, shape.head_dim),
            |(_, position, _)| (past_length + position) as f32,
        )
        .insert_axis(Axis(0))
        .into_dyn();

        let past_key = self.input_f32(TensorName::PastKey(layer))?;
        let past_value = self.input_f32(TensorName::PastValue(layer))?;
        let present_key =
            concatenate(Axis(2), &[past_key.view(), new_keys.view()])
                .map_err(|err| BackendError::InvalidInput(err.to_string()))?;
        let present_value =
            concatenate(Axis(2), &[past_value.view(), new_values.view()])
                .map_err(|err| BackendError::InvalidInput(err.to_string()))?;
        Ok((present_key, present_value))
    }

    fn score_row(
        &self,
        previous_token: i64,
        seen_tokens: &[f32],
        row: &mut [f32],
    ) {
        row.fill(self.config.default_score);
        if self.config.repeat_bonus != 0.0 {
            for &token in seen_tokens {
                if let Some(score) = row.get_mut(token as usize) {
                    *score = self.config.default_score + self.config.repeat_bonus;
                }
            }
        }
        if let Some(targets) = self.config.transitions.get(&previous_token) {
            for target in targets {
                row[target.token as usize] += target.score - self.config.default_score;
            }
        }
    }
}

impl InferRequest for ReferenceRequest {
    fn set_tensor(
        &mut self,
        name: TensorName,
        tensor: Tensor,
    ) -> Result<(), BackendError> {
        match name {
            TensorName::Logits
            | TensorName::PresentKey(_)
            | TensorName::PresentValue(_) => {
                return Err(BackendError::InvalidInput(format!(
                    "{name} is an output"
                )));
            },
            TensorName::PastKey(layer) | TensorName::PastValue(layer)
                if layer >= self.config.layer_count =>
            {
                return Err(BackendError::InvalidInput(format!(
                    "{name} exceeds the model's {} layers",
                    self.config.layer_count
                )));
            },
            _ => {},
        }
        self.inputs.insert(name, tensor);
        Ok(())
    }

    fn tensor(
        &self,
        name: TensorName,
    ) -> Result<&Tensor, BackendError> {
        self.outputs
            .get(&name)
            .or_else(|| self.inputs.get(&name))
            .ok_or(BackendError::MissingTensor(name))
    }

    fn take_tensor(
        &mut self,
        name: TensorName,
    ) -> Result<Tensor, BackendError> {
        self.outputs
            .remove(&name)
            .or_else(|| self.inputs.remove(&name))
            .ok_or(BackendError::MissingTensor(name))
    }

    fn infer(
        &mut self,
        cancellation: &CancellationToken,
    ) -> Result<(), BackendError> {
        if cancellation.is_cancelled() {
            return Err(BackendError::Cancelled);
        }

        let input_ids = self.input_i64(TensorName::InputIds)?;
        let input_length = input_ids.shape().get(1).copied().unwrap_or(0);
        if input_ids.ndim() != 2 || input_length == 0 {
            return Err(BackendError::InvalidInput(String::from(
                "input_ids must be [1, n] with n > 0",
            )));
        }
        let token_ids: Vec<i64> = input_ids.iter().copied().collect();
        if let Some(token) = token_ids
            .iter()
            .find(|&&token| !(0..self.config.vocab_size as i64).contains(&token))
        {
            return Err(BackendError::InvalidInput(format!(
                "token {token} is outside the vocabulary"
            )));
        }

        let past_length = self.past_length()?;
        let total_length = past_length + input_length;
        Self::check_shape(
            TensorName::AttentionMask,
            self.input_i64(TensorName::AttentionMask)?.shape(),
            &[1, total_length],
        )?;
        let position_ids = self.input_i64(TensorName::PositionIds)?;
        Self::check_shape(
            TensorName::PositionIds,
            position_ids.shape(),
            &[1, input_length],
        )?;
        let positions_match = position_ids
            .iter()
            .enumerate()
            .all(|(index, &position)| position == (past_length + index) as i64);
        if !positions_match {
            return Err(BackendError::InvalidInput(format!(
                "position_ids must continue from {past_length}"
            )));
        }

        let mut presents = Vec::with_capacity(self.config.layer_count);
        for layer in 0..self.config.layer_count {
            presents.push(self.grow_cache(layer, &token_ids, past_length)?);
        }

        let seen_tokens: Vec<f32> = presents[0]
            .0
            .index_axis(Axis(0), 0)
            .index_axis(Axis(0), 0)
            .index_axis(Axis(1), 0)
            .iter()
            .copied()
            .collect();
        let vocab_size = self.config.vocab_size;
        let mut logits = vec![0.0_f32; input_length * vocab_size];
        for (position, row) in logits.chunks_mut(vocab_size).enumerate() {
            if cancellation.is_cancelled() {
                return Err(BackendError::Cancelled);
            }
            self.score_row(
                token_ids[position],
                &seen_tokens[..past_length + position + 1],
                row,
            );
        }
        let logits =
            ArrayD::from_shape_vec(IxDyn(&[1, input_length, vocab_size]), logits)
                .map_err(|err| BackendError::InvalidInput(err.to_string()))?;

        self.outputs.clear();
        self.outputs.insert(TensorName::Logits, Tensor::F32(logits));
        for (layer, (key, value)) in presents.into_iter().enumerate() {
            self.outputs.insert(TensorName::PresentKey(layer), Tensor::F32(key));
            self.outputs
                .insert(TensorName::PresentValue(layer), Tensor::F32(value));
        }
        Ok(())
    }

    fn reset_state(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }
}
