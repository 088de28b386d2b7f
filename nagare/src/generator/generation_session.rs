use std::time::Instant;

use ndarray::Axis;

use super::{
    error::GeneratorError,
    kv_cache::KvCache,
    result::{GenerateResult, PrefillResult},
};
use crate::{
    TokenId,
    backends::{
        BackendError, CancellationToken, CompiledModel, InferRequest,
        ModelShape, Tensor, TensorName,
    },
};

/// Incremental inputs of one session.
///
/// `attention_mask` and `position_ids` always hold `sequence_length`
/// entries and the cache holds `sequence_length` positions.
#[derive(Debug, Clone)]
pub struct InferenceState {
    pub sequence_length: usize,
    pub attention_mask: Vec<i64>,
    pub position_ids: Vec<i64>,
    pub kv_cache: KvCache,
}

impl InferenceState {
    fn new(shape: ModelShape) -> Self {
        Self {
            sequence_length: 0,
            attention_mask: Vec::new(),
            position_ids: Vec::new(),
            kv_cache: KvCache::new(shape),
        }
    }

    fn reset(&mut self) {
        self.sequence_length = 0;
        self.attention_mask.clear();
        self.position_ids.clear();
        self.kv_cache.reset();
    }
}

/// Drives one compiled model token by token over a growing KV cache.
pub struct GenerationSession {
    request: Box<dyn InferRequest>,
    shape: ModelShape,
    state: InferenceState,
    tokens: Vec<TokenId>,
    context_length: Option<usize>,
    cancellation: CancellationToken,
}

impl GenerationSession {
    pub fn new(
        model: &dyn CompiledModel,
        context_length: Option<usize>,
    ) -> Result<Self, GeneratorError> {
        let shape = model.shape();
        let request = model.create_request()?;
        Ok(Self {
            request,
            shape,
            state: InferenceState::new(shape),
            tokens: Vec::new(),
            context_length,
            cancellation: CancellationToken::new(),
        })
    }

    /// Shares `cancellation` with the caller so it can abort in-flight calls.
    pub fn with_cancellation(
        mut self,
        cancellation: CancellationToken,
    ) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn shape(&self) -> ModelShape {
        self.shape
    }

    pub fn state(&self) -> &InferenceState {
        &self.state
    }

    /// Tokens whose keys and values are in the cache.
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn sequence_length(&self) -> usize {
        self.state.sequence_length
    }

    /// Runs the whole prompt from an empty cache.
    pub fn prefill(
        &mut self,
        token_ids: &[TokenId],
    ) -> Result<PrefillResult, GeneratorError> {
        if token_ids.is_empty() {
            return Err(GeneratorError::EmptyPrompt);
        }
        self.check_context(token_ids.len())?;
        self.reset();

        let length = token_ids.len();
        let attention_mask = vec![1; length];
        let position_ids: Vec<i64> = (0..length as i64).collect();
        let (logits, forwardpass_duration) =
            self.run(token_ids, &attention_mask, &position_ids)?;

        self.commit(token_ids, attention_mask, position_ids);
        tracing::debug!(
            prompt_tokens = length,
            duration = forwardpass_duration,
            "prefill"
        );
        Ok(PrefillResult {
            logits,
            forwardpass_duration,
        })
    }

    /// Feeds one token and returns the scores for the one after it.
    ///
    /// The session is unchanged if the call fails or is cancelled.
    pub fn decode_step(
        &mut self,
        token_id: TokenId,
    ) -> Result<GenerateResult, GeneratorError> {
        if self.state.sequence_length == 0 {
            return Err(GeneratorError::NotPrefilled);
        }
        let length = self.state.sequence_length + 1;
        self.check_context(length)?;

        let mut attention_mask = self.state.attention_mask.clone();
        attention_mask.push(1);
        let position_ids = [length as i64 - 1];
        let (logits, forwardpass_duration) =
            self.run(&[token_id], &attention_mask, &position_ids)?;

        let mut all_position_ids = self.state.position_ids.clone();
        all_position_ids.extend(position_ids);
        self.commit(&[token_id], attention_mask, all_position_ids);
        tracing::trace!(
            token_id,
            sequence_length = length,
            duration = forwardpass_duration,
            "decode step"
        );
        Ok(GenerateResult {
            logits,
            forwardpass_duration,
        })
    }

    /// Takes the model's `present` outputs as the cache for the next call.
    ///
    /// They must cover exactly `sequence_length` positions on every layer.
    /// Nothing is taken if they don't.
    pub fn absorb_present(
        &mut self,
        sequence_length: usize,
    ) -> Result<(), GeneratorError> {
        self.state.kv_cache.absorb(self.request.as_mut(), sequence_length)
    }

    /// Empties the cache and token history. Used between prompts.
    pub fn reset(&mut self) {
        self.state.reset();
        self.tokens.clear();
        self.request.reset_state();
    }

    fn check_context(
        &self,
        length: usize,
    ) -> Result<(), GeneratorError> {
        match self.context_length {
            Some(limit) if length > limit => {
                Err(GeneratorError::ContextLengthExceeded {
                    limit,
                })
            },
            _ => Ok(()),
        }
    }

    fn run(
        &mut self,
        input_ids: &[TokenId],
        attention_mask: &[i64],
        position_ids: &[i64],
    ) -> Result<(Vec<f32>, f64), GeneratorError> {
        let request = self.request.as_mut();
        request.set_tensor(TensorName::InputIds, Tensor::i64_row(input_ids))?;
        request.set_tensor(
            TensorName::AttentionMask,
            Tensor::i64_row(attention_mask),
        )?;
        request.set_tensor(
            TensorName::PositionIds,
            Tensor::i64_row(position_ids),
        )?;

        let result = self.exchange(input_ids.len(), attention_mask.len());
        if let Err(error) = &result {
            if let Err(reclaim_error) =
                self.state.kv_cache.reclaim(self.request.as_mut())
            {
                tracing::warn!(
                    %error,
                    %reclaim_error,
                    "cache lost with the failed call, resetting the session"
                );
                self.reset();
            }
        }
        result
    }

    /// Hands the cache to the model and takes back the grown one.
    fn exchange(
        &mut self,
        input_length: usize,
        sequence_length: usize,
    ) -> Result<(Vec<f32>, f64), GeneratorError> {
        let request = self.request.as_mut();
        self.state.kv_cache.bind(request)?;

        let start = Instant::now();
        request.infer(&self.cancellation)?;
        let duration = start.elapsed().as_secs_f64();

        let logits = self.last_logits(input_length)?;
        self.absorb_present(sequence_length)?;
        Ok((logits, duration))
    }

    fn last_logits(
        &self,
        input_length: usize,
    ) -> Result<Vec<f32>, GeneratorError> {
        let expected = [1, input_length, self.shape.vocab_size];
        let logits = self
            .request
            .tensor(TensorName::Logits)?
            .as_f32()
            .ok_or(BackendError::TypeMismatch(TensorName::Logits))?;
        if logits.shape() != expected {
            return Err(BackendError::ShapeMismatch {
                name: TensorName::Logits,
                expected: expected.to_vec(),
                actual: logits.shape().to_vec(),
            }
            .into());
        }
        Ok(logits
            .index_axis(Axis(0), 0)
            .index_axis(Axis(0), input_length - 1)
            .iter()
            .copied()
            .collect())
    }

    fn commit(
        &mut self,
        token_ids: &[TokenId],
        attention_mask: Vec<i64>,
        position_ids: Vec<i64>,
    ) {
        self.tokens.extend_from_slice(token_ids);
        self.state.sequence_length = self.tokens.len();
        self.state.attention_mask = attention_mask;
        self.state.position_ids = position_ids;
    }
}
