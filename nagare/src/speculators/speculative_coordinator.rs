use std::sync::Arc;

use super::{
    speculative_config::{SpeculativeConfig, VerificationPolicy},
    speculative_output::{SpeculativeOutput, SpeculativeStats},
};
use crate::{
    TokenId,
    generator::{GenerationSession, GeneratorError, argmax::simple_argmax},
    session::types::{Error, FinishReason},
    streamer::IncrementalTextDecoder,
    tokenizer::TextCodec,
};

/// Advances a draft and a target session in lockstep over one prompt.
///
/// Each session owns its cache. Both are reset once a generation ends,
/// whether it succeeds or not.
pub struct SpeculativeCoordinator {
    draft: GenerationSession,
    target: GenerationSession,
    codec: Arc<dyn TextCodec>,
    config: SpeculativeConfig,
    history_ids: Vec<TokenId>,
}

struct Progress {
    text: String,
    tokens: Vec<TokenId>,
    stats: SpeculativeStats,
}

impl SpeculativeCoordinator {
    pub fn new(
        draft: GenerationSession,
        target: GenerationSession,
        codec: Arc<dyn TextCodec>,
        config: SpeculativeConfig,
    ) -> Result<Self, Error> {
        let draft_vocab = draft.shape().vocab_size;
        let target_vocab = target.shape().vocab_size;
        if draft_vocab != target_vocab {
            return Err(Error::IncompatibleModels {
                draft: draft_vocab,
                target: target_vocab,
            });
        }
        Ok(Self {
            draft,
            target,
            codec,
            config,
            history_ids: Vec::new(),
        })
    }

    pub fn config(&self) -> &SpeculativeConfig {
        &self.config
    }

    /// Prompt plus committed tokens of the last generation.
    pub fn history_ids(&self) -> &[TokenId] {
        &self.history_ids
    }

    /// Generates from `prompt`, handing each revealed text chunk to
    /// `on_text` as soon as it is available.
    pub fn generate<F>(
        &mut self,
        prompt: &str,
        mut on_text: F,
    ) -> Result<SpeculativeOutput, Error>
    where
        F: FnMut(&str),
    {
        let prompt_ids = self.codec.encode(prompt)?.ids;
        self.history_ids = prompt_ids.clone();

        let mut streamer = IncrementalTextDecoder::new(self.codec.clone());
        let mut progress = Progress {
            text: String::new(),
            tokens: Vec::new(),
            stats: SpeculativeStats::default(),
        };
        let result =
            self.run(&prompt_ids, &mut streamer, &mut progress, &mut on_text);
        self.draft.reset();
        self.target.reset();
        let finish_reason = result?;

        let tail = streamer.end()?;
        on_text(&tail);
        progress.text.push_str(&tail);

        tracing::info!(
            iterations = progress.stats.iterations,
            agreement_rate = progress.stats.agreement_rate(),
            finish_reason = ?finish_reason,
            "speculative generation finished"
        );
        Ok(SpeculativeOutput {
            text: progress.text,
            tokens: progress.tokens,
            finish_reason,
            stats: progress.stats,
        })
    }

    fn run<F>(
        &mut self,
        prompt_ids: &[TokenId],
        streamer: &mut IncrementalTextDecoder,
        progress: &mut Progress,
        on_text: &mut F,
    ) -> Result<FinishReason, Error>
    where
        F: FnMut(&str),
    {
        let (mut draft_logits, mut target_logits) = match self.prefill(prompt_ids)
        {
            Ok(logits) => logits,
            Err(err) => return Self::finish_or_fail(err),
        };

        loop {
            if progress.stats.iterations as usize >= self.config.max_iterations {
                return Ok(FinishReason::Length);
            }

            let proposed = simple_argmax(&draft_logits) as TokenId;
            let predicted = simple_argmax(&target_logits) as TokenId;
            progress.stats.iterations += 1;
            if proposed == predicted {
                progress.stats.agreed += 1;
            } else {
                progress.stats.disagreed += 1;
            }

            let (committed, target_input) = match self.config.policy {
                VerificationPolicy::Unverified => (proposed, predicted),
                VerificationPolicy::Greedy => (predicted, predicted),
            };
            self.history_ids.push(committed);
            progress.tokens.push(committed);
            if self.config.eos_token_ids.contains(&committed) {
                return Ok(FinishReason::Stop);
            }

            if let Some(chunk) = streamer.put(committed)? {
                on_text(&chunk);
                progress.text.push_str(&chunk);
            }
            if progress.stats.iterations as usize >= self.config.max_iterations {
                return Ok(FinishReason::Length);
            }

            match self.step(committed, target_input) {
                Ok((draft, target)) => {
                    draft_logits = draft;
                    target_logits = target;
                },
                Err(err) => return Self::finish_or_fail(err),
            }
        }
    }

    fn prefill(
        &mut self,
        prompt_ids: &[TokenId],
    ) -> Result<(Vec<f32>, Vec<f32>), GeneratorError> {
        let draft = self.draft.prefill(prompt_ids)?;
        let target = self.target.prefill(prompt_ids)?;
        Ok((draft.logits, target.logits))
    }

    fn step(
        &mut self,
        draft_input: TokenId,
        target_input: TokenId,
    ) -> Result<(Vec<f32>, Vec<f32>), GeneratorError> {
        let draft = self.draft.decode_step(draft_input)?;
        let target = self.target.decode_step(target_input)?;
        Ok((draft.logits, target.logits))
    }

    fn finish_or_fail(err: GeneratorError) -> Result<FinishReason, Error> {
        match err {
            err if err.is_cancelled() => Ok(FinishReason::Cancelled),
            GeneratorError::ContextLengthExceeded {
                ..
            } => Ok(FinishReason::ContextLimitReached),
            err => Err(err.into()),
        }
    }
}
