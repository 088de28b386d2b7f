use std::{sync::Arc, time::Instant};

use super::{
    config::SamplingConfig,
    controller::GenerationController,
    types::{
        ControllerState, Error, FinishReason, Output, RunStats, Stats,
        StepStats, StreamEvent, TotalStats,
    },
};
use crate::{
    TokenId,
    generator::{GeneratorError, Sampler},
    streamer::IncrementalTextDecoder,
    tokenizer::TextCodec,
};

/// Tokens of one generation, produced lazily.
///
/// Each call to `next` samples one token and, unless it ends the
/// generation, feeds it back into the model on the following call. Once
/// the stream is exhausted or dropped the controller is ready for the
/// next prompt.
pub struct TokenStream<'a> {
    controller: &'a mut GenerationController,
    streamer: IncrementalTextDecoder,
    sampler: Sampler,
    config: SamplingConfig,
    prompt_length: usize,
    next_logits: Option<Vec<f32>>,
    pending_token: Option<TokenId>,
    token_ids: Vec<TokenId>,
    text: String,
    run_start: Instant,
    prefill_stats: StepStats,
    generate_durations: Vec<f64>,
    forwardpass_durations: Vec<f64>,
    finish_reason: Option<FinishReason>,
    done: bool,
}

impl<'a> TokenStream<'a> {
    pub(super) fn start(
        controller: &'a mut GenerationController,
        codec: Arc<dyn TextCodec>,
        prompt_ids: Vec<TokenId>,
        config: SamplingConfig,
    ) -> Result<Self, Error> {
        controller.stop_handle.reset();
        let session =
            controller.session.as_mut().ok_or(Error::ModelNotLoaded)?;

        let run_start = Instant::now();
        let prefill = session.prefill(&prompt_ids);
        let prefill_duration = run_start.elapsed().as_secs_f64();
        let prompt_length = prompt_ids.len();

        let mut stream = Self {
            controller,
            streamer: IncrementalTextDecoder::new(codec),
            sampler: Sampler::from_seed(config.seed),
            config,
            prompt_length,
            next_logits: None,
            pending_token: None,
            token_ids: Vec::new(),
            text: String::new(),
            run_start,
            prefill_stats: StepStats::default(),
            generate_durations: Vec::new(),
            forwardpass_durations: Vec::new(),
            finish_reason: None,
            done: false,
        };
        match prefill {
            Ok(result) => {
                stream.prefill_stats = StepStats {
                    duration: prefill_duration,
                    tokens_count: prompt_length as u64,
                    tokens_per_second: per_second(prompt_length, prefill_duration),
                    model_run: RunStats {
                        count: 1,
                        average_duration: result.forwardpass_duration,
                    },
                };
                stream.next_logits = Some(result.logits);
                stream.controller.state = ControllerState::Generating;
            },
            Err(err) if err.is_cancelled() => {
                stream.finish(FinishReason::Cancelled);
            },
            Err(err) => {
                stream.abandon();
                return Err(err.into());
            },
        }
        Ok(stream)
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Text revealed so far, including the final flush once finished.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Ends the stream and returns everything it produced. A stream that
    /// was not exhausted counts as cancelled.
    pub fn into_output(mut self) -> Output {
        if !self.done {
            self.finish(FinishReason::Cancelled);
        }
        Output {
            text: std::mem::take(&mut self.text),
            token_ids: std::mem::take(&mut self.token_ids),
            stats: self.stats(),
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Cancelled),
        }
    }

    fn step(&mut self) -> Result<Option<StreamEvent>, Error> {
        if self.controller.stop_handle.is_stopped() {
            self.finish(FinishReason::Cancelled);
            return Ok(None);
        }
        if self.token_ids.len() >= self.config.max_new_tokens {
            self.finish(FinishReason::Length);
            return Ok(None);
        }

        let logits = match (self.next_logits.take(), self.pending_token.take()) {
            (Some(logits), _) => logits,
            (None, Some(token_id)) => match self.decode(token_id) {
                Ok(logits) => logits,
                Err(err) => return self.finish_on_error(err),
            },
            (None, None) => {
                self.finish(FinishReason::Length);
                return Ok(None);
            },
        };

        let session = self.controller.session.as_ref().ok_or(Error::ModelNotLoaded)?;
        let token_id = self.sampler.select(&logits, session.tokens(), &self.config);
        self.token_ids.push(token_id);

        if self.config.is_eos(token_id) {
            self.finish(FinishReason::Stop);
            return Ok(Some(StreamEvent {
                token_id,
                text: String::new(),
            }));
        }

        let text = match self.streamer.put(token_id) {
            Ok(text) => text.unwrap_or_default(),
            Err(err) => {
                self.abandon();
                return Err(err);
            },
        };
        self.text.push_str(&text);
        self.pending_token = Some(token_id);
        Ok(Some(StreamEvent {
            token_id,
            text,
        }))
    }

    fn decode(
        &mut self,
        token_id: TokenId,
    ) -> Result<Vec<f32>, GeneratorError> {
        let Some(session) = self.controller.session.as_mut() else {
            return Err(GeneratorError::NotPrefilled);
        };
        let start = Instant::now();
        let result = session.decode_step(token_id)?;
        self.generate_durations.push(start.elapsed().as_secs_f64());
        self.forwardpass_durations.push(result.forwardpass_duration);
        Ok(result.logits)
    }

    fn finish_on_error(
        &mut self,
        err: GeneratorError,
    ) -> Result<Option<StreamEvent>, Error> {
        match err {
            err if err.is_cancelled() => {
                self.finish(FinishReason::Cancelled);
                Ok(None)
            },
            GeneratorError::ContextLengthExceeded {
                ..
            } => {
                self.finish(FinishReason::ContextLimitReached);
                Ok(None)
            },
            err => {
                self.abandon();
                Err(err.into())
            },
        }
    }

    fn finish(
        &mut self,
        finish_reason: FinishReason,
    ) {
        self.finish_reason = Some(finish_reason);
        self.done = true;
        match self.streamer.end() {
            Ok(tail) => self.text.push_str(&tail),
            Err(err) => tracing::warn!(error = %err, "failed to flush streamed text"),
        }

        let stats = self.stats();
        let controller = &mut *self.controller;
        controller.statistics.record_generation(&stats);
        if let Some(session) = controller.session.as_mut() {
            session.reset();
        }
        controller.state = match finish_reason {
            FinishReason::Cancelled => ControllerState::Stopped,
            _ => controller.loaded_state(),
        };
        tracing::info!(
            finish_reason = ?finish_reason,
            generated_tokens = self.token_ids.len(),
            tokens_per_second = stats.tokens_per_second(),
            "generation finished"
        );
    }

    /// Ends the stream after a fatal error without recording statistics.
    fn abandon(&mut self) {
        self.done = true;
        self.streamer.clear();
        if let Some(session) = self.controller.session.as_mut() {
            session.reset();
        }
        self.controller.state = self.controller.loaded_state();
    }

    fn stats(&self) -> Stats {
        let generate_stats = if self.generate_durations.is_empty() {
            None
        } else {
            let duration: f64 = self.generate_durations.iter().sum();
            let count = self.forwardpass_durations.len();
            Some(StepStats {
                duration,
                tokens_count: count as u64,
                tokens_per_second: per_second(count, duration),
                model_run: RunStats {
                    count: count as u64,
                    average_duration: self.forwardpass_durations.iter().sum::<f64>()
                        / count as f64,
                },
            })
        };
        Stats {
            prefill_stats: self.prefill_stats.clone(),
            generate_stats,
            total_stats: TotalStats {
                duration: self.run_start.elapsed().as_secs_f64(),
                tokens_count_input: self.prompt_length as u64,
                tokens_count_output: self.token_ids.len() as u64,
            },
        }
    }
}

impl Iterator for TokenStream<'_> {
    type Item = Result<StreamEvent, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.step().transpose()
    }
}

impl Drop for TokenStream<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.finish(FinishReason::Cancelled);
        }
    }
}

fn per_second(
    count: usize,
    duration: f64,
) -> f64 {
    if duration > 0.0 {
        count as f64 / duration
    } else {
        0.0
    }
}
