use std::{path::Path, sync::Arc, time::Instant};

use super::{
    config::{ControllerConfig, SamplingConfig},
    parameter::ResolvableValue,
    stop_handle::StopHandle,
    token_stream::TokenStream,
    types::{
        ControllerState, Error, Output, PerformanceStatistics, StreamEvent,
    },
};
use crate::{
    backends::{CompiledModel, Model},
    generator::GenerationSession,
    tokenizer::{HuggingFaceCodec, TextCodec},
    utils::env_utils::EnvVar,
};

/// Loads a model and tokenizer and runs generations over them.
///
/// One generation runs at a time. Another thread can end it early through
/// a [`StopHandle`] obtained from [`stop_handle`](Self::stop_handle).
pub struct GenerationController {
    model: Box<dyn Model>,
    config: ControllerConfig,
    pub(super) state: ControllerState,
    compiled_model: Option<Box<dyn CompiledModel>>,
    pub(super) session: Option<GenerationSession>,
    codec: Option<Arc<dyn TextCodec>>,
    pub(super) stop_handle: StopHandle,
    pub(super) statistics: PerformanceStatistics,
}

impl GenerationController {
    pub fn new(
        model: Box<dyn Model>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            model,
            config,
            state: ControllerState::Uninitialized,
            compiled_model: None,
            session: None,
            codec: None,
            stop_handle: StopHandle::new(),
            statistics: PerformanceStatistics::default(),
        }
    }

    pub fn status(&self) -> ControllerState {
        self.state
    }

    pub fn performance_statistics(&self) -> &PerformanceStatistics {
        &self.statistics
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Compiles the model at `path`. `thread_count` overrides the
    /// configured value.
    pub fn load_model(
        &mut self,
        path: &Path,
        thread_count: Option<usize>,
    ) -> Result<(), Error> {
        let start = Instant::now();
        if let Some(thread_count) = thread_count {
            self.config.thread_count = Some(thread_count);
        }

        let compiled_model =
            self.model.compile(path, &self.config.compile_options())?;
        let mut session = GenerationSession::new(
            compiled_model.as_ref(),
            self.config.context_length.resolve(),
        )?;
        if !EnvVar::SkipModelValidation.is_enabled() {
            // A one-token prefill checks the cache contract before any prompt.
            session.prefill(&[0])?;
            session.reset();
        }

        self.session =
            Some(session.with_cancellation(self.stop_handle.cancellation()));
        self.compiled_model = Some(compiled_model);
        self.statistics.llm_load_duration = elapsed_ms(start);
        self.state = self.loaded_state();
        tracing::info!(
            path = %path.display(),
            duration_ms = self.statistics.llm_load_duration,
            "model loaded"
        );
        Ok(())
    }

    /// Loads `tokenizer.json` from `path` or a model directory.
    pub fn load_tokenizer(
        &mut self,
        path: &Path,
    ) -> Result<(), Error> {
        let start = Instant::now();
        let codec = HuggingFaceCodec::from_path(path)?;
        self.set_tokenizer(Arc::new(codec));
        self.statistics.tokenizer_load_duration = elapsed_ms(start);
        tracing::info!(
            path = %path.display(),
            duration_ms = self.statistics.tokenizer_load_duration,
            "tokenizer loaded"
        );
        Ok(())
    }

    pub fn set_tokenizer(
        &mut self,
        codec: Arc<dyn TextCodec>,
    ) {
        self.codec = Some(codec);
        self.state = self.loaded_state();
    }

    pub fn unload_model(&mut self) {
        let start = Instant::now();
        self.session = None;
        self.compiled_model = None;
        self.statistics.llm_unload_duration = elapsed_ms(start);
        self.state = ControllerState::Unloaded;
        tracing::info!(
            duration_ms = self.statistics.llm_unload_duration,
            "model unloaded"
        );
    }

    pub fn unload_tokenizer(&mut self) {
        let start = Instant::now();
        self.codec = None;
        self.statistics.tokenizer_unload_duration = elapsed_ms(start);
        if self.state != ControllerState::Unloaded {
            self.state = self.loaded_state();
        }
    }

    /// Requests that the current generation end and records how long the
    /// request took.
    pub fn stop(&mut self) {
        let start = Instant::now();
        self.stop_handle.stop();
        self.statistics.llm_cancel_duration = elapsed_ms(start);
    }

    /// Clears the cache, the counters and the stop flag. The model stays
    /// loaded.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.reset();
        }
        self.statistics.reset();
        self.stop_handle.reset();
        if self.state == ControllerState::Stopped {
            self.state = self.loaded_state();
        }
    }

    /// Starts a generation and returns its tokens as an iterator.
    ///
    /// The prompt is evaluated before this returns. Each token is yielded
    /// exactly once and the stream cannot be restarted.
    pub fn stream(
        &mut self,
        prompt: &str,
        config: &SamplingConfig,
    ) -> Result<TokenStream<'_>, Error> {
        config.validate()?;
        self.check_can_generate("generate")?;
        let codec = self.codec.clone().ok_or(Error::TokenizerNotLoaded)?;
        let prompt_ids = codec.encode(prompt)?.ids;
        tracing::debug!(prompt_tokens = prompt_ids.len(), "starting generation");
        TokenStream::start(self, codec, prompt_ids, config.clone())
    }

    /// Runs a generation, calling `callback` after every token.
    ///
    /// The callback may end the generation through the [`StopHandle`] it
    /// is given.
    pub fn generate_with_callback<F>(
        &mut self,
        prompt: &str,
        config: &SamplingConfig,
        mut callback: F,
    ) -> Result<Output, Error>
    where
        F: FnMut(&StreamEvent, &StopHandle),
    {
        let stop_handle = self.stop_handle.clone();
        let mut stream = self.stream(prompt, config)?;
        for event in stream.by_ref() {
            callback(&event?, &stop_handle);
        }
        Ok(stream.into_output())
    }

    pub fn generate(
        &mut self,
        prompt: &str,
        config: &SamplingConfig,
    ) -> Result<Output, Error> {
        self.generate_with_callback(prompt, config, |_, _| {})
    }

    pub(super) fn loaded_state(&self) -> ControllerState {
        match (self.session.is_some(), self.codec.is_some()) {
            (true, true) => ControllerState::Ready,
            (true, false) => ControllerState::ModelLoaded,
            (false, true) => ControllerState::TokenizerLoaded,
            (false, false) => ControllerState::Uninitialized,
        }
    }

    fn check_can_generate(
        &self,
        operation: &'static str,
    ) -> Result<(), Error> {
        if self.session.is_none() {
            return Err(Error::ModelNotLoaded);
        }
        if self.codec.is_none() {
            return Err(Error::TokenizerNotLoaded);
        }
        if !self.state.can_generate() {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
