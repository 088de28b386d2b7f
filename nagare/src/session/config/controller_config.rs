use crate::{
    backends::{CompileOptions, Device},
    session::parameter::ContextLength,
};

#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    pub device: Device,
    pub thread_count: Option<usize>,
    pub context_length: ContextLength,
}

impl ControllerConfig {
    pub fn new(
        device: Device,
        thread_count: Option<usize>,
        context_length: ContextLength,
    ) -> Self {
        Self {
            device,
            thread_count,
            context_length,
        }
    }

    pub fn device(
        mut self,
        device: Device,
    ) -> Self {
        self.device = device;
        self
    }

    pub fn thread_count(
        mut self,
        thread_count: usize,
    ) -> Self {
        self.thread_count = Some(thread_count);
        self
    }

    pub fn context_length(
        mut self,
        context_length: ContextLength,
    ) -> Self {
        self.context_length = context_length;
        self
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            device: self.device,
            thread_count: self.thread_count,
        }
    }
}
