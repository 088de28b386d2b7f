mod common;
mod controller_config;
mod generation_config;
mod sampling_config;

pub use common::ValueOrList;
pub use controller_config::ControllerConfig;
pub use generation_config::GenerationConfig;
pub use sampling_config::SamplingConfig;
