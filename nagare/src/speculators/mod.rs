mod speculative_config;
mod speculative_coordinator;
mod speculative_output;

pub use speculative_config::{SpeculativeConfig, VerificationPolicy};
pub use speculative_coordinator::SpeculativeCoordinator;
pub use speculative_output::{SpeculativeOutput, SpeculativeStats};
