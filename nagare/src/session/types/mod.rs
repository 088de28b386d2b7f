mod error;
mod output;
mod state;
mod stats;
pub use error::Error;
pub use output::{FinishReason, Output, StreamEvent};
pub use state::ControllerState;
pub use stats::{PerformanceStatistics, RunStats, Stats, StepStats, TotalStats};
