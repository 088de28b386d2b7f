mod context_length;
mod resolvable_value;
mod sampling_seed;

pub use context_length::ContextLength;
pub use resolvable_value::ResolvableValue;
pub use sampling_seed::SamplingSeed;
