pub mod config;
mod controller;
pub mod parameter;
mod stop_handle;
mod token_stream;
pub mod types;

pub use controller::GenerationController;
pub use stop_handle::StopHandle;
pub use token_stream::TokenStream;
