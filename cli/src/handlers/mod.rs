mod generate;
mod loading;
mod run;

pub use generate::{GenerateArgs, handle_generate};
pub use run::{RunArgs, handle_run};
