mod handlers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nagare::utils::env_utils::EnvVar;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::handlers::{GenerateArgs, RunArgs, handle_generate, handle_run};

/// Streaming text generation over locally compiled models
#[derive(Parser)]
#[command(name = "nagare")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate from a prompt with one model and stream the text.
    Run {
        /// Model directory holding `model.json` and `tokenizer.json`.
        model_path: PathBuf,

        /// Input prompt text.
        prompt: String,

        /// `generation_config.json` used as the base sampling settings.
        #[arg(long)]
        generation_config: Option<PathBuf>,

        /// Decode greedily instead of sampling.
        #[arg(long)]
        greedy: bool,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        top_p: Option<f32>,

        #[arg(long)]
        repeat_penalty: Option<f32>,

        /// Random seed for reproducible sampling.
        #[arg(short, long)]
        seed: Option<u64>,

        /// Maximum number of tokens to generate.
        #[arg(short, long)]
        max_tokens: Option<usize>,

        #[arg(long)]
        threads: Option<usize>,
    },
    /// Generate with a draft model checked against a target model.
    Generate {
        /// Draft model directory.
        draft_path: PathBuf,

        /// Target model directory, also the tokenizer source.
        target_path: PathBuf,

        /// Input prompt text.
        prompt: String,

        #[arg(long, default_value_t = 50)]
        max_iterations: usize,

        /// Commit the target's token when the models disagree.
        #[arg(long)]
        verify: bool,

        /// Token ids that end the generation.
        #[arg(long, value_delimiter = ',', default_values_t = [2])]
        eos: Vec<i64>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_env(EnvVar::Log.key())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run {
            model_path,
            prompt,
            generation_config,
            greedy,
            temperature,
            top_k,
            top_p,
            repeat_penalty,
            seed,
            max_tokens,
            threads,
        } => handle_run(RunArgs {
            model_path,
            prompt,
            generation_config,
            greedy,
            temperature,
            top_k,
            top_p,
            repeat_penalty,
            seed,
            max_tokens,
            threads,
        }),
        Command::Generate {
            draft_path,
            target_path,
            prompt,
            max_iterations,
            verify,
            eos,
        } => handle_generate(GenerateArgs {
            draft_path,
            target_path,
            prompt,
            max_iterations,
            verify,
            eos,
        }),
    };

    if let Err(error) = result {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_takes_prompt_positionally() {
        let cli = Cli::try_parse_from([
            "nagare_cli",
            "generate",
            "/tmp/draft",
            "/tmp/target",
            "Hello",
            "--verify",
        ])
        .unwrap();
        match cli.command {
            Command::Generate {
                draft_path,
                target_path,
                prompt,
                verify,
                eos,
                ..
            } => {
                assert_eq!(draft_path, PathBuf::from("/tmp/draft"));
                assert_eq!(target_path, PathBuf::from("/tmp/target"));
                assert_eq!(prompt, "Hello");
                assert!(verify);
                assert_eq!(eos, vec![2]);
            },
            Command::Run {
                ..
            } => panic!("parsed as run"),
        }
    }

    #[test]
    fn test_run_takes_prompt_positionally() {
        let cli = Cli::try_parse_from([
            "nagare_cli",
            "run",
            "/tmp/model",
            "Hello",
            "--greedy",
            "--max-tokens",
            "5",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                model_path,
                prompt,
                greedy,
                max_tokens,
                ..
            } => {
                assert_eq!(model_path, PathBuf::from("/tmp/model"));
                assert_eq!(prompt, "Hello");
                assert!(greedy);
                assert_eq!(max_tokens, Some(5));
            },
            Command::Generate {
                ..
            } => panic!("parsed as generate"),
        }
    }

    #[test]
    fn test_missing_prompt_is_rejected() {
        assert!(Cli::try_parse_from(["nagare_cli", "run", "/tmp/model"]).is_err());
    }
}
