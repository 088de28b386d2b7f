use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use console::Style;
use nagare::{
    TokenId,
    backends::{CancellationToken, CompileOptions, Model, reference::ReferenceModel},
    generator::GenerationSession,
    speculators::{
        SpeculativeConfig, SpeculativeCoordinator, SpeculativeOutput,
        VerificationPolicy,
    },
    tokenizer::HuggingFaceCodec,
};

use super::loading::with_spinner;

pub struct GenerateArgs {
    pub draft_path: PathBuf,
    pub target_path: PathBuf,
    pub prompt: String,
    pub max_iterations: usize,
    pub verify: bool,
    pub eos: Vec<TokenId>,
}

fn load_session(
    path: &Path,
    cancellation: &CancellationToken,
) -> anyhow::Result<GenerationSession> {
    with_spinner(path, || {
        let compiled_model =
            ReferenceModel::new().compile(path, &CompileOptions::default())?;
        let session = GenerationSession::new(compiled_model.as_ref(), None)?;
        Ok(session.with_cancellation(cancellation.clone()))
    })
}

fn format_stats(output: &SpeculativeOutput) -> String {
    let style_stats = Style::new().bold();
    style_stats
        .apply_to(format!(
            "{} iterations, {:.1}% agreement, {:?}",
            output.stats.iterations,
            output.stats.agreement_rate() * 100.0,
            output.finish_reason,
        ))
        .to_string()
}

pub fn handle_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let cancellation = CancellationToken::new();
    let draft = load_session(&args.draft_path, &cancellation)?;
    let target = load_session(&args.target_path, &cancellation)?;
    let codec = HuggingFaceCodec::from_path(&args.target_path)
        .with_context(|| format!("no tokenizer in {}", args.target_path.display()))?;

    let policy = if args.verify {
        VerificationPolicy::Greedy
    } else {
        VerificationPolicy::Unverified
    };
    let config = SpeculativeConfig::new(args.max_iterations, args.eos, policy);
    let mut coordinator =
        SpeculativeCoordinator::new(draft, target, Arc::new(codec), config)?;

    let cancellation_for_ctrlc = cancellation.clone();
    ctrlc::set_handler(move || cancellation_for_ctrlc.cancel())
        .context("failed to install the interrupt handler")?;

    let mut stdout = std::io::stdout();
    let output = coordinator.generate(&args.prompt, |chunk| {
        print!("{chunk}");
        let _ = stdout.flush();
    })?;
    println!("{}", format_stats(&output));
    Ok(())
}
