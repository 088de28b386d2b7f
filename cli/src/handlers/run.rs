use std::{io::Write, path::PathBuf};

use anyhow::Context;
use console::Style;
use nagare::{
    backends::reference::ReferenceModel,
    session::{
        GenerationController,
        config::{ControllerConfig, SamplingConfig},
        parameter::SamplingSeed,
        types::{Output, PerformanceStatistics},
    },
};

use super::loading::with_spinner;

pub struct RunArgs {
    pub model_path: PathBuf,
    pub prompt: String,
    pub generation_config: Option<PathBuf>,
    pub greedy: bool,
    pub temperature: Option<f32>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
    pub repeat_penalty: Option<f32>,
    pub seed: Option<u64>,
    pub max_tokens: Option<usize>,
    pub threads: Option<usize>,
}

impl RunArgs {
    fn sampling_config(&self) -> anyhow::Result<SamplingConfig> {
        let mut config = match &self.generation_config {
            Some(path) => SamplingConfig::from_file(path).with_context(|| {
                format!("failed to read {}", path.display())
            })?,
            None => SamplingConfig::default(),
        };
        if self.greedy {
            config = config.do_sample(false);
        }
        if let Some(temperature) = self.temperature {
            config = config.temperature(temperature);
        }
        if let Some(top_k) = self.top_k {
            config = config.top_k(top_k);
        }
        if let Some(top_p) = self.top_p {
            config = config.top_p(top_p);
        }
        if let Some(repeat_penalty) = self.repeat_penalty {
            config = config.repeat_penalty(repeat_penalty);
        }
        if let Some(seed) = self.seed {
            config = config.seed(SamplingSeed::Custom(seed));
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.max_new_tokens(max_tokens);
        }
        Ok(config)
    }
}

fn format_stats(
    output: &Output,
    statistics: &PerformanceStatistics,
) -> String {
    let stats = &output.stats;
    let tokens_per_second = if let Some(generate_stats) = &stats.generate_stats
    {
        generate_stats.tokens_per_second
    } else {
        stats.prefill_stats.tokens_per_second
    };

    let style_stats = Style::new().bold();
    style_stats
        .apply_to(format!(
            "{:.3}s, {:.3}t/s, first token {:.1}ms, {} tokens, {:?}",
            stats.total_stats.duration,
            tokens_per_second,
            statistics.llm_first_infer_duration,
            statistics.generated_token_num,
            output.finish_reason,
        ))
        .to_string()
}

pub fn handle_run(args: RunArgs) -> anyhow::Result<()> {
    let sampling_config = args.sampling_config()?;
    tracing::debug!(?sampling_config, "resolved sampling config");
    let mut controller = GenerationController::new(
        Box::new(ReferenceModel::new()),
        ControllerConfig::default(),
    );
    with_spinner(&args.model_path, || {
        controller.load_model(&args.model_path, args.threads)?;
        controller.load_tokenizer(&args.model_path)?;
        Ok(())
    })?;

    let stop_handle = controller.stop_handle();
    ctrlc::set_handler(move || stop_handle.stop())
        .context("failed to install the interrupt handler")?;

    let mut stdout = std::io::stdout();
    let mut printed = 0;
    let output = controller.generate_with_callback(
        &args.prompt,
        &sampling_config,
        |event, _| {
            print!("{}", event.text);
            let _ = stdout.flush();
            printed += event.text.len();
        },
    )?;
    print!("{}", output.text.get(printed..).unwrap_or_default());
    println!("{}", format_stats(&output, controller.performance_statistics()));
    Ok(())
}
