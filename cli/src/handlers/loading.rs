use std::path::Path;

use anyhow::Context;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

/// Runs `load` behind a spinner labelled with the directory name of `path`.
pub fn with_spinner<T, F>(
    path: &Path,
    load: F,
) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    let style_bold = Style::new().bold();
    let model_name = style_bold
        .apply_to(
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        )
        .to_string();

    let progress_bar = ProgressBar::new_spinner();
    progress_bar.enable_steady_tick(std::time::Duration::from_millis(100));
    progress_bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Loading: {msg}")
            .context("invalid spinner template")?,
    );
    progress_bar.set_message(model_name.clone());

    let result = load();
    match &result {
        Ok(_) => {
            progress_bar.set_style(
                ProgressStyle::default_spinner()
                    .template("Loaded: {msg}")
                    .context("invalid spinner template")?,
            );
            progress_bar.finish_with_message(model_name);
        },
        Err(_) => progress_bar.finish_and_clear(),
    }
    result
}
