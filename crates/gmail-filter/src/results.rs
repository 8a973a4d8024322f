//! Persist the summary of a run as pretty-printed JSON.

use anyhow::{Context, Result};
use chrono::Local;
use shared_types::RunSummary;
use std::path::{Path, PathBuf};

/// File name for a run started now, e.g. `email_results_20250106_093000.json`
pub fn results_file_name() -> String {
    format!("email_results_{}.json", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Write `summary` into `results_dir`, falling back to the working directory.
///
/// Returns the path actually written.
pub fn save_results(summary: &RunSummary, results_dir: &Path) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize results")?;
    let file_name = results_file_name();

    let primary = results_dir.join(&file_name);
    match write_file(&primary, &json) {
        Ok(()) => {
            tracing::info!("Results saved to {}", primary.display());
            Ok(primary)
        }
        Err(e) => {
            tracing::error!("Error saving results to {}: {:#}", primary.display(), e);

            let fallback = PathBuf::from(&file_name);
            write_file(&fallback, &json)
                .context("Error saving results to fallback path")?;
            tracing::info!("Results saved to fallback path: {}", fallback.display());
            Ok(fallback)
        }
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            tracing::debug!("Creating directory: {}", dir.display());
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}
