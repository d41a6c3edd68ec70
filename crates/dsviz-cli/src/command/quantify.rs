use std::path::PathBuf;

use anyhow::Context as _;

use crate::{config::PipelineConfig, pipeline::quant};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct QuantifyArg {
    /// Output file path (defaults to `dataset_quant.csv` in the data directory)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct AppendArg {
    /// Parsed save file (JSON) to append
    #[arg(long)]
    save_file: PathBuf,
}

pub(crate) fn run_quantify(config: &PipelineConfig, arg: &QuantifyArg) -> anyhow::Result<()> {
    let save_dir = config.save_path();
    let summaries = quant::summarize_save_dir(&save_dir)?;
    let output = arg
        .output
        .clone()
        .unwrap_or_else(|| config.quant_dataset_path());
    quant::write_dataset(&output, &summaries)?;
    log::info!(
        "wrote {} solutions to {}",
        summaries.len(),
        output.display()
    );
    Ok(())
}

pub(crate) fn run_append(config: &PipelineConfig, arg: &AppendArg) -> anyhow::Result<()> {
    let summary = quant::summarize_save_file(&arg.save_file)?;
    quant::append_to_dataset(
        &config.updated_dataset_path(),
        &config.quant_dataset_path(),
        &summary,
    )
    .with_context(|| format!("Failed to append {}", arg.save_file.display()))
}
