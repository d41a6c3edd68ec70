use std::path::PathBuf;

use anyhow::bail;

use crate::{config::PipelineConfig, pipeline::validate, util::Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ValidateArg {
    /// Write the validation report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
    /// Write the validation report as JSON to stdout
    #[arg(long, conflicts_with = "report")]
    json: bool,
}

pub(crate) fn run(config: &PipelineConfig, arg: &ValidateArg) -> anyhow::Result<()> {
    let report = validate::validate(config);

    if arg.json || arg.report.is_some() {
        Output::save_json(&report, arg.report.clone())?;
    }

    if !report.is_ok() {
        log::error!("Validation FAILED with {} error(s):", report.errors.len());
        for error in &report.errors {
            log::error!("  - {error}");
        }
        bail!("Validation failed");
    }
    if report.warnings.is_empty() {
        log::info!("Validation PASSED, all outputs present and valid");
    } else {
        log::warn!("Validation passed with {} warning(s):", report.warnings.len());
        for warning in &report.warnings {
            log::warn!("  - {warning}");
        }
    }
    Ok(())
}
