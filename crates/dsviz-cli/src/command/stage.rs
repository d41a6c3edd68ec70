use anyhow::bail;

use crate::{
    config::PipelineConfig,
    pipeline::{Pipeline, Stage, validate},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct StageArg {
    /// Recompute even if the outputs already exist
    #[arg(long)]
    pub(crate) force: bool,
}

pub(crate) fn run(config: PipelineConfig, stage: Stage, arg: &StageArg) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::new(config);
    if arg.force {
        pipeline = pipeline.force(stage);
    }
    pipeline.run(stage)
}

pub(crate) fn run_all(config: PipelineConfig, arg: &StageArg) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::new(config);
    if arg.force {
        pipeline = pipeline.force_all();
    }
    log::info!("running the full pipeline");
    pipeline.run_all()?;

    let report = validate::validate(pipeline.config());
    for warning in &report.warnings {
        log::warn!("{warning}");
    }
    for error in &report.errors {
        log::error!("{error}");
    }
    if !report.is_ok() {
        bail!("Validation failed with {} error(s)", report.errors.len());
    }
    log::info!("pipeline complete, {} solutions", report.rows);
    Ok(())
}
