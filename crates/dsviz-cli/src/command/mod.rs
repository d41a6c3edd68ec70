use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{config::PipelineConfig, pipeline::Stage};

use self::{
    quantify::{AppendArg, QuantifyArg},
    stage::StageArg,
    validate::ValidateArg,
    watch::WatchArg,
};

mod quantify;
mod stage;
mod validate;
mod watch;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[clap(flatten)]
    global: GlobalArg,
    /// Pipeline stage or tool to run
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct GlobalArg {
    /// Pipeline configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Input data directory, overriding the configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Output directory, overriding the configuration
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
}

impl GlobalArg {
    fn load_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config.data_dir.clone_from(dir);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Read the source and colour sheets
    Read(#[clap(flatten)] StageArg),
    /// Compute the distance matrix
    Distance(#[clap(flatten)] StageArg),
    /// Embed the distance matrix in two dimensions
    Umap(#[clap(flatten)] StageArg),
    /// Add original identifiers from the masking keys
    Unmask(#[clap(flatten)] StageArg),
    /// Derive descriptive attributes and merge save-file summaries
    Features(#[clap(flatten)] StageArg),
    /// Compute exploration distances and design-space coverage
    Metrics(#[clap(flatten)] StageArg),
    /// Detect clusters on the neighbor graph
    Clusters(#[clap(flatten)] StageArg),
    /// Score solution novelty
    Novelty(#[clap(flatten)] StageArg),
    /// Compute participant convex hulls
    Hulls(#[clap(flatten)] StageArg),
    /// Write the final table, metadata and manifest
    Save(#[clap(flatten)] StageArg),
    /// Run every stage, then validate the outputs
    All(#[clap(flatten)] StageArg),
    /// Check the pipeline outputs
    Validate(#[clap(flatten)] ValidateArg),
    /// Build the quantitative dataset from every save file
    Quantify(#[clap(flatten)] QuantifyArg),
    /// Append one save file to the quantitative dataset
    Append(#[clap(flatten)] AppendArg),
    /// Watch for new save slots and append them as they appear
    Watch(#[clap(flatten)] WatchArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    let config = args.global.load_config()?;
    match args.mode {
        Mode::Read(arg) => stage::run(config, Stage::Read, &arg)?,
        Mode::Distance(arg) => stage::run(config, Stage::Distance, &arg)?,
        Mode::Umap(arg) => stage::run(config, Stage::Umap, &arg)?,
        Mode::Unmask(arg) => stage::run(config, Stage::Unmask, &arg)?,
        Mode::Features(arg) => stage::run(config, Stage::Features, &arg)?,
        Mode::Metrics(arg) => stage::run(config, Stage::Metrics, &arg)?,
        Mode::Clusters(arg) => stage::run(config, Stage::Clusters, &arg)?,
        Mode::Novelty(arg) => stage::run(config, Stage::Novelty, &arg)?,
        Mode::Hulls(arg) => stage::run(config, Stage::Hulls, &arg)?,
        Mode::Save(arg) => stage::run(config, Stage::Save, &arg)?,
        Mode::All(arg) => stage::run_all(config, &arg)?,
        Mode::Validate(arg) => validate::run(&config, &arg)?,
        Mode::Quantify(arg) => quantify::run_quantify(&config, &arg)?,
        Mode::Append(arg) => quantify::run_append(&config, &arg)?,
        Mode::Watch(arg) => watch::run(&config, &arg)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_command_definition() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_global_overrides() {
        let args =
            CommandArgs::parse_from(["dsviz", "metrics", "--force", "--output-dir", "/tmp/out"]);
        let config = args.global.load_config().unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(matches!(args.mode, Mode::Metrics(StageArg { force: true })));
    }
}
