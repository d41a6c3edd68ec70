//! Polls a save-slot directory and appends every new save to the dataset.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    process::Command,
    thread,
    time::Duration,
};

use anyhow::{Context as _, bail};
use dsviz_data::savefile::SaveLayout;

use crate::{config::PipelineConfig, pipeline::quant};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct WatchArg {
    /// Scan once and exit instead of polling
    #[arg(long)]
    once: bool,
    /// Slot directory, overriding the configuration
    #[arg(long)]
    slot_dir: Option<PathBuf>,
}

pub(crate) fn run(config: &PipelineConfig, arg: &WatchArg) -> anyhow::Result<()> {
    let slot_dir = arg
        .slot_dir
        .clone()
        .unwrap_or_else(|| config.watch.slot_dir.clone());
    if config.watch.parser_command.is_empty() {
        bail!("No parser command configured");
    }

    let mut watcher = SlotWatcher::new(&slot_dir)?;
    log::info!(
        "watching {} ({} existing slots ignored)",
        slot_dir.display(),
        watcher.seen.len()
    );
    let interval = Duration::from_millis(config.watch.poll_interval_ms);
    loop {
        for slot in watcher.poll()? {
            if let Err(err) = process_slot(config, &slot) {
                log::error!("{err:#}");
            }
        }
        if arg.once {
            return Ok(());
        }
        thread::sleep(interval);
    }
}

/// Tracks which `*.slot` files of a directory have been seen.
#[derive(Debug)]
struct SlotWatcher {
    dir: PathBuf,
    seen: BTreeSet<PathBuf>,
}

impl SlotWatcher {
    /// Starts watching `dir`; slots already present are never reported.
    fn new(dir: &Path) -> anyhow::Result<Self> {
        let seen = slot_files(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            seen,
        })
    }

    /// Slots that appeared since the last poll, sorted by path.
    fn poll(&mut self) -> anyhow::Result<Vec<PathBuf>> {
        let current = slot_files(&self.dir)?;
        let new = current.difference(&self.seen).cloned().collect();
        self.seen = current;
        Ok(new)
    }
}

fn slot_files(dir: &Path) -> anyhow::Result<BTreeSet<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read slot directory: {}", dir.display()))?;
    let mut slots = BTreeSet::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read slot directory: {}", dir.display()))?
            .path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("slot")) {
            slots.insert(path);
        }
    }
    Ok(slots)
}

/// Parses a slot, stores the parsed JSON and appends it to the dataset.
fn process_slot(config: &PipelineConfig, slot: &Path) -> anyhow::Result<()> {
    log::info!("new save slot: {}", slot.display());
    let stem = slot
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Invalid slot file name: {}", slot.display()))?;

    let (program, args) = config
        .watch
        .parser_command
        .split_first()
        .context("No parser command configured")?;
    let output = Command::new(program)
        .args(args)
        .arg(slot)
        .output()
        .with_context(|| format!("Failed to run parser `{program}`"))?;
    if !output.status.success() {
        bail!(
            "Parser failed on {} ({}): {}",
            slot.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    // nothing reaches the save directory unless it summarizes
    let save_dir = config.save_path();
    let json_path = save_dir.join(format!("{stem}.json"));
    let layout: SaveLayout = serde_json::from_slice(&output.stdout).with_context(|| {
        format!("Parser output for {} is not a save file", slot.display())
    })?;
    let summary = quant::summarize_layout(stem, &layout, &json_path)?;

    fs::create_dir_all(&save_dir)
        .with_context(|| format!("Failed to create directory: {}", save_dir.display()))?;
    fs::write(&json_path, &output.stdout)
        .with_context(|| format!("Failed to write parsed save: {}", json_path.display()))?;
    quant::append_to_dataset(
        &config.updated_dataset_path(),
        &config.quant_dataset_path(),
        &summary,
    )
}
