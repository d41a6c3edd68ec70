//! Quantitative dataset built from parsed save files.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use dsviz_data::{
    savefile::{SaveLayout, SolutionSummary},
    solution::full_id_from_stem,
};

use crate::util;

/// Summarizes one parsed save file. The full ID comes from the file stem.
pub(crate) fn summarize_save_file(path: &Path) -> anyhow::Result<SolutionSummary> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Invalid save file name: {}", path.display()))?;
    let layout: SaveLayout = util::read_json_file("save", path)?;
    summarize_layout(stem, &layout, path)
}

/// Summarizes a layout that is stored, or about to be stored, at `path`.
pub(crate) fn summarize_layout(
    stem: &str,
    layout: &SaveLayout,
    path: &Path,
) -> anyhow::Result<SolutionSummary> {
    SolutionSummary::from_layout(&full_id_from_stem(stem), layout)
        .with_context(|| format!("Failed to summarize save file: {}", path.display()))
}

/// Parsed save files of a directory, sorted by name.
pub(crate) fn save_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = vec![];
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read save directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read save directory: {}", dir.display()))?
            .path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub(crate) fn summarize_save_dir(dir: &Path) -> anyhow::Result<Vec<SolutionSummary>> {
    let summaries = save_files(dir)?
        .iter()
        .map(|path| summarize_save_file(path))
        .collect::<anyhow::Result<Vec<_>>>()?;
    log::info!("summarized {} save files in {}", summaries.len(), dir.display());
    Ok(summaries)
}

/// Writes `summaries` as a CSV dataset, replacing `path`.
pub(crate) fn write_dataset(path: &Path, summaries: &[SolutionSummary]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create dataset: {}", path.display()))?;
    for summary in summaries {
        writer
            .serialize(summary)
            .with_context(|| format!("Failed to write dataset: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush dataset: {}", path.display()))?;
    Ok(())
}

/// Appends one row to the dataset at `path`.
///
/// A missing dataset is first seeded from `seed` if that exists, and
/// otherwise started with a header row. Existing rows are never rewritten.
pub(crate) fn append_to_dataset(
    path: &Path,
    seed: &Path,
    summary: &SolutionSummary,
) -> anyhow::Result<()> {
    let exists = path.exists();
    if !exists && seed.exists() {
        fs::copy(seed, path).with_context(|| {
            format!("Failed to seed {} from {}", path.display(), seed.display())
        })?;
    }
    let has_header = path.exists();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!has_header)
        .from_writer(file);
    writer
        .serialize(summary)
        .with_context(|| format!("Failed to append to dataset: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush dataset: {}", path.display()))?;
    log::info!("appended {} to {}", summary.fullid_orig, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use dsviz_data::table::Table;

    use super::*;

    const SAVE: &str = r#"{
        "bridge": {
            "anchors": [
                { "guid": "L", "pos": { "x": 0.0, "y": 0.0 } },
                { "guid": "R", "pos": { "x": 4.0, "y": 0.0 } }
            ],
            "joints": [{ "guid": "J", "pos": { "x": 2.0, "y": 0.0 } }],
            "edges": [
                { "materialType": 1, "nodeAGuid": "L", "nodeBGuid": "J" },
                { "materialType": 1, "nodeAGuid": "J", "nodeBGuid": "R" }
            ]
        }
    }"#;

    fn write_saves(dir: &Path, stems: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for stem in stems {
            fs::write(dir.join(format!("{stem}.json")), SAVE).unwrap();
        }
        fs::write(dir.join("notes.txt"), "not a save").unwrap();
    }

    #[test]
    fn test_summarize_save_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_saves(dir.path(), &["P02-Pre-01", "P01-Pst-10"]);
        let summaries = summarize_save_dir(dir.path()).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].fullid_orig, "P01-Pst-10");
        assert_eq!(summaries[1].fullid_orig, "P02-Pre-1");
        assert_eq!(summaries[1].total_length, 4.0);
        assert_eq!(summaries[1].num_segments, 2);
    }

    #[test]
    fn test_malformed_save_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("P01-Pre-01.json"), "{ not json").unwrap();
        let err = summarize_save_dir(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse save JSON file"));
    }

    #[test]
    fn test_append_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let saves = dir.path().join("json");
        write_saves(&saves, &["P01-Pre-01", "P01-Pre-02"]);
        let quant = dir.path().join("dataset_quant.csv");
        let updated = dir.path().join("dataset_updated.csv");
        write_dataset(&quant, &summarize_save_dir(&saves).unwrap()).unwrap();
        let before = fs::read_to_string(&quant).unwrap();

        let new = summarize_save_file(&saves.join("P01-Pre-02.json")).unwrap();
        let new = SolutionSummary {
            fullid_orig: "P01-Pst-3".to_owned(),
            ..new
        };
        append_to_dataset(&updated, &quant, &new).unwrap();
        let after = fs::read_to_string(&updated).unwrap();
        assert!(after.starts_with(&before));
        assert_eq!(after.lines().count(), before.lines().count() + 1);

        append_to_dataset(&updated, &quant, &new).unwrap();
        let table = Table::from_path(&updated).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.value(3, "fullid_orig").unwrap(), Some("P01-Pst-3"));
        // the seed is left alone
        assert_eq!(fs::read_to_string(&quant).unwrap(), before);
    }

    #[test]
    fn test_append_without_seed_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let saves = dir.path().join("json");
        write_saves(&saves, &["P01-Pre-01"]);
        let updated = dir.path().join("dataset_updated.csv");
        let summary = summarize_save_file(&saves.join("P01-Pre-01.json")).unwrap();
        append_to_dataset(&updated, &dir.path().join("missing.csv"), &summary).unwrap();
        let table = Table::from_path(&updated).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.has_column("TLength"));
    }
}
