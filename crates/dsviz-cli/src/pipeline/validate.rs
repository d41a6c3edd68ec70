//! Structural checks of the pipeline outputs.

use std::collections::BTreeMap;

use dsviz_analysis::{
    coverage::FULL_DESIGN_SPACE,
    record::{Metadata, SolutionRecord},
};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{
    COLORS_FILE, COLORS_UNMASK_FILE, DISTANCE_FILE, EMBEDDING_FILE, GRAPH_FILE, READ_FILE,
    UNMASK_FILE,
    features::FEATURES_FILE,
    metrics::{AREA_FILE, CLUSTERS_FILE, EXPLORATION_FILE, HULLS_FILE, METRICS_FILE, NOVELTY_FILE},
    save::{BASE_FILE, FINAL_FILES, MANIFEST_FILE, METADATA_FILE, Manifest},
};
use crate::{config::PipelineConfig, util};

const INTERMEDIATE_FILES: [&str; 13] = [
    READ_FILE,
    COLORS_FILE,
    DISTANCE_FILE,
    EMBEDDING_FILE,
    GRAPH_FILE,
    UNMASK_FILE,
    COLORS_UNMASK_FILE,
    FEATURES_FILE,
    METRICS_FILE,
    EXPLORATION_FILE,
    AREA_FILE,
    CLUSTERS_FILE,
    NOVELTY_FILE,
];

/// Participant hulls expected in a complete study.
const EXPECTED_PARTICIPANTS: usize = 30;

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct ValidationReport {
    pub rows: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub(crate) fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub(crate) fn validate(config: &PipelineConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    for name in FINAL_FILES {
        if !config.output(name).exists() {
            report.errors.push(format!("Missing {name}"));
        }
    }
    for name in INTERMEDIATE_FILES {
        if !config.intermediate(name).exists() {
            report
                .warnings
                .push(format!("Missing intermediate file: {name}"));
        }
    }

    check_base(config, &mut report);
    check_hulls(config, &mut report);
    check_metadata(config, &mut report);
    check_manifest(config, &mut report);
    report
}

fn read_object_file<T>(config: &PipelineConfig, name: &str, report: &mut ValidationReport) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    let path = config.output(name);
    if !path.exists() {
        return None;
    }
    match util::read_json_file(name, &path) {
        Ok(value) => Some(value),
        Err(err) => {
            report.errors.push(format!("{err:#}"));
            None
        }
    }
}

fn check_base(config: &PipelineConfig, report: &mut ValidationReport) {
    let Some(records) = read_object_file::<Vec<Map<String, Value>>>(config, BASE_FILE, report)
    else {
        return;
    };
    report.rows = records.len();
    if records.is_empty() {
        report.errors.push(format!("{BASE_FILE} has 0 rows"));
        return;
    }
    for (i, record) in records.iter().enumerate() {
        let missing = SolutionRecord::missing_columns(record.keys().map(String::as_str));
        if !missing.is_empty() {
            report.errors.push(format!(
                "{BASE_FILE} row {i} is missing required columns: {}",
                missing.join(", ")
            ));
            return;
        }
    }
    log::info!("{BASE_FILE} has {} rows", records.len());
}

fn check_hulls(config: &PipelineConfig, report: &mut ValidationReport) {
    let Some(hulls) = read_object_file::<BTreeMap<String, Value>>(config, HULLS_FILE, report)
    else {
        return;
    };
    if !hulls.contains_key(FULL_DESIGN_SPACE) {
        report
            .errors
            .push(format!("{HULLS_FILE} is missing `{FULL_DESIGN_SPACE}`"));
        return;
    }
    let participants = hulls.len() - 1;
    if participants < EXPECTED_PARTICIPANTS {
        report.warnings.push(format!(
            "{HULLS_FILE} has only {participants} participants (expected {EXPECTED_PARTICIPANTS}+)"
        ));
    }
}

fn check_metadata(config: &PipelineConfig, report: &mut ValidationReport) {
    let Some(metadata) = read_object_file::<Map<String, Value>>(config, METADATA_FILE, report)
    else {
        return;
    };
    for key in Metadata::KEYS {
        if !metadata.contains_key(key) {
            report
                .errors
                .push(format!("{METADATA_FILE} is missing key `{key}`"));
        }
    }
    if let Some(ids) = metadata.get("participant_ids") {
        match ids.as_array() {
            Some(ids) if ids.is_empty() => report
                .errors
                .push(format!("{METADATA_FILE} `participant_ids` is empty")),
            Some(_) => {}
            None => report
                .errors
                .push(format!("{METADATA_FILE} `participant_ids` is not a list")),
        }
    }
    if let Some(colors) = metadata.get("color_mapping") {
        match colors.as_object() {
            Some(colors) if colors.is_empty() => report
                .errors
                .push(format!("{METADATA_FILE} `color_mapping` is empty")),
            Some(_) => {}
            None => report
                .errors
                .push(format!("{METADATA_FILE} `color_mapping` is not an object")),
        }
    }
    if let Some(area) = metadata.get("ds_area") {
        match area.as_f64() {
            Some(area) if area > 0.0 => {}
            Some(_) => report
                .errors
                .push(format!("{METADATA_FILE} `ds_area` is not positive")),
            None => report
                .errors
                .push(format!("{METADATA_FILE} `ds_area` is not a number")),
        }
    }
}

fn check_manifest(config: &PipelineConfig, report: &mut ValidationReport) {
    let Some(manifest) = read_object_file::<Map<String, Value>>(config, MANIFEST_FILE, report)
    else {
        return;
    };
    for key in Manifest::KEYS {
        if !manifest.contains_key(key) {
            report
                .errors
                .push(format!("{MANIFEST_FILE} is missing key `{key}`"));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn config(root: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            data_dir: root.join("data"),
            output_dir: root.join("output"),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_empty_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let report = validate(&config(dir.path()));
        assert_eq!(report.errors.len(), FINAL_FILES.len());
        assert_eq!(report.warnings.len(), INTERMEDIATE_FILES.len());
        assert!(!report.is_ok());
    }

    #[test]
    fn test_structural_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        fs::create_dir_all(&config.output_dir).unwrap();
        fs::write(config.output(BASE_FILE), "[]").unwrap();
        fs::write(
            config.output(METADATA_FILE),
            r#"{ "participant_ids": ["P01"], "color_mapping": {}, "ds_area": 0.0 }"#,
        )
        .unwrap();
        fs::write(config.output(HULLS_FILE), r#"{ "P01": {} }"#).unwrap();
        fs::write(config.output(MANIFEST_FILE), "not json").unwrap();

        let report = validate(&config);
        let has = |needle: &str| report.errors.iter().any(|e| e.contains(needle));
        assert!(has("has 0 rows"));
        assert!(has("missing `full_ds`"));
        assert!(has("missing key `cluster_symbols`"));
        assert!(has("`color_mapping` is empty"));
        assert!(has("`ds_area` is not positive"));
        assert!(has("Failed to parse manifest.json JSON file"));
        assert!(!has("participant_ids"));
    }
}
