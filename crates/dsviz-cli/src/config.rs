//! Pipeline configuration.
//!
//! Every field has a default, so a configuration file only needs the values
//! it changes.

use std::path::{Path, PathBuf};

use dsviz_analysis::{cluster::ClusterParams, distance::AttributeSchema, embedding::EmbeddingParams};
use serde::{Deserialize, Serialize};

use crate::util;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Source sheet, exported as CSV, relative to `data_dir`.
    pub source_sheet: String,
    pub colors_sheet: String,
    pub masking_dir: String,
    /// Directory of parsed save files, relative to `data_dir`.
    pub save_dir: String,
    /// Optional `attribute,weight` table overriding the schema weights.
    pub weights_file: String,
    pub umap: EmbeddingParams,
    pub cluster: ClusterParams,
    pub novelty_delta: f64,
    pub schema: AttributeSchema,
    pub watch: WatchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            source_sheet: "ExpData-100R-Expanded.csv".to_owned(),
            colors_sheet: "Colors.csv".to_owned(),
            masking_dir: "MASKING_KEYS".to_owned(),
            save_dir: "json".to_owned(),
            weights_file: "weights.csv".to_owned(),
            umap: EmbeddingParams::default(),
            cluster: ClusterParams::default(),
            novelty_delta: 0.9,
            schema: AttributeSchema::default(),
            watch: WatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct WatchConfig {
    /// Parser program followed by its arguments; the save file path is appended.
    pub parser_command: Vec<String>,
    pub slot_dir: PathBuf,
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            parser_command: vec!["node".to_owned(), "polyparser/parse.js".to_owned()],
            slot_dir: PathBuf::from("slots"),
            poll_interval_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// Loads the configuration file, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => util::read_json_file("config", path),
            None => Ok(Self::default()),
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.data_dir.join(&self.source_sheet)
    }

    pub fn colors_path(&self) -> PathBuf {
        self.data_dir.join(&self.colors_sheet)
    }

    pub fn masking_path(&self) -> PathBuf {
        self.data_dir.join(&self.masking_dir)
    }

    pub fn save_path(&self) -> PathBuf {
        self.data_dir.join(&self.save_dir)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.data_dir.join(&self.weights_file)
    }

    pub fn intermediate_dir(&self) -> PathBuf {
        self.output_dir.join("intermediate")
    }

    pub fn intermediate(&self, name: &str) -> PathBuf {
        self.intermediate_dir().join(name)
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Quantitative dataset built from every save file.
    pub fn quant_dataset_path(&self) -> PathBuf {
        self.data_dir.join("dataset_quant.csv")
    }

    /// Quantitative dataset extended with solutions appended one at a time.
    pub fn updated_dataset_path(&self) -> PathBuf {
        self.data_dir.join("dataset_updated.csv")
    }
}
