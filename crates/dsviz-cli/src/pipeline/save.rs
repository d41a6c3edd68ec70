use std::collections::BTreeMap;

use anyhow::{Context as _, bail};
use chrono::{DateTime, Utc};
use dsviz_analysis::record::{DESIGN_COLUMNS, Metadata, SolutionRecord};
use dsviz_data::{solution::MaskedIds, table::Table};
use serde::{Deserialize, Serialize};

use super::{
    Pipeline, Stage, ensure_aligned,
    features::FeatureRow,
    metrics::{ClusterRow, HULLS_FILE, MetricsRow, NoveltyRow},
};
use crate::{config::PipelineConfig, util};

pub(crate) const BASE_FILE: &str = "df_base.json";
pub(crate) const METADATA_FILE: &str = "metadata.json";
pub(crate) const MANIFEST_FILE: &str = "manifest.json";

pub(crate) const FINAL_FILES: [&str; 4] = [BASE_FILE, METADATA_FILE, HULLS_FILE, MANIFEST_FILE];

/// Record of how the final outputs were produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub timestamp: DateTime<Utc>,
    pub source_file: String,
    pub source_sheet: String,
    pub umap_params: UmapParams,
    pub cluster_resolution: f64,
    pub novelty_delta: f64,
    pub output_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct UmapParams {
    #[serde(rename = "NN")]
    pub n_neighbors: usize,
    #[serde(rename = "MD")]
    pub min_dist: f64,
    pub densm: f64,
    pub seed: u64,
}

impl Manifest {
    pub(crate) const KEYS: [&str; 5] = [
        "timestamp",
        "source_file",
        "umap_params",
        "cluster_resolution",
        "output_files",
    ];

    fn new(config: &PipelineConfig) -> Self {
        Self {
            timestamp: Utc::now(),
            source_file: config.source_path().display().to_string(),
            source_sheet: config.source_sheet.clone(),
            umap_params: UmapParams {
                n_neighbors: config.umap.n_neighbors,
                min_dist: config.umap.min_dist,
                densm: config.umap.dens_lambda,
                seed: config.umap.seed,
            },
            cluster_resolution: config.cluster.resolution,
            novelty_delta: config.novelty_delta,
            output_files: FINAL_FILES.iter().map(|f| (*f).to_owned()).collect(),
        }
    }
}

/// Per-solution results of every stage, in source row order.
pub(crate) struct StageResults<'a> {
    pub solutions: &'a Table,
    pub coords: &'a [[f64; 2]],
    pub features: &'a [FeatureRow],
    pub metrics: &'a [MetricsRow],
    pub clusters: &'a [ClusterRow],
    pub novelty: &'a [NoveltyRow],
}

impl Pipeline {
    pub(crate) fn save(&mut self) -> anyhow::Result<()> {
        let base_path = self.config.output(BASE_FILE);
        let metadata_path = self.config.output(METADATA_FILE);
        let manifest_path = self.config.output(MANIFEST_FILE);
        if self.is_cached(Stage::Save, &[&base_path, &metadata_path, &manifest_path]) {
            log::info!("save: outputs up to date in {}", self.config.output_dir.display());
            return Ok(());
        }

        let inputs = self.read()?;
        let embedding = self.umap()?;
        let features = self.features()?;
        let metrics = self.metrics()?;
        let clusters = self.clusters()?;
        let novelty = self.novelty()?;
        self.hulls()?;

        let records = build_records(&StageResults {
            solutions: &inputs.solutions,
            coords: &embedding.coords,
            features: &features,
            metrics: &metrics.rows,
            clusters: &clusters,
            novelty: &novelty,
        })?;
        let metadata = Metadata::from_records(&records, metrics.ds_area);

        util::write_json_file(&records, &base_path)?;
        util::write_json_file(&metadata, &metadata_path)?;
        util::write_json_file(&Manifest::new(&self.config), &manifest_path)?;
        log::info!(
            "save: {} solutions written to {}",
            records.len(),
            base_path.display()
        );
        self.computed(Stage::Save);
        Ok(())
    }
}

/// Joins the stage results into the records of the final table.
pub(crate) fn build_records(results: &StageResults<'_>) -> anyhow::Result<Vec<SolutionRecord>> {
    let points = results.coords.len();
    ensure_aligned(Stage::Save, "source table", results.solutions.len(), points)?;
    ensure_aligned(Stage::Save, "features", results.features.len(), points)?;
    ensure_aligned(Stage::Save, "metrics", results.metrics.len(), points)?;
    ensure_aligned(Stage::Save, "clusters", results.clusters.len(), points)?;
    ensure_aligned(Stage::Save, "novelty", results.novelty.len(), points)?;

    let table = results.solutions;
    let design_columns = DESIGN_COLUMNS
        .iter()
        .copied()
        .filter(|c| table.has_column(c))
        .collect::<Vec<_>>();

    let mut records = Vec::with_capacity(points);
    for (row, &[x_emb, y_emb]) in results.coords.iter().enumerate() {
        let masked = MaskedIds::from_row(table, row)?;
        let feature = &results.features[row];
        let metrics = &results.metrics[row];
        let cluster = &results.clusters[row];
        let novelty = &results.novelty[row];
        for other in [&feature.full_id, &metrics.full_id, &cluster.full_id, &novelty.full_id] {
            if *other != masked.full_id {
                bail!(
                    "save: row {row} is {} in the source table but {other} in an intermediate; rerun with --force",
                    masked.full_id
                );
            }
        }

        let design = design_columns
            .iter()
            .map(|&c| -> anyhow::Result<(String, String)> {
                let value = table.value(row, c)?.unwrap_or_default();
                Ok((c.to_owned(), value.to_owned()))
            })
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

        records.push(SolutionRecord {
            full_id: masked.full_id,
            participant_id: masked.participant,
            solution_id: masked.solution,
            group_id: masked.group,
            pre_post: masked.phase,
            x_emb,
            y_emb,
            original_participant: feature.ids.participant.clone(),
            original_group: feature.ids.group.clone(),
            original_solution: feature.ids.solution.clone(),
            original_phase: feature.ids.phase.clone(),
            fullid_orig: feature.fullid_orig.clone(),
            result: feature.result.clone(),
            budget_used: number(table, row, "budgetUsed")?,
            max_stress: number(table, row, "maxStress")?,
            video_preview: optional_text(table, row, "videoPreview")?,
            ca_sol: feature.core.ca_sol.clone(),
            ca_deck: feature.core.ca_deck.clone(),
            ca_str: feature.core.ca_str.clone(),
            ca_rck: feature.core.ca_rck.clone(),
            ca_mtr: feature.core.ca_mtr.clone(),
            ca_perf: feature.core.ca_perf,
            performance: feature.core.performance,
            total_length: feature.total_length,
            segments: feature.segments,
            joints: feature.joints,
            color: feature.color.clone(),
            hovertxt: cluster.hovertxt.clone(),
            cluster_id: cluster.cluster_id,
            clust_symb: cluster.clust_symb.clone(),
            n_clusters: cluster.n_clusters,
            n_clusters_pre: cluster.n_clusters_pre,
            n_clusters_post: cluster.n_clusters_post,
            total_distance_fs: metrics.total_distance_fs,
            total_distance_pre: metrics.total_distance_pre,
            total_distance_post: metrics.total_distance_post,
            area_perc_fs: metrics.area_perc_fs,
            area_perc_pre: metrics.area_perc_pre,
            area_perc_post: metrics.area_perc_post,
            novel_nn: novelty.novel_nn,
            novelty_norm: novelty.novelty_norm,
            design,
        });
    }
    Ok(records)
}

// absent columns read as missing values
fn optional_text(table: &Table, row: usize, column: &str) -> anyhow::Result<Option<String>> {
    if !table.has_column(column) {
        return Ok(None);
    }
    Ok(table.value(row, column)?.map(|v| v.trim().to_owned()))
}

fn number(table: &Table, row: usize, column: &str) -> anyhow::Result<Option<f64>> {
    optional_text(table, row, column)?
        .map(|v| {
            v.parse::<f64>()
                .with_context(|| format!("{column} of row {row} is not a number: {v}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_keys() {
        let manifest = Manifest::new(&PipelineConfig::default());
        let value = serde_json::to_value(&manifest).unwrap();
        for key in Manifest::KEYS {
            assert!(value.get(key).is_some(), "{key}");
        }
        assert_eq!(value["umap_params"]["NN"], 115);
        assert_eq!(value["umap_params"]["densm"], 2.0);
        assert_eq!(value["output_files"][0], BASE_FILE);
        let back: Manifest = serde_json::from_value(value).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn test_misaligned_results_are_rejected() {
        let table = Table::from_reader(
            "FullID,ParticipantID,SolutionID,GroupID,PrePost\nX1,R1,1,G1,K1\n".as_bytes(),
        )
        .unwrap();
        let results = StageResults {
            solutions: &table,
            coords: &[[0.0, 0.0], [1.0, 1.0]],
            features: &[],
            metrics: &[],
            clusters: &[],
            novelty: &[],
        };
        let err = build_records(&results).unwrap_err();
        assert!(err.to_string().contains("rerun with --force"));
    }
}
