use std::collections::BTreeMap;

use anyhow::Context as _;
use dsviz_analysis::{
    cluster::{ClusterAssignment, leiden},
    coverage::{CoveragePoint, CoverageReport, HullRecord},
    exploration::{ExplorationMetrics, ExplorationPoint, exploration_metrics},
    features::{CLUSTER_SYMBOLS, cluster_counts, cluster_symbol, hover_text},
    novelty::NoveltyScores,
};
use dsviz_data::solution::MaskedIds;
use serde::{Deserialize, Serialize};

use super::{Pipeline, Stage, ensure_aligned, features::FeatureRow};
use crate::util;

pub(crate) const METRICS_FILE: &str = "df_metrics.json";
pub(crate) const EXPLORATION_FILE: &str = "exploration.json";
pub(crate) const AREA_FILE: &str = "ds_area.json";
pub(crate) const CLUSTERS_FILE: &str = "df_clusters.json";
pub(crate) const NOVELTY_FILE: &str = "df_novelty.json";
pub(crate) const HULLS_FILE: &str = "convex_hulls.json";

/// Exploration distance and coverage of one solution's participant.
///
/// Every value is `None` for gallery solutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MetricsRow {
    #[serde(rename = "FullID")]
    pub full_id: String,
    #[serde(rename = "totaldist_FS")]
    pub total_distance_fs: Option<f64>,
    #[serde(rename = "totaldist_PRE")]
    pub total_distance_pre: Option<f64>,
    #[serde(rename = "totaldist_PST")]
    pub total_distance_post: Option<f64>,
    #[serde(rename = "Area-Perc-FS")]
    pub area_perc_fs: Option<f64>,
    #[serde(rename = "Area-Perc-PRE")]
    pub area_perc_pre: Option<f64>,
    #[serde(rename = "Area-Perc-POST")]
    pub area_perc_post: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct DesignSpaceArea {
    #[serde(rename = "DS_area")]
    pub area: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Metrics {
    pub rows: Vec<MetricsRow>,
    pub exploration: BTreeMap<String, ExplorationMetrics>,
    pub ds_area: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ClusterRow {
    #[serde(rename = "FullID")]
    pub full_id: String,
    pub cluster_id: usize,
    pub clust_symb: Option<String>,
    pub n_clusters: Option<usize>,
    pub n_clusters_pre: Option<usize>,
    pub n_clusters_post: Option<usize>,
    pub hovertxt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct NoveltyRow {
    #[serde(rename = "FullID")]
    pub full_id: String,
    pub novelty_norm: f64,
    pub novel_nn: f64,
}

impl Pipeline {
    pub(crate) fn metrics(&mut self) -> anyhow::Result<Metrics> {
        let rows_path = self.config.intermediate(METRICS_FILE);
        let exploration_path = self.config.intermediate(EXPLORATION_FILE);
        let area_path = self.config.intermediate(AREA_FILE);
        if self.is_cached(Stage::Metrics, &[&rows_path, &exploration_path, &area_path]) {
            let area: DesignSpaceArea = util::read_json_file("design-space area", &area_path)?;
            return Ok(Metrics {
                rows: util::read_json_file("metrics", &rows_path)?,
                exploration: util::read_json_file("exploration", &exploration_path)?,
                ds_area: area.area,
            });
        }

        let features = self.features()?;
        let embedding = self.umap()?;
        ensure_aligned(Stage::Metrics, "features", features.len(), embedding.coords.len())?;

        let metrics = compute_metrics(&features, &embedding.coords);
        log::info!(
            "metrics: design-space area {:.3}, {} participants",
            metrics.ds_area,
            metrics.exploration.len()
        );

        util::write_json_file(&metrics.rows, &rows_path)?;
        util::write_json_file(&metrics.exploration, &exploration_path)?;
        util::write_json_file(
            &DesignSpaceArea {
                area: metrics.ds_area,
            },
            &area_path,
        )?;
        self.computed(Stage::Metrics);
        Ok(metrics)
    }

    pub(crate) fn clusters(&mut self) -> anyhow::Result<Vec<ClusterRow>> {
        let path = self.config.intermediate(CLUSTERS_FILE);
        if self.is_cached(Stage::Clusters, &[&path]) {
            return util::read_json_file("clusters", &path);
        }

        let features = self.features()?;
        let embedding = self.umap()?;
        ensure_aligned(Stage::Clusters, "features", features.len(), embedding.graph.len())?;

        let params = &self.config.cluster;
        let assignment = leiden(&embedding.graph, params);
        log::info!(
            "clusters: {} clusters (resolution = {}, seed = {})",
            assignment.cluster_count(),
            params.resolution,
            params.seed
        );
        if assignment.cluster_count() > CLUSTER_SYMBOLS.len() {
            log::warn!(
                "clusters: clusters beyond {} have no marker symbol",
                CLUSTER_SYMBOLS.len()
            );
        }

        let rows = cluster_rows(&features, &assignment);
        util::write_json_file(&rows, &path)?;
        self.computed(Stage::Clusters);
        Ok(rows)
    }

    pub(crate) fn novelty(&mut self) -> anyhow::Result<Vec<NoveltyRow>> {
        let path = self.config.intermediate(NOVELTY_FILE);
        if self.is_cached(Stage::Novelty, &[&path]) {
            return util::read_json_file("novelty", &path);
        }

        let inputs = self.read()?;
        let embedding = self.umap()?;
        let ids = MaskedIds::all_from_table(&inputs.solutions)
            .context("Failed to read solution identifiers")?;
        ensure_aligned(Stage::Novelty, "source table", ids.len(), embedding.coords.len())?;

        let delta = self.config.novelty_delta;
        let scores = NoveltyScores::new(&embedding.coords, delta);
        log::info!("novelty: scored {} solutions (delta = {delta})", ids.len());

        let rows = ids
            .into_iter()
            .zip(scores.novelty_norm.into_iter().zip(scores.novel_nn))
            .map(|(ids, (novelty_norm, novel_nn))| NoveltyRow {
                full_id: ids.full_id,
                novelty_norm,
                novel_nn,
            })
            .collect::<Vec<_>>();
        util::write_json_file(&rows, &path)?;
        self.computed(Stage::Novelty);
        Ok(rows)
    }

    pub(crate) fn hulls(&mut self) -> anyhow::Result<BTreeMap<String, HullRecord>> {
        let path = self.config.output(HULLS_FILE);
        if self.is_cached(Stage::Hulls, &[&path]) {
            return util::read_json_file("convex hulls", &path);
        }

        let features = self.features()?;
        let embedding = self.umap()?;
        ensure_aligned(Stage::Hulls, "features", features.len(), embedding.coords.len())?;

        let report = CoverageReport::new(&coverage_points(&features, &embedding.coords));
        let hulls = report.hull_records();
        log::info!("hulls: {} participant hulls", hulls.len() - 1);

        util::write_json_file(&hulls, &path)?;
        self.computed(Stage::Hulls);
        Ok(hulls)
    }
}

fn coverage_points<'a>(features: &'a [FeatureRow], coords: &[[f64; 2]]) -> Vec<CoveragePoint<'a>> {
    features
        .iter()
        .zip(coords)
        .map(|(f, &coord)| CoveragePoint {
            participant: &f.ids.participant,
            phase: f.phase,
            coord,
        })
        .collect()
}

pub(crate) fn compute_metrics(features: &[FeatureRow], coords: &[[f64; 2]]) -> Metrics {
    let coverage = CoverageReport::new(&coverage_points(features, coords));
    let points = features
        .iter()
        .zip(coords)
        .map(|(f, &coord)| ExplorationPoint {
            participant: &f.ids.participant,
            phase: f.phase,
            solution: f.ids.solution.parse().unwrap_or(f64::INFINITY),
            coord,
        })
        .collect::<Vec<_>>();
    let exploration = exploration_metrics(&points);

    let rows = features
        .iter()
        .map(|f| {
            let distance = exploration.get(&f.ids.participant);
            let area = coverage.participant(&f.ids.participant);
            MetricsRow {
                full_id: f.full_id.clone(),
                total_distance_fs: distance.map(|d| d.total_fs),
                total_distance_pre: distance.map(|d| d.total_pre),
                total_distance_post: distance.map(|d| d.total_post),
                area_perc_fs: area.and_then(|a| a.perc_fs),
                area_perc_pre: area.and_then(|a| a.perc_pre),
                area_perc_post: area.and_then(|a| a.perc_post),
            }
        })
        .collect();

    Metrics {
        rows,
        exploration,
        ds_area: coverage.design_space_area(),
    }
}

pub(crate) fn cluster_rows(features: &[FeatureRow], assignment: &ClusterAssignment) -> Vec<ClusterRow> {
    let counts = cluster_counts(
        features
            .iter()
            .zip(assignment.labels())
            .map(|(f, &c)| (f.ids.participant.as_str(), f.phase, c)),
    );
    features
        .iter()
        .zip(assignment.labels())
        .map(|(f, &cluster_id)| {
            let count = counts.get(&f.ids.participant);
            ClusterRow {
                full_id: f.full_id.clone(),
                cluster_id,
                clust_symb: cluster_symbol(cluster_id).map(str::to_owned),
                n_clusters: count.map(|c| c.n_clusters),
                n_clusters_pre: count.map(|c| c.n_clusters_pre),
                n_clusters_post: count.map(|c| c.n_clusters_post),
                hovertxt: hover_text(&f.ids, &f.result),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use dsviz_analysis::features::CoreAttributes;
    use dsviz_data::{masking::OriginalIds, solution::Phase};

    use super::*;

    fn feature(participant: &str, phase: Phase, solution: &str) -> FeatureRow {
        FeatureRow {
            full_id: format!("{participant}-{solution}"),
            ids: OriginalIds {
                participant: participant.to_owned(),
                group: "G1".to_owned(),
                phase: phase.code().to_owned(),
                solution: solution.to_owned(),
            },
            phase,
            fullid_orig: format!("{participant}-{}-{solution}", phase.code()),
            result: "pass".to_owned(),
            core: CoreAttributes {
                ca_sol: String::new(),
                ca_deck: String::new(),
                ca_str: String::new(),
                ca_rck: String::new(),
                ca_mtr: String::new(),
                ca_perf: 1,
                performance: 1.0,
            },
            total_length: None,
            segments: None,
            joints: None,
            color: None,
        }
    }

    fn study() -> (Vec<FeatureRow>, Vec<[f64; 2]>) {
        let features = vec![
            feature("P01", Phase::Pre, "1"),
            feature("P01", Phase::Pre, "2"),
            feature("P01", Phase::Post, "3"),
            feature("GALL", Phase::Gallery, "17"),
        ];
        let coords = vec![[0.0, 0.0], [4.0, 0.0], [4.0, 3.0], [0.0, 6.0]];
        (features, coords)
    }

    #[test]
    fn test_compute_metrics() {
        let (features, coords) = study();
        let metrics = compute_metrics(&features, &coords);
        assert_eq!(metrics.ds_area, 18.0);
        assert_eq!(metrics.exploration.len(), 1);

        let first = &metrics.rows[0];
        assert_eq!(first.total_distance_fs, Some(7.0));
        assert_eq!(first.total_distance_pre, Some(4.0));
        assert_eq!(first.total_distance_post, Some(0.0));
        // triangle (0,0) (4,0) (4,3) has area 6
        assert!((first.area_perc_fs.unwrap() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(first.area_perc_pre, Some(0.0));

        let gallery = &metrics.rows[3];
        assert_eq!(gallery.total_distance_fs, None);
        assert_eq!(gallery.area_perc_fs, None);
    }

    #[test]
    fn test_cluster_rows() {
        let (features, _) = study();
        let assignment = ClusterAssignment::from_labels(&[0, 0, 1, 2]);
        let rows = cluster_rows(&features, &assignment);
        assert_eq!(rows[0].cluster_id, 1);
        assert_eq!(rows[2].cluster_id, 2);
        assert_eq!(rows[2].clust_symb.as_deref(), Some(CLUSTER_SYMBOLS[1]));
        assert_eq!(rows[0].n_clusters, Some(2));
        assert_eq!(rows[0].n_clusters_pre, Some(1));
        assert_eq!(rows[0].n_clusters_post, Some(1));
        assert_eq!(rows[3].n_clusters, None);
        assert_eq!(rows[0].hovertxt, "<b>P01 | Sol. 1</b><br>Pre | pass");
    }
}
