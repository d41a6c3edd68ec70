//! The precompute pipeline.
//!
//! Each stage persists its result and later stages read it back. A stage is
//! recomputed when its files are missing or when it was forced; prerequisites
//! are resolved the same way, so running a late stage on a clean output
//! directory recomputes everything before it.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use anyhow::{Context as _, bail};
use dsviz_analysis::{
    distance::{AttributeSchema, distance_matrix},
    embedding::{Embedding, EmbeddingParams, embed},
    graph::NeighborGraph,
    matrix::DistanceMatrix,
};
use dsviz_data::{
    masking::{KeyKind, MaskingKeys},
    palette::{COLOR_COLUMN, PARTICIPANT_COLUMN},
    solution::IDENTITY_COLUMNS,
    table::Table,
};
use serde::{Deserialize, Serialize};

use crate::{config::PipelineConfig, util};

pub(crate) mod features;
pub(crate) mod metrics;
pub(crate) mod quant;
pub(crate) mod save;
pub(crate) mod validate;

pub(crate) const READ_FILE: &str = "df_read.csv";
pub(crate) const COLORS_FILE: &str = "df_colors.csv";
pub(crate) const DISTANCE_FILE: &str = "distmatrix.json";
pub(crate) const EMBEDDING_FILE: &str = "embedding.json";
pub(crate) const GRAPH_FILE: &str = "graph.json";
pub(crate) const UNMASK_FILE: &str = "df_unmask.csv";
pub(crate) const COLORS_UNMASK_FILE: &str = "df_colors_unmask.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub(crate) enum Stage {
    #[display("read")]
    Read,
    #[display("distance")]
    Distance,
    #[display("umap")]
    Umap,
    #[display("unmask")]
    Unmask,
    #[display("features")]
    Features,
    #[display("metrics")]
    Metrics,
    #[display("clusters")]
    Clusters,
    #[display("novelty")]
    Novelty,
    #[display("hulls")]
    Hulls,
    #[display("save")]
    Save,
}

impl Stage {
    pub(crate) const ALL: [Stage; 10] = [
        Stage::Read,
        Stage::Distance,
        Stage::Umap,
        Stage::Unmask,
        Stage::Features,
        Stage::Metrics,
        Stage::Clusters,
        Stage::Novelty,
        Stage::Hulls,
        Stage::Save,
    ];
}

/// Source and colour sheets as read.
#[derive(Debug, Clone)]
pub(crate) struct Inputs {
    pub solutions: Table,
    pub colors: Table,
}

/// Source and colour sheets with `OriginalID_*` columns added.
#[derive(Debug, Clone)]
pub(crate) struct Unmasked {
    pub solutions: Table,
    pub colors: Table,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEmbedding {
    coords: Vec<[f64; 2]>,
    params: EmbeddingParams,
}

#[derive(Debug)]
pub(crate) struct Pipeline {
    config: PipelineConfig,
    forced: HashSet<Stage>,
    // stages computed during this run; forcing them again would redo the work
    fresh: HashSet<Stage>,
}

impl Pipeline {
    pub(crate) fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            forced: HashSet::new(),
            fresh: HashSet::new(),
        }
    }

    /// Recomputes `stage` even if its files exist.
    pub(crate) fn force(mut self, stage: Stage) -> Self {
        self.forced.insert(stage);
        self
    }

    pub(crate) fn force_all(mut self) -> Self {
        self.forced.extend(Stage::ALL);
        self
    }

    pub(crate) fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn run(&mut self, stage: Stage) -> anyhow::Result<()> {
        match stage {
            Stage::Read => self.read().map(drop),
            Stage::Distance => self.distance().map(drop),
            Stage::Umap => self.umap().map(drop),
            Stage::Unmask => self.unmask().map(drop),
            Stage::Features => self.features().map(drop),
            Stage::Metrics => self.metrics().map(drop),
            Stage::Clusters => self.clusters().map(drop),
            Stage::Novelty => self.novelty().map(drop),
            Stage::Hulls => self.hulls().map(drop),
            Stage::Save => self.save(),
        }
    }

    pub(crate) fn run_all(&mut self) -> anyhow::Result<()> {
        for stage in Stage::ALL {
            self.run(stage)?;
        }
        Ok(())
    }

    fn is_cached(&self, stage: Stage, paths: &[&Path]) -> bool {
        let forced = self.forced.contains(&stage) && !self.fresh.contains(&stage);
        if forced || !paths.iter().all(|p| p.exists()) {
            return false;
        }
        log::debug!("{stage}: using cached {}", paths[0].display());
        true
    }

    fn computed(&mut self, stage: Stage) {
        self.fresh.insert(stage);
        log::info!("{stage}: done");
    }

    pub(crate) fn read(&mut self) -> anyhow::Result<Inputs> {
        let solutions_path = self.config.intermediate(READ_FILE);
        let colors_path = self.config.intermediate(COLORS_FILE);
        if self.is_cached(Stage::Read, &[&solutions_path, &colors_path]) {
            return Ok(Inputs {
                solutions: util::read_table_file("solutions", &solutions_path)?,
                colors: util::read_table_file("colors", &colors_path)?,
            });
        }

        let source = self.config.source_path();
        log::info!("read: reading {}", source.display());
        let solutions = util::read_table_file("source", &source)?;
        solutions
            .require_columns(IDENTITY_COLUMNS)
            .with_context(|| format!("Invalid source table: {}", source.display()))?;
        if solutions.is_empty() {
            bail!("Source table has no solutions: {}", source.display());
        }

        let colors_source = self.config.colors_path();
        let colors = util::read_table_file("colors", &colors_source)?;
        colors
            .require_columns([PARTICIPANT_COLUMN, COLOR_COLUMN])
            .with_context(|| format!("Invalid colors table: {}", colors_source.display()))?;
        log::info!(
            "read: {} solutions, {} colours",
            solutions.len(),
            colors.len()
        );

        util::write_table_file("solutions", &solutions, &solutions_path)?;
        util::write_table_file("colors", &colors, &colors_path)?;
        self.computed(Stage::Read);
        Ok(Inputs { solutions, colors })
    }

    pub(crate) fn distance(&mut self) -> anyhow::Result<DistanceMatrix> {
        let path = self.config.intermediate(DISTANCE_FILE);
        if self.is_cached(Stage::Distance, &[&path]) {
            return util::read_json_file("distance matrix", &path);
        }

        let inputs = self.read()?;
        let schema = self.schema()?;
        log::info!(
            "distance: {} solutions over {} attributes",
            inputs.solutions.len(),
            schema.columns().count()
        );
        let matrix = distance_matrix(&inputs.solutions, &schema)
            .context("Failed to compute the distance matrix")?;

        util::write_json_file(&matrix, &path)?;
        self.computed(Stage::Distance);
        Ok(matrix)
    }

    /// Attribute schema with the optional weights file applied.
    fn schema(&self) -> anyhow::Result<AttributeSchema> {
        let mut schema = self.config.schema.clone();
        let path = self.config.weights_path();
        if !path.exists() {
            return Ok(schema);
        }
        let table = util::read_table_file("weights", &path)?;
        let weights = weights_from_table(&table)
            .with_context(|| format!("Invalid weights table: {}", path.display()))?;
        let unused = schema.apply_weights(&weights);
        if !unused.is_empty() {
            log::warn!(
                "distance: weights for unknown attributes ignored: {}",
                unused.join(", ")
            );
        }
        log::info!("distance: {} weights from {}", weights.len(), path.display());
        Ok(schema)
    }

    pub(crate) fn umap(&mut self) -> anyhow::Result<Embedding> {
        let coords_path = self.config.intermediate(EMBEDDING_FILE);
        let graph_path = self.config.intermediate(GRAPH_FILE);
        if self.is_cached(Stage::Umap, &[&coords_path, &graph_path]) {
            let stored: StoredEmbedding = util::read_json_file("embedding", &coords_path)?;
            let graph: NeighborGraph = util::read_json_file("graph", &graph_path)?;
            return Ok(Embedding {
                coords: stored.coords,
                graph,
                params: stored.params,
            });
        }

        let matrix = self.distance()?;
        let params = &self.config.umap;
        log::info!(
            "umap: embedding {} solutions (n_neighbors = {}, min_dist = {}, dens_lambda = {}, seed = {})",
            matrix.len(),
            params.n_neighbors,
            params.min_dist,
            params.dens_lambda,
            params.seed
        );
        let embedding = embed(&matrix, params).context("Failed to embed the distance matrix")?;
        log::info!(
            "umap: neighbor graph with {} edges",
            embedding.graph.edges().len()
        );

        let stored = StoredEmbedding {
            coords: embedding.coords.clone(),
            params: embedding.params.clone(),
        };
        util::write_json_file(&stored, &coords_path)?;
        util::write_json_file(&embedding.graph, &graph_path)?;
        self.computed(Stage::Umap);
        Ok(embedding)
    }

    pub(crate) fn unmask(&mut self) -> anyhow::Result<Unmasked> {
        let solutions_path = self.config.intermediate(UNMASK_FILE);
        let colors_path = self.config.intermediate(COLORS_UNMASK_FILE);
        if self.is_cached(Stage::Unmask, &[&solutions_path, &colors_path]) {
            return Ok(Unmasked {
                solutions: util::read_table_file("unmasked solutions", &solutions_path)?,
                colors: util::read_table_file("unmasked colors", &colors_path)?,
            });
        }

        let inputs = self.read()?;
        let dir = self.config.masking_path();
        let keys = MaskingKeys::load(|kind: KeyKind| {
            util::read_table_file(
                "masking key",
                dir.join(format!("{}.csv", kind.sheet_name())),
            )
        })
        .with_context(|| format!("Failed to load masking keys from {}", dir.display()))?;

        let solutions = keys
            .unmask_table(&inputs.solutions)
            .context("Failed to unmask the source table")?;
        let colors = keys
            .unmask_colors(&inputs.colors)
            .context("Failed to unmask the colors table")?;
        let gallery = solutions
            .column_values(&KeyKind::Participant.original_column())?
            .iter()
            .filter(|v| v.is_none())
            .count();
        log::info!("unmask: {gallery} solutions without an original participant are gallery");

        util::write_table_file("unmasked solutions", &solutions, &solutions_path)?;
        util::write_table_file("unmasked colors", &colors, &colors_path)?;
        self.computed(Stage::Unmask);
        Ok(Unmasked { solutions, colors })
    }
}

fn weights_from_table(table: &Table) -> anyhow::Result<HashMap<String, f64>> {
    table.require_columns(["attribute", "weight"])?;
    let mut weights = HashMap::new();
    for row in 0..table.len() {
        let Some(name) = table.value(row, "attribute")? else {
            continue;
        };
        let value = table
            .value(row, "weight")?
            .with_context(|| format!("Missing weight for `{name}`"))?;
        let weight = value
            .trim()
            .parse::<f64>()
            .with_context(|| format!("Invalid weight for `{name}`: {value}"))?;
        weights.insert(name.trim().to_owned(), weight);
    }
    Ok(weights)
}

/// Fails unless every per-solution artifact has one entry per embedded point.
pub(crate) fn ensure_aligned(stage: Stage, what: &str, len: usize, points: usize) -> anyhow::Result<()> {
    if len != points {
        bail!(
            "{stage}: {what} has {len} rows but the embedding has {points} points; rerun with --force"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use dsviz_analysis::{
        coverage::{FULL_DESIGN_SPACE, HullRecord},
        distance::WeightedColumn,
        record::{DESIGN_COLUMNS, SolutionRecord},
    };

    use super::*;

    /// Writes a study of ten solutions by two participants under `root`.
    fn synthetic_study(root: &Path) -> PipelineConfig {
        let data_dir = root.join("data");
        let masking_dir = data_dir.join("MASKING_KEYS");
        fs::create_dir_all(&masking_dir).unwrap();

        let mut header = IDENTITY_COLUMNS.to_vec();
        header.extend(["result", "budgetUsed", "maxStress", "videoPreview"]);
        header.extend(DESIGN_COLUMNS);
        let mut source = Table::new(header.iter().copied()).unwrap();
        let types = ["arch", "beam", "truss"];
        let decks = ["single", "double"];
        let sizes = ["small", "large"];
        for i in 0..10_usize {
            let participant = if i < 5 { "R1" } else { "R2" };
            let phase = if i % 5 < 3 { "K1" } else { "K2" };
            let mut row = vec![
                format!("X{i}"),
                participant.to_owned(),
                format!("{}", 100 + i),
                "G9".to_owned(),
                phase.to_owned(),
                if i == 4 { "fail" } else { "pass" }.to_owned(),
                format!("{}", 5000 + 500 * i),
                "0.5".to_owned(),
                String::new(),
            ];
            for column in DESIGN_COLUMNS {
                let value = match column {
                    "type" => types[i % 3].to_owned(),
                    "deckType_1" => decks[i % 2].to_owned(),
                    "structureSize" => sizes[(i / 2) % 2].to_owned(),
                    "numAnchorsUsed" => format!("{}", 2 + (i * 7) % 4),
                    c if c.starts_with("material") => "yes".to_owned(),
                    _ => "-".to_owned(),
                };
                row.push(value);
            }
            source.push_row(row).unwrap();
        }
        source.write_path(data_dir.join("ExpData-100R-Expanded.csv")).unwrap();

        fs::write(
            data_dir.join("Colors.csv"),
            "P,HEX-Win\nR1,#1f77b4\nR2,#ff7f0e\n",
        )
        .unwrap();
        let sol_rows = (0..10)
            .map(|i| format!("{},{}.0", 100 + i, i % 5 + 1))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(
            masking_dir.join("SolutionMasking.csv"),
            format!("RandomID_Sol,OriginalID_Sol\n{sol_rows}\n"),
        )
        .unwrap();
        fs::write(
            masking_dir.join("ParticipantMasking.csv"),
            "RandomID_PT,OriginalID_PT\nR1,P01\nR2,P02\n",
        )
        .unwrap();
        fs::write(
            masking_dir.join("GroupMasking.csv"),
            "RandomID_Group,OriginalID_Group\nG9,G1\n",
        )
        .unwrap();
        fs::write(
            masking_dir.join("PrePostMasking.csv"),
            "RandomID_PrePost,OriginalID_PrePost\nK1,Pre\nK2,Pst\n",
        )
        .unwrap();

        let mut config = PipelineConfig {
            data_dir,
            output_dir: root.join("output"),
            ..PipelineConfig::default()
        };
        config.schema = AttributeSchema {
            categorical: ["type", "deckType_1", "structureSize"]
                .into_iter()
                .map(WeightedColumn::new)
                .collect(),
            numeric: vec![WeightedColumn::new("numAnchorsUsed")],
            materials: vec![],
            ..AttributeSchema::default()
        };
        config.umap.n_neighbors = 5;
        config.umap.n_epochs = Some(100);
        config
    }

    #[test]
    fn test_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = synthetic_study(dir.path());
        let mut pipeline = Pipeline::new(config.clone());
        pipeline.run_all().unwrap();

        let matrix: DistanceMatrix =
            util::read_json_file("matrix", config.intermediate(DISTANCE_FILE)).unwrap();
        assert_eq!(matrix.len(), 10);
        for i in 0..10 {
            assert_eq!(matrix.get(i, i), 0.0);
            for j in 0..10 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
            }
        }

        let records: Vec<SolutionRecord> =
            util::read_json_file("table", config.output(save::BASE_FILE)).unwrap();
        assert_eq!(records.len(), 10);
        for r in &records {
            assert!(r.x_emb.is_finite() && r.y_emb.is_finite());
            assert!((1..=10).contains(&r.cluster_id));
            assert!((0.0..=1.0).contains(&r.novel_nn));
        }
        assert_eq!(records[0].fullid_orig, "P01-Pre-1");
        assert_eq!(records[3].original_phase, "Pst");
        assert_eq!(records[4].ca_perf, 0);
        assert_eq!(records[0].color.as_deref(), Some("#1f77b4"));
        assert_eq!(records[1].design["type"], "beam");
        assert_eq!(records[2].design["numAnchorsUsed"], "4");

        let hulls: HashMap<String, HullRecord> =
            util::read_json_file("hulls", config.output(metrics::HULLS_FILE)).unwrap();
        assert_eq!(hulls.len(), 3);
        assert!(hulls[FULL_DESIGN_SPACE].area > 0.0);
        assert!(hulls["P01"].area > 0.0);
        assert!(hulls["P02"].area > 0.0);

        let report = validate::validate(&config);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
    }

    #[test]
    fn test_embedding_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let config = synthetic_study(dir.path());
        Pipeline::new(config.clone()).distance().unwrap();
        let a = Pipeline::new(config.clone()).force(Stage::Umap).umap().unwrap();
        let b = Pipeline::new(config).force(Stage::Umap).umap().unwrap();
        assert_eq!(a.coords, b.coords);
        assert_eq!(a.graph, b.graph);
    }

    #[test]
    fn test_cached_stage_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let config = synthetic_study(dir.path());
        Pipeline::new(config.clone()).read().unwrap();
        fs::remove_file(config.source_path()).unwrap();

        // distance reads the cached sheet
        let matrix = Pipeline::new(config.clone()).distance().unwrap();
        assert_eq!(matrix.len(), 10);

        let err = Pipeline::new(config).force(Stage::Read).read().unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read source table"));
    }

    #[test]
    fn test_weights_table() {
        let table = Table::from_reader("attribute,weight\ntype,2\nfoo,0.5\n,\n".as_bytes()).unwrap();
        let weights = weights_from_table(&table).unwrap();
        assert_eq!(weights.len(), 2);
        assert_eq!(weights["type"], 2.0);

        let bad = Table::from_reader("attribute,weight\ntype,heavy\n".as_bytes()).unwrap();
        assert!(weights_from_table(&bad).is_err());
    }
}
