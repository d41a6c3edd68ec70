//! Records of the final solution table and its metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::features::CLUSTER_SYMBOLS;

/// Coded design-attribute columns carried through to the final table as strings.
pub const DESIGN_COLUMNS: [&str; 20] = [
    "type",
    "numAnchorsUsed",
    "deckType_1",
    "deckType_2",
    "deckShape_1",
    "deckShape_2",
    "deckShape_3",
    "deckShape_4",
    "structurePosition_Top",
    "structurePosition_Rock",
    "structurePosition_Bottom",
    "structureShape_1",
    "structureShape_2",
    "structureSize",
    "rockSupportShape",
    "rockSupportMat",
    "materialRoad",
    "materialReinfRoad",
    "materialWood",
    "materialSteel",
];

/// Columns every record of the final table must carry.
pub const REQUIRED_COLUMNS: [&str; 60] = [
    "FullID",
    "ParticipantID",
    "SolutionID",
    "GroupID",
    "x_emb",
    "y_emb",
    "OriginalID_PT",
    "OriginalID_Group",
    "OriginalID_Sol",
    "OriginalID_PrePost",
    "result",
    "budgetUsed",
    "maxStress",
    "ca_sol",
    "ca_deck",
    "ca_str",
    "ca_rck",
    "ca_mtr",
    "ca_perf",
    "performance",
    "TLength",
    "NSegm",
    "NJoint",
    "HEX-Win",
    "hovertxt",
    "clust_symb",
    "videoPreview",
    "fullid_orig",
    "cluster_id",
    "n_clusters",
    "n_clusters_pre",
    "n_clusters_post",
    "totaldist_FS",
    "totaldist_PRE",
    "totaldist_PST",
    "Area-Perc-FS",
    "Area-Perc-PRE",
    "Area-Perc-POST",
    "novel_nn",
    "novelty_norm",
    "type",
    "numAnchorsUsed",
    "deckType_1",
    "deckType_2",
    "deckShape_1",
    "deckShape_2",
    "deckShape_3",
    "deckShape_4",
    "structurePosition_Top",
    "structurePosition_Rock",
    "structurePosition_Bottom",
    "structureShape_1",
    "structureShape_2",
    "structureSize",
    "rockSupportShape",
    "rockSupportMat",
    "materialRoad",
    "materialReinfRoad",
    "materialWood",
    "materialSteel",
];

/// One solution of the final table.
///
/// Values that are undefined for a solution (gallery coverage, unmatched
/// save files, missing outcomes) are `None` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    #[serde(rename = "FullID")]
    pub full_id: String,
    #[serde(rename = "ParticipantID")]
    pub participant_id: String,
    #[serde(rename = "SolutionID")]
    pub solution_id: String,
    #[serde(rename = "GroupID")]
    pub group_id: String,
    #[serde(rename = "PrePost")]
    pub pre_post: String,

    pub x_emb: f64,
    pub y_emb: f64,

    #[serde(rename = "OriginalID_PT")]
    pub original_participant: String,
    #[serde(rename = "OriginalID_Group")]
    pub original_group: String,
    #[serde(rename = "OriginalID_Sol")]
    pub original_solution: String,
    #[serde(rename = "OriginalID_PrePost")]
    pub original_phase: String,
    pub fullid_orig: String,

    pub result: String,
    #[serde(rename = "budgetUsed")]
    pub budget_used: Option<f64>,
    #[serde(rename = "maxStress")]
    pub max_stress: Option<f64>,
    #[serde(rename = "videoPreview")]
    pub video_preview: Option<String>,

    pub ca_sol: String,
    pub ca_deck: String,
    pub ca_str: String,
    pub ca_rck: String,
    pub ca_mtr: String,
    pub ca_perf: u8,
    pub performance: f64,

    #[serde(rename = "TLength")]
    pub total_length: Option<f64>,
    #[serde(rename = "NSegm")]
    pub segments: Option<usize>,
    #[serde(rename = "NJoint")]
    pub joints: Option<usize>,

    #[serde(rename = "HEX-Win")]
    pub color: Option<String>,
    pub hovertxt: String,

    pub cluster_id: usize,
    pub clust_symb: Option<String>,
    pub n_clusters: Option<usize>,
    pub n_clusters_pre: Option<usize>,
    pub n_clusters_post: Option<usize>,

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

    pub novel_nn: f64,
    pub novelty_norm: f64,

    /// Coded design attributes, keyed by column name.
    #[serde(flatten)]
    pub design: BTreeMap<String, String>,
}

impl SolutionRecord {
    /// Names of the [`REQUIRED_COLUMNS`] that `keys` lacks.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dsviz_analysis::record::{REQUIRED_COLUMNS, SolutionRecord};
    /// let missing = SolutionRecord::missing_columns(["FullID", "x_emb"]);
    /// assert_eq!(missing.len(), REQUIRED_COLUMNS.len() - 2);
    /// assert!(!missing.contains(&"FullID"));
    /// ```
    pub fn missing_columns<'a, I>(keys: I) -> Vec<&'static str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keys = keys.into_iter().collect::<Vec<_>>();
        REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !keys.contains(c))
            .collect()
    }
}

/// Metadata consumed alongside the final table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Original participant IDs, sorted, gallery included.
    pub participant_ids: Vec<String>,
    /// Participant colour by original participant ID.
    pub color_mapping: BTreeMap<String, String>,
    /// Area of the design-space hull.
    pub ds_area: f64,
    /// Marker symbol by cluster id.
    pub cluster_symbols: BTreeMap<usize, String>,
    pub ids_list: Vec<String>,
}

impl Metadata {
    /// Keys of the serialized metadata object.
    pub const KEYS: [&str; 5] = [
        "participant_ids",
        "color_mapping",
        "ds_area",
        "cluster_symbols",
        "ids_list",
    ];

    /// Builds the metadata of a final table.
    ///
    /// The colour of a participant is the colour of their first record that
    /// has one.
    #[must_use]
    pub fn from_records(records: &[SolutionRecord], ds_area: f64) -> Self {
        let mut ids = records
            .iter()
            .map(|r| r.original_participant.clone())
            .collect::<Vec<_>>();
        ids.sort();
        ids.dedup();

        let mut color_mapping = BTreeMap::new();
        for r in records {
            if let Some(color) = &r.color {
                color_mapping
                    .entry(r.original_participant.clone())
                    .or_insert_with(|| color.clone());
            }
        }

        Self {
            participant_ids: ids.clone(),
            color_mapping,
            ds_area,
            cluster_symbols: cluster_symbol_map(),
            ids_list: ids,
        }
    }
}

fn cluster_symbol_map() -> BTreeMap<usize, String> {
    CLUSTER_SYMBOLS
        .iter()
        .enumerate()
        .map(|(i, s)| (i + 1, (*s).to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> SolutionRecord {
        SolutionRecord {
            full_id: "X1".to_owned(),
            participant_id: "R11".to_owned(),
            solution_id: "901".to_owned(),
            group_id: "G9".to_owned(),
            pre_post: "KYY".to_owned(),
            x_emb: 1.5,
            y_emb: -2.0,
            original_participant: "P01".to_owned(),
            original_group: "G1".to_owned(),
            original_solution: "1".to_owned(),
            original_phase: "Pre".to_owned(),
            fullid_orig: "P01-Pre-1".to_owned(),
            result: "pass".to_owned(),
            budget_used: Some(7500.0),
            max_stress: None,
            video_preview: None,
            ca_sol: "arch | 2 anchors".to_owned(),
            ca_deck: String::new(),
            ca_str: String::new(),
            ca_rck: "no_support".to_owned(),
            ca_mtr: "road".to_owned(),
            ca_perf: 1,
            performance: 2.0,
            total_length: Some(31.5),
            segments: Some(12),
            joints: None,
            color: Some("#1f77b4".to_owned()),
            hovertxt: "<b>P01 | Sol. 1</b><br>Pre | pass".to_owned(),
            cluster_id: 3,
            clust_symb: Some("cross".to_owned()),
            n_clusters: Some(2),
            n_clusters_pre: Some(1),
            n_clusters_post: None,
            total_distance_fs: Some(4.0),
            total_distance_pre: Some(4.0),
            total_distance_post: Some(0.0),
            area_perc_fs: Some(12.5),
            area_perc_pre: None,
            area_perc_post: None,
            novel_nn: 0.5,
            novelty_norm: 0.25,
            design: DESIGN_COLUMNS
                .iter()
                .map(|c| ((*c).to_owned(), "1".to_owned()))
                .collect(),
        }
    }

    #[test]
    fn test_serialized_record_has_required_columns() {
        let value = serde_json::to_value(sample_record()).unwrap();
        let object = value.as_object().unwrap();
        let missing = SolutionRecord::missing_columns(object.keys().map(String::as_str));
        assert!(missing.is_empty(), "{missing:?}");
        // coded attributes stay strings
        assert_eq!(object["numAnchorsUsed"], "1");
        assert!(object["Area-Perc-PRE"].is_null());
    }

    #[test]
    fn test_record_json_round_trip_keeps_strings() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: SolutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.design["materialRoad"], "1");
    }

    #[test]
    fn test_metadata() {
        let mut gallery = sample_record();
        gallery.original_participant = "GALL".to_owned();
        gallery.color = None;
        let records = [sample_record(), gallery, sample_record()];
        let metadata = Metadata::from_records(&records, 80.0);
        assert_eq!(metadata.participant_ids, vec!["GALL", "P01"]);
        assert_eq!(metadata.color_mapping.len(), 1);
        assert_eq!(metadata.cluster_symbols[&1], "circle");
        assert_eq!(metadata.cluster_symbols.len(), 16);

        let value = serde_json::to_value(&metadata).unwrap();
        for key in Metadata::KEYS {
            assert!(value.get(key).is_some(), "{key}");
        }
        let back: Metadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, metadata);
    }
}
