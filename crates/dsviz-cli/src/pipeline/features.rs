use std::collections::HashMap;

use anyhow::Context as _;
use dsviz_analysis::features::CoreAttributes;
use dsviz_data::{
    masking::OriginalIds,
    palette::ColorTable,
    savefile::SolutionSummary,
    solution::{MaskedIds, Phase, original_full_id},
    table::Table,
};
use serde::{Deserialize, Serialize};

use super::{Pipeline, Stage, quant};
use crate::util;

pub(crate) const FEATURES_FILE: &str = "df_features.json";

/// Identifiers and descriptive attributes of one solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct FeatureRow {
    #[serde(rename = "FullID")]
    pub full_id: String,
    pub ids: OriginalIds,
    pub phase: Phase,
    pub fullid_orig: String,
    pub result: String,
    #[serde(flatten)]
    pub core: CoreAttributes,
    #[serde(rename = "TLength")]
    pub total_length: Option<f64>,
    #[serde(rename = "NSegm")]
    pub segments: Option<usize>,
    #[serde(rename = "NJoint")]
    pub joints: Option<usize>,
    #[serde(rename = "HEX-Win")]
    pub color: Option<String>,
}

impl Pipeline {
    pub(crate) fn features(&mut self) -> anyhow::Result<Vec<FeatureRow>> {
        let path = self.config.intermediate(FEATURES_FILE);
        if self.is_cached(Stage::Features, &[&path]) {
            return util::read_json_file("features", &path);
        }

        let unmasked = self.unmask()?;
        let colors =
            ColorTable::from_table(&unmasked.colors).context("Failed to read participant colours")?;

        let save_dir = self.config.save_path();
        let summaries = if save_dir.is_dir() {
            quant::summarize_save_dir(&save_dir)?
                .into_iter()
                .map(|s| (s.fullid_orig.clone(), s))
                .collect()
        } else {
            log::warn!(
                "features: save directory {} not found, TLength, NSegm and NJoint are N/A",
                save_dir.display()
            );
            HashMap::new()
        };

        let rows = build_features(&unmasked.solutions, &colors, &summaries)?;
        util::write_json_file(&rows, &path)?;
        self.computed(Stage::Features);
        Ok(rows)
    }
}

/// Derives the feature rows of an unmasked source table.
///
/// Save summaries are matched by original full ID; colours by masked
/// participant, then by original participant.
pub(crate) fn build_features(
    unmasked: &Table,
    colors: &ColorTable,
    summaries: &HashMap<String, SolutionSummary>,
) -> anyhow::Result<Vec<FeatureRow>> {
    let mut rows = Vec::with_capacity(unmasked.len());
    let mut unmatched = 0;
    let mut uncolored = 0;

    for row in 0..unmasked.len() {
        let masked = MaskedIds::from_row(unmasked, row)?;
        let ids = OriginalIds::resolve(unmasked, row)
            .with_context(|| format!("Failed to resolve original IDs of {}", masked.full_id))?;
        let phase = ids
            .phase
            .parse::<Phase>()
            .with_context(|| format!("Invalid phase of {}", masked.full_id))?;
        let core = CoreAttributes::from_row(unmasked, row)
            .with_context(|| format!("Failed to derive attributes of {}", masked.full_id))?;
        let result = unmasked
            .value(row, "result")?
            .unwrap_or_default()
            .trim()
            .to_owned();

        let fullid_orig = original_full_id(&ids.participant, &ids.phase, &ids.solution);
        let summary = summaries.get(&fullid_orig);
        if summary.is_none() {
            unmatched += 1;
        }
        let color = colors
            .color_for(&masked.participant)
            .or_else(|| colors.color_for(&ids.participant))
            .map(str::to_owned);
        if color.is_none() {
            uncolored += 1;
        }

        rows.push(FeatureRow {
            full_id: masked.full_id,
            ids,
            phase,
            fullid_orig,
            result,
            core,
            total_length: summary.map(|s| s.total_length),
            segments: summary.map(|s| s.num_segments),
            joints: summary.map(|s| s.num_joints),
            color,
        });
    }

    if unmatched > 0 {
        log::info!("features: {unmatched} solutions have no save file");
    }
    if uncolored > 0 {
        log::warn!("features: {uncolored} solutions have no participant colour");
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use dsviz_data::savefile::SaveLayout;

    use super::*;

    const HEADER: &str = "FullID,ParticipantID,SolutionID,GroupID,PrePost,\
        OriginalID_Sol,OriginalID_PT,OriginalID_Group,OriginalID_PrePost,\
        type,numAnchorsUsed,deckType_1,deckType_2,deckShape_1,deckShape_2,deckShape_3,deckShape_4,\
        structurePosition_Top,structurePosition_Rock,structurePosition_Bottom,\
        structureShape_1,structureShape_2,structureSize,rockSupportShape,rockSupportMat,\
        materialRoad,materialReinfRoad,materialWood,materialSteel,result,budgetUsed";

    fn table() -> Table {
        let csv = format!(
            "{HEADER}\n\
             X1,R1,101,G9,K1,3.0,P07,G1,Pre,arch,2,single,double,flat,-,-,-,-,-,-,-,-,small,no_support,-,yes,no,no,no,pass,7500\n\
             X2,R9,17,G0,K0,,,,,beam,2,single,double,flat,-,-,-,-,-,-,-,-,small,no_support,-,yes,no,no,no,fail,9000\n"
        );
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_build_features() {
        let colors = ColorTable::from_table(
            &Table::from_reader("P,HEX-Win\nR1,#111111\n".as_bytes()).unwrap(),
        )
        .unwrap();
        let layout: SaveLayout = serde_json::from_str(
            r#"{ "anchors": [{ "guid": "a", "pos": { "x": 0, "y": 0 } }],
                 "joints": [{ "guid": "b", "pos": { "x": 3, "y": 4 } }],
                 "edges": [{ "materialType": 1, "nodeAGuid": "a", "nodeBGuid": "b" }] }"#,
        )
        .unwrap();
        let summary = SolutionSummary::from_layout("P07-Pre-3", &layout).unwrap();
        let summaries = HashMap::from([(summary.fullid_orig.clone(), summary)]);

        let rows = build_features(&table(), &colors, &summaries).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.fullid_orig, "P07-Pre-3");
        assert_eq!(first.phase, Phase::Pre);
        assert_eq!(first.total_length, Some(5.0));
        assert_eq!(first.segments, Some(1));
        assert_eq!(first.joints, Some(2));
        assert_eq!(first.color.as_deref(), Some("#111111"));
        assert_eq!(first.core.performance, 2.0);

        let gallery = &rows[1];
        assert_eq!(gallery.phase, Phase::Gallery);
        assert_eq!(gallery.fullid_orig, "GALL-GALL-17");
        assert_eq!(gallery.total_length, None);
        assert_eq!(gallery.color, None);
        assert_eq!(gallery.core.ca_perf, 0);
    }

    #[test]
    fn test_feature_row_json_round_trip() {
        let rows = build_features(&table(), &ColorTable::default(), &HashMap::new()).unwrap();
        let json = serde_json::to_string(&rows).unwrap();
        assert!(json.contains("\"ca_sol\":\"arch | 2 anchors\""));
        let back: Vec<FeatureRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rows);
    }
}
