//! Parsed bridge layouts and their quantitative summary.
//!
//! Game save files are binary; an external parser turns them into JSON. Two
//! shapes of that JSON are accepted:
//!
//! - the parser's own layout, with level anchors at the top level and the
//!   bridge (`joints`, `edges`) nested under `bridge`
//! - a flat layout using the game's serialized field names
//!   (`m_Anchors`, `m_BridgeJoints`, `m_BridgeEdges`, `m_Guid`, `m_Pos`,
//!   `m_MaterialType`, `m_NodeAGuid`, `m_NodeBGuid`)
//!
//! [`SolutionSummary`] condenses a layout into one row of the quantitative
//! dataset: lengths, costs, material usage, anchor usage, connectivity and
//! edge angles.
//!
//! # Examples
//!
//! ```
//! use dsviz_data::savefile::{SaveLayout, SolutionSummary};
//!
//! let json = r#"{
//!   "anchors": [
//!     {"guid": "L", "pos": {"x": 0.0, "y": 5.0}},
//!     {"guid": "R", "pos": {"x": 3.0, "y": 5.0}}
//!   ],
//!   "bridge": {
//!     "joints": [{"guid": "J", "pos": {"x": 0.0, "y": 1.0}}],
//!     "edges": [
//!       {"materialType": 1, "nodeAGuid": "L", "nodeBGuid": "R"},
//!       {"materialType": 3, "nodeAGuid": "L", "nodeBGuid": "J"}
//!     ]
//!   }
//! }"#;
//! let layout: SaveLayout = serde_json::from_str(json).unwrap();
//! let summary = SolutionSummary::from_layout("P01-Pre-1", &layout).unwrap();
//! assert_eq!(summary.total_length, 7.0);
//! assert_eq!(summary.num_segments, 2);
//! assert_eq!(summary.total_cost, 3.0 * 200.0 + 4.0 * 180.0);
//! ```

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

/// Bridge building material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Material {
    Road,
    ReinforcedRoad,
    Wood,
    Steel,
    Rope,
    Cable,
    Hydraulic,
    Spring,
}

impl Material {
    pub const ALL: [Material; 8] = [
        Material::Road,
        Material::ReinforcedRoad,
        Material::Wood,
        Material::Steel,
        Material::Rope,
        Material::Cable,
        Material::Hydraulic,
        Material::Spring,
    ];

    /// Material for a save-file material code (1-based).
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        let index = usize::try_from(code).ok()?.checked_sub(1)?;
        Self::ALL.get(index).copied()
    }

    /// Cost of one unit of length.
    #[must_use]
    pub fn cost_per_length(self) -> f64 {
        match self {
            Material::Road => 200.0,
            Material::ReinforcedRoad | Material::Cable => 400.0,
            Material::Wood => 180.0,
            Material::Steel | Material::Hydraulic => 450.0,
            Material::Rope => 220.0,
            Material::Spring => 330.0,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Material::Road => "road",
            Material::ReinforcedRoad => "reinforced road",
            Material::Wood => "wood",
            Material::Steel => "steel",
            Material::Rope => "rope",
            Material::Cable => "cable",
            Material::Hydraulic => "hydro",
            Material::Spring => "spring",
        }
    }

    /// Road surfaces carry traffic.
    #[must_use]
    pub fn is_road(self) -> bool {
        matches!(self, Material::Road | Material::ReinforcedRoad)
    }

    /// Rigid supports hold the deck up.
    #[must_use]
    pub fn is_support(self) -> bool {
        matches!(self, Material::Wood | Material::Steel)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// An anchor or joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(alias = "m_Guid")]
    pub guid: String,
    #[serde(alias = "m_Pos")]
    pub pos: Position,
}

/// A segment between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(alias = "m_MaterialType")]
    pub material_type: u32,
    #[serde(alias = "m_NodeAGuid")]
    pub node_a_guid: String,
    #[serde(alias = "m_NodeBGuid")]
    pub node_b_guid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawBridge {
    #[serde(default, alias = "m_Anchors")]
    anchors: Vec<Node>,
    #[serde(default, alias = "m_BridgeJoints")]
    joints: Vec<Node>,
    #[serde(default, alias = "m_BridgeEdges")]
    edges: Vec<Edge>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawLayout {
    Nested {
        #[serde(default, alias = "m_Anchors")]
        anchors: Vec<Node>,
        #[serde(alias = "m_Bridge")]
        bridge: RawBridge,
    },
    Flat(RawBridge),
}

impl From<RawLayout> for SaveLayout {
    fn from(raw: RawLayout) -> Self {
        match raw {
            RawLayout::Nested { anchors, bridge } => {
                let anchors = if anchors.is_empty() {
                    bridge.anchors
                } else {
                    anchors
                };
                SaveLayout {
                    anchors,
                    joints: bridge.joints,
                    edges: bridge.edges,
                }
            }
            RawLayout::Flat(bridge) => SaveLayout {
                anchors: bridge.anchors,
                joints: bridge.joints,
                edges: bridge.edges,
            },
        }
    }
}

/// Bridge layout of one save file.
///
/// Anchors are in level order: left, right, then the middle anchor if the
/// level has one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawLayout")]
pub struct SaveLayout {
    pub anchors: Vec<Node>,
    pub joints: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Error raised when a layout cannot be summarized.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum SummaryError {
    #[display("edge {edge} references unknown node `{guid}`")]
    UnknownNode { edge: usize, guid: String },
    #[display("edge {edge} has unknown material code {code}")]
    UnknownMaterial { edge: usize, code: u32 },
}

/// Usage of one level anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnchorUsage {
    pub used: bool,
    pub segments: usize,
}

/// Quantitative summary of one solution, one row of the quantitative dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSummary {
    pub fullid_orig: String,
    #[serde(rename = "TLength")]
    pub total_length: f64,
    #[serde(rename = "NSegm")]
    pub num_segments: usize,
    /// Anchors plus joints of the layout.
    #[serde(rename = "NJoint")]
    pub num_joints: usize,
    #[serde(rename = "TCost")]
    pub total_cost: f64,

    #[serde(rename = "NSegmRoad")]
    pub road_segments: usize,
    #[serde(rename = "LenRoad")]
    pub road_length: f64,
    #[serde(rename = "NSegmReinfRoad")]
    pub reinforced_road_segments: usize,
    #[serde(rename = "LenReinfRoad")]
    pub reinforced_road_length: f64,
    #[serde(rename = "NSegmWood")]
    pub wood_segments: usize,
    #[serde(rename = "LenWood")]
    pub wood_length: f64,
    #[serde(rename = "NSegmSteel")]
    pub steel_segments: usize,
    #[serde(rename = "LenSteel")]
    pub steel_length: f64,

    #[serde(rename = "LeftAnc")]
    pub left_anchor: u8,
    #[serde(rename = "MidAnc")]
    pub mid_anchor: u8,
    #[serde(rename = "RightAnc")]
    pub right_anchor: u8,
    #[serde(rename = "NSegmLeftAnc")]
    pub left_anchor_segments: usize,
    #[serde(rename = "NSegmMidAnc")]
    pub mid_anchor_segments: usize,
    #[serde(rename = "NSegmRightAnc")]
    pub right_anchor_segments: usize,

    /// Segments per node touched by a segment.
    #[serde(rename = "StructDensity")]
    pub struct_density: f64,

    #[serde(rename = "NConnecSupRoad")]
    pub support_road_connections: usize,
    #[serde(rename = "NConnecRoadRoad")]
    pub road_road_connections: usize,
    #[serde(rename = "NConnecSupSup")]
    pub support_support_connections: usize,

    /// Mean absolute angle to the horizontal of road segments, in degrees.
    #[serde(rename = "AvgAngleRoad")]
    pub avg_angle_road: f64,
    /// Mean absolute angle to the horizontal of support segments, in degrees.
    #[serde(rename = "AvgAngleSup")]
    pub avg_angle_support: f64,
}

impl SolutionSummary {
    /// Summarizes a layout.
    #[expect(clippy::cast_precision_loss)]
    pub fn from_layout(fullid_orig: &str, layout: &SaveLayout) -> Result<Self, SummaryError> {
        let positions = layout
            .anchors
            .iter()
            .chain(&layout.joints)
            .map(|n| (n.guid.as_str(), n.pos))
            .collect::<HashMap<_, _>>();

        let mut segments = Vec::with_capacity(layout.edges.len());
        for (i, edge) in layout.edges.iter().enumerate() {
            let material =
                Material::from_code(edge.material_type).ok_or(SummaryError::UnknownMaterial {
                    edge: i,
                    code: edge.material_type,
                })?;
            let lookup = |guid: &str| {
                positions
                    .get(guid)
                    .copied()
                    .ok_or_else(|| SummaryError::UnknownNode {
                        edge: i,
                        guid: guid.to_owned(),
                    })
            };
            let a = lookup(&edge.node_a_guid)?;
            let b = lookup(&edge.node_b_guid)?;
            segments.push(Segment { edge, material, a, b });
        }

        let mut length_by_material = HashMap::<Material, f64>::new();
        let mut count_by_material = HashMap::<Material, usize>::new();
        for s in &segments {
            *length_by_material.entry(s.material).or_default() += s.length();
            *count_by_material.entry(s.material).or_default() += 1;
        }
        let length = |m| length_by_material.get(&m).copied().unwrap_or(0.0);
        let count = |m| count_by_material.get(&m).copied().unwrap_or(0);

        let total_length = segments.iter().map(Segment::length).sum::<f64>();
        let total_cost = segments
            .iter()
            .map(|s| s.length() * s.material.cost_per_length())
            .sum::<f64>();

        // materials of the segments meeting at each used node
        let mut node_materials = HashMap::<&str, Vec<Material>>::new();
        for s in &segments {
            node_materials
                .entry(s.edge.node_a_guid.as_str())
                .or_default()
                .push(s.material);
            node_materials
                .entry(s.edge.node_b_guid.as_str())
                .or_default()
                .push(s.material);
        }
        let used_nodes = node_materials.len();

        let anchor_usage = |index: usize| -> AnchorUsage {
            let Some(anchor) = layout.anchors.get(index) else {
                return AnchorUsage::default();
            };
            let segments = segments
                .iter()
                .map(|s| {
                    usize::from(s.edge.node_a_guid == anchor.guid)
                        + usize::from(s.edge.node_b_guid == anchor.guid)
                })
                .sum::<usize>();
            AnchorUsage {
                used: segments > 0,
                segments,
            }
        };
        let left = anchor_usage(0);
        let right = anchor_usage(1);
        let mid = anchor_usage(2);

        let mut connections = ConnectionCounts::default();
        for materials in node_materials.values() {
            connections.add(materials);
        }

        let mean_angle = |pred: fn(Material) -> bool| {
            let angles = segments
                .iter()
                .filter(|s| pred(s.material))
                .map(Segment::angle_degrees)
                .collect::<Vec<_>>();
            if angles.is_empty() {
                0.0
            } else {
                angles.iter().sum::<f64>() / angles.len() as f64
            }
        };

        Ok(Self {
            fullid_orig: fullid_orig.to_owned(),
            total_length,
            num_segments: segments.len(),
            num_joints: layout.anchors.len() + layout.joints.len(),
            total_cost,
            road_segments: count(Material::Road),
            road_length: length(Material::Road),
            reinforced_road_segments: count(Material::ReinforcedRoad),
            reinforced_road_length: length(Material::ReinforcedRoad),
            wood_segments: count(Material::Wood),
            wood_length: length(Material::Wood),
            steel_segments: count(Material::Steel),
            steel_length: length(Material::Steel),
            left_anchor: u8::from(left.used),
            mid_anchor: u8::from(mid.used),
            right_anchor: u8::from(right.used),
            left_anchor_segments: left.segments,
            mid_anchor_segments: mid.segments,
            right_anchor_segments: right.segments,
            struct_density: if used_nodes == 0 {
                0.0
            } else {
                segments.len() as f64 / used_nodes as f64
            },
            support_road_connections: connections.support_road,
            road_road_connections: connections.road_road,
            support_support_connections: connections.support_support,
            avg_angle_road: mean_angle(Material::is_road),
            avg_angle_support: mean_angle(Material::is_support),
        })
    }
}

struct Segment<'a> {
    edge: &'a Edge,
    material: Material,
    a: Position,
    b: Position,
}

impl Segment<'_> {
    fn length(&self) -> f64 {
        (self.a.x - self.b.x).hypot(self.a.y - self.b.y)
    }

    fn angle_degrees(&self) -> f64 {
        (self.b.y - self.a.y)
            .abs()
            .atan2((self.b.x - self.a.x).abs())
            .to_degrees()
    }
}

#[derive(Debug, Default)]
struct ConnectionCounts {
    support_road: usize,
    road_road: usize,
    support_support: usize,
}

impl ConnectionCounts {
    fn add(&mut self, materials: &[Material]) {
        let count = |m| materials.iter().filter(|&&x| x == m).count();
        let (road, reinforced) = (count(Material::Road), count(Material::ReinforcedRoad));
        let (wood, steel) = (count(Material::Wood), count(Material::Steel));
        let has_road = road + reinforced > 0;
        let has_support = wood + steel > 0;
        if has_road && has_support {
            self.support_road += 1;
        } else if (road > 0 && reinforced > 0) || road >= 2 || reinforced >= 2 {
            self.road_road += 1;
        } else if (wood > 0 && steel > 0) || wood >= 2 || steel >= 2 {
            self.support_support += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(guid: &str, x: f64, y: f64) -> Node {
        Node {
            guid: guid.to_owned(),
            pos: Position { x, y, z: 0.0 },
        }
    }

    fn edge(material_type: u32, a: &str, b: &str) -> Edge {
        Edge {
            material_type,
            node_a_guid: a.to_owned(),
            node_b_guid: b.to_owned(),
        }
    }

    fn truss() -> SaveLayout {
        SaveLayout {
            anchors: vec![node("L", 0.0, 0.0), node("R", 4.0, 0.0), node("M", 2.0, -3.0)],
            joints: vec![node("J1", 2.0, 0.0), node("J2", 2.0, 2.0)],
            edges: vec![
                edge(1, "L", "J1"),
                edge(2, "J1", "R"),
                edge(3, "L", "J2"),
                edge(4, "J2", "R"),
                edge(3, "J1", "J2"),
            ],
        }
    }

    #[test]
    fn test_material_codes() {
        assert_eq!(Material::from_code(1), Some(Material::Road));
        assert_eq!(Material::from_code(8), Some(Material::Spring));
        assert_eq!(Material::from_code(0), None);
        assert_eq!(Material::from_code(9), None);
        assert_eq!(Material::Hydraulic.cost_per_length(), 450.0);
    }

    #[test]
    fn test_summary_of_truss() {
        let summary = SolutionSummary::from_layout("P01-Pre-1", &truss()).unwrap();
        let diag = 8.0_f64.sqrt();
        assert_eq!(summary.num_segments, 5);
        assert_eq!(summary.num_joints, 5);
        assert!((summary.total_length - (2.0 + 2.0 + diag + diag + 2.0)).abs() < 1e-12);
        assert_eq!(summary.road_segments, 1);
        assert_eq!(summary.wood_segments, 2);
        assert!((summary.wood_length - (diag + 2.0)).abs() < 1e-12);
        assert_eq!(summary.steel_segments, 1);
        let cost = 2.0 * 200.0 + 2.0 * 400.0 + (diag + 2.0) * 180.0 + diag * 450.0;
        assert!((summary.total_cost - cost).abs() < 1e-9);

        assert_eq!((summary.left_anchor, summary.right_anchor, summary.mid_anchor), (1, 1, 0));
        assert_eq!(summary.left_anchor_segments, 2);
        assert_eq!(summary.mid_anchor_segments, 0);
        // L, R, J1, J2 are touched by segments
        assert!((summary.struct_density - 5.0 / 4.0).abs() < 1e-12);

        // L: road+wood, R: reinf+steel, J1: road+reinf+wood, J2: wood+steel+wood
        assert_eq!(summary.support_road_connections, 3);
        assert_eq!(summary.road_road_connections, 0);
        assert_eq!(summary.support_support_connections, 1);

        assert!(summary.avg_angle_road.abs() < 1e-12);
        assert!((summary.avg_angle_support - (45.0 + 45.0 + 90.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_node_and_material() {
        let mut layout = truss();
        layout.edges.push(edge(1, "L", "nowhere"));
        assert_eq!(
            SolutionSummary::from_layout("x", &layout).unwrap_err(),
            SummaryError::UnknownNode {
                edge: 5,
                guid: "nowhere".to_owned()
            }
        );

        let mut layout = truss();
        layout.edges[0].material_type = 42;
        assert!(matches!(
            SolutionSummary::from_layout("x", &layout),
            Err(SummaryError::UnknownMaterial { edge: 0, code: 42 })
        ));
    }

    #[test]
    fn test_empty_layout() {
        let summary = SolutionSummary::from_layout("x", &SaveLayout::default()).unwrap();
        assert_eq!(summary.num_segments, 0);
        assert_eq!(summary.struct_density, 0.0);
        assert_eq!(summary.left_anchor, 0);
    }

    #[test]
    fn test_flat_unity_layout() {
        let json = r#"{
            "m_Anchors": [{"m_Guid": "a", "m_Pos": {"x": 0.0, "y": 0.0, "z": 0.0}}],
            "m_BridgeJoints": [{"m_Guid": "b", "m_Pos": {"x": 0.0, "y": 2.0, "z": 0.0}}],
            "m_BridgeEdges": [{"m_MaterialType": 4, "m_NodeAGuid": "a", "m_NodeBGuid": "b"}]
        }"#;
        let layout: SaveLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.anchors.len(), 1);
        assert_eq!(layout.edges[0].material_type, 4);
        let summary = SolutionSummary::from_layout("x", &layout).unwrap();
        assert_eq!(summary.steel_length, 2.0);
        assert_eq!(summary.avg_angle_support, 90.0);
    }

    #[test]
    fn test_nested_layout_uses_bridge_anchors_when_level_has_none() {
        let json = r#"{
            "bridge": {
                "version": 13,
                "anchors": [{"guid": "a", "pos": {"x": 0.0, "y": 0.0}}],
                "joints": [],
                "edges": []
            }
        }"#;
        let layout: SaveLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.anchors.len(), 1);
    }

    #[test]
    fn test_summary_csv_row() {
        let summary = SolutionSummary::from_layout("P01-Pre-1", &truss()).unwrap();
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(&summary).unwrap();
        let bytes = writer.into_inner().unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "fullid_orig");
        assert_eq!(&headers[1], "TLength");
        let row: SolutionSummary = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(row, summary);
    }
}
