//! Weighted undirected neighbor graph.

use serde::{Deserialize, Serialize};

/// An undirected weighted edge, stored with `source < target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// Error raised when a serialized graph has an invalid edge.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
#[display("edge ({from}, {to}) of a graph with {size} nodes: {reason}")]
pub struct GraphError {
    size: usize,
    from: usize,
    to: usize,
    reason: &'static str,
}

/// Sparse undirected graph over `size` nodes.
///
/// Produced by the embedding step (fuzzy simplicial set of the k-nearest
/// neighbors) and consumed by community detection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawGraph")]
pub struct NeighborGraph {
    size: usize,
    edges: Vec<GraphEdge>,
}

#[derive(Deserialize)]
struct RawGraph {
    size: usize,
    edges: Vec<GraphEdge>,
}

impl TryFrom<RawGraph> for NeighborGraph {
    type Error = GraphError;

    fn try_from(raw: RawGraph) -> Result<Self, Self::Error> {
        let RawGraph { size, edges } = raw;
        for e in &edges {
            let reason = if e.source >= size || e.target >= size {
                "endpoint out of range"
            } else if e.source >= e.target {
                "endpoints must satisfy source < target"
            } else if !e.weight.is_finite() || e.weight <= 0.0 {
                "weight must be finite and positive"
            } else {
                continue;
            };
            return Err(GraphError {
                size,
                from: e.source,
                to: e.target,
                reason,
            });
        }
        Ok(Self { size, edges })
    }
}

impl NeighborGraph {
    /// Builds a graph from `(i, j, weight)` triples.
    ///
    /// Self loops, non-positive weights and out-of-range endpoints are
    /// dropped. Duplicate pairs keep the largest weight. Edges are sorted
    /// by `(source, target)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsviz_analysis::graph::NeighborGraph;
    ///
    /// let g = NeighborGraph::new(3, [(1, 0, 0.5), (0, 1, 0.8), (2, 2, 1.0)]);
    /// assert_eq!(g.edges().len(), 1);
    /// assert_eq!(g.edges()[0].weight, 0.8);
    /// assert_eq!(g.degree(0), 0.8);
    /// ```
    pub fn new<I>(size: usize, edges: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut edges = edges
            .into_iter()
            .filter(|&(i, j, w)| i != j && i < size && j < size && w > 0.0 && w.is_finite())
            .map(|(i, j, weight)| GraphEdge {
                source: i.min(j),
                target: i.max(j),
                weight,
            })
            .collect::<Vec<_>>();
        edges.sort_by(|a, b| {
            (a.source, a.target)
                .cmp(&(b.source, b.target))
                .then(b.weight.total_cmp(&a.weight))
        });
        edges.dedup_by_key(|e| (e.source, e.target));
        Self { size, edges }
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Neighbor lists with weights, one per node.
    #[must_use]
    pub fn adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adjacency = vec![vec![]; self.size];
        for e in &self.edges {
            adjacency[e.source].push((e.target, e.weight));
            adjacency[e.target].push((e.source, e.weight));
        }
        adjacency
    }

    /// Sum of the weights of the edges incident to `node`.
    #[must_use]
    pub fn degree(&self, node: usize) -> f64 {
        self.edges
            .iter()
            .filter(|e| e.source == node || e.target == node)
            .map(|e| e.weight)
            .sum()
    }

    /// Connected component index of every node, numbered from 0 in node order.
    #[must_use]
    pub fn components(&self) -> Vec<usize> {
        let adjacency = self.adjacency();
        let mut component = vec![usize::MAX; self.size];
        let mut next = 0;
        for start in 0..self.size {
            if component[start] != usize::MAX {
                continue;
            }
            component[start] = next;
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                for &(neighbor, _) in &adjacency[node] {
                    if component[neighbor] == usize::MAX {
                        component[neighbor] = next;
                        stack.push(neighbor);
                    }
                }
            }
            next += 1;
        }
        component
    }

    /// Returns `true` if every node is reachable from every other one.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.components().iter().all(|&c| c == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_filters_and_dedups() {
        let g = NeighborGraph::new(
            4,
            [(0, 1, 0.2), (1, 0, 0.4), (2, 3, 0.0), (3, 9, 1.0), (2, 1, 1.0)],
        );
        assert_eq!(
            g.edges(),
            &[
                GraphEdge {
                    source: 0,
                    target: 1,
                    weight: 0.4
                },
                GraphEdge {
                    source: 1,
                    target: 2,
                    weight: 1.0
                },
            ]
        );
    }

    #[test]
    fn test_components() {
        let g = NeighborGraph::new(5, [(0, 1, 1.0), (3, 4, 1.0)]);
        assert_eq!(g.components(), vec![0, 0, 1, 2, 2]);
        assert!(!g.is_connected());

        let g = NeighborGraph::new(3, [(0, 1, 1.0), (1, 2, 1.0)]);
        assert!(g.is_connected());
        assert_eq!(g.adjacency()[1].len(), 2);
    }

    #[test]
    fn test_serde() {
        let g = NeighborGraph::new(2, [(0, 1, 0.5)]);
        let json = serde_json::to_string(&g).unwrap();
        assert_eq!(serde_json::from_str::<NeighborGraph>(&json).unwrap(), g);
    }

    #[test]
    fn test_serde_rejects_invalid_edges() {
        let parse = |edge: &str| {
            serde_json::from_str::<NeighborGraph>(&format!(r#"{{"size":3,"edges":[{edge}]}}"#))
                .map_err(|e| e.to_string())
        };
        assert!(parse(r#"{"source":0,"target":2,"weight":0.5}"#).is_ok());
        assert!(
            parse(r#"{"source":0,"target":3,"weight":0.5}"#)
                .unwrap_err()
                .contains("out of range")
        );
        assert!(
            parse(r#"{"source":1,"target":1,"weight":0.5}"#)
                .unwrap_err()
                .contains("source < target")
        );
        assert!(
            parse(r#"{"source":0,"target":1,"weight":0.0}"#)
                .unwrap_err()
                .contains("finite and positive")
        );

        let raw = RawGraph {
            size: 2,
            edges: vec![GraphEdge {
                source: 0,
                target: 1,
                weight: f64::INFINITY,
            }],
        };
        assert!(NeighborGraph::try_from(raw).is_err());
    }
}
