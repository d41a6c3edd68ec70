//! Community detection on the neighbor graph.
//!
//! Clusters are found with the Leiden algorithm optimizing the Constant Potts
//! Model (CPM):
//!
//! ```text
//! Q = Σ_c ( w_in(c) − γ · n_c (n_c − 1) / 2 )
//! ```
//!
//! where `w_in(c)` is the total edge weight inside community `c`, `n_c` its
//! number of nodes and `γ` the resolution. Each pass moves nodes between
//! communities (queue-based local moving), refines every community into
//! well-connected sub-communities, and aggregates the refined communities
//! into a smaller graph. Passes repeat until one leaves the partition
//! unchanged.
//!
//! # Examples
//!
//! ```
//! use dsviz_analysis::{
//!     cluster::{ClusterParams, leiden},
//!     graph::NeighborGraph,
//! };
//!
//! // two triangles joined by a weak edge
//! let graph = NeighborGraph::new(
//!     6,
//!     [(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0), (3, 4, 1.0), (4, 5, 1.0), (3, 5, 1.0), (2, 3, 0.1)],
//! );
//! let clusters = leiden(&graph, &ClusterParams::default());
//! assert_eq!(clusters.labels(), &[1, 1, 1, 2, 2, 2]);
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};

use rand::{SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::graph::NeighborGraph;

const MAX_ITERATIONS: usize = 100;

/// Parameters of [`leiden`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    /// CPM resolution `γ`. Larger values give more, smaller clusters.
    pub resolution: f64,
    pub seed: u64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            resolution: 0.05,
            seed: 42,
        }
    }
}

/// Cluster id of every node: 1-indexed, dense, numbered by first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterAssignment {
    labels: Vec<usize>,
}

impl ClusterAssignment {
    /// Renumbers arbitrary labels to `1..=k` in order of first appearance.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dsviz_analysis::cluster::ClusterAssignment;
    /// let a = ClusterAssignment::from_labels(&[7, 7, 3, 9, 3]);
    /// assert_eq!(a.labels(), &[1, 1, 2, 3, 2]);
    /// assert_eq!(a.cluster_count(), 3);
    /// ```
    #[must_use]
    pub fn from_labels(labels: &[usize]) -> Self {
        let mut ids = HashMap::new();
        let labels = labels
            .iter()
            .map(|&label| {
                let next = ids.len() + 1;
                *ids.entry(label).or_insert(next)
            })
            .collect();
        Self { labels }
    }

    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Cluster id of `node`.
    #[must_use]
    pub fn cluster_of(&self, node: usize) -> usize {
        self.labels[node]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of distinct clusters.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.labels.iter().copied().max().unwrap_or(0)
    }
}

/// CPM quality of a partition of `graph`.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn cpm_quality(graph: &NeighborGraph, labels: &[usize], resolution: f64) -> f64 {
    let internal = graph
        .edges()
        .iter()
        .filter(|e| labels[e.source] == labels[e.target])
        .map(|e| e.weight)
        .sum::<f64>();
    let mut sizes = HashMap::<usize, usize>::new();
    for &label in labels {
        *sizes.entry(label).or_default() += 1;
    }
    let pairs = sizes
        .values()
        .map(|&n| (n * n.saturating_sub(1) / 2) as f64)
        .sum::<f64>();
    internal - resolution * pairs
}

/// Partitions `graph` with the Leiden algorithm (CPM quality).
#[must_use]
pub fn leiden(graph: &NeighborGraph, params: &ClusterParams) -> ClusterAssignment {
    let mut rng = Pcg32::seed_from_u64(params.seed);
    let base = Network::from_graph(graph);
    let mut labels = (0..graph.len()).collect::<Vec<_>>();

    for iteration in 1..=MAX_ITERATIONS {
        let next = leiden_pass(&base, &labels, params.resolution, &mut rng);
        let changed =
            ClusterAssignment::from_labels(&next) != ClusterAssignment::from_labels(&labels);
        labels = next;
        if !changed {
            log::debug!("leiden converged after {iteration} iterations");
            break;
        }
        if iteration == MAX_ITERATIONS {
            log::warn!("leiden did not converge after {MAX_ITERATIONS} iterations");
        }
    }

    let assignment = ClusterAssignment::from_labels(&labels);
    log::debug!(
        "{} clusters, CPM quality {:.4}",
        assignment.cluster_count(),
        cpm_quality(graph, &labels, params.resolution)
    );
    assignment
}

/// Graph with node sizes, as used by aggregation.
#[derive(Debug, Clone)]
struct Network {
    sizes: Vec<f64>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl Network {
    fn from_graph(graph: &NeighborGraph) -> Self {
        Self {
            sizes: vec![1.0; graph.len()],
            adjacency: graph.adjacency(),
        }
    }

    fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Collapses every community of `labels` (dense, `0..k`) into one node.
    fn aggregate(&self, labels: &[usize], count: usize) -> Self {
        let mut sizes = vec![0.0; count];
        let mut weights = BTreeMap::<(usize, usize), f64>::new();
        for (node, row) in self.adjacency.iter().enumerate() {
            let from = labels[node];
            sizes[from] += self.sizes[node];
            for &(neighbor, w) in row {
                let to = labels[neighbor];
                if from != to {
                    *weights.entry((from, to)).or_default() += w;
                }
            }
        }
        let mut adjacency = vec![vec![]; count];
        for ((from, to), w) in weights {
            adjacency[from].push((to, w));
        }
        Self { sizes, adjacency }
    }

    /// Total edge weight from `node` to each neighboring label, in order of
    /// first appearance in the adjacency list.
    fn weights_to_labels(&self, node: usize, labels: &[usize]) -> Vec<(usize, f64)> {
        let mut out = Vec::<(usize, f64)>::new();
        for &(neighbor, w) in &self.adjacency[node] {
            let label = labels[neighbor];
            match out.iter_mut().find(|(l, _)| *l == label) {
                Some((_, total)) => *total += w,
                None => out.push((label, w)),
            }
        }
        out
    }
}

/// Renumbers labels to `0..k` by first appearance and returns `k`.
fn densify(labels: &mut [usize]) -> usize {
    let mut ids = HashMap::new();
    for label in labels.iter_mut() {
        let next = ids.len();
        *label = *ids.entry(*label).or_insert(next);
    }
    ids.len()
}

/// One Leiden pass starting from `initial` (one label per node of `base`).
fn leiden_pass(base: &Network, initial: &[usize], resolution: f64, rng: &mut Pcg32) -> Vec<usize> {
    let mut network = base.clone();
    let mut partition = initial.to_vec();
    // aggregate node of every base node
    let mut node_of = (0..base.len()).collect::<Vec<_>>();

    loop {
        let count = move_nodes_fast(&network, &mut partition, resolution, rng);
        if count == network.len() {
            break;
        }
        let mut refined = refine_partition(&network, &partition, resolution, rng);
        let refined_count = densify(&mut refined);
        if refined_count == network.len() {
            break;
        }

        let mut aggregated_partition = vec![0; refined_count];
        for (node, &r) in refined.iter().enumerate() {
            aggregated_partition[r] = partition[node];
        }
        for n in &mut node_of {
            *n = refined[*n];
        }
        network = network.aggregate(&refined, refined_count);
        partition = aggregated_partition;
    }

    node_of.iter().map(|&n| partition[n]).collect()
}

/// Queue-based local moving. Returns the number of non-empty communities;
/// `partition` is left dense (`0..k`).
fn move_nodes_fast(
    network: &Network,
    partition: &mut [usize],
    resolution: f64,
    rng: &mut Pcg32,
) -> usize {
    let n = network.len();
    densify(partition);
    let mut community_size = vec![0.0; n];
    for (node, &c) in partition.iter().enumerate() {
        community_size[c] += network.sizes[node];
    }
    let mut empty = (0..n)
        .rev()
        .filter(|&c| community_size[c] == 0.0)
        .collect::<Vec<_>>();

    let mut order = (0..n).collect::<Vec<_>>();
    order.shuffle(rng);
    let mut queue = VecDeque::from(order);
    let mut queued = vec![true; n];

    while let Some(node) = queue.pop_front() {
        queued[node] = false;
        let size = network.sizes[node];
        let current = partition[node];
        community_size[current] -= size;
        if community_size[current] == 0.0 {
            empty.push(current);
        }

        let weights = network.weights_to_labels(node, partition);
        let gain = |c: usize, w: f64| w - resolution * size * community_size[c];
        let current_weight = weights
            .iter()
            .find(|&&(c, _)| c == current)
            .map_or(0.0, |&(_, w)| w);
        let mut best = current;
        let mut best_gain = gain(current, current_weight);
        for &(c, w) in &weights {
            let g = gain(c, w);
            if g > best_gain {
                best = c;
                best_gain = g;
            }
        }
        if best_gain < 0.0
            && let Some(&c) = empty.last()
        {
            best = c;
        }

        if community_size[best] == 0.0 {
            empty.retain(|&c| c != best);
        }
        community_size[best] += size;
        partition[node] = best;

        if best != current {
            for &(neighbor, _) in &network.adjacency[node] {
                if !queued[neighbor] && partition[neighbor] != best {
                    queued[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }
    densify(partition)
}

/// Splits every community of `partition` into well-connected
/// sub-communities by greedily merging singletons in random order.
fn refine_partition(
    network: &Network,
    partition: &[usize],
    resolution: f64,
    rng: &mut Pcg32,
) -> Vec<usize> {
    let n = network.len();
    let mut refined = (0..n).collect::<Vec<_>>();
    let mut refined_size = network.sizes.clone();
    let mut singleton = vec![true; n];

    let mut members = BTreeMap::<usize, Vec<usize>>::new();
    for (node, &c) in partition.iter().enumerate() {
        members.entry(c).or_default().push(node);
    }

    for (community, mut nodes) in members {
        let community_size = nodes.iter().map(|&v| network.sizes[v]).sum::<f64>();
        // weight from each refined community to the rest of its community
        let mut external = HashMap::<usize, f64>::new();
        for &v in &nodes {
            let w = network.adjacency[v]
                .iter()
                .filter(|&&(u, _)| partition[u] == community)
                .map(|&(_, w)| w)
                .sum::<f64>();
            external.insert(v, w);
        }
        let well_connected = |weight: f64, size: f64| {
            weight >= resolution * size * (community_size - size)
        };

        nodes.shuffle(rng);
        for v in nodes {
            let size = network.sizes[v];
            if !singleton[v] || !well_connected(external[&v], size) {
                continue;
            }
            let weights = network
                .weights_to_labels(v, &refined)
                .into_iter()
                .filter(|&(r, _)| r != v && partition[r] == community);

            let mut best = None;
            let mut best_gain = 0.0;
            for (r, w) in weights {
                if !well_connected(external[&r], refined_size[r]) {
                    continue;
                }
                let gain = w - resolution * size * refined_size[r];
                if gain >= best_gain {
                    best = Some((r, w));
                    best_gain = gain;
                }
            }
            if let Some((r, w)) = best {
                refined_size[v] = 0.0;
                refined_size[r] += size;
                let merged = external[&r] + external[&v] - 2.0 * w;
                external.insert(r, merged);
                refined[v] = r;
                singleton[r] = false;
                singleton[v] = false;
            }
        }
    }
    refined
}
