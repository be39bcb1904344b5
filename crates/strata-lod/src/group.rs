//! Cluster grouping
//!
//! Clusters that share mesh edges are grouped so that simplifying a group only
//! touches edges internal to it. The dual graph has one node per cluster and
//! an edge between clusters weighted by how many mesh edges they share.

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;

use crate::cluster::{Cluster, ClusterSet};
use crate::partition::{AdjacencyGraph, GraphPartitioner};
use crate::{LodError, LodResult};

/// Below this many clusters everything goes into one group
pub const MIN_CLUSTERS_TO_PARTITION: usize = 8;

/// Unordered pair of mesh vertex indices, smaller first
type Edge = (u32, u32);

/// Clusters of one generation simplified together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterGroup {
    /// Indices into the generation's cluster list
    pub clusters: Vec<u32>,
    /// Largest error among the member clusters
    pub error: f32,
    /// Groups of the next generation holding this group's replacement clusters
    pub parent_groups: Vec<u32>,
}

impl ClusterGroup {
    fn new(clusters: Vec<u32>, members: &[Cluster]) -> Self {
        let error = clusters
            .iter()
            .map(|&index| members[index as usize].error)
            .fold(0.0, f32::max);
        Self {
            clusters,
            error,
            parent_groups: Vec::new(),
        }
    }
}

fn edge(a: u32, b: u32) -> Edge {
    (a.min(b), a.max(b))
}

/// Group `set`'s clusters into parts of about `target_group_size`.
///
/// Small or edge-disconnected sets collapse into a single group; so does a
/// target size that would produce one part. Every cluster lands in exactly
/// one non-empty group.
pub fn group_clusters(
    set: &ClusterSet,
    target_group_size: usize,
    partitioner: &dyn GraphPartitioner,
) -> LodResult<Vec<ClusterGroup>> {
    let cluster_count = set.len();
    if cluster_count == 0 {
        return Ok(Vec::new());
    }

    let everything = || vec![ClusterGroup::new((0..cluster_count as u32).collect(), &set.clusters)];
    if cluster_count < MIN_CLUSTERS_TO_PARTITION {
        return Ok(everything());
    }

    let mut edge_clusters: AHashMap<Edge, SmallVec<[u32; 2]>> = AHashMap::new();
    let mut cluster_edges: Vec<Vec<Edge>> = Vec::with_capacity(cluster_count);
    let mut seen: AHashSet<Edge> = AHashSet::new();

    for (index, cluster) in set.clusters.iter().enumerate() {
        seen.clear();
        let mut edges = Vec::new();
        for [a, b, c] in set.cluster_triangles(cluster) {
            for key in [edge(a, b), edge(b, c), edge(c, a)] {
                if seen.insert(key) {
                    edges.push(key);
                    edge_clusters.entry(key).or_default().push(index as u32);
                }
            }
        }
        cluster_edges.push(edges);
    }

    edge_clusters.retain(|_, owners| owners.len() > 1);
    if edge_clusters.is_empty() {
        log::debug!("{cluster_count} clusters share no edges, keeping one group");
        return Ok(everything());
    }

    let parts = cluster_count / target_group_size.max(1);
    if parts <= 1 {
        return Ok(everything());
    }

    let rows: Vec<Vec<(u32, u32)>> = cluster_edges
        .iter()
        .enumerate()
        .map(|(index, edges)| {
            let mut shared: AHashMap<u32, u32> = AHashMap::new();
            for owners in edges.iter().filter_map(|edge| edge_clusters.get(edge)) {
                for &other in owners.iter().filter(|&&other| other as usize != index) {
                    *shared.entry(other).or_insert(0) += 1;
                }
            }
            let mut row: Vec<(u32, u32)> = shared.into_iter().collect();
            row.sort_unstable();
            row
        })
        .collect();

    let graph = AdjacencyGraph::from_rows(&rows)?;
    let assignment = partitioner.partition(&graph, parts)?;
    if assignment.len() != cluster_count {
        return Err(LodError::Partition(format!(
            "partitioner assigned {} of {cluster_count} clusters",
            assignment.len()
        )));
    }

    let mut members: Vec<Vec<u32>> = vec![Vec::new(); parts];
    for (index, &part) in assignment.iter().enumerate() {
        let Some(group) = members.get_mut(part) else {
            return Err(LodError::Partition(format!(
                "cluster {index} assigned to part {part} of {parts}"
            )));
        };
        group.push(index as u32);
    }

    let groups: Vec<ClusterGroup> = members
        .into_iter()
        .filter(|clusters| !clusters.is_empty())
        .map(|clusters| ClusterGroup::new(clusters, &set.clusters))
        .collect();

    log::debug!(
        "grouped {cluster_count} clusters into {} groups ({} requested)",
        groups.len(),
        parts
    );
    Ok(groups)
}

/// Record in each `previous` group which `current` groups its replacement clusters landed in
pub fn link_parent_groups(previous: &mut [ClusterGroup], clusters: &[Cluster], current: &[ClusterGroup]) {
    for group in previous.iter_mut() {
        group.parent_groups.clear();
    }

    for (group_index, group) in current.iter().enumerate() {
        for &cluster in &group.clusters {
            let Some(source) = clusters[cluster as usize].source_group else {
                continue;
            };
            if let Some(parent) = previous.get_mut(source as usize) {
                if !parent.parent_groups.contains(&(group_index as u32)) {
                    parent.parent_groups.push(group_index as u32);
                }
            }
        }
    }

    for group in previous.iter_mut() {
        group.parent_groups.sort_unstable();
    }
}
