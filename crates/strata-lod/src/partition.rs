//! Graph partitioning
//!
//! Cluster grouping only needs "split this weighted graph into k balanced parts
//! with a small edge cut". [`GraphPartitioner`] is that seam. The default
//! [`GreedyPartitioner`] grows regions and then refines the boundary; with the
//! `metis` feature [`MetisPartitioner`] hands the graph to METIS instead.

use smallvec::SmallVec;

use crate::{LodError, LodResult};

/// Undirected weighted graph in compressed sparse row form.
///
/// Node `n`'s neighbours are `neighbors[offsets[n]..offsets[n + 1]]` with the
/// matching `weights`. Every edge appears once from each side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyGraph {
    offsets: Vec<u32>,
    neighbors: Vec<u32>,
    weights: Vec<u32>,
}

impl AdjacencyGraph {
    /// Build from raw CSR arrays, rejecting malformed adjacency
    pub fn new(offsets: Vec<u32>, neighbors: Vec<u32>, weights: Vec<u32>) -> LodResult<Self> {
        let graph = Self {
            offsets,
            neighbors,
            weights,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Build from per-node `(neighbor, weight)` rows
    pub fn from_rows(rows: &[Vec<(u32, u32)>]) -> LodResult<Self> {
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        let mut neighbors = Vec::new();
        let mut weights = Vec::new();

        offsets.push(0);
        for row in rows {
            for &(neighbor, weight) in row {
                neighbors.push(neighbor);
                weights.push(weight);
            }
            offsets.push(neighbors.len() as u32);
        }

        Self::new(offsets, neighbors, weights)
    }

    pub fn node_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn neighbor_indices(&self) -> &[u32] {
        &self.neighbors
    }

    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    /// `(neighbor, weight)` pairs of `node`
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, u32)> + '_ {
        let range = self.offsets[node] as usize..self.offsets[node + 1] as usize;
        self.neighbors[range.clone()]
            .iter()
            .zip(&self.weights[range])
            .map(|(&neighbor, &weight)| (neighbor as usize, weight))
    }

    /// Total weight of edges whose endpoints land in different parts
    pub fn edge_cut(&self, assignment: &[usize]) -> u64 {
        let doubled: u64 = (0..self.node_count())
            .flat_map(|node| {
                self.neighbors(node)
                    .filter(move |&(neighbor, _)| assignment[neighbor] != assignment[node])
                    .map(|(_, weight)| weight as u64)
            })
            .sum();
        doubled / 2
    }

    pub fn validate(&self) -> LodResult<()> {
        let Some((&first, &last)) = self.offsets.first().zip(self.offsets.last()) else {
            return Err(LodError::Partition("adjacency has no offsets".to_string()));
        };
        if first != 0 || last as usize != self.neighbors.len() {
            return Err(LodError::Partition(format!(
                "offsets span {first}..{last} but there are {} neighbor entries",
                self.neighbors.len()
            )));
        }
        if self.weights.len() != self.neighbors.len() {
            return Err(LodError::Partition(format!(
                "{} weights for {} neighbor entries",
                self.weights.len(),
                self.neighbors.len()
            )));
        }
        if self.offsets.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(LodError::Partition("offsets are not monotonic".to_string()));
        }

        let node_count = self.node_count();
        for node in 0..node_count {
            for (neighbor, _) in self.neighbors(node) {
                if neighbor >= node_count {
                    return Err(LodError::Partition(format!(
                        "node {node} references missing node {neighbor}"
                    )));
                }
                if neighbor == node {
                    return Err(LodError::Partition(format!("node {node} has a self loop")));
                }
            }
        }
        Ok(())
    }
}

/// Splits a graph into `parts` balanced parts minimising the edge cut
pub trait GraphPartitioner: Send + Sync {
    /// Part index (`< parts`) for every node. Parts may come back empty.
    fn partition(&self, graph: &AdjacencyGraph, parts: usize) -> LodResult<Vec<usize>>;
}

/// Deterministic region growing with boundary refinement.
///
/// Each part is seeded at the free node most connected to the parts already
/// grown, then absorbs its most strongly connected free neighbours until it
/// reaches capacity. Refinement moves boundary nodes to the neighbouring part
/// they share the most weight with while capacity allows.
#[derive(Debug, Clone, Copy)]
pub struct GreedyPartitioner {
    /// Refinement sweeps over all nodes
    pub refinement_passes: usize,
}

impl Default for GreedyPartitioner {
    fn default() -> Self {
        Self {
            refinement_passes: 4,
        }
    }
}

const UNASSIGNED: usize = usize::MAX;

impl GreedyPartitioner {
    /// Free node with the most weight towards assigned nodes, else the lowest free index
    fn next_seed(graph: &AdjacencyGraph, assignment: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        let mut first_free = None;

        for node in 0..graph.node_count() {
            if assignment[node] != UNASSIGNED {
                continue;
            }
            first_free.get_or_insert(node);

            let attached: u64 = graph
                .neighbors(node)
                .filter(|&(neighbor, _)| assignment[neighbor] != UNASSIGNED)
                .map(|(_, weight)| weight as u64)
                .sum();
            if attached > 0 && best.is_none_or(|(_, weight)| attached > weight) {
                best = Some((node, attached));
            }
        }

        best.map(|(node, _)| node).or(first_free)
    }

    fn grow(
        graph: &AdjacencyGraph,
        seed: usize,
        part: usize,
        capacity: usize,
        assignment: &mut [usize],
        connection: &mut [u64],
    ) -> usize {
        let mut frontier: Vec<usize> = Vec::new();
        let mut size = 0;
        let mut next = Some(seed);

        while let Some(node) = next {
            assignment[node] = part;
            size += 1;
            for (neighbor, weight) in graph.neighbors(node) {
                if assignment[neighbor] == UNASSIGNED {
                    if connection[neighbor] == 0 {
                        frontier.push(neighbor);
                    }
                    connection[neighbor] += weight.max(1) as u64;
                }
            }
            if size >= capacity {
                break;
            }

            frontier.retain(|&candidate| assignment[candidate] == UNASSIGNED);
            // Strongest connection wins, lowest index breaks ties
            next = frontier
                .iter()
                .copied()
                .max_by(|&a, &b| connection[a].cmp(&connection[b]).then(b.cmp(&a)));
        }

        for candidate in frontier {
            connection[candidate] = 0;
        }
        size
    }

    fn refine(&self, graph: &AdjacencyGraph, assignment: &mut [usize], sizes: &mut [usize], capacity: usize) {
        for _ in 0..self.refinement_passes {
            let mut moved = false;

            for node in 0..graph.node_count() {
                let from = assignment[node];
                if sizes[from] <= 1 {
                    continue;
                }

                let mut links: SmallVec<[(usize, u64); 8]> = SmallVec::new();
                for (neighbor, weight) in graph.neighbors(node) {
                    let part = assignment[neighbor];
                    match links.iter_mut().find(|(candidate, _)| *candidate == part) {
                        Some((_, total)) => *total += weight as u64,
                        None => links.push((part, weight as u64)),
                    }
                }

                let internal = links
                    .iter()
                    .find(|(part, _)| *part == from)
                    .map_or(0, |&(_, weight)| weight);
                let target = links
                    .iter()
                    .filter(|&&(part, weight)| part != from && sizes[part] < capacity && weight > internal)
                    .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));

                if let Some(&(to, _)) = target {
                    assignment[node] = to;
                    sizes[from] -= 1;
                    sizes[to] += 1;
                    moved = true;
                }
            }

            if !moved {
                break;
            }
        }
    }
}

impl GraphPartitioner for GreedyPartitioner {
    fn partition(&self, graph: &AdjacencyGraph, parts: usize) -> LodResult<Vec<usize>> {
        graph.validate()?;
        if parts == 0 {
            return Err(LodError::Partition("cannot split into zero parts".to_string()));
        }

        let node_count = graph.node_count();
        let parts = parts.min(node_count.max(1));
        if parts == 1 {
            return Ok(vec![0; node_count]);
        }

        let capacity = node_count.div_ceil(parts);
        let mut assignment = vec![UNASSIGNED; node_count];
        let mut sizes = vec![0usize; parts];
        let mut connection = vec![0u64; node_count];

        for part in 0..parts {
            let Some(seed) = Self::next_seed(graph, &assignment) else {
                break;
            };
            sizes[part] = Self::grow(graph, seed, part, capacity, &mut assignment, &mut connection);
        }

        // Stragglers from regions that ran out of room or connectivity
        for node in 0..node_count {
            if assignment[node] != UNASSIGNED {
                continue;
            }
            let mut best: Option<(usize, u64)> = None;
            for (neighbor, weight) in graph.neighbors(node) {
                let part = assignment[neighbor];
                if part != UNASSIGNED
                    && sizes[part] < capacity
                    && best.is_none_or(|(_, best_weight)| weight as u64 > best_weight)
                {
                    best = Some((part, weight as u64));
                }
            }
            let part = match best {
                Some((part, _)) => part,
                None => (0..parts).min_by_key(|&part| (sizes[part], part)).unwrap_or(0),
            };
            assignment[node] = part;
            sizes[part] += 1;
        }

        self.refine(graph, &mut assignment, &mut sizes, capacity);
        Ok(assignment)
    }
}

/// METIS k-way partitioning
#[cfg(feature = "metis")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MetisPartitioner;

#[cfg(feature = "metis")]
impl GraphPartitioner for MetisPartitioner {
    fn partition(&self, graph: &AdjacencyGraph, parts: usize) -> LodResult<Vec<usize>> {
        graph.validate()?;
        if parts == 0 {
            return Err(LodError::Partition("cannot split into zero parts".to_string()));
        }

        let node_count = graph.node_count();
        if parts == 1 || node_count <= 1 {
            return Ok(vec![0; node_count]);
        }

        let to_idx = |values: &[u32]| -> Vec<metis::Idx> {
            values.iter().map(|&value| value as metis::Idx).collect()
        };
        let xadj = to_idx(graph.offsets());
        let adjncy = to_idx(graph.neighbor_indices());
        let adjwgt = to_idx(graph.weights());
        let mut part = vec![0 as metis::Idx; node_count];

        metis::Graph::new(1, parts as metis::Idx, &xadj, &adjncy)
            .map_err(|err| LodError::Partition(format!("{err:?}")))?
            .set_adjwgt(&adjwgt)
            .part_kway(&mut part)
            .map_err(|err| LodError::Partition(format!("{err:?}")))?;

        Ok(part.into_iter().map(|index| index as usize).collect())
    }
}
