//! Hierarchy construction
//!
//! Generation 0 clusters the input mesh. Every later generation takes each
//! group of the previous one, merges it, simplifies it with the border locked
//! and clusters the result again. The source clusters get a [`ParentLink`] to
//! the clusters that replace them. Construction stops after
//! `max_generations`, at the first generation that comes out empty, or once
//! a generation has shrunk to a single cluster. A group is re-clustered
//! whenever simplification leaves at least one triangle, even when nothing
//! could be removed, so only groups simplified away keep root clusters below
//! the coarsest generation.
//!
//! All generations are finally flattened into one cluster array; a cluster's
//! id is its position in that array.

use std::ops::Range;
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use strata_core::{BoundingSphere, Pcg32, RandomSource, enclosing_sphere_of_spheres};

use crate::cluster::{Cluster, ClusterId, ClusterSet, ParentLink, build_clusters};
use crate::config::HierarchyConfig;
use crate::group::{ClusterGroup, group_clusters, link_parent_groups};
use crate::merge::merge_group;
use crate::mesh::{Mesh, Vertex};
use crate::partition::{GraphPartitioner, GreedyPartitioner};
use crate::simplify::simplify_group;
use crate::LodResult;

/// PCG stream used for debug colours, kept apart from bounding-sphere pivots
const DEBUG_COLOR_STREAM: u64 = 0xc010;

/// One level of the hierarchy during construction
#[derive(Debug, Clone)]
pub(crate) struct Generation {
    /// 0 is the full-resolution mesh
    index: u32,
    /// Vertex buffer shared with every other generation
    vertices: Arc<[Vertex]>,
    set: ClusterSet,
    groups: Vec<ClusterGroup>,
    /// Largest cluster error in this generation
    error: f32,
    /// Id of this generation's first cluster in the flattened array
    first_id: ClusterId,
}

impl Generation {
    fn new(index: u32, vertices: Arc<[Vertex]>, mut set: ClusterSet, first_id: ClusterId) -> Self {
        for (offset, cluster) in set.clusters.iter_mut().enumerate() {
            cluster.id = first_id + offset as ClusterId;
            cluster.generation = index;
        }
        let error = set.clusters.iter().map(|cluster| cluster.error).fold(0.0, f32::max);

        Self {
            index,
            vertices,
            set,
            groups: Vec::new(),
            error,
            first_id,
        }
    }

    fn triangle_count(&self) -> usize {
        self.set.triangle_count()
    }

    fn assign_groups(&mut self, groups: Vec<ClusterGroup>) {
        for (group_index, group) in groups.iter().enumerate() {
            for &cluster in &group.clusters {
                self.set.clusters[cluster as usize].group = group_index as u32;
            }
        }
        self.groups = groups;
    }

    /// Fill every cluster's drawable index list, and colour when a palette is given
    fn resolve_indices(&mut self, mut palette: Option<&mut (dyn RandomSource + '_)>) {
        for group in &self.groups {
            let merged = merge_group(&self.set, group, palette.as_deref_mut());
            for span in &merged.spans {
                let cluster = &mut self.set.clusters[span.cluster as usize];
                cluster.indices = merged.span_indices(span).to_vec();
                if let Some(color) = span.color {
                    cluster.debug_color = color;
                }
            }
        }
    }
}

/// Per-generation statistics of a finished hierarchy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub index: u32,
    /// Range of [`LodHierarchy::clusters`]
    pub cluster_range: Range<usize>,
    pub triangle_count: usize,
    /// Largest cluster error
    pub error: f32,
    pub group_count: usize,
}

/// Finished, read-only cluster hierarchy
#[derive(Debug, Clone)]
pub struct LodHierarchy {
    vertices: Arc<[Vertex]>,
    clusters: Vec<Cluster>,
    generations: Vec<GenerationSummary>,
    full_index_count: usize,
}

impl LodHierarchy {
    pub fn vertices(&self) -> &Arc<[Vertex]> {
        &self.vertices
    }

    /// Every cluster of every generation, finest first
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id as usize)
    }

    pub fn generations(&self) -> &[GenerationSummary] {
        &self.generations
    }

    /// Clusters of one generation; empty when it does not exist
    pub fn generation_clusters(&self, index: usize) -> &[Cluster] {
        self.generations
            .get(index)
            .map_or(&[], |summary| &self.clusters[summary.cluster_range.clone()])
    }

    /// Clusters nothing coarser replaces
    pub fn roots(&self) -> impl Iterator<Item = &Cluster> + '_ {
        self.clusters.iter().filter(|cluster| cluster.is_root())
    }

    /// Index count of the input mesh
    pub fn full_index_count(&self) -> usize {
        self.full_index_count
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Builds a [`LodHierarchy`] from a mesh
pub struct LodHierarchyBuilder {
    config: HierarchyConfig,
    partitioner: Box<dyn GraphPartitioner>,
}

impl LodHierarchyBuilder {
    /// Builder using the [`GreedyPartitioner`]
    pub fn new(config: HierarchyConfig) -> Self {
        Self {
            config,
            partitioner: Box::new(GreedyPartitioner::default()),
        }
    }

    pub fn with_partitioner(mut self, partitioner: impl GraphPartitioner + 'static) -> Self {
        self.partitioner = Box::new(partitioner);
        self
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    pub fn build(&self, mesh: &Mesh) -> LodResult<LodHierarchy> {
        self.config.validate()?;

        let span = tracing::info_span!(
            "build_lod_hierarchy",
            triangles = mesh.triangle_count(),
            max_generations = self.config.max_generations
        );
        let _enter = span.enter();

        let mut rng = Pcg32::new(self.config.seed);
        let vertices = Arc::clone(mesh.vertices());

        let set = build_clusters(&vertices, mesh.indices(), &self.config.cluster_limits(), &mut rng)?;
        let mut first = Generation::new(0, Arc::clone(&vertices), set, 0);
        self.group(&mut first)?;
        log_generation(&first);

        let mut generations = vec![first];
        for index in 1..self.config.max_generations {
            let Some(previous) = generations.last_mut() else {
                break;
            };
            match self.next_generation(previous, index, &mut rng)? {
                Some(next) => {
                    log_generation(&next);
                    generations.push(next);
                }
                None => {
                    info!("no clusters left to coarsen at generation {index}, stopping early");
                    break;
                }
            }
        }

        Ok(self.finish(vertices, generations, mesh.indices().len()))
    }

    fn group(&self, generation: &mut Generation) -> LodResult<()> {
        let groups = group_clusters(
            &generation.set,
            self.config.target_group_size,
            self.partitioner.as_ref(),
        )?;
        generation.assign_groups(groups);
        Ok(())
    }

    /// Simplify every group of `previous`; `None` when nothing survives
    fn next_generation(
        &self,
        previous: &mut Generation,
        index: u32,
        rng: &mut Pcg32,
    ) -> LodResult<Option<Generation>> {
        if previous.set.len() <= 1 {
            return Ok(None);
        }

        let vertices = Arc::clone(&previous.vertices);
        let limits = self.config.cluster_limits();
        let first_id = previous.first_id + previous.set.len() as ClusterId;
        let max_child_error = previous.error;

        let mut set = ClusterSet::default();
        let mut links: Vec<(usize, ParentLink)> = Vec::with_capacity(previous.groups.len());

        for (group_index, group) in previous.groups.iter().enumerate() {
            let merged = merge_group(&previous.set, group, None);
            let simplified = simplify_group(
                &merged.indices,
                &vertices,
                index,
                self.config.max_generations,
                &self.config,
            )?;
            if simplified.indices.is_empty() {
                debug!("group {group_index} of generation {} simplified away", previous.index);
                continue;
            }
            if simplified.indices.len() >= merged.indices.len() {
                debug!("group {group_index} of generation {} kept all of its triangles", previous.index);
            }

            let mut rebuilt = build_clusters(&vertices, &simplified.indices, &limits, rng)?;
            if rebuilt.is_empty() {
                continue;
            }

            let error = rebuilt_error(max_child_error, simplified.error);
            let bounds: Vec<BoundingSphere> = group
                .clusters
                .iter()
                .map(|&cluster| previous.set.clusters[cluster as usize].lod_bound)
                .chain(rebuilt.clusters.iter().map(|cluster| cluster.bound))
                .collect();
            let lod_bound = enclosing_sphere_of_spheres(&bounds, rng);

            for cluster in &mut rebuilt.clusters {
                cluster.error = error;
                cluster.lod_bound = lod_bound;
                cluster.source_group = Some(group_index as u32);
            }

            let start = first_id + set.len() as ClusterId;
            links.push((
                group_index,
                ParentLink {
                    error,
                    bound: lod_bound,
                    clusters: start..start + rebuilt.len() as ClusterId,
                },
            ));
            set.append(rebuilt);
        }

        if set.is_empty() {
            return Ok(None);
        }

        for (group_index, link) in links {
            for &cluster in &previous.groups[group_index].clusters {
                previous.set.clusters[cluster as usize].parent = Some(link.clone());
            }
        }

        let mut next = Generation::new(index, vertices, set, first_id);
        self.group(&mut next)?;
        link_parent_groups(&mut previous.groups, &next.set.clusters, &next.groups);
        Ok(Some(next))
    }

    fn finish(
        &self,
        vertices: Arc<[Vertex]>,
        generations: Vec<Generation>,
        full_index_count: usize,
    ) -> LodHierarchy {
        let mut palette = self
            .config
            .debug_colors
            .then(|| Pcg32::with_stream(self.config.seed, DEBUG_COLOR_STREAM));

        let total = generations.iter().map(|generation| generation.set.len()).sum();
        let mut clusters = Vec::with_capacity(total);
        let mut summaries = Vec::with_capacity(generations.len());

        for mut generation in generations {
            generation.resolve_indices(palette.as_mut().map(|rng| rng as &mut dyn RandomSource));

            let start = clusters.len();
            summaries.push(GenerationSummary {
                index: generation.index,
                cluster_range: start..start + generation.set.len(),
                triangle_count: generation.triangle_count(),
                error: generation.error,
                group_count: generation.groups.len(),
            });
            clusters.extend(generation.set.clusters);
        }

        info!(
            "built {} generations, {} clusters",
            summaries.len(),
            clusters.len()
        );

        LodHierarchy {
            vertices,
            clusters,
            generations: summaries,
            full_index_count,
        }
    }
}

/// Error of clusters rebuilt from a group; stays strictly above
/// `max_child_error` even when simplification was lossless
fn rebuilt_error(max_child_error: f32, simplification_error: f32) -> f32 {
    let floor = f32::EPSILON * max_child_error.max(1.0);
    max_child_error + simplification_error.max(floor)
}

fn log_generation(generation: &Generation) {
    info!(
        "generation {}: {} clusters, {} triangles, {} groups, error {:.6}",
        generation.index,
        generation.set.len(),
        generation.triangle_count(),
        generation.groups.len(),
        generation.error
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{DEBUG_COLOR_MAX, DEBUG_COLOR_MIN};
    use crate::primitives;

    fn build(config: HierarchyConfig) -> (Mesh, LodHierarchy) {
        let mesh = primitives::uv_sphere(1.0, 48, 25);
        let hierarchy = LodHierarchyBuilder::new(config).build(&mesh).unwrap();
        (mesh, hierarchy)
    }

    fn sorted_triangles(indices: &[u32]) -> Vec<[u32; 3]> {
        let mut triangles: Vec<[u32; 3]> = indices
            .chunks_exact(3)
            .map(|triangle| {
                let mut triangle = [triangle[0], triangle[1], triangle[2]];
                triangle.sort_unstable();
                triangle
            })
            .collect();
        triangles.sort_unstable();
        triangles
    }

    #[test]
    fn test_rebuilt_error_grows_at_any_scale() {
        for max_child in [0.0, 1e-3, 1.0, 10.0, 1e4, 1e7] {
            assert!(rebuilt_error(max_child, 0.0) > max_child, "no growth above {max_child}");
        }
        assert_eq!(rebuilt_error(2.0, 0.5), 2.5);
    }

    #[test]
    fn test_every_non_coarsest_cluster_has_a_parent() {
        let (_, hierarchy) = build(HierarchyConfig {
            max_generations: 5,
            target_group_size: 4,
            ..Default::default()
        });
        let last = hierarchy.generations().len() - 1;
        assert!(last > 0);

        for cluster in hierarchy.clusters() {
            assert_eq!(cluster.is_root(), cluster.generation as usize == last, "cluster {}", cluster.id);
        }
    }

    #[test]
    fn test_ids_follow_flattened_order() {
        let (_, hierarchy) = build(HierarchyConfig::default());

        for (position, cluster) in hierarchy.clusters().iter().enumerate() {
            assert_eq!(cluster.id as usize, position);
        }
        for summary in hierarchy.generations() {
            for cluster in hierarchy.generation_clusters(summary.index as usize) {
                assert_eq!(cluster.generation, summary.index);
            }
        }
        assert!(hierarchy.generation_clusters(99).is_empty());
    }

    #[test]
    fn test_error_is_monotonic() {
        let (_, hierarchy) = build(HierarchyConfig::default());
        let generations = hierarchy.generations();
        assert!(generations.len() > 2);

        for cluster in hierarchy.generation_clusters(0) {
            assert_eq!(cluster.error, 0.0);
        }
        for pair in generations.windows(2) {
            let previous_max = pair[0].error;
            for cluster in hierarchy.generation_clusters(pair[1].index as usize) {
                assert!(cluster.error > previous_max);
            }
        }
        for cluster in hierarchy.clusters() {
            if let Some(parent) = &cluster.parent {
                assert!(parent.error >= cluster.error);
            }
        }
    }

    #[test]
    fn test_parent_links_point_at_next_generation() {
        let (_, hierarchy) = build(HierarchyConfig::default());
        let last = hierarchy.generations().len() as u32 - 1;

        for cluster in hierarchy.clusters() {
            let Some(parent) = &cluster.parent else {
                continue;
            };
            assert!(cluster.generation < last);
            assert!(!parent.clusters.is_empty());
            assert!(parent.bound.contains_sphere(&cluster.lod_bound, 1e-4));

            for id in parent.clusters.clone() {
                let replacement = hierarchy.cluster(id).unwrap();
                assert_eq!(replacement.generation, cluster.generation + 1);
                assert_eq!(replacement.error, parent.error);
                assert_eq!(replacement.lod_bound, parent.bound);
                assert_eq!(replacement.source_group, Some(cluster.group));
            }
        }
        for cluster in hierarchy.generation_clusters(last as usize) {
            assert!(cluster.is_root());
        }
    }

    #[test]
    fn test_cluster_bounds_contain_triangle_centers() {
        let (mesh, hierarchy) = build(HierarchyConfig::default());
        for cluster in hierarchy.clusters() {
            for triangle in cluster.indices.chunks_exact(3) {
                let center = crate::mesh::triangle_center(mesh.vertices(), [triangle[0], triangle[1], triangle[2]]);
                assert!(cluster.bound.contains_point_within(center, 1e-4));
                assert!(cluster.lod_bound.contains_point_within(center, 1e-4));
            }
        }
    }

    #[test]
    fn test_finest_generation_reproduces_mesh() {
        let (mesh, hierarchy) = build(HierarchyConfig::default());

        let mut indices = Vec::new();
        for cluster in hierarchy.generation_clusters(0) {
            assert_eq!(cluster.indices.len(), cluster.triangle_count as usize * 3);
            indices.extend_from_slice(&cluster.indices);
        }
        assert_eq!(sorted_triangles(&indices), sorted_triangles(mesh.indices()));
        assert!(Arc::ptr_eq(hierarchy.vertices(), mesh.vertices()));
        assert_eq!(hierarchy.full_index_count(), mesh.indices().len());
    }

    #[test]
    fn test_summaries_match_clusters() {
        let (_, hierarchy) = build(HierarchyConfig::default());
        let mut next_start = 0;
        for summary in hierarchy.generations() {
            assert_eq!(summary.cluster_range.start, next_start);
            next_start = summary.cluster_range.end;

            let clusters = hierarchy.generation_clusters(summary.index as usize);
            let triangles: usize = clusters.iter().map(|cluster| cluster.triangle_count as usize).sum();
            assert_eq!(summary.triangle_count, triangles);
            assert!(summary.group_count >= 1);
        }
        assert_eq!(next_start, hierarchy.clusters().len());
    }

    #[test]
    fn test_debug_colors() {
        let (_, plain) = build(HierarchyConfig::default());
        assert!(plain.clusters().iter().all(|cluster| cluster.debug_color == [1.0; 3]));

        let (_, colored) = build(HierarchyConfig {
            debug_colors: true,
            ..Default::default()
        });
        for cluster in colored.clusters() {
            assert!(cluster
                .debug_color
                .iter()
                .all(|c| (DEBUG_COLOR_MIN..DEBUG_COLOR_MAX).contains(c)));
        }
    }

    #[test]
    fn test_same_seed_same_hierarchy() {
        let (_, a) = build(HierarchyConfig::default());
        let (_, b) = build(HierarchyConfig::default());
        assert_eq!(a.clusters(), b.clusters());
        assert_eq!(a.generations(), b.generations());
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = Mesh::new(Vec::<Vertex>::new(), Vec::new()).unwrap();
        let hierarchy = LodHierarchyBuilder::new(HierarchyConfig::default())
            .build(&mesh)
            .unwrap();

        assert!(hierarchy.is_empty());
        assert_eq!(hierarchy.generations().len(), 1);
        assert_eq!(hierarchy.generations()[0].triangle_count, 0);
    }

    #[test]
    fn test_single_generation_budget() {
        let (mesh, hierarchy) = build(HierarchyConfig {
            max_generations: 1,
            ..Default::default()
        });
        assert_eq!(hierarchy.generations().len(), 1);
        assert!(hierarchy.clusters().iter().all(Cluster::is_root));
        assert_eq!(hierarchy.generations()[0].triangle_count, mesh.triangle_count());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mesh = primitives::icosahedron(1.0);
        let builder = LodHierarchyBuilder::new(HierarchyConfig {
            max_vertices_per_cluster: 1000,
            ..Default::default()
        });
        assert!(matches!(builder.build(&mesh), Err(crate::LodError::InvalidConfig(_))));
    }

    #[test]
    fn test_custom_partitioner() {
        let mesh = primitives::uv_sphere(1.0, 32, 17);
        let hierarchy = LodHierarchyBuilder::new(HierarchyConfig::default())
            .with_partitioner(GreedyPartitioner { refinement_passes: 0 })
            .build(&mesh)
            .unwrap();
        assert!(hierarchy.generations().len() > 1);
    }
}
