//! Clusters (meshlets)
//!
//! Splits an index buffer into clusters of bounded vertex and triangle count.
//! Triangles are packed greedily by the meshoptimizer meshlet builder, which
//! keeps triangles sharing vertices together. Every cluster stores ranges into
//! two buffers owned by its [`ClusterSet`]: a vertex remap (cluster-local to
//! mesh vertex index) and the local triangle list (one byte per corner).

use std::ops::Range;

use glam::Vec3;
use strata_core::{BoundingSphere, RandomSource, minimal_enclosing_sphere};

use crate::mesh::{Vertex, triangle_center, vertex_adapter};
use crate::{LodError, LodResult};

/// Position of a cluster in the flattened hierarchy
pub type ClusterId = u32;

/// Hard limits of the meshlet builder
pub const MAX_CLUSTER_VERTICES: usize = 255;
pub const MAX_CLUSTER_TRIANGLES: usize = 512;

/// Link from a cluster to the coarser cluster set that replaces its group
#[derive(Debug, Clone, PartialEq)]
pub struct ParentLink {
    /// Error of the replacement clusters
    pub error: f32,
    /// LOD bound of the replacement clusters
    pub bound: BoundingSphere,
    /// Ids of the replacement clusters
    pub clusters: Range<ClusterId>,
}

/// A cluster of at most [`ClusterLimits::max_triangles`] triangles
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Index into the flattened cluster array
    pub id: ClusterId,
    /// Generation this cluster belongs to, 0 being the finest
    pub generation: u32,
    /// First local index in the owning set's `triangles` buffer
    pub triangle_offset: u32,
    pub triangle_count: u32,
    /// First entry in the owning set's `vertex_remap` buffer
    pub vertex_offset: u32,
    pub vertex_count: u32,
    /// Sphere around the cluster's triangle centres
    pub bound: BoundingSphere,
    /// Sphere shared by the cluster set this cluster was created with; encloses
    /// every descendant, used for screen-space error
    pub lod_bound: BoundingSphere,
    /// Accumulated simplification error
    pub error: f32,
    /// Coarser replacement, `None` for roots
    pub parent: Option<ParentLink>,
    /// Group index within its own generation
    pub group: u32,
    /// Group of the previous generation this cluster was simplified from
    pub source_group: Option<u32>,
    /// Visualisation colour
    pub debug_color: [f32; 3],
    /// Triangle list in mesh vertex indices, filled when the hierarchy is finished
    pub indices: Vec<u32>,
}

impl Cluster {
    fn new(triangles: Range<u32>, vertices: Range<u32>, bound: BoundingSphere) -> Self {
        Self {
            id: 0,
            generation: 0,
            triangle_offset: triangles.start,
            triangle_count: triangles.end - triangles.start,
            vertex_offset: vertices.start,
            vertex_count: vertices.end - vertices.start,
            bound,
            lod_bound: bound,
            error: 0.0,
            parent: None,
            group: 0,
            source_group: None,
            debug_color: [1.0; 3],
            indices: Vec::new(),
        }
    }

    /// Whether nothing coarser replaces this cluster
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn parent_error(&self) -> Option<f32> {
        self.parent.as_ref().map(|parent| parent.error)
    }

    /// Range in the owning set's `triangles` buffer (three entries per triangle)
    pub fn local_index_range(&self) -> Range<usize> {
        let start = self.triangle_offset as usize;
        start..start + self.triangle_count as usize * 3
    }

    /// Range in the owning set's `vertex_remap` buffer
    pub fn vertex_range(&self) -> Range<usize> {
        let start = self.vertex_offset as usize;
        start..start + self.vertex_count as usize
    }
}

/// Cluster caps and meshlet builder tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterLimits {
    pub max_vertices: usize,
    pub max_triangles: usize,
    pub cone_weight: f32,
}

impl ClusterLimits {
    pub fn validate(&self) -> LodResult<()> {
        if !(3..=MAX_CLUSTER_VERTICES).contains(&self.max_vertices) {
            return Err(LodError::InvalidConfig(format!(
                "max vertices per cluster {} must be in 3..={MAX_CLUSTER_VERTICES}",
                self.max_vertices
            )));
        }
        if !(4..=MAX_CLUSTER_TRIANGLES).contains(&self.max_triangles) || self.max_triangles % 4 != 0 {
            return Err(LodError::InvalidConfig(format!(
                "max triangles per cluster {} must be a multiple of 4 in 4..={MAX_CLUSTER_TRIANGLES}",
                self.max_triangles
            )));
        }
        if !(0.0..=1.0).contains(&self.cone_weight) {
            return Err(LodError::InvalidConfig(format!(
                "cone weight {} must be in [0, 1]",
                self.cone_weight
            )));
        }
        Ok(())
    }
}

impl Default for ClusterLimits {
    fn default() -> Self {
        Self {
            max_vertices: 128,
            max_triangles: 128,
            cone_weight: 0.5,
        }
    }
}

/// Clusters plus the remap buffers they address
#[derive(Debug, Clone, Default)]
pub struct ClusterSet {
    pub clusters: Vec<Cluster>,
    /// Cluster-local vertex slot to mesh vertex index
    pub vertex_remap: Vec<u32>,
    /// Local triangle corners, indexing into a cluster's `vertex_remap` range
    pub triangles: Vec<u8>,
}

impl ClusterSet {
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.clusters.iter().map(|cluster| cluster.triangle_count as usize).sum()
    }

    /// Triangles of `cluster` in mesh vertex indices
    pub fn cluster_triangles<'a>(&'a self, cluster: &Cluster) -> impl Iterator<Item = [u32; 3]> + 'a {
        let remap = &self.vertex_remap[cluster.vertex_range()];
        self.triangles[cluster.local_index_range()]
            .chunks_exact(3)
            .map(move |corners| [0, 1, 2].map(|corner| remap[corners[corner] as usize]))
    }

    /// Move `other`'s clusters to the end of this set, rebasing their offsets
    pub fn append(&mut self, other: ClusterSet) {
        let triangle_base = self.triangles.len() as u32;
        let vertex_base = self.vertex_remap.len() as u32;

        self.triangles.extend_from_slice(&other.triangles);
        self.vertex_remap.extend_from_slice(&other.vertex_remap);
        self.clusters.extend(other.clusters.into_iter().map(|mut cluster| {
            cluster.triangle_offset += triangle_base;
            cluster.vertex_offset += vertex_base;
            cluster
        }));
    }
}

/// Partition `indices` into clusters no larger than `limits`.
///
/// Each cluster's bound is the minimal sphere around its triangle centres.
/// An empty index buffer yields an empty set.
pub fn build_clusters<R>(
    vertices: &[Vertex],
    indices: &[u32],
    limits: &ClusterLimits,
    rng: &mut R,
) -> LodResult<ClusterSet>
where
    R: RandomSource + ?Sized,
{
    limits.validate()?;
    if indices.is_empty() {
        return Ok(ClusterSet::default());
    }
    if indices.len() % 3 != 0 {
        return Err(LodError::InvalidMesh(format!(
            "index count {} is not a multiple of 3",
            indices.len()
        )));
    }

    let adapter = vertex_adapter(vertices)?;
    let mut meshlets = meshopt::build_meshlets(
        indices,
        &adapter,
        limits.max_vertices,
        limits.max_triangles,
        limits.cone_weight,
    );

    let mut set = ClusterSet {
        clusters: Vec::with_capacity(meshlets.meshlets.len()),
        vertex_remap: std::mem::take(&mut meshlets.vertices),
        triangles: std::mem::take(&mut meshlets.triangles),
    };

    let mut centers: Vec<Vec3> = Vec::with_capacity(limits.max_triangles);
    for meshlet in &meshlets.meshlets {
        let triangles = meshlet.triangle_offset..meshlet.triangle_offset + meshlet.triangle_count;
        let slots = meshlet.vertex_offset..meshlet.vertex_offset + meshlet.vertex_count;
        let mut cluster = Cluster::new(triangles, slots, BoundingSphere::ZERO);

        centers.clear();
        centers.extend(
            set.cluster_triangles(&cluster)
                .map(|triangle| triangle_center(vertices, triangle)),
        );
        cluster.bound = minimal_enclosing_sphere(&centers, rng);
        cluster.lod_bound = cluster.bound;
        set.clusters.push(cluster);
    }

    log::trace!(
        "clustered {} triangles into {} clusters",
        indices.len() / 3,
        set.len()
    );
    Ok(set)
}
