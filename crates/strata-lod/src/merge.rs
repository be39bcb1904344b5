//! Group merging
//!
//! Flattens the clusters of a group back into one triangle list over mesh
//! vertex indices, ready for simplification.

use std::ops::Range;

use strata_core::RandomSource;

use crate::cluster::ClusterSet;
use crate::group::ClusterGroup;

/// Debug colour components stay in this range so clusters never render black
pub const DEBUG_COLOR_MIN: f32 = 0.15;
pub const DEBUG_COLOR_MAX: f32 = 1.0;

/// Where one source cluster ended up in a [`MergedGroup`]
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSpan {
    /// Index into the generation's cluster list
    pub cluster: u32,
    /// Range of `MergedGroup::indices`
    pub indices: Range<usize>,
    /// Colour shared by all of the cluster's triangles, when requested
    pub color: Option<[f32; 3]>,
}

/// Concatenated triangles of a group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedGroup {
    pub indices: Vec<u32>,
    pub spans: Vec<ClusterSpan>,
}

impl MergedGroup {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn span_indices(&self, span: &ClusterSpan) -> &[u32] {
        &self.indices[span.indices.clone()]
    }
}

/// Random colour with every component in [`DEBUG_COLOR_MIN`], [`DEBUG_COLOR_MAX`])
pub fn random_debug_color<R: RandomSource + ?Sized>(rng: &mut R) -> [f32; 3] {
    [(); 3].map(|_| rng.next_f32_range(DEBUG_COLOR_MIN, DEBUG_COLOR_MAX))
}

/// Concatenate every triangle of `group`, resolved to mesh vertex indices.
///
/// With a `palette` each member cluster also draws one debug colour.
pub fn merge_group(
    set: &ClusterSet,
    group: &ClusterGroup,
    mut palette: Option<&mut (dyn RandomSource + '_)>,
) -> MergedGroup {
    let triangle_total: usize = group
        .clusters
        .iter()
        .map(|&index| set.clusters[index as usize].triangle_count as usize)
        .sum();

    let mut merged = MergedGroup {
        indices: Vec::with_capacity(triangle_total * 3),
        spans: Vec::with_capacity(group.clusters.len()),
    };

    for &index in &group.clusters {
        let cluster = &set.clusters[index as usize];
        let start = merged.indices.len();
        merged
            .indices
            .extend(set.cluster_triangles(cluster).flatten());

        merged.spans.push(ClusterSpan {
            cluster: index,
            indices: start..merged.indices.len(),
            color: palette.as_deref_mut().map(random_debug_color),
        });
    }

    merged
}
