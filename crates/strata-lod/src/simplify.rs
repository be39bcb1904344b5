//! Group simplification
//!
//! Reduces a merged group with meshoptimizer's edge-collapse simplifier. The
//! group border is locked: a vertex on an edge that only one of the group's
//! triangles uses may be shared with a neighbouring group, so it must survive
//! untouched or the two groups would crack apart. Simplification only rewrites
//! indices; vertex positions are never changed.

use meshopt::SimplifyOptions;
use strata_core::math::lerp;

use crate::config::HierarchyConfig;
use crate::mesh::{Vertex, vertex_adapter};
use crate::LodResult;

/// Output of [`simplify_group`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimplifiedGroup {
    /// Reduced triangle list; may equal the input, may be empty
    pub indices: Vec<u32>,
    /// Achieved geometric error in object-space units
    pub error: f32,
}

impl SimplifiedGroup {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Relative error budget for `generation`, growing from the config minimum
/// towards its maximum as the hierarchy gets coarser
pub fn target_error(generation: u32, max_generations: u32, config: &HierarchyConfig) -> f32 {
    let t = if max_generations == 0 {
        1.0
    } else {
        (generation as f32 / max_generations as f32).clamp(0.0, 1.0)
    };
    lerp(config.min_target_error, config.max_target_error, t)
}

/// Simplify `indices` to about `simplify_ratio` of its triangles with the border locked.
///
/// `generation` is the generation the result will belong to.
pub fn simplify_group(
    indices: &[u32],
    vertices: &[Vertex],
    generation: u32,
    max_generations: u32,
    config: &HierarchyConfig,
) -> LodResult<SimplifiedGroup> {
    if indices.is_empty() {
        return Ok(SimplifiedGroup::default());
    }

    let adapter = vertex_adapter(vertices)?;
    let target_count = (indices.len() as f32 * config.simplify_ratio) as usize / 3 * 3;
    let budget = target_error(generation, max_generations, config);

    let mut relative_error = 0.0f32;
    let simplified = meshopt::simplify(
        indices,
        &adapter,
        target_count,
        budget,
        SimplifyOptions::LockBorder,
        Some(&mut relative_error),
    );
    let error = relative_error * meshopt::simplify_scale(&adapter);

    log::trace!(
        "simplified {} -> {} triangles (target {}, budget {budget:.3}, error {error:.5})",
        indices.len() / 3,
        simplified.len() / 3,
        target_count / 3
    );

    Ok(SimplifiedGroup {
        indices: simplified,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterLimits, build_clusters};
    use crate::group::group_clusters;
    use crate::merge::merge_group;
    use crate::partition::GreedyPartitioner;
    use crate::primitives;
    use ahash::{AHashMap, AHashSet};
    use strata_core::Pcg32;

    #[test]
    fn test_target_error_interpolates() {
        let config = HierarchyConfig::default();
        assert!((target_error(0, 5, &config) - 0.01).abs() < 1e-6);
        assert!((target_error(5, 5, &config) - 0.99).abs() < 1e-6);
        assert!((target_error(1, 5, &config) - (0.99 * 0.2 + 0.01 * 0.8)).abs() < 1e-6);
        assert!(target_error(2, 5, &config) < target_error(3, 5, &config));
    }

    #[test]
    fn test_empty_input() {
        let config = HierarchyConfig::default();
        let result = simplify_group(&[], &[], 1, 5, &config).unwrap();
        assert_eq!(result.triangle_count(), 0);
        assert_eq!(result.error, 0.0);
    }

    #[test]
    fn test_closed_mesh_halves() {
        let mesh = primitives::uv_sphere(1.0, 40, 21);
        let config = HierarchyConfig::default();
        let result = simplify_group(mesh.indices(), mesh.vertices(), 1, 5, &config).unwrap();

        assert!(result.triangle_count() > 0);
        assert!(result.triangle_count() <= mesh.triangle_count() / 2 + 2);
        assert!(result.error > 0.0);
        assert!(result.indices.iter().all(|&index| (index as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_shared_group_vertices_survive() {
        let mesh = primitives::uv_sphere(1.0, 64, 33);
        let limits = ClusterLimits {
            max_vertices: 64,
            max_triangles: 64,
            cone_weight: 0.0,
        };
        let set = build_clusters(mesh.vertices(), mesh.indices(), &limits, &mut Pcg32::new(4)).unwrap();
        let groups = group_clusters(&set, 4, &GreedyPartitioner::default()).unwrap();
        assert!(groups.len() > 1);

        let merged: Vec<_> = groups.iter().map(|group| merge_group(&set, group, None)).collect();

        // Vertex -> groups using it
        let mut users: AHashMap<u32, AHashSet<usize>> = AHashMap::new();
        for (group, buffer) in merged.iter().enumerate() {
            for &index in &buffer.indices {
                users.entry(index).or_default().insert(group);
            }
        }

        let config = HierarchyConfig::default();
        let before = mesh.vertices().to_vec();
        let mut remaining = 0;
        for (group, buffer) in merged.iter().enumerate() {
            let result = simplify_group(&buffer.indices, mesh.vertices(), 1, 5, &config).unwrap();
            assert!(result.triangle_count() <= buffer.triangle_count());
            remaining += result.triangle_count();

            let kept: AHashSet<u32> = result.indices.iter().copied().collect();
            for (&vertex, owners) in &users {
                if owners.len() > 1 && owners.contains(&group) {
                    assert!(kept.contains(&vertex), "border vertex {vertex} of group {group} was collapsed");
                }
            }
        }
        assert!(remaining < mesh.triangle_count());
        assert_eq!(&mesh.vertices()[..], before.as_slice());
    }
}
