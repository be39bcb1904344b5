//! Runtime cluster selection
//!
//! Each instance independently cuts the hierarchy: a cluster is drawn when its
//! own projected error fits the instance's pixel threshold and its parent's
//! does not. Clusters of one generation that replace the same group share
//! their error and LOD bound, so the cut never mixes a cluster with its own
//! ancestors or descendants.

use glam::{Mat4, Vec3};
use log::warn;
use rayon::prelude::*;
use strata_core::BoundingSphere;
use strata_core::math::max_axis_scale;

use crate::cluster::{Cluster, ClusterId};
use crate::hierarchy::LodHierarchy;
use crate::instance::InstanceParams;

/// Camera state for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// World to view transform
    pub view: Mat4,
    /// Object transform applied before the instance transform
    pub model: Mat4,
    /// Viewport width in pixels
    pub viewport_width: f32,
    /// Horizontal field of view in radians
    pub horizontal_fov: f32,
}

impl ViewState {
    pub fn new(view: Mat4, viewport_width: f32, horizontal_fov: f32) -> Self {
        Self {
            view,
            model: Mat4::IDENTITY,
            viewport_width,
            horizontal_fov,
        }
    }

    /// Right-handed camera at `eye` looking at `target` with +Y up
    pub fn look_at(eye: Vec3, target: Vec3, viewport_width: f32, horizontal_fov: f32) -> Self {
        Self::new(Mat4::look_at_rh(eye, target, Vec3::Y), viewport_width, horizontal_fov)
    }

    pub fn with_model(mut self, model: Mat4) -> Self {
        self.model = model;
        self
    }

    /// Pixels covered by a view-space slope of one: `W/2 · cot(hfov/2)`
    pub fn projection_scale(&self) -> f32 {
        self.viewport_width * 0.5 / (self.horizontal_fov * 0.5).tan()
    }

    pub fn model_view(&self, instance: &InstanceParams) -> Mat4 {
        self.view * instance.transform() * self.model
    }
}

/// Clusters picked for one instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Selected cluster ids in flattened order
    pub clusters: Vec<ClusterId>,
    /// Concatenated triangle lists of the selected clusters
    pub indices: Vec<u32>,
    /// Sum of the selected clusters' vertex counts
    pub vertex_count: usize,
    /// Mean generation of the selected clusters, [`Selection::NO_GENERATION`] when empty
    pub average_generation: f32,
}

impl Selection {
    /// Reported as average generation when nothing was selected
    pub const NO_GENERATION: f32 = -1.0;

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Projected size in pixels of a geometric `error` attached to `bound`.
///
/// Unlike the textbook formula, which measures distance to the bound's
/// centre, distance here is measured to the nearest point of the bound, so a
/// bound that contains a child's bound never projects a smaller error than
/// the child.
/// Zero error projects to zero; an error sphere reaching the eye projects to
/// infinity.
pub fn screen_space_error(
    bound: &BoundingSphere,
    error: f32,
    model_view: Mat4,
    projection_scale: f32,
) -> f32 {
    if !(error > 0.0) {
        return 0.0;
    }

    let view_bound = bound.transform(model_view);
    let radius = error * max_axis_scale(model_view);
    let distance = (view_bound.center.length() - view_bound.radius).max(0.0);
    if distance <= radius {
        return f32::INFINITY;
    }

    projection_scale * radius / (distance * distance - radius * radius).sqrt()
}

/// Cut `clusters` for one instance.
///
/// Output follows the flattened cluster order. Index buffers longer than
/// `full_index_count` are clamped to it.
pub fn select_clusters(
    clusters: &[Cluster],
    view: &ViewState,
    instance: &InstanceParams,
    full_index_count: usize,
) -> Selection {
    let model_view = view.model_view(instance);
    let projection_scale = view.projection_scale();
    let threshold = instance.error_threshold;

    let mut selection = Selection::default();
    let mut generation_sum = 0u64;

    for cluster in clusters {
        let own = screen_space_error(&cluster.lod_bound, cluster.error, model_view, projection_scale);
        // NaN thresholds select nothing
        if !(own <= threshold) {
            continue;
        }
        let parent_too_coarse = cluster.parent.as_ref().is_none_or(|parent| {
            screen_space_error(&parent.bound, parent.error, model_view, projection_scale) > threshold
        });
        if !parent_too_coarse {
            continue;
        }

        selection.clusters.push(cluster.id);
        selection.indices.extend_from_slice(&cluster.indices);
        selection.vertex_count += cluster.vertex_count as usize;
        generation_sum += u64::from(cluster.generation);
    }

    selection.average_generation = if selection.clusters.is_empty() {
        Selection::NO_GENERATION
    } else {
        generation_sum as f32 / selection.clusters.len() as f32
    };

    if selection.indices.len() > full_index_count {
        warn!(
            "selection produced {} indices, clamping to the full mesh's {full_index_count}",
            selection.indices.len()
        );
        selection.indices.truncate(full_index_count - full_index_count % 3);
    }

    selection
}

impl LodHierarchy {
    /// Cut the hierarchy for one instance
    pub fn select(&self, view: &ViewState, instance: &InstanceParams) -> Selection {
        select_clusters(self.clusters(), view, instance, self.full_index_count())
    }

    /// Cut the hierarchy for every instance in parallel; results follow `instances`
    pub fn select_instances(&self, view: &ViewState, instances: &[InstanceParams]) -> Vec<Selection> {
        let span = tracing::debug_span!("select_instances", instances = instances.len());
        let _enter = span.enter();

        instances
            .par_iter()
            .map(|instance| self.select(view, instance))
            .collect()
    }
}
