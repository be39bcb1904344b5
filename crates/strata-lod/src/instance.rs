//! Per-instance selection parameters

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Spacing between neighbouring instances of [`grid_instances`] in the demo scene
pub const DEFAULT_INSTANCE_SPACING: f32 = 30.0;

/// One placement of a hierarchy in the world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceParams {
    pub position: Vec3,
    /// Uniform scale
    pub scale: f32,
    /// Largest acceptable projected error in pixels
    pub error_threshold: f32,
}

impl Default for InstanceParams {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Self::DEFAULT_ERROR_THRESHOLD)
    }
}

impl InstanceParams {
    /// One pixel
    pub const DEFAULT_ERROR_THRESHOLD: f32 = 1.0;

    pub fn new(position: Vec3, error_threshold: f32) -> Self {
        Self {
            position,
            scale: 1.0,
            error_threshold,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Object to world transform
    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), glam::Quat::IDENTITY, self.position)
    }
}

/// Lay `count` instances out in rows of `row_len`, rows growing down -Y.
///
/// Columns start one `spacing` right of the origin.
pub fn grid_instances(
    count: usize,
    row_len: usize,
    spacing: f32,
    scale: f32,
    error_threshold: f32,
) -> Vec<InstanceParams> {
    let row_len = row_len.max(1);
    (0..count)
        .map(|index| {
            let column = (index % row_len) as f32 + 1.0;
            let row = (index / row_len) as f32;
            InstanceParams::new(Vec3::new(column * spacing, -row * spacing, 0.0), error_threshold)
                .with_scale(scale)
        })
        .collect()
}
