//! Math utilities
//!
//! glam re-exports plus the two bounding volumes the LOD pipeline needs.

pub use glam::{Mat4, Quat, Vec2, Vec3};

/// Axis-aligned box; [`Aabb::EMPTY`] is inverted so any point expands it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut aabb, point| {
            aabb.expand_to_include(point);
            aabb
        })
    }

    pub fn size(&self) -> Vec3 {
        (self.max - self.min).max(Vec3::ZERO)
    }

    /// True until at least one point was added
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn expand_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Sphere given by centre and radius
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub const ZERO: Self = Self {
        center: Vec3::ZERO,
        radius: 0.0,
    };

    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere having the segment `a`-`b` as its diameter
    pub fn from_diameter(a: Vec3, b: Vec3) -> Self {
        Self::new((a + b) * 0.5, a.distance(b) * 0.5)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }

    /// [`contains_point`](Self::contains_point) with the radius grown by
    /// `tolerance`, both relatively and absolutely
    pub fn contains_point_within(&self, point: Vec3, tolerance: f32) -> bool {
        let radius = self.radius * (1.0 + tolerance) + tolerance;
        self.center.distance_squared(point) <= radius * radius
    }

    /// Whether `other` lies entirely inside, up to an absolute `tolerance`
    pub fn contains_sphere(&self, other: &BoundingSphere, tolerance: f32) -> bool {
        self.center.distance(other.center) + other.radius <= self.radius + tolerance
    }

    /// Grow the radius until `point` is inside; the centre stays
    pub fn expand_to_include(&mut self, point: Vec3) {
        self.radius = self.radius.max(self.center.distance(point));
    }

    /// Conservative transform; the radius follows the largest axis scale of `matrix`
    pub fn transform(&self, matrix: Mat4) -> BoundingSphere {
        Self::new(
            matrix.transform_point3(self.center),
            self.radius * max_axis_scale(matrix),
        )
    }
}

/// Largest scale factor applied by the linear part of `matrix`
pub fn max_axis_scale(matrix: Mat4) -> f32 {
    [matrix.x_axis, matrix.y_axis, matrix.z_axis]
        .map(|axis| axis.truncate().length_squared())
        .into_iter()
        .fold(0.0, f32::max)
        .sqrt()
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
