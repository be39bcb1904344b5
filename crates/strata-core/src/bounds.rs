//! Bounding volumes
//!
//! Minimal enclosing spheres via Welzl's randomized incremental algorithm.
//! The recursion depth grows with the point count, so this is meant for the
//! small sets the LOD builder feeds it (triangle centres of one cluster, bound
//! centres of one group).

use glam::Vec3;
use smallvec::SmallVec;

use crate::math::BoundingSphere;
use crate::random::RandomSource;

/// Points a sphere in 3D can be pinned to before it is fully determined
const MAX_SUPPORT: usize = 4;

/// Relative slack used when testing whether a point is already enclosed
const CONTAINMENT_TOLERANCE: f32 = 1e-5;

type Support = SmallVec<[Vec3; MAX_SUPPORT]>;

/// Smallest sphere enclosing every point.
///
/// - no points: zero-radius sphere at the origin
/// - one point: zero-radius sphere at that point
/// - two points: the segment is the diameter
/// - otherwise: Welzl's algorithm, drawing pivots from `rng`
///
/// The returned radius is grown afterwards so that every input point is
/// contained even after floating-point rounding.
pub fn minimal_enclosing_sphere<R>(points: &[Vec3], rng: &mut R) -> BoundingSphere
where
    R: RandomSource + ?Sized,
{
    match points {
        [] => BoundingSphere::ZERO,
        [point] => BoundingSphere::new(*point, 0.0),
        [a, b] => BoundingSphere::from_diameter(*a, *b),
        _ => {
            let mut scratch = points.to_vec();
            let mut support = Support::new();
            let mut sphere = welzl(&mut scratch, points.len(), &mut support, rng);
            for &point in points {
                sphere.expand_to_include(point);
            }
            sphere
        }
    }
}

/// Sphere enclosing every input sphere.
///
/// Solves the point problem on the centres, then widens the radius so each
/// input sphere is fully inside. Not minimal, but conservative.
pub fn enclosing_sphere_of_spheres<R>(spheres: &[BoundingSphere], rng: &mut R) -> BoundingSphere
where
    R: RandomSource + ?Sized,
{
    if spheres.is_empty() {
        return BoundingSphere::ZERO;
    }

    let centers: Vec<Vec3> = spheres.iter().map(|sphere| sphere.center).collect();
    let mut result = minimal_enclosing_sphere(&centers, rng);
    for sphere in spheres {
        result.radius = result
            .radius
            .max(result.center.distance(sphere.center) + sphere.radius);
    }
    result
}

/// Minimal sphere enclosing `points[..count]` with every `support` point on its surface
fn welzl<R>(points: &mut [Vec3], count: usize, support: &mut Support, rng: &mut R) -> BoundingSphere
where
    R: RandomSource + ?Sized,
{
    if count == 0 || support.len() == MAX_SUPPORT {
        return sphere_from_support(support);
    }

    let pivot = rng.next_below(count as u32) as usize;
    points.swap(pivot, count - 1);
    let point = points[count - 1];

    let sphere = welzl(points, count - 1, support, rng);
    if sphere.contains_point_within(point, CONTAINMENT_TOLERANCE) {
        return sphere;
    }

    support.push(point);
    let sphere = welzl(points, count - 1, support, rng);
    support.pop();
    sphere
}

fn sphere_from_support(support: &[Vec3]) -> BoundingSphere {
    match support {
        [] => BoundingSphere::ZERO,
        [a] => BoundingSphere::new(*a, 0.0),
        [a, b] => BoundingSphere::from_diameter(*a, *b),
        [a, b, c] => circumsphere_of_triangle(*a, *b, *c)
            .unwrap_or_else(|| centroid_sphere(support)),
        [a, b, c, d] => circumsphere_of_tetrahedron(*a, *b, *c, *d)
            .unwrap_or_else(|| centroid_sphere(support)),
        _ => centroid_sphere(support),
    }
}

/// Sphere whose great circle passes through the three points; `None` when collinear
fn circumsphere_of_triangle(a: Vec3, b: Vec3, c: Vec3) -> Option<BoundingSphere> {
    let ab = b - a;
    let ac = c - a;
    let normal = ab.cross(ac);
    let normal_len_sq = normal.length_squared();

    if normal_len_sq <= 1e-12 * ab.length_squared() * ac.length_squared() || normal_len_sq == 0.0 {
        return None;
    }

    let offset = (normal.cross(ab) * ac.length_squared() + ac.cross(normal) * ab.length_squared())
        / (2.0 * normal_len_sq);
    Some(BoundingSphere::new(a + offset, offset.length()))
}

/// Sphere through all four points; `None` when coplanar
fn circumsphere_of_tetrahedron(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> Option<BoundingSphere> {
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    let det = 2.0 * ab.dot(ac.cross(ad));
    let scale = ab.length() * ac.length() * ad.length();

    if det.abs() <= 1e-6 * scale || det == 0.0 {
        return None;
    }

    let offset = (ac.cross(ad) * ab.length_squared()
        + ad.cross(ab) * ac.length_squared()
        + ab.cross(ac) * ad.length_squared())
        / det;
    Some(BoundingSphere::new(a + offset, offset.length()))
}

fn centroid_sphere(points: &[Vec3]) -> BoundingSphere {
    let center = points.iter().copied().sum::<Vec3>() / points.len().max(1) as f32;
    let radius = points
        .iter()
        .map(|point| center.distance(*point))
        .fold(0.0, f32::max);
    BoundingSphere::new(center, radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::Pcg32;

    fn random_cloud(rng: &mut Pcg32, count: usize, extent: f32) -> Vec<Vec3> {
        (0..count).map(|_| rng.next_vec3_range(-extent, extent)).collect()
    }

    #[test]
    fn test_trivial_point_counts() {
        let mut rng = Pcg32::new(1);

        assert_eq!(minimal_enclosing_sphere(&[], &mut rng), BoundingSphere::ZERO);

        let single = minimal_enclosing_sphere(&[Vec3::new(1.0, 2.0, 3.0)], &mut rng);
        assert_eq!(single.center, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(single.radius, 0.0);

        let pair = minimal_enclosing_sphere(&[Vec3::ZERO, Vec3::new(0.0, 4.0, 0.0)], &mut rng);
        assert_eq!(pair.center, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(pair.radius, 2.0);
    }

    #[test]
    fn test_equilateral_triangle() {
        let mut rng = Pcg32::new(2);
        let h = 3.0f32.sqrt() / 2.0;
        let points = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-0.5, h, 0.0),
            Vec3::new(-0.5, -h, 0.0),
        ];

        let sphere = minimal_enclosing_sphere(&points, &mut rng);
        assert!(sphere.center.length() < 1e-4);
        assert!((sphere.radius - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_octahedron_is_unit_sphere() {
        let mut rng = Pcg32::new(3);
        let points = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];

        let sphere = minimal_enclosing_sphere(&points, &mut rng);
        assert!(sphere.center.length() < 1e-4);
        assert!(sphere.radius >= 1.0 && sphere.radius < 1.0 + 1e-3);
    }

    #[test]
    fn test_obtuse_triangle_uses_longest_edge() {
        let mut rng = Pcg32::new(4);
        let points = [Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.2, 0.0)];

        let sphere = minimal_enclosing_sphere(&points, &mut rng);
        assert!((sphere.radius - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_random_clouds_are_enclosed_and_tight() {
        let mut rng = Pcg32::new(5);
        for round in 0..25 {
            let points = random_cloud(&mut rng, 10 + round * 7, 5.0);
            let sphere = minimal_enclosing_sphere(&points, &mut rng);

            for point in &points {
                assert!(sphere.contains_point_within(*point, 1e-5));
            }

            // Never worse than the naive centroid sphere, never smaller than half the diameter
            let naive = centroid_sphere(&points);
            assert!(sphere.radius <= naive.radius + 1e-4);
            let diameter = points
                .iter()
                .flat_map(|a| points.iter().map(move |b| a.distance(*b)))
                .fold(0.0, f32::max);
            assert!(sphere.radius + 1e-4 >= diameter * 0.5);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let points = random_cloud(&mut Pcg32::new(6), 64, 3.0);
        let a = minimal_enclosing_sphere(&points, &mut Pcg32::new(11));
        let b = minimal_enclosing_sphere(&points, &mut Pcg32::new(11));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sphere_of_spheres_contains_inputs() {
        let mut rng = Pcg32::new(7);
        let spheres: Vec<BoundingSphere> = (0..12)
            .map(|_| BoundingSphere::new(rng.next_vec3_range(-10.0, 10.0), rng.next_f32_range(0.1, 3.0)))
            .collect();

        let outer = enclosing_sphere_of_spheres(&spheres, &mut rng);
        for sphere in &spheres {
            assert!(outer.contains_sphere(sphere, 1e-4));
        }
        assert_eq!(enclosing_sphere_of_spheres(&[], &mut rng), BoundingSphere::ZERO);
    }

    #[test]
    fn test_degenerate_supports_fall_back() {
        assert!(circumsphere_of_triangle(Vec3::ZERO, Vec3::X, Vec3::X * 2.0).is_none());
        assert!(circumsphere_of_tetrahedron(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::X + Vec3::Y).is_none());

        let mut rng = Pcg32::new(8);
        let collinear: Vec<Vec3> = (0..10).map(|i| Vec3::X * i as f32).collect();
        let sphere = minimal_enclosing_sphere(&collinear, &mut rng);
        assert!((sphere.center - Vec3::X * 4.5).length() < 1e-3);
        assert!((sphere.radius - 4.5).abs() < 1e-3);
    }
}
