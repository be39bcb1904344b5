//! Procedural meshes
//!
//! Closed shapes for exercising the hierarchy and an open height field for
//! border handling. Every generator keeps triangle winding consistent and
//! shares vertices between neighbouring triangles.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use crate::mesh::{Mesh, Vertex};

/// Regular icosahedron with vertices on a sphere of `radius`
pub fn icosahedron(radius: f32) -> Mesh {
    let t = (1.0 + 5f32.sqrt()) * 0.5;
    let corners = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];
    let vertices = corners
        .iter()
        .map(|corner| {
            let direction = corner.normalize();
            Vertex::new(direction * radius, spherical_uv(direction))
        })
        .collect();

    #[rustfmt::skip]
    let indices = vec![
        0, 11, 5,   0, 5, 1,    0, 1, 7,    0, 7, 10,   0, 10, 11,
        1, 5, 9,    5, 11, 4,   11, 10, 2,  10, 7, 6,   7, 1, 8,
        3, 9, 4,    3, 4, 2,    3, 2, 6,    3, 6, 8,    3, 8, 9,
        4, 9, 5,    2, 4, 11,   6, 2, 10,   8, 6, 7,    9, 8, 1,
    ];

    Mesh::new_unchecked(vertices, indices)
}

/// Latitude/longitude sphere.
///
/// `slices` columns around the Y axis and `stacks` rows from pole to pole,
/// clamped to at least 3 and 2. Each pole is a single vertex and the seam
/// reuses the first column, so the mesh is closed:
/// `2 · slices · (stacks − 1)` triangles over `slices · (stacks − 1) + 2` vertices.
pub fn uv_sphere(radius: f32, slices: u32, stacks: u32) -> Mesh {
    let slices = slices.max(3);
    let stacks = stacks.max(2);

    let mut vertices = Vec::with_capacity((slices * (stacks - 1) + 2) as usize);
    vertices.push(Vertex::new(Vec3::Y * radius, Vec2::new(0.5, 0.0)));
    for ring in 1..stacks {
        let phi = PI * ring as f32 / stacks as f32;
        for slice in 0..slices {
            let theta = TAU * slice as f32 / slices as f32;
            let direction = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            vertices.push(Vertex::new(
                direction * radius,
                Vec2::new(slice as f32 / slices as f32, ring as f32 / stacks as f32),
            ));
        }
    }
    let south = vertices.len() as u32;
    vertices.push(Vertex::new(-Vec3::Y * radius, Vec2::new(0.5, 1.0)));

    let ring_vertex = |ring: u32, slice: u32| 1 + (ring - 1) * slices + slice % slices;
    let last_ring = stacks - 1;

    let mut indices = Vec::with_capacity((6 * slices * (stacks - 1)) as usize);
    for slice in 0..slices {
        indices.extend_from_slice(&[0, ring_vertex(1, slice + 1), ring_vertex(1, slice)]);
    }
    for ring in 1..last_ring {
        for slice in 0..slices {
            let a = ring_vertex(ring, slice);
            let b = ring_vertex(ring, slice + 1);
            let c = ring_vertex(ring + 1, slice);
            let d = ring_vertex(ring + 1, slice + 1);
            indices.extend_from_slice(&[a, b, d, a, d, c]);
        }
    }
    for slice in 0..slices {
        indices.extend_from_slice(&[ring_vertex(last_ring, slice), ring_vertex(last_ring, slice + 1), south]);
    }

    Mesh::new_unchecked(vertices, indices)
}

/// Open `columns × rows` grid of quads spanning `size` in X and Z around the
/// origin, lifted by `height(x, z)`
pub fn height_field(columns: u32, rows: u32, size: f32, height: impl Fn(f32, f32) -> f32) -> Mesh {
    let columns = columns.max(1);
    let rows = rows.max(1);
    let stride = columns + 1;

    let mut vertices = Vec::with_capacity((stride * (rows + 1)) as usize);
    for row in 0..=rows {
        for column in 0..=columns {
            let u = column as f32 / columns as f32;
            let v = row as f32 / rows as f32;
            let x = (u - 0.5) * size;
            let z = (v - 0.5) * size;
            vertices.push(Vertex::new(Vec3::new(x, height(x, z), z), Vec2::new(u, v)));
        }
    }

    let mut indices = Vec::with_capacity((6 * columns * rows) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let a = row * stride + column;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }

    Mesh::new_unchecked(vertices, indices)
}

/// Rolling terrain used by the demo scene
pub fn wave_terrain(resolution: u32, size: f32) -> Mesh {
    height_field(resolution, resolution, size, |x, z| {
        0.1 * size * ((x * 4.0 / size).sin() * (z * 3.0 / size).cos())
    })
}

fn spherical_uv(direction: Vec3) -> Vec2 {
    Vec2::new(
        0.5 + direction.z.atan2(direction.x) / TAU,
        direction.y.clamp(-1.0, 1.0).acos() / PI,
    )
}
