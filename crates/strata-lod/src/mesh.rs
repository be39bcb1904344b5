//! Mesh input
//!
//! The vertex layout shared by every generation and the validated
//! vertex/index pair the hierarchy builder consumes.

use std::mem::{offset_of, size_of};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use meshopt::VertexDataAdapter;
use strata_core::Aabb;

use crate::{LodError, LodResult};

/// Maximum bone influences per vertex
pub const MAX_BONE_INFLUENCES: usize = 4;

/// Mesh vertex
///
/// Plain-old-data so the whole buffer can be handed to the mesh kernels as
/// bytes. Positions are never rewritten once a mesh is built.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Vertex colour (visualisation only)
    pub color: [f32; 3],
    /// Texture coordinate
    pub uv: [f32; 2],
    /// Bone indices, [`Vertex::NO_BONE`] for unused slots
    pub bone_ids: [i32; MAX_BONE_INFLUENCES],
    /// Bone weights matching `bone_ids`
    pub bone_weights: [f32; MAX_BONE_INFLUENCES],
}

impl Vertex {
    /// Marker for an unused bone slot
    pub const NO_BONE: i32 = -1;

    /// Unskinned white vertex
    pub fn new(position: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            color: [1.0; 3],
            uv: uv.to_array(),
            bone_ids: [Self::NO_BONE; MAX_BONE_INFLUENCES],
            bone_weights: [0.0; MAX_BONE_INFLUENCES],
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color.to_array();
        self
    }

    /// Attach a bone influence to the first free slot; ignored when all slots are taken
    pub fn with_bone(mut self, bone: i32, weight: f32) -> Self {
        if let Some(slot) = self.bone_ids.iter().position(|&id| id == Self::NO_BONE) {
            self.bone_ids[slot] = bone;
            self.bone_weights[slot] = weight;
        }
        self
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    /// Whether any bone influences this vertex
    pub fn is_skinned(&self) -> bool {
        self.bone_ids.iter().any(|&id| id != Self::NO_BONE)
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec2::ZERO)
    }
}

/// Triangle mesh ready for LOD construction
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Arc<[Vertex]>,
    indices: Vec<u32>,
}

impl Mesh {
    /// Validates that indices form whole triangles and stay inside the vertex buffer
    pub fn new(vertices: impl Into<Arc<[Vertex]>>, indices: Vec<u32>) -> LodResult<Self> {
        let vertices = vertices.into();

        if indices.len() % 3 != 0 {
            return Err(LodError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&index) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
            return Err(LodError::InvalidMesh(format!(
                "index {index} out of range for {} vertices",
                vertices.len()
            )));
        }

        Ok(Self { vertices, indices })
    }

    /// For generators whose output is valid by construction
    pub(crate) fn new_unchecked(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        debug_assert!(indices.len() % 3 == 0);
        debug_assert!(indices.iter().all(|&index| (index as usize) < vertices.len()));
        Self {
            vertices: vertices.into(),
            indices,
        }
    }

    pub fn vertices(&self) -> &Arc<[Vertex]> {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bounds of every vertex, referenced or not
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(Vertex::position))
    }
}

/// Byte view of a vertex buffer for the meshopt kernels
pub(crate) fn vertex_adapter(vertices: &[Vertex]) -> LodResult<VertexDataAdapter<'_>> {
    VertexDataAdapter::new(
        bytemuck::cast_slice(vertices),
        size_of::<Vertex>(),
        offset_of!(Vertex, position),
    )
    .map_err(|err| LodError::VertexLayout(format!("{err:?}")))
}

/// Centre of the triangle `[a, b, c]`
pub(crate) fn triangle_center(vertices: &[Vertex], triangle: [u32; 3]) -> Vec3 {
    let [a, b, c] = triangle.map(|index| vertices[index as usize].position());
    (a + b + c) / 3.0
}
