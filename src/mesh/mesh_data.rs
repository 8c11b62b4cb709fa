//! Mesh data structures - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in mesh_operations.rs

use crate::bounds::AABB;
use bytemuck::{Pod, Zeroable};

/// Indexed triangle mesh in local space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMesh {
    /// Vertex positions
    pub vertices: Vec<[f32; 3]>,

    /// Triangle list indices, length must be a multiple of 3
    pub indices: Vec<u32>,

    /// Local bounds reported by the host; computed from the vertices when unset
    pub bounds: Option<AABB>,
}

/// Vertex of the mesh drawn once per voxel
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Index range of one submesh inside an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmeshRange {
    pub index_start: u32,
    pub index_count: u32,
    pub base_vertex: i32,
}

/// Mesh instanced at every occupied voxel
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceMesh {
    pub vertices: Vec<InstanceVertex>,
    pub indices: Vec<u32>,
    /// Submesh whose range is baked into the indirect draw arguments
    pub submesh: SubmeshRange,
}
