//! Mesh data feeding the voxelizer
//!
//! Source meshes are indexed triangle lists in local space. The voxelizer
//! only ever consumes them in unpacked form, three contiguous corners per
//! triangle, so each projection thread can walk triangles without an index
//! indirection.

pub mod mesh_data;
pub mod mesh_operations;

pub use mesh_data::{InstanceMesh, InstanceVertex, SourceMesh, SubmeshRange};
pub use mesh_operations::{
    instance_cube_mesh, mesh_bounds, triangle_count, unit_cube_mesh, unpack_triangles,
    uv_sphere_mesh, validate_mesh,
};
