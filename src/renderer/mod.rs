//! Voxel drawing: indirect args, frustum test and the instanced renderer

pub mod culling;
pub mod indirect;
pub mod instanced;

pub use culling::Frustum;
pub use indirect::IndirectDrawArgs;
pub use instanced::{DrawBinding, RenderTargetDesc, VoxelDrawUniforms, VoxelInstanceRenderer};
