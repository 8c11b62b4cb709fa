//! CPU reference implementation of the voxelization kernels

pub mod backend;
pub mod kernels;

pub use backend::{CpuBackend, CpuRun};
pub use kernels::{combine, compact, project_axis, ray_hit_depth, voxelize, CpuVoxelization};
