//! wgpu side of the voxelizer: typed kernel bindings, pipelines, per-run
//! buffers, command encoding and the backend that ties them together.

pub mod backend;
pub mod bindings;
pub mod dispatch;
pub mod error_recovery;
pub mod kernels;
pub mod resources;

pub use backend::{GpuRun, WgpuBackend};
pub use bindings::{KernelStage, ResourceSlot, VoxelizeParams};
pub use error_recovery::{GpuErrorRecovery, GpuRecoveryError};
pub use kernels::VoxelKernels;
pub use resources::RunResources;
