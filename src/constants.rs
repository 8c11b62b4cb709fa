//! Shared constants for the voxelization pipeline.
//!
//! Workgroup sizes here must match the `@workgroup_size` attributes in
//! `shaders/compute/voxelize.wgsl`.

/// Compute workgroup dimensions
pub mod workgroup {
    /// 2D projection kernels: 8x8 plane cells per group
    pub const PROJECTION_X: u32 = 8;
    pub const PROJECTION_Y: u32 = 8;

    /// 3D kernels (clear, combine, compact)
    ///
    /// 8x8x4 keeps the group at 256 invocations, the wgpu default
    /// `max_compute_invocations_per_workgroup`.
    pub const VOLUME_X: u32 = 8;
    pub const VOLUME_Y: u32 = 8;
    pub const VOLUME_Z: u32 = 4;
}

/// GPU limits the planner validates against before allocating anything
pub mod gpu_limits {
    /// Default `max_storage_buffer_binding_size` guaranteed by wgpu (128 MiB)
    pub const MAX_BUFFER_BINDING_SIZE: u64 = 128 << 20;

    /// Upper bound on cells along a single axis
    pub const MAX_AXIS_RESOLUTION: u32 = 1024;
}

/// Voxel grid storage layout
pub mod layout {
    /// Bits stored per projection word
    pub const BITS_PER_WORD: u32 = 32;

    /// Bytes per compacted voxel position (vec4<f32>)
    pub const POSITION_STRIDE: u64 = 16;

    /// Bytes per occupancy volume cell (u32 flag)
    pub const VOLUME_CELL_SIZE: u64 = 4;

    /// Bytes per triangle vertex on the device (vec4<f32>)
    pub const TRIANGLE_VERTEX_STRIDE: u64 = 16;
}

/// Reveal animation tuning
pub mod reveal {
    /// Instances revealed per second at speed 1.0
    pub const STEPS_PER_SECOND: f32 = 10.0;
}

/// Default configuration values
pub mod defaults {
    pub const SPLIT_COUNT: [u32; 3] = [32, 32, 32];
    pub const VOXEL_SIZE: [f32; 3] = [0.9, 0.9, 0.9];
    pub const VOXEL_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
}
