//! Resolution planning
//!
//! Turns mesh bounds plus the configured mode into a concrete grid. The grid
//! always spans exactly the mesh bounds; the cell step is `size / resolution`
//! on every axis, whichever mode produced the resolution.

use crate::bounds::{aabb_size, AABB};
use crate::constants::{gpu_limits, layout};
use crate::error::{VoxelResult, VoxelizerError};
use serde::{Deserialize, Serialize};

/// Number of voxel cells along each axis, every axis >= 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridResolution {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridResolution {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(counts: [u32; 3]) -> Self {
        Self::new(counts[0], counts[1], counts[2])
    }

    pub fn as_array(&self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }

    /// Total cell count, also the capacity of the compacted position list
    pub fn cell_count(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

/// How the grid resolution is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResolutionMode {
    /// `ceil(bounds / voxel_size)` per axis
    AutoFromVoxelSize { voxel_size: [f32; 3] },
    /// User-supplied cell counts used as-is
    Fixed { split_count: [u32; 3] },
}

/// Concrete grid for one voxelization run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionPlan {
    pub resolution: GridResolution,
    /// Grid extent in mesh-local space
    pub bounds: AABB,
    /// Distance between neighbouring cell centers, `size / resolution`
    pub cell_size: [f32; 3],
}

/// Plan the grid for a mesh
pub fn plan_resolution(bounds: &AABB, mode: &ResolutionMode) -> VoxelResult<ResolutionPlan> {
    let size = aabb_size(bounds);
    let size = [size.x, size.y, size.z];

    let counts = match mode {
        ResolutionMode::AutoFromVoxelSize { voxel_size } => {
            if voxel_size.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(VoxelizerError::invalid_config(
                    "voxel_size",
                    voxel_size,
                    "every component must be finite and > 0",
                ));
            }
            let mut counts = [1u32; 3];
            for axis in 0..3 {
                let cells = (size[axis] / voxel_size[axis]).ceil();
                if cells > gpu_limits::MAX_AXIS_RESOLUTION as f32 {
                    return Err(VoxelizerError::invalid_config(
                        "voxel_size",
                        voxel_size,
                        format!(
                            "axis {} would need {} cells (max {})",
                            axis,
                            cells,
                            gpu_limits::MAX_AXIS_RESOLUTION
                        ),
                    ));
                }
                // A flat axis still gets one cell
                counts[axis] = (cells as u32).max(1);
            }
            counts
        }
        ResolutionMode::Fixed { split_count } => {
            if split_count.iter().any(|&c| c == 0) {
                return Err(VoxelizerError::invalid_config(
                    "split_count",
                    split_count,
                    "every axis must be >= 1",
                ));
            }
            if split_count
                .iter()
                .any(|&c| c > gpu_limits::MAX_AXIS_RESOLUTION)
            {
                return Err(VoxelizerError::invalid_config(
                    "split_count",
                    split_count,
                    format!("axis exceeds {}", gpu_limits::MAX_AXIS_RESOLUTION),
                ));
            }
            *split_count
        }
    };

    let resolution = GridResolution::from_array(counts);
    let cell_size = [
        size[0] / counts[0] as f32,
        size[1] / counts[1] as f32,
        size[2] / counts[2] as f32,
    ];

    log::debug!(
        "[ResolutionPlanner] Bounds size {:?} -> resolution {:?}, cell size {:?}",
        size,
        counts,
        cell_size
    );

    Ok(ResolutionPlan {
        resolution,
        bounds: *bounds,
        cell_size,
    })
}

/// Check every per-run buffer of a resolution fits a storage binding
pub fn validate_resolution_budget(
    resolution: &GridResolution,
    max_binding_size: u64,
) -> VoxelResult<()> {
    let cells = resolution.cell_count();
    let checks = [
        ("voxel_positions", cells * layout::POSITION_STRIDE),
        ("volume", cells * layout::VOLUME_CELL_SIZE),
    ];

    for (buffer, required) in checks {
        if required > max_binding_size {
            return Err(VoxelizerError::ResolutionTooLarge {
                resolution: resolution.as_array(),
                buffer: buffer.to_string(),
                required,
                limit: max_binding_size,
            });
        }
    }

    Ok(())
}

/// Check the unpacked triangle corners fit a storage binding
///
/// An empty mesh still binds one padding vertex.
pub fn validate_triangle_budget(vertex_count: usize, max_binding_size: u64) -> VoxelResult<()> {
    let required = (vertex_count.max(1) as u64) * layout::TRIANGLE_VERTEX_STRIDE;
    if required > max_binding_size {
        return Err(VoxelizerError::MeshTooLarge {
            triangles: vertex_count as u64 / 3,
            required,
            limit: max_binding_size,
        });
    }
    Ok(())
}
