// Hearth Voxelizer - GPU surface voxelization
//
// Converts a triangle mesh into a grid of occupied cells with three
// axis-aligned parity projections, compacts the occupied cells into a
// position list and draws one instanced cube per cell with an indirect draw
// whose instance count never leaves the device.
//
// - voxelizer::Voxelizer drives one mesh through Idle -> Pending -> Ready
// - gpu::WgpuBackend runs the compute kernels on a wgpu device
// - cpu::CpuBackend is the reference implementation with identical results

// Constants module
pub mod constants;

pub mod backend;
pub mod bounds;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod mesh;
pub mod renderer;
pub mod voxelizer;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use backend::{CompletionReport, SubmittedRun, VoxelizationBackend, VoxelizationJob};
pub use bounds::AABB;
pub use cpu::CpuBackend;
pub use error::{ErrorContext, OptionExt, VoxelResult, VoxelizerError};
pub use gpu::WgpuBackend;
pub use mesh::{InstanceMesh, SourceMesh, SubmeshRange};
pub use renderer::{IndirectDrawArgs, RenderTargetDesc, VoxelInstanceRenderer};
pub use voxelizer::{
    GridResolution, ResolutionMode, ResolutionPlan, RevealConfig, Voxelizer, VoxelizerState,
};

// Re-export wgpu so hosts can share one device with the voxelizer
pub use wgpu;

use constants::{defaults, gpu_limits, layout};

/// Per-voxelizer configuration
///
/// Resolution changes take effect on the next `start` or `restart`; draw
/// settings apply as soon as `Voxelizer::set_config` accepts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelizerConfig {
    /// Cube size per axis; the cell size when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_scale: Option<[f32; 3]>,
    /// RGBA tint of the drawn cubes
    pub color: [f32; 4],
    /// Apply the host transform to the drawn cubes
    pub bind_local_to_world: bool,
    pub resolution: ResolutionMode,
    /// Progressive reveal of the instances, off when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reveal: Option<RevealConfig>,
}

impl Default for VoxelizerConfig {
    fn default() -> Self {
        Self {
            instance_scale: None,
            color: defaults::VOXEL_COLOR,
            bind_local_to_world: true,
            resolution: ResolutionMode::AutoFromVoxelSize {
                voxel_size: defaults::VOXEL_SIZE,
            },
            reveal: None,
        }
    }
}

impl VoxelizerConfig {
    /// Validate configuration parameters
    ///
    /// Auto resolutions depend on the mesh and are checked again by the
    /// planner; fixed resolutions are checked against the default binding
    /// limit here.
    pub fn validate(&self) -> VoxelResult<()> {
        match &self.resolution {
            ResolutionMode::AutoFromVoxelSize { voxel_size } => {
                if voxel_size.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                    return Err(VoxelizerError::invalid_config(
                        "voxel_size",
                        voxel_size,
                        "every component must be finite and > 0",
                    ));
                }
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

                let cells = GridResolution::from_array(*split_count).cell_count();
                let position_bytes = cells * layout::POSITION_STRIDE;
                log::info!(
                    "[VoxelizerConfig] Validation: split_count={:?}, cells={}, positions={}KB, max_cubic_resolution={}",
                    split_count,
                    cells,
                    position_bytes / 1024,
                    Self::max_cubic_resolution()
                );

                if position_bytes > gpu_limits::MAX_BUFFER_BINDING_SIZE {
                    return Err(VoxelizerError::invalid_config(
                        "split_count",
                        split_count,
                        format!(
                            "needs {} bytes of positions, limit is {}. {}",
                            position_bytes,
                            gpu_limits::MAX_BUFFER_BINDING_SIZE,
                            self.suggest_safe_config()
                        ),
                    ));
                }
            }
        }

        if let Some(scale) = &self.instance_scale {
            if scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
                return Err(VoxelizerError::invalid_config(
                    "instance_scale",
                    scale,
                    "every component must be finite and > 0",
                ));
            }
        }

        if self.color.iter().any(|c| !c.is_finite()) {
            return Err(VoxelizerError::invalid_config(
                "color",
                self.color,
                "components must be finite",
            ));
        }

        if let Some(reveal) = &self.reveal {
            if !reveal.speed.is_finite() || reveal.speed <= 0.0 {
                return Err(VoxelizerError::invalid_config(
                    "reveal.speed",
                    reveal.speed,
                    "must be finite and > 0",
                ));
            }
            if !reveal.delay.is_finite() || reveal.delay < 0.0 {
                return Err(VoxelizerError::invalid_config(
                    "reveal.delay",
                    reveal.delay,
                    "must be finite and >= 0",
                ));
            }
        }

        log::debug!("[VoxelizerConfig] Configuration validated successfully");
        Ok(())
    }

    /// Largest N such that an N x N x N grid fits the default binding limit
    pub fn max_cubic_resolution() -> u32 {
        let max_cells = gpu_limits::MAX_BUFFER_BINDING_SIZE / layout::POSITION_STRIDE;
        let mut n = (max_cells as f64).cbrt().floor() as u64;
        // cbrt can land one above on exact cubes
        while n > 0 && n * n * n > max_cells {
            n -= 1;
        }
        (n as u32).min(gpu_limits::MAX_AXIS_RESOLUTION)
    }

    /// Suggest safe configuration parameters
    pub fn suggest_safe_config(&self) -> String {
        let max = Self::max_cubic_resolution();
        [
            format!("Maximum cubic split_count is [{0}, {0}, {0}]", max),
            "Common safe configurations:".to_string(),
            format!(
                "  - split_count=[{0}, {0}, {0}] ({1}KB of positions)",
                defaults::SPLIT_COUNT[0],
                GridResolution::from_array(defaults::SPLIT_COUNT).cell_count()
                    * layout::POSITION_STRIDE
                    / 1024
            ),
            "  - auto_from_voxel_size with a voxel size near bounds / 64".to_string(),
        ]
        .join("\n")
    }

    pub fn from_toml_str(source: &str) -> VoxelResult<Self> {
        let config: Self = toml::from_str(source)?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> VoxelResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| VoxelizerError::IoError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config = Self::from_toml_str(&source)?;
        config.validate()?;
        log::info!("[VoxelizerConfig] Loaded {}", path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> VoxelResult<String> {
        toml::to_string(self).context("serializing voxelizer config")
    }
}
