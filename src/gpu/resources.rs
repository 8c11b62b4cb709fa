//! Per-run device buffers
//!
//! Everything here belongs to one voxelization run. The scratch buffers are
//! released as soon as the run completes; the position list stays alive for
//! as long as the run is drawable.

use super::bindings::{ResourceSlot, VoxelizeParams};
use crate::backend::VoxelizationJob;
use crate::constants::layout;
use crate::renderer::IndirectDrawArgs;
use crate::voxelizer::grid::{plane_word_count, ProjectionAxis};
use wgpu::util::DeviceExt;

/// Buffers only needed while the kernels run
pub struct ScratchBuffers {
    pub params: wgpu::Buffer,
    pub triangle_vertices: wgpu::Buffer,
    pub projection_yz: wgpu::Buffer,
    pub projection_xz: wgpu::Buffer,
    pub projection_xy: wgpu::Buffer,
    pub volume: wgpu::Buffer,
    pub voxel_counter: wgpu::Buffer,
    /// MAP_READ copy of the indirect args for the completion readback
    pub readback: wgpu::Buffer,
}

pub struct RunResources {
    pub voxel_positions: wgpu::Buffer,
    /// Number of position slots, the cell count of the grid
    pub position_capacity: u64,
    scratch: Option<ScratchBuffers>,
}

/// Size of a storage buffer holding `count` elements of `stride` bytes
///
/// Never zero: wgpu rejects empty storage bindings.
pub fn storage_size(count: u64, stride: u64) -> u64 {
    count.max(1) * stride
}

fn storage_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
    })
}

/// Triangle corners padded to vec4 with w = 1, one padding element when empty
pub fn padded_triangle_vertices(triangles: &[[f32; 3]]) -> Vec<[f32; 4]> {
    if triangles.is_empty() {
        return vec![[0.0, 0.0, 0.0, 1.0]];
    }
    triangles.iter().map(|v| [v[0], v[1], v[2], 1.0]).collect()
}

impl RunResources {
    pub fn new(device: &wgpu::Device, job: &VoxelizationJob) -> Self {
        let resolution = &job.plan.resolution;
        let cells = resolution.cell_count();
        let params = VoxelizeParams::from_plan(&job.plan, job.triangle_count());

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxelize Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let vertices = padded_triangle_vertices(&job.triangles);
        let triangle_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxelize Triangle Vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let plane = |axis: ProjectionAxis| {
            storage_buffer(
                device,
                axis.plane_name(),
                storage_size(plane_word_count(resolution, axis), 4),
            )
        };

        let scratch = ScratchBuffers {
            params: params_buffer,
            triangle_vertices,
            projection_yz: plane(ProjectionAxis::X),
            projection_xz: plane(ProjectionAxis::Y),
            projection_xy: plane(ProjectionAxis::Z),
            volume: storage_buffer(
                device,
                "Voxelize Volume",
                storage_size(cells, layout::VOLUME_CELL_SIZE),
            ),
            voxel_counter: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Voxelize Counter"),
                size: 4,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            readback: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Voxelize Args Readback"),
                size: IndirectDrawArgs::SIZE,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        };

        let voxel_positions = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxel Positions"),
            size: storage_size(cells, layout::POSITION_STRIDE),
            // COPY_SRC lets hosts read the positions back
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        log::debug!(
            "[RunResources] Allocated run buffers for {:?} ({} cells, {} triangles)",
            resolution.as_array(),
            cells,
            job.triangle_count()
        );

        Self {
            voxel_positions,
            position_capacity: cells,
            scratch: Some(scratch),
        }
    }

    pub fn scratch(&self) -> Option<&ScratchBuffers> {
        self.scratch.as_ref()
    }

    /// Buffer bound at a kernel slot, `None` once scratch is released
    pub fn buffer(&self, slot: ResourceSlot) -> Option<&wgpu::Buffer> {
        if slot == ResourceSlot::VoxelPositions {
            return Some(&self.voxel_positions);
        }
        let scratch = self.scratch.as_ref()?;
        Some(match slot {
            ResourceSlot::Params => &scratch.params,
            ResourceSlot::TriangleVertices => &scratch.triangle_vertices,
            ResourceSlot::ProjectionYz => &scratch.projection_yz,
            ResourceSlot::ProjectionXz => &scratch.projection_xz,
            ResourceSlot::ProjectionXy => &scratch.projection_xy,
            ResourceSlot::Volume => &scratch.volume,
            ResourceSlot::VoxelCounter => &scratch.voxel_counter,
            ResourceSlot::VoxelPositions => &self.voxel_positions,
        })
    }

    /// Drop everything except the position list
    pub fn release_scratch(&mut self) {
        if self.scratch.take().is_some() {
            log::debug!("[RunResources] Released scratch buffers");
        }
    }
}
