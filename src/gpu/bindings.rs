//! Typed resource bindings for the voxelization kernels
//!
//! Every device resource has one slot with a fixed binding index and access
//! mode, and every kernel stage lists exactly the slots it touches. The WGSL
//! binding header and the per-stage bind group layouts are both generated
//! from these tables, so the shader source contains only compute logic.

use crate::constants::workgroup;
use crate::voxelizer::grid::ProjectionAxis;
use crate::voxelizer::resolution::{GridResolution, ResolutionPlan};
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use wgpu::{BindGroupLayoutEntry, BindingType, BufferBindingType, ShaderStages};

/// Bind group every kernel resource lives in
pub const KERNEL_GROUP: u32 = 0;

/// Uniform parameters shared by all kernels
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct VoxelizeParams {
    /// Grid minimum corner, w unused
    pub aabb_min: [f32; 4],
    /// Grid maximum corner, w unused
    pub aabb_max: [f32; 4],
    /// Cells per axis, w unused
    pub split_count: [u32; 4],
    pub triangle_count: u32,
    pub _padding: [u32; 3],
}

const_assert_eq!(std::mem::size_of::<VoxelizeParams>(), 64);

impl VoxelizeParams {
    pub fn from_plan(plan: &ResolutionPlan, triangle_count: u32) -> Self {
        let b = &plan.bounds;
        let r = plan.resolution;
        Self {
            aabb_min: [b.min.x, b.min.y, b.min.z, 0.0],
            aabb_max: [b.max.x, b.max.y, b.max.z, 0.0],
            split_count: [r.x, r.y, r.z, 0],
            triangle_count,
            _padding: [0; 3],
        }
    }
}

/// WGSL mirror of [`VoxelizeParams`]
pub const VOXELIZE_PARAMS_WGSL: &str = "struct VoxelizeParams {
    aabb_min: vec4<f32>,
    aabb_max: vec4<f32>,
    split_count: vec4<u32>,
    triangle_count: u32,
    _padding0: u32,
    _padding1: u32,
    _padding2: u32,
}
";

/// Binding access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingAccess {
    ReadOnly,
    ReadWrite,
    Uniform,
}

/// Every resource the kernels can bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceSlot {
    Params,
    TriangleVertices,
    ProjectionYz,
    ProjectionXz,
    ProjectionXy,
    Volume,
    VoxelPositions,
    VoxelCounter,
}

impl ResourceSlot {
    pub const ALL: [ResourceSlot; 8] = [
        ResourceSlot::Params,
        ResourceSlot::TriangleVertices,
        ResourceSlot::ProjectionYz,
        ResourceSlot::ProjectionXz,
        ResourceSlot::ProjectionXy,
        ResourceSlot::Volume,
        ResourceSlot::VoxelPositions,
        ResourceSlot::VoxelCounter,
    ];

    pub fn binding(self) -> u32 {
        match self {
            ResourceSlot::Params => 0,
            ResourceSlot::TriangleVertices => 1,
            ResourceSlot::ProjectionYz => 2,
            ResourceSlot::ProjectionXz => 3,
            ResourceSlot::ProjectionXy => 4,
            ResourceSlot::Volume => 5,
            ResourceSlot::VoxelPositions => 6,
            ResourceSlot::VoxelCounter => 7,
        }
    }

    pub fn access(self) -> BindingAccess {
        match self {
            ResourceSlot::Params => BindingAccess::Uniform,
            ResourceSlot::TriangleVertices => BindingAccess::ReadOnly,
            _ => BindingAccess::ReadWrite,
        }
    }

    /// Variable name in WGSL
    pub fn wgsl_name(self) -> &'static str {
        match self {
            ResourceSlot::Params => "params",
            ResourceSlot::TriangleVertices => "triangle_vertices",
            ResourceSlot::ProjectionYz => "projection_yz",
            ResourceSlot::ProjectionXz => "projection_xz",
            ResourceSlot::ProjectionXy => "projection_xy",
            ResourceSlot::Volume => "volume",
            ResourceSlot::VoxelPositions => "voxel_positions",
            ResourceSlot::VoxelCounter => "voxel_counter",
        }
    }

    /// Variable type in WGSL
    pub fn wgsl_type(self) -> &'static str {
        match self {
            ResourceSlot::Params => "VoxelizeParams",
            ResourceSlot::TriangleVertices | ResourceSlot::VoxelPositions => "array<vec4<f32>>",
            ResourceSlot::VoxelCounter => "array<atomic<u32>>",
            _ => "array<u32>",
        }
    }

    /// Projection plane written by a ray along `axis`
    pub fn projection(axis: ProjectionAxis) -> Self {
        match axis {
            ProjectionAxis::X => ResourceSlot::ProjectionYz,
            ProjectionAxis::Y => ResourceSlot::ProjectionXz,
            ProjectionAxis::Z => ResourceSlot::ProjectionXy,
        }
    }

    pub fn binding_type(self) -> BindingType {
        let ty = match self.access() {
            BindingAccess::Uniform => BufferBindingType::Uniform,
            BindingAccess::ReadOnly => BufferBindingType::Storage { read_only: true },
            BindingAccess::ReadWrite => BufferBindingType::Storage { read_only: false },
        };
        BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        }
    }

    pub fn layout_entry(self) -> BindGroupLayoutEntry {
        BindGroupLayoutEntry {
            binding: self.binding(),
            visibility: ShaderStages::COMPUTE,
            ty: self.binding_type(),
            count: None,
        }
    }

    /// Full WGSL declaration line
    pub fn wgsl_declaration(self) -> String {
        let qualifier = match self.access() {
            BindingAccess::Uniform => "<uniform>",
            BindingAccess::ReadOnly => "<storage, read>",
            BindingAccess::ReadWrite => "<storage, read_write>",
        };
        format!(
            "@group({}) @binding({}) var{} {}: {};\n",
            KERNEL_GROUP,
            self.binding(),
            qualifier,
            self.wgsl_name(),
            self.wgsl_type()
        )
    }
}

/// The six device kernels, in submission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelStage {
    Clear,
    ProjectAlongX,
    ProjectAlongY,
    ProjectAlongZ,
    Combine,
    Compact,
}

impl KernelStage {
    pub const ALL: [KernelStage; 6] = [
        KernelStage::Clear,
        KernelStage::ProjectAlongX,
        KernelStage::ProjectAlongY,
        KernelStage::ProjectAlongZ,
        KernelStage::Combine,
        KernelStage::Compact,
    ];

    pub fn entry_point(self) -> &'static str {
        match self {
            KernelStage::Clear => "clear",
            KernelStage::ProjectAlongX => "project_along_x",
            KernelStage::ProjectAlongY => "project_along_y",
            KernelStage::ProjectAlongZ => "project_along_z",
            KernelStage::Combine => "combine",
            KernelStage::Compact => "compact",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KernelStage::Clear => "Voxelize Clear",
            KernelStage::ProjectAlongX => "Voxelize Project X",
            KernelStage::ProjectAlongY => "Voxelize Project Y",
            KernelStage::ProjectAlongZ => "Voxelize Project Z",
            KernelStage::Combine => "Voxelize Combine",
            KernelStage::Compact => "Voxelize Compact",
        }
    }

    /// Ray axis of a projection stage
    pub fn projection_axis(self) -> Option<ProjectionAxis> {
        match self {
            KernelStage::ProjectAlongX => Some(ProjectionAxis::X),
            KernelStage::ProjectAlongY => Some(ProjectionAxis::Y),
            KernelStage::ProjectAlongZ => Some(ProjectionAxis::Z),
            _ => None,
        }
    }

    /// Exactly the resources this stage reads or writes
    pub fn slots(self) -> &'static [ResourceSlot] {
        use ResourceSlot::*;
        match self {
            KernelStage::Clear => &[
                Params,
                ProjectionYz,
                ProjectionXz,
                ProjectionXy,
                Volume,
                VoxelCounter,
            ],
            KernelStage::ProjectAlongX => &[Params, TriangleVertices, ProjectionYz],
            KernelStage::ProjectAlongY => &[Params, TriangleVertices, ProjectionXz],
            KernelStage::ProjectAlongZ => &[Params, TriangleVertices, ProjectionXy],
            KernelStage::Combine => &[Params, ProjectionYz, ProjectionXz, ProjectionXy, Volume],
            KernelStage::Compact => &[Params, Volume, VoxelPositions, VoxelCounter],
        }
    }

    pub fn layout_entries(self) -> Vec<BindGroupLayoutEntry> {
        self.slots().iter().map(|slot| slot.layout_entry()).collect()
    }

    /// Workgroups to dispatch for a grid
    pub fn dispatch_size(self, resolution: &GridResolution) -> [u32; 3] {
        let groups = |cells: u32, size: u32| (cells + size - 1) / size;
        match self.projection_axis() {
            Some(axis) => {
                let counts = resolution.as_array();
                let (u, v) = axis.plane_axes();
                [
                    groups(counts[u], workgroup::PROJECTION_X),
                    groups(counts[v], workgroup::PROJECTION_Y),
                    1,
                ]
            }
            None => [
                groups(resolution.x, workgroup::VOLUME_X),
                groups(resolution.y, workgroup::VOLUME_Y),
                groups(resolution.z, workgroup::VOLUME_Z),
            ],
        }
    }
}

/// Generated WGSL prelude: parameter struct plus every binding declaration
pub fn generate_binding_header() -> String {
    let mut wgsl = String::new();
    wgsl.push_str("// Generated from gpu::bindings - do not declare bindings in shader logic\n");
    wgsl.push_str(VOXELIZE_PARAMS_WGSL);
    wgsl.push('\n');
    for slot in ResourceSlot::ALL {
        wgsl.push_str(&slot.wgsl_declaration());
    }
    wgsl.push('\n');
    wgsl
}
