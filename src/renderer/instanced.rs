//! Indirect instanced voxel renderer
//!
//! Draws the instance mesh once per compacted voxel. The instance count is
//! read by the device from the indirect args buffer; positions are read in the
//! vertex shader straight from the run's position buffer.

use crate::error::{VoxelResult, VoxelizerError};
use crate::mesh::{InstanceMesh, InstanceVertex, SubmeshRange};
use bytemuck::{Pod, Zeroable};
use cgmath::{Matrix4, SquareMatrix};
use static_assertions::const_assert_eq;
use wgpu::util::DeviceExt;

const INSTANCE_SHADER: &str = include_str!("../../shaders/rendering/voxel_instance.wgsl");

/// Per-draw uniform record, rebuilt every frame
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct VoxelDrawUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub local_to_world: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// Per-axis cube scale, w unused
    pub instance_scale: [f32; 4],
    /// x: reveal active, y: instances revealed so far
    pub reveal: [u32; 4],
}

const_assert_eq!(std::mem::size_of::<VoxelDrawUniforms>(), 176);

impl VoxelDrawUniforms {
    pub fn new(
        view_proj: Matrix4<f32>,
        local_to_world: Matrix4<f32>,
        color: [f32; 4],
        instance_scale: [f32; 3],
        revealed: Option<u32>,
    ) -> Self {
        Self {
            view_proj: view_proj.into(),
            local_to_world: local_to_world.into(),
            color,
            instance_scale: [instance_scale[0], instance_scale[1], instance_scale[2], 0.0],
            reveal: match revealed {
                Some(limit) => [1, limit, 0, 0],
                None => [0; 4],
            },
        }
    }
}

impl Default for VoxelDrawUniforms {
    fn default() -> Self {
        Self::new(
            Matrix4::identity(),
            Matrix4::identity(),
            [1.0; 4],
            [1.0; 3],
            None,
        )
    }
}

/// Formats of the pass the voxels are drawn into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

/// Uniforms plus position binding for one run
pub struct DrawBinding {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl DrawBinding {
    pub fn write(&self, queue: &wgpu::Queue, uniforms: &VoxelDrawUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }
}

pub struct VoxelInstanceRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    submesh: SubmeshRange,
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

fn validate_instance_mesh(mesh: &InstanceMesh) -> VoxelResult<()> {
    let submesh = &mesh.submesh;
    if submesh.index_count == 0 || submesh.index_count % 3 != 0 {
        return Err(VoxelizerError::invalid_config(
            "instance_mesh.submesh.index_count",
            submesh.index_count,
            "must be a positive multiple of 3",
        ));
    }
    let end = submesh.index_start as u64 + submesh.index_count as u64;
    if end > mesh.indices.len() as u64 {
        return Err(VoxelizerError::invalid_config(
            "instance_mesh.submesh",
            submesh,
            format!("range ends at {} but mesh has {} indices", end, mesh.indices.len()),
        ));
    }
    if mesh.vertices.is_empty() {
        return Err(VoxelizerError::MissingResource {
            resource: "instance mesh vertices".to_string(),
        });
    }
    Ok(())
}

impl VoxelInstanceRenderer {
    pub fn new(
        device: &wgpu::Device,
        target: &RenderTargetDesc,
        mesh: &InstanceMesh,
    ) -> VoxelResult<Self> {
        validate_instance_mesh(mesh)?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Voxel Instance Shader"),
            source: wgpu::ShaderSource::Wgsl(INSTANCE_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Voxel Draw Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Voxel Instance Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Voxel Instance Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<InstanceVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: target.color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: target.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: target.sample_count.max(1),
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxel Instance Vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxel Instance Indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        log::debug!(
            "[VoxelInstanceRenderer] Instance mesh: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(Self {
            pipeline,
            bind_group_layout,
            vertex_buffer,
            index_buffer,
            submesh: mesh.submesh,
        })
    }

    /// Index range baked into every run's indirect args
    pub fn submesh(&self) -> SubmeshRange {
        self.submesh
    }

    pub fn create_draw_binding(&self, device: &wgpu::Device, positions: &wgpu::Buffer) -> DrawBinding {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxel Draw Uniforms"),
            contents: bytemuck::bytes_of(&VoxelDrawUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxel Draw Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: positions.as_entire_binding(),
                },
            ],
        });

        DrawBinding {
            uniform_buffer,
            bind_group,
        }
    }

    /// One indirect draw; the instance count never leaves the device
    pub fn draw<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        binding: &'a DrawBinding,
        args_buffer: &'a wgpu::Buffer,
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &binding.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed_indirect(args_buffer, 0);
    }
}
