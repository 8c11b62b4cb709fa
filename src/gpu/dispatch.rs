//! Command encoding for one voxelization run
//!
//! Clear, the three projections, combine and compact run in one compute pass;
//! wgpu orders storage access between dispatches. The append counter is then
//! copied device-to-device into the indirect args, and the args into the
//! readback buffer.

use super::bindings::{KernelStage, KERNEL_GROUP};
use super::kernels::VoxelKernels;
use super::resources::RunResources;
use crate::error::{VoxelResult, VoxelizerError};
use crate::renderer::indirect::INSTANCE_COUNT_OFFSET;
use crate::renderer::IndirectDrawArgs;
use crate::voxelizer::resolution::GridResolution;

fn stage_bind_group(
    device: &wgpu::Device,
    kernels: &VoxelKernels,
    resources: &RunResources,
    stage: KernelStage,
) -> VoxelResult<wgpu::BindGroup> {
    let kernel = kernels.stage(stage)?;
    let entries = stage
        .slots()
        .iter()
        .map(|&slot| {
            let buffer = resources
                .buffer(slot)
                .ok_or_else(|| VoxelizerError::MissingResource {
                    resource: slot.wgsl_name().to_string(),
                })?;
            Ok(wgpu::BindGroupEntry {
                binding: slot.binding(),
                resource: buffer.as_entire_binding(),
            })
        })
        .collect::<VoxelResult<Vec<_>>>()?;

    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(stage.label()),
        layout: &kernel.bind_group_layout,
        entries: &entries,
    }))
}

/// Record every kernel dispatch and the copies that follow them
pub fn encode_voxelization(
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    kernels: &VoxelKernels,
    resources: &RunResources,
    args_buffer: &wgpu::Buffer,
    resolution: &GridResolution,
) -> VoxelResult<()> {
    let scratch = resources
        .scratch()
        .ok_or_else(|| VoxelizerError::MissingResource {
            resource: "run scratch buffers".to_string(),
        })?;

    let bind_groups = KernelStage::ALL
        .iter()
        .map(|&stage| stage_bind_group(device, kernels, resources, stage).map(|bg| (stage, bg)))
        .collect::<VoxelResult<Vec<_>>>()?;

    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Voxelize Pass"),
            timestamp_writes: None,
        });

        for (stage, bind_group) in &bind_groups {
            let kernel = kernels.stage(*stage)?;
            let [x, y, z] = stage.dispatch_size(resolution);
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(KERNEL_GROUP, bind_group, &[]);
            pass.dispatch_workgroups(x, y, z);
        }
    }

    encoder.copy_buffer_to_buffer(
        &scratch.voxel_counter,
        0,
        args_buffer,
        INSTANCE_COUNT_OFFSET,
        4,
    );
    encoder.copy_buffer_to_buffer(args_buffer, 0, &scratch.readback, 0, IndirectDrawArgs::SIZE);

    Ok(())
}
