//! wgpu execution backend
//!
//! Submits the six kernels and the args copies as one command buffer, then
//! requests an asynchronous map of the args readback. The map callback owns
//! nothing but the completion sender.
//!
//! Resource creation, encoding and submission of a run sit inside that run's
//! own error scopes, so several backends and the host can share one device
//! without seeing each other's errors.

use super::dispatch::encode_voxelization;
use super::error_recovery::{GpuErrorRecovery, GpuRecoveryError, GpuResultExt};
use super::kernels::VoxelKernels;
use super::resources::RunResources;
use crate::backend::{CompletionReport, SubmittedRun, VoxelizationBackend, VoxelizationJob};
use crate::error::{OptionExt, VoxelResult, VoxelizerError};
use crate::renderer::{DrawBinding, IndirectDrawArgs};
use crate::voxelizer::completion::completion_channel;
use std::sync::Arc;

/// Device side of one run
pub struct GpuRun {
    generation: u64,
    resources: RunResources,
    draw_binding: Option<DrawBinding>,
}

impl GpuRun {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Compacted voxel centers, bound read-only by the renderer
    pub fn positions(&self) -> &wgpu::Buffer {
        &self.resources.voxel_positions
    }

    pub fn position_capacity(&self) -> u64 {
        self.resources.position_capacity
    }

    pub(crate) fn draw_binding(&self) -> Option<&DrawBinding> {
        self.draw_binding.as_ref()
    }

    pub(crate) fn set_draw_binding(&mut self, binding: DrawBinding) {
        self.draw_binding = Some(binding);
    }
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    kernels: VoxelKernels,
    recovery: GpuErrorRecovery,
    /// Indirect args, alive as long as the backend
    args_buffer: wgpu::Buffer,
    max_binding_size: u64,
}

impl WgpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> VoxelResult<Self> {
        let recovery = GpuErrorRecovery::new();
        let kernels = VoxelKernels::new(&device, &recovery)?;

        let args_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxel Indirect Args"),
            size: IndirectDrawArgs::SIZE,
            usage: wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let max_binding_size = device.limits().max_storage_buffer_binding_size as u64;
        log::info!(
            "[WgpuBackend] Ready, max storage binding {} bytes",
            max_binding_size
        );

        Ok(Self {
            device,
            queue,
            kernels,
            recovery,
            args_buffer,
            max_binding_size,
        })
    }

    /// Create a device without a surface, for offline voxelization and tests
    pub async fn request_headless() -> VoxelResult<Self> {
        let (device, queue) = Self::request_headless_device().await?;
        Self::new(device, queue)
    }

    /// Device and queue with default limits, for hosts that share one device
    /// between several voxelizers
    pub async fn request_headless_device() -> VoxelResult<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_voxel(|| VoxelizerError::AdapterNotFound)?;

        let info = adapter.get_info();
        log::info!("[WgpuBackend] Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Voxelizer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        Ok((Arc::new(device), Arc::new(queue)))
    }

    /// Override the storage budget used to reject resolutions before any
    /// allocation. A budget above the device limit lets oversized runs reach
    /// the device, where validation fails them.
    pub fn with_binding_limit(mut self, max_binding_size: u64) -> Self {
        self.max_binding_size = max_binding_size;
        self
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn args_buffer(&self) -> &wgpu::Buffer {
        &self.args_buffer
    }

    /// Block until all submitted work is done
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

impl VoxelizationBackend for WgpuBackend {
    type Run = GpuRun;

    fn max_binding_size(&self) -> u64 {
        self.max_binding_size
    }

    fn submit(&mut self, job: VoxelizationJob) -> VoxelResult<SubmittedRun<GpuRun>> {
        if self.recovery.is_device_lost() {
            return Err(GpuRecoveryError::DeviceLost.into());
        }

        let resources = self.recovery.scoped(&self.device, || -> VoxelResult<RunResources> {
            let resources = RunResources::new(&self.device, &job);

            // Constant fields; instance_count is replaced by the counter copy
            self.queue
                .write_buffer(&self.args_buffer, 0, job.args_template().as_bytes());

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Voxelize Encoder"),
                });
            encode_voxelization(
                &self.device,
                &mut encoder,
                &self.kernels,
                &resources,
                &self.args_buffer,
                &job.plan.resolution,
            )?;
            self.recovery
                .submit_with_recovery(&self.queue, vec![encoder.finish()])?;
            Ok(resources)
        })?;

        let (sender, token) = completion_channel(job.generation);
        let readback = &resources
            .scratch()
            .ok_or_voxel(|| VoxelizerError::MissingResource {
                resource: "args readback".to_string(),
            })?
            .readback;
        readback
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                sender.complete(
                    result
                        .gpu_context("args readback mapping")
                        .map_err(VoxelizerError::from),
                );
            });

        log::debug!(
            "[WgpuBackend] Submitted run {} ({} triangles, {:?})",
            job.generation,
            job.triangle_count(),
            job.plan.resolution.as_array()
        );

        Ok(SubmittedRun {
            run: GpuRun {
                generation: job.generation,
                resources,
                draw_binding: None,
            },
            token,
        })
    }

    fn poll(&self) {
        self.device.poll(wgpu::Maintain::Poll);
    }

    fn finish(&mut self, run: &mut GpuRun) -> VoxelResult<CompletionReport> {
        let scratch = run
            .resources
            .scratch()
            .ok_or_voxel(|| VoxelizerError::MissingResource {
                resource: "args readback".to_string(),
            })?;
        let args = {
            let view = scratch.readback.slice(..).get_mapped_range();
            IndirectDrawArgs::from_bytes(&view)
        };
        scratch.readback.unmap();

        let args = args.ok_or_voxel(|| VoxelizerError::Internal {
            message: "args readback shorter than 20 bytes".to_string(),
        })?;
        if args.instance_count as u64 > run.resources.position_capacity {
            return Err(VoxelizerError::Internal {
                message: format!(
                    "{} voxels appended into {} slots",
                    args.instance_count, run.resources.position_capacity
                ),
            });
        }

        run.resources.release_scratch();

        Ok(CompletionReport {
            generation: run.generation,
            args,
        })
    }
}
