//! Voxelization compute pipelines
//!
//! One shader module (generated binding header plus the kernel logic) and
//! one pipeline per [`KernelStage`], each with a layout holding only the
//! resources that stage touches.

use super::bindings::{generate_binding_header, KernelStage};
use super::error_recovery::{GpuErrorRecovery, GpuRecoveryError};
use crate::error::{VoxelResult, VoxelizerError};
use std::borrow::Cow;

/// Kernel logic, without types or bindings
const KERNEL_SOURCE: &str = include_str!("../../shaders/compute/voxelize.wgsl");

/// Compiled pipeline for one stage
pub struct StageKernel {
    pub stage: KernelStage,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline: wgpu::ComputePipeline,
}

/// Every voxelization kernel, compiled once per backend
pub struct VoxelKernels {
    stages: Vec<StageKernel>,
}

/// Full WGSL source handed to the device
pub fn kernel_shader_source() -> String {
    let mut source = generate_binding_header();
    source.push_str(KERNEL_SOURCE);
    source
}

/// Check an entry point exists and carries `@compute`
pub fn validate_shader_entry_point(shader_source: &str, entry_point: &str) -> Result<(), String> {
    let fn_pattern = format!("fn {}(", entry_point);
    let lines: Vec<&str> = shader_source.lines().collect();

    let Some(line_index) = lines.iter().position(|line| line.contains(&fn_pattern)) else {
        return Err(format!(
            "Entry point '{}' not found in shader. Available functions: {}",
            entry_point,
            extract_function_names(shader_source).join(", ")
        ));
    };

    // Walk back over attributes and comments looking for @compute
    let has_compute_annotation = lines[..line_index]
        .iter()
        .rev()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .take_while(|line| line.starts_with('@'))
        .any(|line| line.contains("@compute"));

    if !has_compute_annotation {
        return Err(format!(
            "Entry point '{}' found but missing @compute annotation",
            entry_point
        ));
    }

    Ok(())
}

/// Function names declared in a shader, for diagnostics
pub fn extract_function_names(shader_source: &str) -> Vec<String> {
    shader_source
        .lines()
        .filter_map(|line| line.trim().strip_prefix("fn "))
        .filter_map(|rest| rest.find('(').map(|end| rest[..end].trim().to_string()))
        .filter(|name| !name.is_empty())
        .collect()
}

impl VoxelKernels {
    pub fn new(device: &wgpu::Device, recovery: &GpuErrorRecovery) -> VoxelResult<Self> {
        let source = kernel_shader_source();

        for stage in KernelStage::ALL {
            validate_shader_entry_point(&source, stage.entry_point()).map_err(|error| {
                log::error!("[VoxelKernels] {}", error);
                VoxelizerError::ShaderValidation {
                    shader: "voxelize".to_string(),
                    error,
                }
            })?;
        }

        log::info!(
            "[VoxelKernels] Compiling voxelization shader ({} chars, {} stages)",
            source.len(),
            KernelStage::ALL.len()
        );

        let stages = recovery
            .scoped(device, || {
                let module = recovery.execute_with_recovery(|| {
                    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some("Voxelize Shader"),
                        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
                    }))
                })?;
                KernelStage::ALL
                    .iter()
                    .map(|&stage| Self::create_stage(device, recovery, &module, stage))
                    .collect::<Result<Vec<_>, GpuRecoveryError>>()
            })
            .map_err(|error| match error {
                GpuRecoveryError::Validation { message } => {
                    log::error!("[VoxelKernels] Shader validation failed: {}", message);
                    VoxelizerError::ShaderValidation {
                        shader: "voxelize".to_string(),
                        error: message,
                    }
                }
                other => other.into(),
            })?;

        log::debug!("[VoxelKernels] All kernel pipelines created");
        Ok(Self { stages })
    }

    fn create_stage(
        device: &wgpu::Device,
        recovery: &GpuErrorRecovery,
        module: &wgpu::ShaderModule,
        stage: KernelStage,
    ) -> Result<StageKernel, GpuRecoveryError> {
        let entries = stage.layout_entries();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(stage.label()),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(stage.label()),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = recovery.execute_with_recovery(|| {
            Ok(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(stage.label()),
                layout: Some(&pipeline_layout),
                module,
                entry_point: stage.entry_point(),
            }))
        })?;

        log::debug!(
            "[VoxelKernels] Pipeline {} ready ({} bindings)",
            stage.entry_point(),
            entries.len()
        );

        Ok(StageKernel {
            stage,
            bind_group_layout,
            pipeline,
        })
    }

    pub fn stage(&self, stage: KernelStage) -> VoxelResult<&StageKernel> {
        self.stages
            .iter()
            .find(|kernel| kernel.stage == stage)
            .ok_or_else(|| VoxelizerError::MissingResource {
                resource: format!("kernel {}", stage.entry_point()),
            })
    }
}
