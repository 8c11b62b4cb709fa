//! CPU reference backend
//!
//! Runs the kernels synchronously inside `submit` and signals completion
//! immediately, so the voxelizer still observes Pending until its next
//! update.

use super::kernels;
use crate::backend::{CompletionReport, SubmittedRun, VoxelizationBackend, VoxelizationJob};
use crate::constants::gpu_limits;
use crate::error::{ErrorContext, VoxelResult};
use crate::renderer::IndirectDrawArgs;
use crate::voxelizer::completion::completion_channel;
use crate::voxelizer::resolution::ResolutionPlan;

/// Output of one CPU run
#[derive(Debug, Clone)]
pub struct CpuRun {
    pub generation: u64,
    pub plan: ResolutionPlan,
    /// Dense occupancy, x-fastest
    pub volume: Vec<u32>,
    /// Compacted cell centers, w = 1
    pub positions: Vec<[f32; 4]>,
    pub args: IndirectDrawArgs,
}

impl CpuRun {
    pub fn is_occupied(&self, x: u32, y: u32, z: u32) -> bool {
        let index = crate::voxelizer::grid::cell_index(&self.plan.resolution, x, y, z);
        self.volume.get(index).copied().unwrap_or(0) != 0
    }
}

pub struct CpuBackend {
    max_binding_size: u64,
    runs_submitted: u64,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::with_binding_limit(gpu_limits::MAX_BUFFER_BINDING_SIZE)
    }

    /// Backend that enforces a custom storage budget
    pub fn with_binding_limit(max_binding_size: u64) -> Self {
        Self {
            max_binding_size,
            runs_submitted: 0,
        }
    }

    pub fn runs_submitted(&self) -> u64 {
        self.runs_submitted
    }
}

impl VoxelizationBackend for CpuBackend {
    type Run = CpuRun;

    fn max_binding_size(&self) -> u64 {
        self.max_binding_size
    }

    fn submit(&mut self, job: VoxelizationJob) -> VoxelResult<SubmittedRun<CpuRun>> {
        let (sender, token) = completion_channel(job.generation);
        self.runs_submitted += 1;

        let result = kernels::voxelize(&job.plan, &job.triangles);
        let count = u32::try_from(result.positions.len())
            .with_context(|| format!("{} voxels as an instance count", result.positions.len()))?;

        log::debug!(
            "[CpuBackend] Run {} produced {} voxels from {} triangles",
            job.generation,
            count,
            job.triangle_count()
        );

        let run = CpuRun {
            generation: job.generation,
            plan: job.plan,
            volume: result.volume,
            positions: result.positions,
            args: job.args_template().with_instance_count(count),
        };
        sender.complete(Ok(()));

        Ok(SubmittedRun { run, token })
    }

    fn poll(&self) {}

    fn finish(&mut self, run: &mut CpuRun) -> VoxelResult<CompletionReport> {
        Ok(CompletionReport {
            generation: run.generation,
            args: run.args,
        })
    }
}
