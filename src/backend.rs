//! Execution backends
//!
//! A backend runs the voxelization kernels for one job and reports back
//! through a [`CompletionToken`]. The voxelizer state machine only sees this
//! trait, so the wgpu path and the CPU reference path share every state
//! transition.

use crate::error::VoxelResult;
use crate::mesh::SubmeshRange;
use crate::renderer::IndirectDrawArgs;
use crate::voxelizer::completion::CompletionToken;
use crate::voxelizer::resolution::ResolutionPlan;

/// Everything one run needs, validated and planned
#[derive(Debug, Clone)]
pub struct VoxelizationJob {
    pub plan: ResolutionPlan,
    /// Unindexed triangle corners, three per triangle
    pub triangles: Vec<[f32; 3]>,
    /// Instance submesh baked into the indirect args
    pub submesh: SubmeshRange,
    /// Distinguishes runs of the same voxelizer
    pub generation: u64,
}

impl VoxelizationJob {
    pub fn triangle_count(&self) -> u32 {
        (self.triangles.len() / 3) as u32
    }

    /// Args as they are before the device writes the instance count
    pub fn args_template(&self) -> IndirectDrawArgs {
        IndirectDrawArgs::from_submesh(&self.submesh, 0)
    }
}

/// A run in flight plus the token that reports its completion
pub struct SubmittedRun<R> {
    pub run: R,
    pub token: CompletionToken,
}

/// Result of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionReport {
    pub generation: u64,
    /// Args as the draw will consume them
    pub args: IndirectDrawArgs,
}

impl CompletionReport {
    pub fn voxel_count(&self) -> u32 {
        self.args.instance_count
    }
}

pub trait VoxelizationBackend {
    /// Resources kept alive for one run
    type Run;

    /// Largest storage binding the backend can allocate
    fn max_binding_size(&self) -> u64;

    /// Start a run; configuration must already be validated
    fn submit(&mut self, job: VoxelizationJob) -> VoxelResult<SubmittedRun<Self::Run>>;

    /// Drive outstanding device work without blocking
    fn poll(&self);

    /// Collect the outcome of a run whose token reported completion
    fn finish(&mut self, run: &mut Self::Run) -> VoxelResult<CompletionReport>;
}
