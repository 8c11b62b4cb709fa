//! Voxelizer instance data
//!
//! Plain state; transitions live in voxelizer_operations.rs.

use super::completion::CompletionToken;
use super::resolution::ResolutionPlan;
use super::reveal::RevealState;
use crate::backend::{CompletionReport, VoxelizationBackend};
use crate::bounds::AABB;
use crate::mesh::{SourceMesh, SubmeshRange};
use crate::VoxelizerConfig;
use cgmath::Matrix4;

/// Lifecycle of one voxelizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoxelizerState {
    /// Nothing submitted, or torn down
    Idle,
    /// Kernels submitted, completion not yet observed
    Pending,
    /// Results confirmed and drawable
    Ready,
    /// The run reported an error; nothing is drawn
    Failed,
}

impl VoxelizerState {
    pub fn name(self) -> &'static str {
        match self {
            VoxelizerState::Idle => "Idle",
            VoxelizerState::Pending => "Pending",
            VoxelizerState::Ready => "Ready",
            VoxelizerState::Failed => "Failed",
        }
    }
}

/// One mesh-to-voxel converter and everything its current run owns
pub struct Voxelizer<B: VoxelizationBackend> {
    pub(crate) config: VoxelizerConfig,
    pub(crate) backend: B,
    pub(crate) state: VoxelizerState,
    /// Bumped on every submission
    pub(crate) generation: u64,
    /// Last started mesh, kept for restarts
    pub(crate) source: Option<SourceMesh>,
    pub(crate) submesh: SubmeshRange,
    pub(crate) plan: Option<ResolutionPlan>,
    pub(crate) run: Option<B::Run>,
    pub(crate) token: Option<CompletionToken>,
    pub(crate) report: Option<CompletionReport>,
    pub(crate) last_error: Option<String>,
    pub(crate) local_to_world: Matrix4<f32>,
    /// World-space bounds of the drawn cubes
    pub(crate) draw_bounds: Option<AABB>,
    pub(crate) reveal: RevealState,
    /// Set by a successful prepare_draw in the current frame
    pub(crate) draw_prepared: bool,
}
