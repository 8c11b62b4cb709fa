//! Voxelizer core
//!
//! Planning, grid math, completion signalling and the per-instance state
//! machine. Data lives in `voxelizer_data`, transitions in
//! `voxelizer_operations`, and the draw path in `render`.

pub mod completion;
pub mod grid;
pub mod render;
pub mod resolution;
pub mod reveal;
pub mod voxelizer_data;
pub mod voxelizer_operations;

pub use completion::{completion_channel, CompletionPoll, CompletionSender, CompletionToken};
pub use grid::ProjectionAxis;
pub use resolution::{
    plan_resolution, validate_resolution_budget, validate_triangle_budget, GridResolution,
    ResolutionMode, ResolutionPlan,
};
pub use reveal::{RevealConfig, RevealState};
pub use voxelizer_data::{Voxelizer, VoxelizerState};
