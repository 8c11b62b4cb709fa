//! Animated reveal of the voxel instances
//!
//! While active, instances with index >= the current step are collapsed in the
//! vertex shader. The step grows with time and the reveal completes once it
//! passes the voxel count plus the configured delay.

use crate::constants::reveal::STEPS_PER_SECOND;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Speed multiplier, 1.0 reveals ten instances per second
    pub speed: f32,
    /// Seconds to hold the full volume before completing
    pub delay: f32,
    /// Stop drawing the voxels once the reveal completes
    pub hide_after_reveal: bool,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            delay: 0.0,
            hide_after_reveal: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RevealState {
    pub step: f32,
    pub completed: bool,
}

/// Advance the reveal by `dt` seconds
pub fn advance_reveal(state: &mut RevealState, config: &RevealConfig, voxel_count: u32, dt: f32) {
    if state.completed {
        return;
    }

    state.step += config.speed * dt * STEPS_PER_SECOND;
    if state.step >= voxel_count as f32 + config.delay * STEPS_PER_SECOND {
        state.step = 0.0;
        state.completed = true;
        log::info!("[Reveal] Reveal of {} voxels completed", voxel_count);
    }
}

/// Instance limit for the draw, `None` means draw every instance
pub fn revealed_instances(state: &RevealState, config: Option<&RevealConfig>) -> Option<u32> {
    match config {
        Some(_) if !state.completed => Some(state.step.max(0.0) as u32),
        _ => None,
    }
}

/// Whether the voxels should still be drawn
pub fn reveal_allows_draw(state: &RevealState, config: Option<&RevealConfig>) -> bool {
    match config {
        Some(config) => !(state.completed && config.hide_after_reveal),
        None => true,
    }
}
