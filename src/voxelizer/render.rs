//! Draw path for confirmed runs
//!
//! `prepare_draw` runs outside the render pass (it writes uniforms and may
//! create the bind group); `render` only records the indirect draw.

use super::voxelizer_data::Voxelizer;
use crate::backend::VoxelizationBackend;
use crate::gpu::WgpuBackend;
use crate::renderer::{Frustum, VoxelDrawUniforms, VoxelInstanceRenderer};
use cgmath::Matrix4;

impl<B: VoxelizationBackend> Voxelizer<B> {
    /// Whether a confirmed run exists, is allowed to draw and can be seen
    pub fn is_visible(&self, view_proj: &Matrix4<f32>) -> bool {
        if !self.should_render() {
            return false;
        }
        match self.draw_bounds.as_ref() {
            Some(bounds) => Frustum::from_view_proj(view_proj).intersects_aabb(bounds),
            None => false,
        }
    }
}

impl Voxelizer<WgpuBackend> {
    /// Upload this frame's uniforms; false means nothing will be drawn
    pub fn prepare_draw(
        &mut self,
        renderer: &VoxelInstanceRenderer,
        view_proj: Matrix4<f32>,
    ) -> bool {
        self.draw_prepared = false;

        if !self.is_visible(&view_proj) {
            return false;
        }

        if renderer.submesh() != self.submesh {
            log::warn!(
                "[Voxelizer] Renderer submesh {:?} differs from run submesh {:?}, skipping draw",
                renderer.submesh(),
                self.submesh
            );
            return false;
        }

        let uniforms = VoxelDrawUniforms::new(
            view_proj,
            self.local_to_world(),
            self.config.color,
            self.instance_scale(),
            self.revealed_instances(),
        );

        let Some(run) = self.run.as_mut() else {
            return false;
        };
        if run.draw_binding().is_none() {
            let binding = renderer.create_draw_binding(self.backend.device(), run.positions());
            run.set_draw_binding(binding);
        }
        let Some(binding) = run.draw_binding() else {
            return false;
        };

        binding.write(self.backend.queue(), &uniforms);
        self.draw_prepared = true;
        true
    }

    /// Record the indirect draw prepared this frame
    pub fn render<'a>(
        &'a self,
        renderer: &'a VoxelInstanceRenderer,
        pass: &mut wgpu::RenderPass<'a>,
    ) -> bool {
        if !self.draw_prepared || !self.is_complete() {
            return false;
        }
        let Some(binding) = self.run.as_ref().and_then(|run| run.draw_binding()) else {
            return false;
        };

        renderer.draw(pass, binding, self.backend.args_buffer());
        true
    }
}
