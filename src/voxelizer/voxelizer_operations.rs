//! Voxelizer state transitions
//!
//! Idle -> Pending on `start`, Pending -> Ready or Failed when the completion
//! token resolves. A new `start` always tears the previous run down first, so
//! results from an older run are never visible while a newer one is pending.

use super::completion::CompletionPoll;
use super::resolution::{
    plan_resolution, validate_resolution_budget, validate_triangle_budget, ResolutionPlan,
};
use super::reveal::{advance_reveal, reveal_allows_draw, revealed_instances, RevealState};
use super::voxelizer_data::{Voxelizer, VoxelizerState};
use crate::backend::{CompletionReport, VoxelizationBackend, VoxelizationJob};
use crate::bounds::{aabb_transformed, create_aabb, AABB};
use crate::error::{OptionExt, VoxelResult, VoxelizerError};
use crate::mesh::{mesh_bounds, unpack_triangles, SourceMesh, SubmeshRange};
use crate::renderer::IndirectDrawArgs;
use crate::VoxelizerConfig;
use cgmath::{Matrix4, Point3, SquareMatrix};

impl<B: VoxelizationBackend> Voxelizer<B> {
    /// Idle voxelizer; nothing is allocated until `start`
    pub fn new(backend: B, config: VoxelizerConfig, submesh: SubmeshRange) -> Self {
        Self {
            config,
            backend,
            state: VoxelizerState::Idle,
            generation: 0,
            source: None,
            submesh,
            plan: None,
            run: None,
            token: None,
            report: None,
            last_error: None,
            local_to_world: Matrix4::identity(),
            draw_bounds: None,
            reveal: RevealState::default(),
            draw_prepared: false,
        }
    }

    /// Validate, plan and submit a run for `mesh`
    ///
    /// Configuration and mesh errors are returned before anything changes:
    /// the previous run, if any, stays as it was. Submission errors move the
    /// voxelizer to Failed.
    pub fn start(&mut self, mesh: &SourceMesh) -> VoxelResult<()> {
        let prepared = self.prepare_job(mesh);
        let (plan, triangles) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                log::error!("[Voxelizer] Configuration error, not starting: {}", e);
                return Err(e);
            }
        };

        self.teardown_run();
        self.source = Some(mesh.clone());
        self.generation += 1;
        self.plan = Some(plan);
        self.last_error = None;
        self.reveal = RevealState::default();
        self.state = VoxelizerState::Pending;
        self.refresh_draw_bounds();

        let job = VoxelizationJob {
            plan,
            triangles,
            submesh: self.submesh,
            generation: self.generation,
        };

        log::info!(
            "[Voxelizer] Run {} submitted: {} triangles, resolution {:?}",
            self.generation,
            job.triangle_count(),
            plan.resolution.as_array()
        );

        match self.backend.submit(job) {
            Ok(submitted) => {
                self.run = Some(submitted.run);
                self.token = Some(submitted.token);
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn prepare_job(&self, mesh: &SourceMesh) -> VoxelResult<(ResolutionPlan, Vec<[f32; 3]>)> {
        self.config.validate()?;
        let triangles = unpack_triangles(mesh)?;
        validate_triangle_budget(triangles.len(), self.backend.max_binding_size())?;
        let plan = plan_resolution(&mesh_bounds(mesh), &self.config.resolution)?;
        validate_resolution_budget(&plan.resolution, self.backend.max_binding_size())?;
        Ok((plan, triangles))
    }

    /// Run again with the last started mesh and the current configuration
    pub fn restart(&mut self) -> VoxelResult<()> {
        let mesh = self
            .source
            .clone()
            .ok_or_voxel(|| VoxelizerError::MissingResource {
                resource: "source mesh (start was never called)".to_string(),
            })?;
        self.start(&mesh)
    }

    /// Drive the pending run and the reveal animation
    pub fn update(&mut self, dt: f32) {
        self.draw_prepared = false;

        match self.state {
            VoxelizerState::Pending => self.poll_completion(),
            VoxelizerState::Ready => {
                if let (Some(config), Some(report)) = (self.config.reveal.as_ref(), self.report) {
                    advance_reveal(&mut self.reveal, config, report.voxel_count(), dt);
                }
            }
            VoxelizerState::Idle | VoxelizerState::Failed => {}
        }
    }

    fn poll_completion(&mut self) {
        self.backend.poll();

        let Some(token) = self.token.as_ref() else {
            self.fail(&VoxelizerError::StateError {
                expected: "completion token".to_string(),
                actual: "none".to_string(),
            });
            return;
        };

        if token.generation() != self.generation {
            log::warn!(
                "[Voxelizer] Ignoring token of run {} while run {} is current",
                token.generation(),
                self.generation
            );
            self.token = None;
            return;
        }

        match token.poll() {
            CompletionPoll::Pending => {}
            CompletionPoll::Completed => {
                self.token = None;
                self.complete_run();
            }
            CompletionPoll::Failed(e) => {
                self.token = None;
                self.fail(&e);
            }
        }
    }

    fn complete_run(&mut self) {
        let result = match self.run.as_mut() {
            Some(run) => self.backend.finish(run),
            None => Err(VoxelizerError::MissingResource {
                resource: "run resources".to_string(),
            }),
        };

        match result {
            Ok(report) if report.generation == self.generation => {
                log::info!(
                    "[Voxelizer] Run {} ready: {} voxels",
                    report.generation,
                    report.voxel_count()
                );
                self.report = Some(report);
                self.state = VoxelizerState::Ready;
            }
            Ok(report) => {
                // The token was already consumed, so waiting would never end
                self.fail(&VoxelizerError::StateError {
                    expected: format!("report of run {}", self.generation),
                    actual: format!("report of run {}", report.generation),
                });
            }
            Err(e) => self.fail(&e),
        }
    }

    fn fail(&mut self, error: &VoxelizerError) {
        log::error!("[Voxelizer] Run {} failed: {}", self.generation, error);
        self.teardown_run();
        self.last_error = Some(error.to_string());
        self.state = VoxelizerState::Failed;
    }

    /// Release the current run; a late completion becomes a no-op
    fn teardown_run(&mut self) {
        // Token first so the device callback can no longer deliver
        self.token = None;
        self.run = None;
        self.report = None;
        self.draw_prepared = false;
    }

    /// Release everything and go back to Idle
    pub fn disable(&mut self) {
        if self.state != VoxelizerState::Idle {
            log::info!("[Voxelizer] Disabled in state {}", self.state.name());
        }
        self.teardown_run();
        self.plan = None;
        self.draw_bounds = None;
        self.reveal = RevealState::default();
        self.state = VoxelizerState::Idle;
    }

    pub fn state(&self) -> VoxelizerState {
        self.state
    }

    /// True only while confirmed results exist
    pub fn is_complete(&self) -> bool {
        self.state == VoxelizerState::Ready
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &VoxelizerConfig {
        &self.config
    }

    /// Replace the configuration, keeping the old one if `config` is invalid
    ///
    /// Resolution changes apply on the next `start` or `restart`. Draw
    /// settings (scale, color, transform binding, reveal) apply to the
    /// current run immediately.
    pub fn set_config(&mut self, config: VoxelizerConfig) -> VoxelResult<()> {
        config.validate()?;
        self.config = config;
        self.refresh_draw_bounds();
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn plan(&self) -> Option<&ResolutionPlan> {
        self.plan.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Run output, only once confirmed
    pub fn run(&self) -> Option<&B::Run> {
        match self.state {
            VoxelizerState::Ready => self.run.as_ref(),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&CompletionReport> {
        self.report.as_ref()
    }

    pub fn draw_args(&self) -> Option<IndirectDrawArgs> {
        self.report.map(|report| report.args)
    }

    /// Occupied cell count of the confirmed run
    pub fn voxel_count(&self) -> Option<u32> {
        self.report.map(|report| report.voxel_count())
    }

    pub fn reveal_completed(&self) -> bool {
        self.reveal.completed
    }

    /// Instance limit handed to the vertex shader
    pub fn revealed_instances(&self) -> Option<u32> {
        revealed_instances(&self.reveal, self.config.reveal.as_ref())
    }

    /// Whether a draw should be issued this frame, ignoring visibility
    pub fn should_render(&self) -> bool {
        self.state == VoxelizerState::Ready
            && reveal_allows_draw(&self.reveal, self.config.reveal.as_ref())
    }

    /// Per-axis cube size, the cell size unless configured
    pub fn instance_scale(&self) -> [f32; 3] {
        match (self.config.instance_scale, self.plan.as_ref()) {
            (Some(scale), _) => scale,
            (None, Some(plan)) => plan.cell_size,
            (None, None) => [1.0; 3],
        }
    }

    pub fn local_to_world(&self) -> Matrix4<f32> {
        if self.config.bind_local_to_world {
            self.local_to_world
        } else {
            Matrix4::identity()
        }
    }

    pub fn set_transform(&mut self, local_to_world: Matrix4<f32>) {
        self.local_to_world = local_to_world;
        self.refresh_draw_bounds();
    }

    pub fn draw_bounds(&self) -> Option<&AABB> {
        self.draw_bounds.as_ref()
    }

    /// Grid bounds grown by half a cube on each side, then transformed
    fn refresh_draw_bounds(&mut self) {
        self.draw_bounds = self.plan.as_ref().map(|plan| {
            let half = self.instance_scale().map(|s| s.abs() * 0.5);
            let b = &plan.bounds;
            let local = create_aabb(
                Point3::new(b.min.x - half[0], b.min.y - half[1], b.min.z - half[2]),
                Point3::new(b.max.x + half[0], b.max.y + half[1], b.max.z + half[2]),
            );
            aabb_transformed(&local, &self.local_to_world())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SubmittedRun;
    use crate::cpu::CpuBackend;
    use crate::mesh::{instance_cube_mesh, unit_cube_mesh};
    use crate::voxelizer::completion::completion_channel;
    use crate::voxelizer::resolution::{GridResolution, ResolutionMode};
    use crate::voxelizer::reveal::RevealConfig;
    use cgmath::Vector3;

    fn fixed_config(split: [u32; 3]) -> VoxelizerConfig {
        VoxelizerConfig {
            resolution: ResolutionMode::Fixed { split_count: split },
            ..VoxelizerConfig::default()
        }
    }

    fn cpu_voxelizer(config: VoxelizerConfig) -> Voxelizer<CpuBackend> {
        Voxelizer::new(CpuBackend::new(), config, instance_cube_mesh().submesh)
    }

    /// Completes every run at once but reports a generation far ahead
    struct MislabeledBackend;

    impl VoxelizationBackend for MislabeledBackend {
        type Run = ();

        fn max_binding_size(&self) -> u64 {
            u64::MAX
        }

        fn submit(&mut self, job: VoxelizationJob) -> VoxelResult<SubmittedRun<()>> {
            let (sender, token) = completion_channel(job.generation);
            sender.complete(Ok(()));
            Ok(SubmittedRun { run: (), token })
        }

        fn poll(&self) {}

        fn finish(&mut self, _run: &mut ()) -> VoxelResult<CompletionReport> {
            Ok(CompletionReport {
                generation: 100,
                args: IndirectDrawArgs::from_submesh(&instance_cube_mesh().submesh, 8),
            })
        }
    }

    #[test]
    fn test_start_goes_pending_then_ready() {
        let mut voxelizer = cpu_voxelizer(fixed_config([4, 4, 4]));
        assert_eq!(voxelizer.state(), VoxelizerState::Idle);

        voxelizer.start(&unit_cube_mesh(0.5)).expect("start");
        assert_eq!(voxelizer.state(), VoxelizerState::Pending);
        assert!(!voxelizer.is_complete());
        assert!(voxelizer.run().is_none());

        voxelizer.update(0.016);
        assert!(voxelizer.is_complete());
        assert_eq!(voxelizer.voxel_count(), Some(64));
        assert_eq!(voxelizer.draw_args().map(|a| a.index_count_per_instance), Some(36));
    }

    #[test]
    fn test_configuration_error_stays_idle() {
        let mut voxelizer = cpu_voxelizer(fixed_config([0, 4, 4]));
        let err = voxelizer.start(&unit_cube_mesh(0.5)).unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(voxelizer.state(), VoxelizerState::Idle);
        assert_eq!(voxelizer.backend().runs_submitted(), 0);
        assert_eq!(voxelizer.generation(), 0);
    }

    #[test]
    fn test_bad_mesh_stays_idle() {
        let mut voxelizer = cpu_voxelizer(fixed_config([4, 4, 4]));
        let mesh = SourceMesh {
            vertices: vec![[0.0; 3]; 3],
            indices: vec![0, 1],
            bounds: None,
        };
        assert!(voxelizer.start(&mesh).is_err());
        assert_eq!(voxelizer.state(), VoxelizerState::Idle);
        assert_eq!(voxelizer.backend().runs_submitted(), 0);
    }

    #[test]
    fn test_resolution_over_budget_is_configuration_error() {
        let mut voxelizer = Voxelizer::new(
            CpuBackend::with_binding_limit(1024),
            fixed_config([8, 8, 8]),
            instance_cube_mesh().submesh,
        );
        let err = voxelizer.start(&unit_cube_mesh(0.5)).unwrap_err();
        assert!(matches!(err, VoxelizerError::ResolutionTooLarge { .. }));
        assert_eq!(voxelizer.state(), VoxelizerState::Idle);
    }

    #[test]
    fn test_rerun_resets_completion_and_recounts() {
        let mut voxelizer = cpu_voxelizer(fixed_config([4, 4, 4]));
        let cube = unit_cube_mesh(0.5);
        voxelizer.start(&cube).expect("start");
        voxelizer.update(0.0);
        assert_eq!(voxelizer.voxel_count(), Some(64));

        voxelizer.set_config(fixed_config([2, 2, 2])).expect("config");
        voxelizer.restart().expect("restart");
        assert!(!voxelizer.is_complete());
        assert_eq!(voxelizer.voxel_count(), None);
        assert!(voxelizer.run().is_none());
        assert!(!voxelizer.should_render());

        voxelizer.update(0.0);
        assert_eq!(voxelizer.voxel_count(), Some(8));
        let run = voxelizer.run().expect("ready run");
        assert_eq!(run.plan.resolution, GridResolution::new(2, 2, 2));
        assert_eq!(run.positions.len(), 8);
    }

    #[test]
    fn test_same_input_same_count() {
        let mut voxelizer = cpu_voxelizer(fixed_config([6, 5, 7]));
        let cube = unit_cube_mesh(0.5);
        voxelizer.start(&cube).expect("start");
        voxelizer.update(0.0);
        let first = voxelizer.voxel_count();

        voxelizer.start(&cube).expect("start");
        voxelizer.update(0.0);
        assert_eq!(voxelizer.voxel_count(), first);
        assert_eq!(voxelizer.generation(), 2);
    }

    #[test]
    fn test_empty_mesh_is_ready_with_no_instances() {
        let mut voxelizer = cpu_voxelizer(fixed_config([4, 4, 4]));
        voxelizer.start(&SourceMesh::default()).expect("start");
        voxelizer.update(0.0);
        assert!(voxelizer.is_complete());
        assert_eq!(voxelizer.voxel_count(), Some(0));
        assert_eq!(voxelizer.draw_args().map(|a| a.instance_count), Some(0));
    }

    #[test]
    fn test_disable_releases_everything() {
        let mut voxelizer = cpu_voxelizer(fixed_config([4, 4, 4]));
        voxelizer.start(&unit_cube_mesh(0.5)).expect("start");
        voxelizer.disable();
        assert_eq!(voxelizer.state(), VoxelizerState::Idle);
        assert!(voxelizer.run.is_none());
        assert!(voxelizer.token.is_none());

        // Nothing left to poll
        voxelizer.update(0.0);
        assert_eq!(voxelizer.state(), VoxelizerState::Idle);

        // Restart after disable uses the remembered mesh
        voxelizer.restart().expect("restart");
        voxelizer.update(0.0);
        assert_eq!(voxelizer.voxel_count(), Some(64));
    }

    #[test]
    fn test_restart_without_mesh_is_error() {
        let mut voxelizer = cpu_voxelizer(VoxelizerConfig::default());
        assert!(matches!(
            voxelizer.restart(),
            Err(VoxelizerError::MissingResource { .. })
        ));
    }

    #[test]
    fn test_dropped_run_fails() {
        let mut voxelizer = cpu_voxelizer(fixed_config([4, 4, 4]));
        voxelizer.start(&unit_cube_mesh(0.5)).expect("start");
        // Swap in a token whose sender is already gone
        let (sender, token) = crate::voxelizer::completion::completion_channel(1);
        drop(sender);
        voxelizer.token = Some(token);

        voxelizer.update(0.0);
        assert_eq!(voxelizer.state(), VoxelizerState::Failed);
        assert!(!voxelizer.is_complete());
        assert!(voxelizer.last_error().is_some());
        assert!(!voxelizer.should_render());
    }

    #[test]
    fn test_reveal_runs_after_ready() {
        let mut config = fixed_config([4, 4, 4]);
        config.reveal = Some(RevealConfig {
            speed: 10.0,
            delay: 0.0,
            hide_after_reveal: true,
        });
        let mut voxelizer = cpu_voxelizer(config);
        voxelizer.start(&unit_cube_mesh(0.5)).expect("start");
        voxelizer.update(0.0);
        assert_eq!(voxelizer.revealed_instances(), Some(0));

        // 100 steps per second
        voxelizer.update(0.25);
        assert_eq!(voxelizer.revealed_instances(), Some(25));
        assert!(voxelizer.should_render());

        voxelizer.update(0.5);
        assert!(voxelizer.reveal_completed());
        assert!(!voxelizer.should_render());
        assert!(voxelizer.is_complete());
    }

    #[test]
    fn test_draw_bounds_follow_transform() {
        let mut config = fixed_config([4, 4, 4]);
        config.instance_scale = Some([1.0; 3]);
        let mut voxelizer = cpu_voxelizer(config);
        voxelizer.start(&unit_cube_mesh(0.5)).expect("start");

        let bounds = *voxelizer.draw_bounds().expect("bounds");
        assert_eq!(bounds.min, Point3::new(-1.0, -1.0, -1.0));

        voxelizer.set_transform(Matrix4::from_translation(Vector3::new(10.0, 0.0, 0.0)));
        let moved = *voxelizer.draw_bounds().expect("bounds");
        assert_eq!(moved.min.x, 9.0);
        assert_eq!(moved.max.x, 11.0);
    }

    #[test]
    fn test_unbound_transform_is_identity() {
        let mut config = fixed_config([4, 4, 4]);
        config.bind_local_to_world = false;
        let mut voxelizer = cpu_voxelizer(config);
        voxelizer.set_transform(Matrix4::from_scale(3.0));
        assert_eq!(voxelizer.local_to_world(), Matrix4::identity());
    }

    #[test]
    fn test_instance_scale_defaults_to_cell_size() {
        let mut voxelizer = cpu_voxelizer(fixed_config([4, 2, 1]));
        voxelizer.start(&unit_cube_mesh(0.5)).expect("start");
        assert_eq!(voxelizer.instance_scale(), [0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_mesh_over_triangle_budget_stays_idle() {
        // 36 corners of 16 bytes do not fit in 64 bytes
        let mut voxelizer = Voxelizer::new(
            CpuBackend::with_binding_limit(64),
            fixed_config([1, 1, 1]),
            instance_cube_mesh().submesh,
        );
        let err = voxelizer.start(&unit_cube_mesh(0.5)).unwrap_err();
        assert!(matches!(err, VoxelizerError::MeshTooLarge { triangles: 12, .. }));
        assert!(err.is_configuration_error());
        assert_eq!(voxelizer.state(), VoxelizerState::Idle);
        assert_eq!(voxelizer.backend().runs_submitted(), 0);
    }

    #[test]
    fn test_set_config_refreshes_draw_bounds() {
        let mut voxelizer = cpu_voxelizer(fixed_config([4, 4, 4]));
        voxelizer.start(&unit_cube_mesh(0.5)).expect("start");
        voxelizer.update(0.0);
        // Cell size 0.25 grows the grid by 0.125
        assert_eq!(voxelizer.draw_bounds().expect("bounds").max.x, 0.625);

        let mut config = fixed_config([4, 4, 4]);
        config.instance_scale = Some([4.0; 3]);
        voxelizer.set_config(config).expect("config");
        assert_eq!(voxelizer.instance_scale(), [4.0; 3]);
        let bounds = *voxelizer.draw_bounds().expect("bounds");
        assert_eq!(bounds.max.x, 2.5);
        assert_eq!(bounds.min.z, -2.5);
        assert!(voxelizer.is_complete());
    }

    #[test]
    fn test_set_config_rejects_invalid_and_keeps_old() {
        let mut voxelizer = cpu_voxelizer(fixed_config([4, 4, 4]));
        let err = voxelizer.set_config(fixed_config([4, 0, 4])).unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(
            voxelizer.config().resolution,
            ResolutionMode::Fixed {
                split_count: [4, 4, 4]
            }
        );
    }

    #[test]
    fn test_mislabeled_report_fails_run() {
        let mut voxelizer = Voxelizer::new(
            MislabeledBackend,
            fixed_config([2, 2, 2]),
            instance_cube_mesh().submesh,
        );
        voxelizer.start(&unit_cube_mesh(0.5)).expect("start");
        voxelizer.update(0.0);

        assert_eq!(voxelizer.state(), VoxelizerState::Failed);
        assert!(voxelizer.report().is_none());
        let error = voxelizer.last_error().expect("error").to_string();
        assert!(error.contains("report of run 100"), "{}", error);

        // Further updates do not replace the error
        voxelizer.update(0.0);
        assert_eq!(voxelizer.last_error(), Some(error.as_str()));
    }

    #[test]
    fn test_supplied_bounds_define_grid() {
        let mut mesh = unit_cube_mesh(0.5);
        mesh.bounds = Some(create_aabb(
            Point3::new(-1.0, -1.0, -1.0),
            Point3::new(1.0, 1.0, 1.0),
        ));
        let mut voxelizer = cpu_voxelizer(fixed_config([8, 8, 8]));
        voxelizer.start(&mesh).expect("start");
        voxelizer.update(0.0);

        let plan = voxelizer.plan().expect("plan");
        assert_eq!(plan.bounds.min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(plan.cell_size, [0.25; 3]);
        // Cube of side 1 in cells of 0.25
        assert_eq!(voxelizer.voxel_count(), Some(64));
    }
}
