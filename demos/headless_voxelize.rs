//! Voxelize a sphere without a window
//!
//! Uses the first available GPU adapter and falls back to the CPU backend
//! when there is none. Pass a TOML config path as the first argument to
//! override the defaults.
//!
//! RUST_LOG=info cargo run --example headless_voxelize [config.toml]

use anyhow::{Context, Result};
use hearth_voxelizer::mesh::{instance_cube_mesh, uv_sphere_mesh};
use hearth_voxelizer::{
    CpuBackend, SourceMesh, VoxelizationBackend, Voxelizer, VoxelizerConfig, VoxelizerState,
    WgpuBackend,
};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => VoxelizerConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => VoxelizerConfig::default(),
    };
    let mesh = uv_sphere_mesh(8.0, 32, 16);
    let submesh = instance_cube_mesh().submesh;

    match pollster::block_on(WgpuBackend::request_headless()) {
        Ok(backend) => {
            let mut voxelizer = Voxelizer::new(backend, config, submesh);
            run(&mut voxelizer, &mesh, |v: &Voxelizer<WgpuBackend>| {
                v.backend().wait_idle()
            })
        }
        Err(e) => {
            log::warn!("No GPU available ({}), using the CPU backend", e);
            let mut voxelizer = Voxelizer::new(CpuBackend::new(), config, submesh);
            run(&mut voxelizer, &mesh, |_| {})
        }
    }
}

fn run<B: VoxelizationBackend>(
    voxelizer: &mut Voxelizer<B>,
    mesh: &SourceMesh,
    wait: impl Fn(&Voxelizer<B>),
) -> Result<()> {
    let started = Instant::now();
    voxelizer.start(mesh)?;

    while voxelizer.state() == VoxelizerState::Pending {
        if started.elapsed() > TIMEOUT {
            anyhow::bail!("voxelization did not finish within {:?}", TIMEOUT);
        }
        wait(voxelizer);
        voxelizer.update(0.0);
    }

    if let Some(error) = voxelizer.last_error() {
        anyhow::bail!("voxelization failed: {}", error);
    }

    let plan = voxelizer.plan().context("no plan after a finished run")?;
    println!(
        "resolution {:?}, cell size {:?}, {} voxels in {:?}",
        plan.resolution.as_array(),
        plan.cell_size,
        voxelizer.voxel_count().unwrap_or(0),
        started.elapsed()
    );
    Ok(())
}
