//! Voxelization on a real device
//!
//! Every test returns early when no adapter is available, so the suite stays
//! green on machines without a GPU.

use cgmath::{perspective, Deg, Matrix4, Point3, Vector3};
use hearth_voxelizer::mesh::{instance_cube_mesh, unit_cube_mesh, uv_sphere_mesh};
use hearth_voxelizer::renderer::{RenderTargetDesc, VoxelInstanceRenderer};
use hearth_voxelizer::{
    CpuBackend, GridResolution, ResolutionMode, SourceMesh, Voxelizer, VoxelizerConfig,
    VoxelizerState, WgpuBackend,
};
use std::sync::Arc;

const MAX_UPDATES: usize = 1000;

fn gpu_backend() -> Option<WgpuBackend> {
    match pollster::block_on(WgpuBackend::request_headless()) {
        Ok(backend) => Some(backend),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

fn shared_device() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    match pollster::block_on(WgpuBackend::request_headless_device()) {
        Ok(pair) => Some(pair),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

fn fixed(split_count: [u32; 3]) -> VoxelizerConfig {
    VoxelizerConfig {
        resolution: ResolutionMode::Fixed { split_count },
        ..VoxelizerConfig::default()
    }
}

fn drive(voxelizer: &mut Voxelizer<WgpuBackend>) {
    for _ in 0..MAX_UPDATES {
        if voxelizer.state() != VoxelizerState::Pending {
            return;
        }
        voxelizer.backend().wait_idle();
        voxelizer.update(0.0);
    }
    panic!("run still pending after {} updates", MAX_UPDATES);
}

fn cpu_count(config: &VoxelizerConfig, mesh: &SourceMesh) -> u32 {
    let mut voxelizer = Voxelizer::new(CpuBackend::new(), config.clone(), instance_cube_mesh().submesh);
    voxelizer.start(mesh).expect("cpu start");
    voxelizer.update(0.0);
    voxelizer.voxel_count().expect("cpu count")
}

fn read_positions(backend: &WgpuBackend, buffer: &wgpu::Buffer, count: u32) -> Vec<[f32; 4]> {
    if count == 0 {
        return Vec::new();
    }
    let size = count as u64 * 16;
    let staging = backend.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("Test Positions Readback"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let mut encoder = backend
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    backend.queue().submit(Some(encoder.finish()));

    let (sender, receiver) = flume::bounded(1);
    staging
        .slice(..)
        .map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
    backend.wait_idle();
    receiver.recv().expect("map callback").expect("map");

    let positions = bytemuck::cast_slice::<u8, [f32; 4]>(&staging.slice(..).get_mapped_range()).to_vec();
    staging.unmap();
    positions
}

fn sorted(mut positions: Vec<[f32; 4]>) -> Vec<[f32; 4]> {
    positions.sort_by(|a, b| {
        (a[2], a[1], a[0])
            .partial_cmp(&(b[2], b[1], b[0]))
            .expect("finite positions")
    });
    positions
}

#[test]
fn test_gpu_cube_fills_every_cell() {
    let Some(backend) = gpu_backend() else { return };
    let mut voxelizer = Voxelizer::new(backend, fixed([4, 4, 4]), instance_cube_mesh().submesh);

    voxelizer.start(&unit_cube_mesh(0.5)).expect("start");
    assert_eq!(voxelizer.state(), VoxelizerState::Pending);
    assert!(voxelizer.run().is_none());

    drive(&mut voxelizer);
    assert_eq!(voxelizer.state(), VoxelizerState::Ready, "{:?}", voxelizer.last_error());
    assert_eq!(voxelizer.voxel_count(), Some(64));

    let args = voxelizer.draw_args().expect("args");
    assert_eq!(args.index_count_per_instance, 36);
    assert_eq!(args.start_instance_location, 0);
}

#[test]
fn test_gpu_positions_match_cpu_reference() {
    let Some(backend) = gpu_backend() else { return };
    let config = fixed([6, 5, 7]);
    let mesh = unit_cube_mesh(0.5);

    let mut reference = Voxelizer::new(CpuBackend::new(), config.clone(), instance_cube_mesh().submesh);
    reference.start(&mesh).expect("cpu start");
    reference.update(0.0);
    let expected = sorted(reference.run().expect("cpu run").positions.clone());

    let mut voxelizer = Voxelizer::new(backend, config, instance_cube_mesh().submesh);
    voxelizer.start(&mesh).expect("start");
    drive(&mut voxelizer);

    let count = voxelizer.voxel_count().expect("count");
    assert_eq!(count as usize, expected.len());

    let run = voxelizer.run().expect("gpu run");
    let actual = sorted(read_positions(voxelizer.backend(), run.positions(), count));
    for (a, e) in actual.iter().zip(&expected) {
        for c in 0..3 {
            assert!((a[c] - e[c]).abs() < 1e-5, "{:?} vs {:?}", a, e);
        }
    }
}

#[test]
fn test_gpu_sphere_close_to_cpu_count() {
    let Some(backend) = gpu_backend() else { return };
    let config = fixed([24, 24, 24]);
    let mesh = uv_sphere_mesh(1.0, 24, 12);
    let expected = cpu_count(&config, &mesh);

    let mut voxelizer = Voxelizer::new(backend, config, instance_cube_mesh().submesh);
    voxelizer.start(&mesh).expect("start");
    drive(&mut voxelizer);
    let count = voxelizer.voxel_count().expect("count");

    // Device float rounding may flip a cell whose center lies on the surface
    let tolerance = (expected / 100).max(1);
    assert!(
        count.abs_diff(expected) <= tolerance,
        "gpu {} vs cpu {}",
        count,
        expected
    );
    assert!(count > 0);
}

#[test]
fn test_gpu_empty_mesh_draws_nothing() {
    let Some(backend) = gpu_backend() else { return };
    let mut voxelizer = Voxelizer::new(backend, fixed([8, 8, 8]), instance_cube_mesh().submesh);
    voxelizer.start(&SourceMesh::default()).expect("start");
    drive(&mut voxelizer);
    assert!(voxelizer.is_complete());
    assert_eq!(voxelizer.voxel_count(), Some(0));
}

#[test]
fn test_gpu_restart_at_new_resolution() {
    let Some(backend) = gpu_backend() else { return };
    let mut voxelizer = Voxelizer::new(backend, fixed([4, 4, 4]), instance_cube_mesh().submesh);
    let mesh = unit_cube_mesh(0.5);

    voxelizer.start(&mesh).expect("start");
    drive(&mut voxelizer);
    assert_eq!(voxelizer.voxel_count(), Some(64));

    voxelizer.set_config(fixed([3, 3, 3])).expect("config");
    voxelizer.restart().expect("restart");
    assert!(!voxelizer.is_complete());
    assert_eq!(voxelizer.voxel_count(), None);

    drive(&mut voxelizer);
    assert_eq!(voxelizer.voxel_count(), Some(27));
    assert_eq!(
        voxelizer.plan().map(|p| p.resolution),
        Some(GridResolution::new(3, 3, 3))
    );
}

#[test]
fn test_gpu_restart_while_pending_discards_old_run() {
    let Some(backend) = gpu_backend() else { return };
    let mut voxelizer = Voxelizer::new(backend, fixed([4, 4, 4]), instance_cube_mesh().submesh);
    let mesh = unit_cube_mesh(0.5);

    voxelizer.start(&mesh).expect("start");
    voxelizer.set_config(fixed([2, 2, 2])).expect("config");
    voxelizer.restart().expect("restart");
    assert_eq!(voxelizer.generation(), 2);

    drive(&mut voxelizer);
    assert_eq!(voxelizer.voxel_count(), Some(8));
}

#[test]
fn test_gpu_draws_into_offscreen_target() {
    let Some(backend) = gpu_backend() else { return };
    const SIZE: u32 = 64;
    let format = wgpu::TextureFormat::Rgba8Unorm;

    let device = backend.device().clone();
    let queue = backend.queue().clone();
    let renderer = VoxelInstanceRenderer::new(
        &device,
        &RenderTargetDesc {
            color_format: format,
            depth_format: None,
            sample_count: 1,
        },
        &instance_cube_mesh(),
    )
    .expect("renderer");

    let mut config = fixed([4, 4, 4]);
    config.color = [1.0, 0.0, 0.0, 1.0];
    let mut voxelizer = Voxelizer::new(backend, config, renderer.submesh());
    voxelizer.start(&unit_cube_mesh(0.5)).expect("start");
    drive(&mut voxelizer);

    let view = Matrix4::look_at_rh(Point3::new(1.5, 1.5, 3.0), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y());
    let view_proj = perspective(Deg(60.0), 1.0, 0.1, 100.0) * view;
    assert!(voxelizer.prepare_draw(&renderer, view_proj));

    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Test Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        assert!(voxelizer.render(&renderer, &mut pass));
    }

    // 64 px * 4 bytes is already 256-aligned
    let bytes_per_row = SIZE * 4;
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Test Pixels"),
        size: (bytes_per_row * SIZE) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    encoder.copy_texture_to_buffer(
        target.as_image_copy(),
        wgpu::ImageCopyBuffer {
            buffer: &readback,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(SIZE),
            },
        },
        wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let (sender, receiver) = flume::bounded(1);
    readback
        .slice(..)
        .map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
    device.poll(wgpu::Maintain::Wait);
    receiver.recv().expect("map callback").expect("map");

    let pixels = readback.slice(..).get_mapped_range();
    let center = ((SIZE / 2) * bytes_per_row + (SIZE / 2) * 4) as usize;
    assert!(pixels[center] > 0, "center pixel {:?}", &pixels[center..center + 4]);
    assert_eq!(pixels[center + 1], 0);
    assert_eq!(pixels[center + 3], 255);
}

#[test]
fn test_gpu_host_errors_do_not_fail_runs() {
    let Some((device, queue)) = shared_device() else { return };
    let first = WgpuBackend::new(device.clone(), queue.clone()).expect("first backend");
    let second = WgpuBackend::new(device.clone(), queue.clone()).expect("second backend");
    let mut a = Voxelizer::new(first, fixed([4, 4, 4]), instance_cube_mesh().submesh);
    let mut b = Voxelizer::new(second, fixed([2, 2, 2]), instance_cube_mesh().submesh);
    let mesh = unit_cube_mesh(0.5);

    a.start(&mesh).expect("start a");
    b.start(&mesh).expect("start b");

    // MAP_READ may only pair with COPY_DST, so the host sees its own error
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let _bad = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Host Bad Buffer"),
        size: 16,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
    });
    let host_error = pollster::block_on(device.pop_error_scope());
    assert!(host_error.is_some());

    drive(&mut a);
    drive(&mut b);
    assert_eq!(a.state(), VoxelizerState::Ready, "{:?}", a.last_error());
    assert_eq!(b.state(), VoxelizerState::Ready, "{:?}", b.last_error());
    assert_eq!(a.voxel_count(), Some(64));
    assert_eq!(b.voxel_count(), Some(8));
}

#[test]
fn test_gpu_failed_run_stays_local_and_recovers() {
    let Some((device, queue)) = shared_device() else { return };
    let healthy = WgpuBackend::new(device.clone(), queue.clone()).expect("healthy backend");
    // Budget above the device limit so an oversized grid reaches validation
    let oversized = WgpuBackend::new(device.clone(), queue.clone())
        .expect("oversized backend")
        .with_binding_limit(u64::MAX);
    let mesh = unit_cube_mesh(0.5);

    let mut a = Voxelizer::new(healthy, fixed([4, 4, 4]), instance_cube_mesh().submesh);
    let huge = VoxelizerConfig {
        resolution: ResolutionMode::AutoFromVoxelSize {
            voxel_size: [0.001, 0.001, 0.1],
        },
        ..VoxelizerConfig::default()
    };
    let mut b = Voxelizer::new(oversized, huge, instance_cube_mesh().submesh);

    a.start(&mesh).expect("start a");
    // 1000 x 1000 x 10 cells of positions exceed the storage binding limit
    let err = b.start(&mesh).unwrap_err();
    assert!(!err.is_configuration_error());
    assert_eq!(b.state(), VoxelizerState::Failed);
    assert!(b.last_error().is_some());

    drive(&mut a);
    assert_eq!(a.state(), VoxelizerState::Ready, "{:?}", a.last_error());
    assert_eq!(a.voxel_count(), Some(64));

    // A validation failure is not device loss; the next run on b succeeds
    for _ in 0..11 {
        assert!(b.restart().is_err());
    }
    b.set_config(fixed([4, 4, 4])).expect("config");
    b.start(&mesh).expect("start b again");
    drive(&mut b);
    assert_eq!(b.state(), VoxelizerState::Ready, "{:?}", b.last_error());
    assert_eq!(b.voxel_count(), Some(64));
}
