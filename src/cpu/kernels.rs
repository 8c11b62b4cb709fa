//! CPU versions of the voxelization kernels
//!
//! Same storage layout and the same arithmetic as `voxelize.wgsl`, run with
//! rayon. Rows and cells are independent, exactly like the device threads.

use crate::voxelizer::grid::{
    cell_center, cell_center_component, cell_index, first_cell_after, plane_dims, row_bit,
    row_offset, toggle_suffix, ProjectionAxis,
};
use crate::voxelizer::resolution::ResolutionPlan;
use rayon::prelude::*;

type Point2 = [f32; 2];

fn lex_less(a: Point2, b: Point2) -> bool {
    a[0] < b[0] || (a[0] == b[0] && a[1] < b[1])
}

/// Signed area of `(a, b, p)` with canonical endpoint order
fn edge_function(a: Point2, b: Point2, p: Point2) -> f32 {
    if lex_less(b, a) {
        return -((a[0] - b[0]) * (p[1] - b[1]) - (a[1] - b[1]) * (p[0] - b[0]));
    }
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

fn owns_edge(a: Point2, b: Point2) -> bool {
    let d = [b[0] - a[0], b[1] - a[1]];
    d[1] < 0.0 || (d[1] == 0.0 && d[0] > 0.0)
}

fn edge_covers(w: f32, a: Point2, b: Point2) -> bool {
    w > 0.0 || (w == 0.0 && owns_edge(a, b))
}

/// Depth along `axis` where the ray through plane point `p` crosses the
/// triangle, `None` when it misses or the triangle is edge-on
pub fn ray_hit_depth(triangle: &[[f32; 3]], axis: ProjectionAxis, p: Point2) -> Option<f32> {
    let (u, v) = axis.plane_axes();
    let d = axis.index();
    let project = |corner: &[f32; 3]| [corner[u], corner[v]];

    let a = project(&triangle[0]);
    let mut b = project(&triangle[1]);
    let mut c = project(&triangle[2]);
    let da = triangle[0][d];
    let mut db = triangle[1][d];
    let mut dc = triangle[2][d];

    let orientation = edge_function(a, b, c);
    if orientation == 0.0 {
        return None;
    }
    if orientation < 0.0 {
        std::mem::swap(&mut b, &mut c);
        std::mem::swap(&mut db, &mut dc);
    }

    let w0 = edge_function(b, c, p);
    let w1 = edge_function(c, a, p);
    let w2 = edge_function(a, b, p);
    if !(edge_covers(w0, b, c) && edge_covers(w1, c, a) && edge_covers(w2, a, b)) {
        return None;
    }

    Some((w0 * da + w1 * db + w2 * dc) / (w0 + w1 + w2))
}

fn build_row(
    plan: &ResolutionPlan,
    triangles: &[[f32; 3]],
    axis: ProjectionAxis,
    cell_u: u32,
    cell_v: u32,
    row: &mut [u32],
) {
    let (u, v) = axis.plane_axes();
    let component = axis.index();
    let count = plan.resolution.as_array()[component];
    let p = [
        cell_center_component(plan, u, cell_u),
        cell_center_component(plan, v, cell_v),
    ];

    for triangle in triangles.chunks_exact(3) {
        if let Some(depth) = ray_hit_depth(triangle, axis, p) {
            toggle_suffix(row, first_cell_after(plan, component, depth), count);
        }
    }
}

/// Parity plane for rays along `axis`
pub fn project_axis(plan: &ResolutionPlan, triangles: &[[f32; 3]], axis: ProjectionAxis) -> Vec<u32> {
    let (dim_u, dim_v, words) = plane_dims(&plan.resolution, axis);
    let mut plane = vec![0u32; dim_u as usize * dim_v as usize * words as usize];

    plane
        .par_chunks_mut(words as usize)
        .enumerate()
        .for_each(|(row_index, row)| {
            let cell_u = row_index as u32 % dim_u;
            let cell_v = row_index as u32 / dim_u;
            build_row(plan, triangles, axis, cell_u, cell_v, row);
        });

    plane
}

/// Occupied iff inside along all three axes
pub fn combine(plan: &ResolutionPlan, planes: &[Vec<u32>; 3]) -> Vec<u32> {
    let resolution = &plan.resolution;
    let (nx, ny) = (resolution.x as usize, resolution.y as usize);
    let mut volume = vec![0u32; resolution.cell_count() as usize];

    volume.par_iter_mut().enumerate().for_each(|(index, cell)| {
        let x = (index % nx) as u32;
        let y = ((index / nx) % ny) as u32;
        let z = (index / (nx * ny)) as u32;

        let yz = &planes[0][row_offset(resolution, ProjectionAxis::X, y, z)..];
        let xz = &planes[1][row_offset(resolution, ProjectionAxis::Y, x, z)..];
        let xy = &planes[2][row_offset(resolution, ProjectionAxis::Z, x, y)..];

        *cell = (row_bit(yz, x) && row_bit(xz, y) && row_bit(xy, z)) as u32;
    });

    volume
}

/// Centers of occupied cells, x-fastest order, w = 1
pub fn compact(plan: &ResolutionPlan, volume: &[u32]) -> Vec<[f32; 4]> {
    let resolution = &plan.resolution;
    let (nx, ny) = (resolution.x as usize, resolution.y as usize);

    volume
        .par_iter()
        .enumerate()
        .filter(|(_, &occupied)| occupied != 0)
        .map(|(index, _)| {
            let x = (index % nx) as u32;
            let y = ((index / nx) % ny) as u32;
            let z = (index / (nx * ny)) as u32;
            debug_assert_eq!(cell_index(resolution, x, y, z), index);
            let [cx, cy, cz] = cell_center(plan, x, y, z);
            [cx, cy, cz, 1.0]
        })
        .collect()
}

/// Dense occupancy and compacted positions for one set of triangles
pub struct CpuVoxelization {
    pub volume: Vec<u32>,
    pub positions: Vec<[f32; 4]>,
}

pub fn voxelize(plan: &ResolutionPlan, triangles: &[[f32; 3]]) -> CpuVoxelization {
    let planes = ProjectionAxis::ALL.map(|axis| project_axis(plan, triangles, axis));
    let volume = combine(plan, &planes);
    let positions = compact(plan, &volume);
    CpuVoxelization { volume, positions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::create_aabb;
    use crate::mesh::{mesh_bounds, unit_cube_mesh, unpack_triangles, uv_sphere_mesh};
    use crate::voxelizer::resolution::{plan_resolution, GridResolution, ResolutionMode};
    use cgmath::Point3;

    fn fixed_plan(min: f32, max: f32, split: [u32; 3]) -> ResolutionPlan {
        plan_resolution(
            &create_aabb(Point3::new(min, min, min), Point3::new(max, max, max)),
            &ResolutionMode::Fixed { split_count: split },
        )
        .expect("valid plan")
    }

    #[test]
    fn test_ray_hits_triangle_at_interpolated_depth() {
        let triangle = [[0.0, 0.0, 1.0], [0.0, 4.0, 1.0], [0.0, 0.0, 5.0]];
        // Sloped triangle in the YZ plane seen along Z: project to XY is edge-on
        assert_eq!(ray_hit_depth(&triangle, ProjectionAxis::Z, [0.0, 1.0]), None);

        let sloped = [[0.0, 0.0, 0.0], [4.0, 0.0, 4.0], [0.0, 4.0, 0.0]];
        let depth = ray_hit_depth(&sloped, ProjectionAxis::Z, [1.0, 1.0]).expect("hit");
        assert!((depth - 1.0).abs() < 1e-6);
        assert_eq!(ray_hit_depth(&sloped, ProjectionAxis::Z, [3.0, 3.0]), None);
    }

    #[test]
    fn test_winding_does_not_matter() {
        let ccw = [[0.0, 0.0, 2.0], [4.0, 0.0, 2.0], [0.0, 4.0, 2.0]];
        let cw = [ccw[0], ccw[2], ccw[1]];
        let p = [1.0, 1.0];
        assert_eq!(
            ray_hit_depth(&ccw, ProjectionAxis::Z, p),
            ray_hit_depth(&cw, ProjectionAxis::Z, p)
        );
    }

    #[test]
    fn test_shared_edge_counted_once() {
        // Quad split along its diagonal; the ray passes exactly through it
        let quad = [
            [0.0, 0.0, 1.0],
            [2.0, 0.0, 1.0],
            [2.0, 2.0, 1.0],
            [0.0, 0.0, 1.0],
            [2.0, 2.0, 1.0],
            [0.0, 2.0, 1.0],
        ];
        for p in [[1.0, 1.0], [0.0, 0.0], [2.0, 2.0], [1.0, 0.5]] {
            let hits = quad
                .chunks_exact(3)
                .filter(|tri| ray_hit_depth(tri, ProjectionAxis::Z, p).is_some())
                .count();
            assert!(hits <= 1, "point {:?} hit {} times", p, hits);
        }
        let interior = quad
            .chunks_exact(3)
            .filter(|tri| ray_hit_depth(tri, ProjectionAxis::Z, [1.0, 1.0]).is_some())
            .count();
        assert_eq!(interior, 1);
    }

    #[test]
    fn test_cube_fills_its_own_bounds() {
        let cube = unit_cube_mesh(0.5);
        let triangles = unpack_triangles(&cube).expect("valid cube");
        let plan = plan_resolution(
            &mesh_bounds(&cube),
            &ResolutionMode::Fixed {
                split_count: [4, 4, 4],
            },
        )
        .expect("valid plan");

        let result = voxelize(&plan, &triangles);
        assert_eq!(result.positions.len(), 64);
        assert!(result.volume.iter().all(|&cell| cell == 1));
    }

    #[test]
    fn test_small_cube_in_larger_grid() {
        let cube = unit_cube_mesh(0.5);
        let triangles = unpack_triangles(&cube).expect("valid cube");
        let plan = fixed_plan(-1.0, 1.0, [8, 8, 8]);

        let result = voxelize(&plan, &triangles);
        let resolution = plan.resolution;
        for z in 0..8 {
            for y in 0..8 {
                for x in 0..8 {
                    let center = cell_center(&plan, x, y, z);
                    let inside = center.iter().all(|c| c.abs() < 0.5);
                    let occupied = result.volume[cell_index(&resolution, x, y, z)] == 1;
                    assert_eq!(inside, occupied, "cell ({}, {}, {})", x, y, z);
                }
            }
        }
        // Centers at +-0.125 and +-0.375 on every axis
        assert_eq!(result.positions.len(), 64);
    }

    #[test]
    fn test_positions_are_occupied_centers() {
        let sphere = uv_sphere_mesh(1.0, 24, 12);
        let triangles = unpack_triangles(&sphere).expect("valid sphere");
        let plan = fixed_plan(-1.0, 1.0, [12, 12, 12]);

        let result = voxelize(&plan, &triangles);
        let occupied = result.volume.iter().filter(|&&c| c == 1).count();
        assert_eq!(result.positions.len(), occupied);
        assert!(occupied > 0);
        for p in &result.positions {
            assert_eq!(p[3], 1.0);
            let r2 = p[0] * p[0] + p[1] * p[1] + p[2] * p[2];
            assert!(r2 < 1.0, "center {:?} outside sphere", p);
        }
        // The center cells are always inside
        assert!(result.volume[cell_index(&plan.resolution, 6, 6, 6)] == 1);
    }

    #[test]
    fn test_no_triangles_no_voxels() {
        let plan = fixed_plan(0.0, 1.0, [3, 3, 3]);
        let result = voxelize(&plan, &[]);
        assert!(result.positions.is_empty());
        assert_eq!(result.volume.len(), 27);
    }

    #[test]
    fn test_rows_longer_than_one_word() {
        let cube = unit_cube_mesh(0.5);
        let triangles = unpack_triangles(&cube).expect("valid cube");
        let plan = plan_resolution(
            &mesh_bounds(&cube),
            &ResolutionMode::Fixed {
                split_count: [40, 2, 3],
            },
        )
        .expect("valid plan");
        assert_eq!(plan.resolution, GridResolution::new(40, 2, 3));

        let result = voxelize(&plan, &triangles);
        assert_eq!(result.positions.len(), 40 * 2 * 3);
    }
}
