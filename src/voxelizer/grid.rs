//! Grid storage layout shared by the device kernels and the CPU reference
//!
//! Projection planes store one bit row per plane cell: bit `i` of the row at
//! plane cell `(u, v)` is cell `i` along the projected axis. Rows are
//! `ceil(n / 32)` words long. The volume is x-fastest.

use super::resolution::{GridResolution, ResolutionPlan};
use crate::constants::layout::BITS_PER_WORD;

/// Principal axis a projection ray travels along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionAxis {
    X,
    Y,
    Z,
}

impl ProjectionAxis {
    pub const ALL: [ProjectionAxis; 3] = [ProjectionAxis::X, ProjectionAxis::Y, ProjectionAxis::Z];

    /// Component index of the ray axis
    pub fn index(self) -> usize {
        match self {
            ProjectionAxis::X => 0,
            ProjectionAxis::Y => 1,
            ProjectionAxis::Z => 2,
        }
    }

    /// Component indices `(u, v)` of the plane the axis projects onto
    pub fn plane_axes(self) -> (usize, usize) {
        match self {
            ProjectionAxis::X => (1, 2),
            ProjectionAxis::Y => (0, 2),
            ProjectionAxis::Z => (0, 1),
        }
    }

    /// Name of the projection plane resource
    pub fn plane_name(self) -> &'static str {
        match self {
            ProjectionAxis::X => "projection_yz",
            ProjectionAxis::Y => "projection_xz",
            ProjectionAxis::Z => "projection_xy",
        }
    }
}

/// Words needed for a bit row of `cells` entries
pub fn words_per_row(cells: u32) -> u32 {
    (cells + BITS_PER_WORD - 1) / BITS_PER_WORD
}

/// Plane dimensions `(dim_u, dim_v, words_per_row)` for an axis
pub fn plane_dims(resolution: &GridResolution, axis: ProjectionAxis) -> (u32, u32, u32) {
    let counts = resolution.as_array();
    let (u, v) = axis.plane_axes();
    (counts[u], counts[v], words_per_row(counts[axis.index()]))
}

/// Total u32 words in one projection plane
pub fn plane_word_count(resolution: &GridResolution, axis: ProjectionAxis) -> u64 {
    let (dim_u, dim_v, words) = plane_dims(resolution, axis);
    dim_u as u64 * dim_v as u64 * words as u64
}

/// First word of the bit row at plane cell `(u, v)`
pub fn row_offset(resolution: &GridResolution, axis: ProjectionAxis, u: u32, v: u32) -> usize {
    let (dim_u, _, words) = plane_dims(resolution, axis);
    ((v as usize * dim_u as usize) + u as usize) * words as usize
}

/// Flat index of a volume cell
pub fn cell_index(resolution: &GridResolution, x: u32, y: u32, z: u32) -> usize {
    ((z as usize * resolution.y as usize) + y as usize) * resolution.x as usize + x as usize
}

/// Center of cell `i` along one component
pub fn cell_center_component(plan: &ResolutionPlan, component: usize, i: u32) -> f32 {
    let min = [plan.bounds.min.x, plan.bounds.min.y, plan.bounds.min.z];
    min[component] + (i as f32 + 0.5) * plan.cell_size[component]
}

/// Local-space center of cell `(x, y, z)`
pub fn cell_center(plan: &ResolutionPlan, x: u32, y: u32, z: u32) -> [f32; 3] {
    [
        cell_center_component(plan, 0, x),
        cell_center_component(plan, 1, y),
        cell_center_component(plan, 2, z),
    ]
}

/// First cell whose center lies at or beyond a crossing at `depth`
///
/// Returns a value in `0..=count`. A crossing exactly on a center counts as
/// lying before that center.
pub fn first_cell_after(plan: &ResolutionPlan, component: usize, depth: f32) -> u32 {
    let count = plan.resolution.as_array()[component];
    let step = plan.cell_size[component];
    if step <= 0.0 {
        // Flat axis: the single center sits on the minimum plane
        let min = [plan.bounds.min.x, plan.bounds.min.y, plan.bounds.min.z][component];
        return if depth < min { 0 } else { count };
    }

    let min = [plan.bounds.min.x, plan.bounds.min.y, plan.bounds.min.z][component];
    let t = (depth - min) / step - 0.5;
    let first = t.ceil();
    if first <= 0.0 {
        0
    } else if first >= count as f32 {
        count
    } else {
        first as u32
    }
}

/// XOR-toggle bits `first..count` of a bit row
pub fn toggle_suffix(row: &mut [u32], first: u32, count: u32) {
    if first >= count {
        return;
    }
    let first_word = first / BITS_PER_WORD;
    let last_word = (count - 1) / BITS_PER_WORD;
    for word in first_word..=last_word {
        let mut mask = u32::MAX;
        if word == first_word {
            mask &= u32::MAX << (first % BITS_PER_WORD);
        }
        if word == last_word {
            let used = count - word * BITS_PER_WORD;
            if used < BITS_PER_WORD {
                mask &= (1u32 << used) - 1;
            }
        }
        row[word as usize] ^= mask;
    }
}

/// Read bit `i` of a bit row
pub fn row_bit(row: &[u32], i: u32) -> bool {
    (row[(i / BITS_PER_WORD) as usize] >> (i % BITS_PER_WORD)) & 1 == 1
}
