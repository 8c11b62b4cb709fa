//! Mesh Operations - Pure DOP Functions
//!
//! All functions are pure: take data, return results, no side effects.

use super::mesh_data::{InstanceMesh, InstanceVertex, SourceMesh, SubmeshRange};
use crate::bounds::{aabb_from_points, AABB};
use crate::error::{VoxelResult, VoxelizerError};

/// Check the index list describes whole triangles over existing vertices
pub fn validate_mesh(mesh: &SourceMesh) -> VoxelResult<()> {
    if mesh.indices.len() % 3 != 0 {
        return Err(VoxelizerError::InvalidMesh {
            reason: format!(
                "index count {} is not a multiple of 3",
                mesh.indices.len()
            ),
        });
    }

    let vertex_count = mesh.vertices.len();
    if let Some((slot, &index)) = mesh
        .indices
        .iter()
        .enumerate()
        .find(|&(_, &index)| index as usize >= vertex_count)
    {
        return Err(VoxelizerError::InvalidMesh {
            reason: format!(
                "index {} at slot {} exceeds vertex count {}",
                index, slot, vertex_count
            ),
        });
    }

    if let Some(bounds) = &mesh.bounds {
        let min: [f32; 3] = bounds.min.into();
        let max: [f32; 3] = bounds.max.into();
        let invalid = min
            .iter()
            .zip(&max)
            .any(|(lo, hi)| !lo.is_finite() || !hi.is_finite() || lo > hi);
        if invalid {
            return Err(VoxelizerError::InvalidMesh {
                reason: format!("supplied bounds {:?}..{:?} are not a finite box", min, max),
            });
        }
    }

    Ok(())
}

/// Number of triangles in an indexed mesh
pub fn triangle_count(mesh: &SourceMesh) -> usize {
    mesh.indices.len() / 3
}

/// Expand an indexed mesh into one vertex per index
///
/// `output[i] == mesh.vertices[mesh.indices[i]]`. Shared corners are
/// duplicated on purpose.
pub fn unpack_triangles(mesh: &SourceMesh) -> VoxelResult<Vec<[f32; 3]>> {
    validate_mesh(mesh)?;

    let unpacked: Vec<[f32; 3]> = mesh
        .indices
        .iter()
        .map(|&index| mesh.vertices[index as usize])
        .collect();

    log::debug!(
        "[MeshUnpacker] Unpacked {} triangles ({} vertices from {} shared)",
        triangle_count(mesh),
        unpacked.len(),
        mesh.vertices.len()
    );

    Ok(unpacked)
}

/// Local-space bounds: the supplied box, else the box of the vertices
pub fn mesh_bounds(mesh: &SourceMesh) -> AABB {
    mesh.bounds.unwrap_or_else(|| aabb_from_points(&mesh.vertices))
}

/// Closed axis-aligned cube centered at the origin, 8 shared corners
pub fn unit_cube_mesh(half_extent: f32) -> SourceMesh {
    let h = half_extent;
    // Corner i: bit 0 -> +x, bit 1 -> +y, bit 2 -> +z
    let vertices = (0..8u32)
        .map(|i| {
            [
                if i & 1 != 0 { h } else { -h },
                if i & 2 != 0 { h } else { -h },
                if i & 4 != 0 { h } else { -h },
            ]
        })
        .collect();

    let indices = CUBE_QUADS
        .iter()
        .flat_map(|(_, [a, b, c, d])| [*a, *b, *c, *a, *c, *d])
        .collect();

    SourceMesh {
        vertices,
        indices,
        bounds: None,
    }
}

/// Outward CCW quads of the cube, with face normals
const CUBE_QUADS: [([f32; 3], [u32; 4]); 6] = [
    ([-1.0, 0.0, 0.0], [0, 4, 6, 2]),
    ([1.0, 0.0, 0.0], [1, 3, 7, 5]),
    ([0.0, -1.0, 0.0], [0, 1, 5, 4]),
    ([0.0, 1.0, 0.0], [2, 6, 7, 3]),
    ([0.0, 0.0, -1.0], [0, 2, 3, 1]),
    ([0.0, 0.0, 1.0], [4, 5, 7, 6]),
];

/// Unit cube with per-face normals, used as the per-voxel instance
pub fn instance_cube_mesh() -> InstanceMesh {
    let corners = unit_cube_mesh(0.5).vertices;
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, quad) in CUBE_QUADS.iter() {
        let base = vertices.len() as u32;
        for &corner in quad {
            vertices.push(InstanceVertex {
                position: corners[corner as usize],
                normal: *normal,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let submesh = SubmeshRange {
        index_start: 0,
        index_count: indices.len() as u32,
        base_vertex: 0,
    };

    InstanceMesh {
        vertices,
        indices,
        submesh,
    }
}

/// Closed latitude/longitude sphere centered at the origin
///
/// The seam reuses the first column of vertices so neighbouring triangles
/// share bit-identical corners.
pub fn uv_sphere_mesh(radius: f32, segments: u32, rings: u32) -> SourceMesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut vertices = Vec::with_capacity((segments * (rings - 1) + 2) as usize);
    vertices.push([0.0, radius, 0.0]);
    for ring in 1..rings {
        let theta = std::f32::consts::PI * ring as f32 / rings as f32;
        let (sin_t, cos_t) = theta.sin_cos();
        for segment in 0..segments {
            let phi = std::f32::consts::TAU * segment as f32 / segments as f32;
            let (sin_p, cos_p) = phi.sin_cos();
            vertices.push([radius * sin_t * cos_p, radius * cos_t, radius * sin_t * sin_p]);
        }
    }
    let south = vertices.len() as u32;
    vertices.push([0.0, -radius, 0.0]);

    let ring_start = |ring: u32| 1 + (ring - 1) * segments;
    let mut indices = Vec::new();

    for segment in 0..segments {
        let next = (segment + 1) % segments;

        // North cap
        let first = ring_start(1);
        indices.extend_from_slice(&[0, first + next, first + segment]);

        // Bands
        for ring in 1..rings - 1 {
            let upper = ring_start(ring);
            let lower = ring_start(ring + 1);
            indices.extend_from_slice(&[
                upper + segment,
                upper + next,
                lower + next,
                upper + segment,
                lower + next,
                lower + segment,
            ]);
        }

        // South cap
        let last = ring_start(rings - 1);
        indices.extend_from_slice(&[south, last + segment, last + next]);
    }

    SourceMesh {
        vertices,
        indices,
        bounds: None,
    }
}
