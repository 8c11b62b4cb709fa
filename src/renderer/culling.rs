//! View frustum test for the world-space draw bounds

use crate::bounds::AABB;
use cgmath::{Matrix4, Vector4};

/// Six inward-facing planes: left, right, top, bottom, near, far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Vector4<f32>; 6],
}

impl Frustum {
    pub fn from_view_proj(view_proj: &Matrix4<f32>) -> Self {
        Self {
            planes: extract_frustum_planes(view_proj),
        }
    }

    /// Conservative box test: false only when the box is fully outside one plane
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        self.planes.iter().all(|plane| {
            // Corner furthest along the plane normal
            let x = if plane.x >= 0.0 { aabb.max.x } else { aabb.min.x };
            let y = if plane.y >= 0.0 { aabb.max.y } else { aabb.min.y };
            let z = if plane.z >= 0.0 { aabb.max.z } else { aabb.min.z };
            plane.x * x + plane.y * y + plane.z * z + plane.w >= 0.0
        })
    }
}

/// Extract frustum planes from a view-projection matrix (Gribb-Hartmann)
fn extract_frustum_planes(vp: &Matrix4<f32>) -> [Vector4<f32>; 6] {
    let m = vp;

    [
        // Left plane
        Vector4::new(m.x.w + m.x.x, m.y.w + m.y.x, m.z.w + m.z.x, m.w.w + m.w.x).normalize_plane(),
        // Right plane
        Vector4::new(m.x.w - m.x.x, m.y.w - m.y.x, m.z.w - m.z.x, m.w.w - m.w.x).normalize_plane(),
        // Top plane
        Vector4::new(m.x.w - m.x.y, m.y.w - m.y.y, m.z.w - m.z.y, m.w.w - m.w.y).normalize_plane(),
        // Bottom plane
        Vector4::new(m.x.w + m.x.y, m.y.w + m.y.y, m.z.w + m.z.y, m.w.w + m.w.y).normalize_plane(),
        // Near plane
        Vector4::new(m.x.w + m.x.z, m.y.w + m.y.z, m.z.w + m.z.z, m.w.w + m.w.z).normalize_plane(),
        // Far plane
        Vector4::new(m.x.w - m.x.z, m.y.w - m.y.z, m.z.w - m.z.z, m.w.w - m.w.z).normalize_plane(),
    ]
}

trait NormalizePlane {
    fn normalize_plane(self) -> Self;
}

impl NormalizePlane for Vector4<f32> {
    fn normalize_plane(self) -> Self {
        let length = (self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if length > 0.0 {
            self / length
        } else {
            self
        }
    }
}
