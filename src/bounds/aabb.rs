/// Data-Oriented Axis-Aligned Bounding Box
///
/// Pure functions over mesh bounds - no methods, just data transformations.
use cgmath::{Matrix4, Point3, Transform, Vector3};

/// Axis-Aligned Bounding Box - pure data structure
///
/// Invariant: `min <= max` component-wise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

/// Create new AABB from min/max points
/// Pure function - orders the corners so the min <= max invariant holds
pub fn create_aabb(a: Point3<f32>, b: Point3<f32>) -> AABB {
    AABB {
        min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
        max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
    }
}

/// Tightest AABB around a point set
/// An empty set yields a zero-size box at the origin
pub fn aabb_from_points(points: &[[f32; 3]]) -> AABB {
    let Some(first) = points.first() else {
        return AABB {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(0.0, 0.0, 0.0),
        };
    };

    let mut min = Point3::new(first[0], first[1], first[2]);
    let mut max = min;
    for p in &points[1..] {
        min.x = min.x.min(p[0]);
        min.y = min.y.min(p[1]);
        min.z = min.z.min(p[2]);
        max.x = max.x.max(p[0]);
        max.y = max.y.max(p[1]);
        max.z = max.z.max(p[2]);
    }

    AABB { min, max }
}

/// Get center point of AABB
pub fn aabb_center(aabb: &AABB) -> Point3<f32> {
    Point3::new(
        (aabb.min.x + aabb.max.x) * 0.5,
        (aabb.min.y + aabb.max.y) * 0.5,
        (aabb.min.z + aabb.max.z) * 0.5,
    )
}

/// Get full extents of AABB
pub fn aabb_size(aabb: &AABB) -> Vector3<f32> {
    aabb.max - aabb.min
}

/// The eight corners of the box
pub fn aabb_corners(aabb: &AABB) -> [Point3<f32>; 8] {
    let (a, b) = (aabb.min, aabb.max);
    [
        Point3::new(a.x, a.y, a.z),
        Point3::new(b.x, a.y, a.z),
        Point3::new(a.x, b.y, a.z),
        Point3::new(b.x, b.y, a.z),
        Point3::new(a.x, a.y, b.z),
        Point3::new(b.x, a.y, b.z),
        Point3::new(a.x, b.y, b.z),
        Point3::new(b.x, b.y, b.z),
    ]
}

/// World-space bounds of a local box under an affine transform
/// Pure function - transforms all eight corners so rotation is covered too
pub fn aabb_transformed(aabb: &AABB, local_to_world: &Matrix4<f32>) -> AABB {
    let corners = aabb_corners(aabb);
    let first = local_to_world.transform_point(corners[0]);
    let mut result = AABB {
        min: first,
        max: first,
    };

    for corner in &corners[1..] {
        let p = local_to_world.transform_point(*corner);
        result.min.x = result.min.x.min(p.x);
        result.min.y = result.min.y.min(p.y);
        result.min.z = result.min.z.min(p.z);
        result.max.x = result.max.x.max(p.x);
        result.max.y = result.max.y.max(p.y);
        result.max.z = result.max.z.max(p.z);
    }

    result
}
