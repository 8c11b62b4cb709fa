//! Axis-aligned bounds of source meshes and draw volumes

pub mod aabb;

pub use aabb::{
    aabb_center, aabb_corners, aabb_from_points, aabb_size, aabb_transformed, create_aabb, AABB,
};
