//! Indirect draw argument record
//!
//! Byte layout of an indexed indirect draw: five u32 fields, 20 bytes. Every
//! field except `instance_count` is fixed by the instance mesh submesh;
//! `instance_count` is overwritten on the device after each run.

use crate::mesh::SubmeshRange;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectDrawArgs {
    pub index_count_per_instance: u32,
    pub instance_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: i32,
    pub start_instance_location: u32,
}

const_assert_eq!(std::mem::size_of::<IndirectDrawArgs>(), 20);

/// Byte offset of `instance_count`, the target of the counter copy
pub const INSTANCE_COUNT_OFFSET: u64 = 4;

impl IndirectDrawArgs {
    pub const SIZE: u64 = std::mem::size_of::<IndirectDrawArgs>() as u64;

    /// Args for drawing `submesh` once per voxel
    pub fn from_submesh(submesh: &SubmeshRange, instance_count: u32) -> Self {
        Self {
            index_count_per_instance: submesh.index_count,
            instance_count,
            start_index_location: submesh.index_start,
            base_vertex_location: submesh.base_vertex,
            start_instance_location: 0,
        }
    }

    pub fn with_instance_count(self, instance_count: u32) -> Self {
        Self {
            instance_count,
            ..self
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Decode a record read back from the device
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE as usize {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&bytes[..Self::SIZE as usize]))
    }
}
