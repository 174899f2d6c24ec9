//! Coordinate systems for the voxel world: block-local, chunk, region,
//! and world-space positions, plus the flat-array index conventions
//! the RLE codec and region file table rely on.

use crate::constants::{CHUNK_BITS, CHUNK_SIZE, REGION_SIZE};
use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Position within a chunk (0 to `CHUNK_SIZE - 1` per axis).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub _pad: u8,
}

impl LocalPos {
    /// Create a new local position.
    #[inline]
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        debug_assert!((x as usize) < CHUNK_SIZE);
        debug_assert!((y as usize) < CHUNK_SIZE);
        debug_assert!((z as usize) < CHUNK_SIZE);
        Self { x, y, z, _pad: 0 }
    }

    /// Flat block-array index. Z is unit-stride, X next, Y outermost —
    /// this matches the row order the RLE codec walks
    /// (`for y: for x: z-runs`).
    #[inline]
    pub const fn to_index(self) -> usize {
        (self.y as usize) * CHUNK_SIZE * CHUNK_SIZE
            + (self.x as usize) * CHUNK_SIZE
            + (self.z as usize)
    }

    /// Recover a local position from a flat block-array index.
    #[inline]
    pub const fn from_index(index: usize) -> Self {
        let z = (index % CHUNK_SIZE) as u8;
        let x = ((index / CHUNK_SIZE) % CHUNK_SIZE) as u8;
        let y = (index / (CHUNK_SIZE * CHUNK_SIZE)) as u8;
        Self { x, y, z, _pad: 0 }
    }
}

/// Chunk position in chunk coordinates.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub _pad: i32,
}

impl ChunkPos {
    /// Create a new chunk position.
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z, _pad: 0 }
    }

    /// Convert to the world position of this chunk's minimum corner.
    #[inline]
    pub const fn to_world_pos(self) -> WorldPos {
        WorldPos::new(
            (self.x as i64) << CHUNK_BITS,
            (self.y as i64) << CHUNK_BITS,
            (self.z as i64) << CHUNK_BITS,
        )
    }

    /// The region this chunk belongs to.
    #[inline]
    pub fn region_pos(self) -> RegionPos {
        RegionPos::new(
            self.x.div_euclid(REGION_SIZE as i32),
            self.y.div_euclid(REGION_SIZE as i32),
            self.z.div_euclid(REGION_SIZE as i32),
        )
    }

    /// This chunk's position local to its region, each component in
    /// `[0, REGION_SIZE)`.
    #[inline]
    pub fn local_in_region(self) -> (u32, u32, u32) {
        (
            self.x.rem_euclid(REGION_SIZE as i32) as u32,
            self.y.rem_euclid(REGION_SIZE as i32) as u32,
            self.z.rem_euclid(REGION_SIZE as i32) as u32,
        )
    }

    /// Convert to a glam `IVec3`.
    #[inline]
    pub const fn to_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl From<IVec3> for ChunkPos {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Region position in region coordinates (each unit is `REGION_SIZE`
/// chunks).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegionPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl RegionPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Conventional on-disk file name for this region, `x{rx}y{ry}z{rz}.vgr`.
    pub fn file_name(self) -> String {
        format!("x{}y{}z{}.vgr", self.x, self.y, self.z)
    }
}

/// Table index of a chunk local to its region, per the region file
/// layout: `ly * R*R + lx * R + lz`.
#[inline]
pub fn region_table_index(local_chunk: (u32, u32, u32)) -> usize {
    let (lx, ly, lz) = local_chunk;
    let r = REGION_SIZE as u32;
    (ly * r * r + lx * r + lz) as usize
}

/// World position in voxel (block) coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl WorldPos {
    /// Create a new world position.
    #[inline]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The chunk containing this position.
    #[inline]
    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(
            (self.x >> CHUNK_BITS) as i32,
            (self.y >> CHUNK_BITS) as i32,
            (self.z >> CHUNK_BITS) as i32,
        )
    }

    /// The local position within that chunk.
    #[inline]
    pub const fn local_pos(self) -> LocalPos {
        let mask = (CHUNK_SIZE - 1) as i64;
        LocalPos::new(
            (self.x & mask) as u8,
            (self.y & mask) as u8,
            (self.z & mask) as u8,
        )
    }

    /// Split into chunk and local position in one call.
    #[inline]
    pub const fn split(self) -> (ChunkPos, LocalPos) {
        (self.chunk_pos(), self.local_pos())
    }

    /// Build a world position from a chunk and a local position.
    #[inline]
    pub const fn from_chunk_local(chunk: ChunkPos, local: LocalPos) -> Self {
        Self::new(
            ((chunk.x as i64) << CHUNK_BITS) + local.x as i64,
            ((chunk.y as i64) << CHUNK_BITS) + local.y as i64,
            ((chunk.z as i64) << CHUNK_BITS) + local.z as i64,
        )
    }

    /// Convert to a floating point `Vec3`.
    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

impl From<Vec3> for WorldPos {
    fn from(v: Vec3) -> Self {
        Self::new(v.x.floor() as i64, v.y.floor() as i64, v.z.floor() as i64)
    }
}
