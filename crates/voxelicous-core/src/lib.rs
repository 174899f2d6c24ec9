//! Core types, math, and traits for the streaming chunk subsystem.
//!
//! This crate provides the foundations every other crate in the
//! workspace builds on:
//! - coordinate systems (world, chunk, region, local)
//! - the tuned constants the rest of the system is sized against
//! - the block id and process-wide block palette
//! - math utilities (AABB/ray/frustum)
//! - the error type
//! - the trait interfaces the core consumes from its host program

pub mod coords;
pub mod error;
pub mod interfaces;
pub mod math;
pub mod types;

pub use coords::{ChunkPos, LocalPos, RegionPos, WorldPos};
pub use error::{Error, Result};
pub use types::{BlockId, BlockMaterial, BlockPalette};

/// Engine-wide tuned constants.
pub mod constants {
    /// Size of a chunk in voxels per axis.
    pub const CHUNK_SIZE: usize = 32;
    /// Total voxels in a chunk (`CHUNK_SIZE^3`).
    pub const CHUNK_SIZE_CUBED: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;
    /// Bits needed to shift a chunk coordinate into world space
    /// (`log2(CHUNK_SIZE)`).
    pub const CHUNK_BITS: u32 = 5;

    /// Chunks per axis in a region.
    pub const REGION_SIZE: usize = 16;
    /// Byte size of one region file sector.
    pub const SECTOR_SIZE: usize = 4096;

    /// Fixed capacity of the block array / mesh record pools. Must be
    /// `>= (2V+1)^2 * (V+1)` for every supported view distance `V`.
    pub const POOL_SIZE: usize = 30_000;

    /// Default horizontal view distance, in chunks.
    pub const DEFAULT_VIEW_DISTANCE: u32 = 14;
    /// Maximum number of buffer swaps drained per `ChunkManager::update`.
    pub const MESH_SWAPS_PER_FRAME: usize = 25;
    /// Maximum number of load-queue entries drained per worker iteration.
    pub const CHUNKS_TO_LOAD_PER_ITERATION: usize = 8;
}
