//! Offline world generation: noise heightfield, altitude bands, region
//! files.
//!
//! [`WorldGenerator`] never runs while a [`crate::ChunkManager`] has the
//! same world open; it is a one-shot tool for seeding a `Worlds/<name>/`
//! directory before the game starts streaming it.

use std::fs;
use std::path::PathBuf;

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rayon::prelude::*;
use voxelicous_core::constants::{CHUNK_SIZE, CHUNK_SIZE_CUBED, REGION_SIZE};
use voxelicous_core::coords::{ChunkPos, RegionPos};
use voxelicous_core::{BlockId, Result};
use voxelicous_voxel::rle;

use crate::region_file::RegionFile;

const WORLD_INFO_FILE: &str = "WorldInfo.vgw";

/// An altitude band: the terrain block used from `starting_height`
/// (inclusive) up to the next band below it.
#[derive(Clone, Copy, Debug)]
pub struct AltitudeBand {
    pub starting_height: i32,
    pub block_id: BlockId,
}

/// Terrain generator configuration.
#[derive(Clone, Debug)]
pub struct TerrainConfig {
    /// Seed for noise generation.
    pub seed: u32,
    /// World size, in chunks, along every axis.
    pub world_size_chunks: u32,
    /// Bounds passed to the noise module, `(lower, upper)` on each of
    /// the two horizontal axes.
    pub bounds: ((f64, f64), (f64, f64)),
    /// Minimum and maximum terrain height, in world Y.
    pub min_height: i32,
    pub max_height: i32,
    /// Altitude bands, in any order; `WorldGenerator::new` sorts them
    /// descending by starting height.
    pub altitude_bands: Vec<AltitudeBand>,
    /// Number of noise octaves for detail.
    pub octaves: usize,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            world_size_chunks: 4,
            bounds: ((0.0, 1.0), (0.0, 1.0)),
            min_height: 0,
            max_height: 1,
            altitude_bands: Vec::new(),
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
        }
    }
}

/// Offline generator that writes a complete set of region files plus a
/// `WorldInfo.vgw` sibling for a fresh world. Never runs concurrently
/// with a `ChunkManager` that has the same world open.
pub struct WorldGenerator {
    config: TerrainConfig,
    height_noise: Fbm<Perlin>,
    bands: Vec<AltitudeBand>,
}

impl WorldGenerator {
    pub fn new(config: TerrainConfig) -> Self {
        let height_noise = Fbm::<Perlin>::new(config.seed)
            .set_octaves(config.octaves)
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.persistence);

        let mut bands = config.altitude_bands.clone();
        bands.sort_by(|a, b| b.starting_height.cmp(&a.starting_height));

        Self {
            config,
            height_noise,
            bands,
        }
    }

    /// Sampled terrain height at a world XZ position, mapped from the
    /// noise module's `[-1, 1]` range into `[min_height, max_height]`.
    fn height_at(&self, world_x: i64, world_z: i64) -> i32 {
        let (lower, upper) = self.config.bounds;
        let world_size = f64::from(self.config.world_size_chunks) * CHUNK_SIZE as f64;
        let nx = lower.0 + (world_x as f64 / world_size) * (upper.0 - lower.0);
        let nz = lower.1 + (world_z as f64 / world_size) * (upper.1 - lower.1);

        let value = self.height_noise.get([nx, nz]);
        let t = (value + 1.0) * 0.5;
        self.config.min_height
            + (t * f64::from(self.config.max_height - self.config.min_height)) as i32
    }

    /// The terrain block for a given absolute world Y: the highest band
    /// whose `starting_height <= y`. No band matching resolves to AIR.
    fn block_for_height(&self, world_y: i32) -> BlockId {
        self.bands
            .iter()
            .find(|band| band.starting_height <= world_y)
            .map(|band| band.block_id)
            .unwrap_or(BlockId::AIR)
    }

    /// Build one chunk's flat block array at `chunk_pos`.
    fn build_chunk(&self, chunk_pos: ChunkPos) -> Vec<BlockId> {
        let origin = chunk_pos.to_world_pos();
        let mut blocks = vec![BlockId::AIR; CHUNK_SIZE_CUBED];

        for y in 0..CHUNK_SIZE {
            let world_y = origin.y as i32 + y as i32;
            let terrain_block = self.block_for_height(world_y);

            for x in 0..CHUNK_SIZE {
                let world_x = origin.x + x as i64;
                for z in 0..CHUNK_SIZE {
                    let world_z = origin.z + z as i64;
                    let surface_height = self.height_at(world_x, world_z);
                    let block = if world_y < surface_height {
                        terrain_block
                    } else {
                        BlockId::AIR
                    };
                    let index = y * CHUNK_SIZE * CHUNK_SIZE + x * CHUNK_SIZE + z;
                    blocks[index] = block;
                }
            }
        }

        blocks
    }

    /// Every chunk position contained in the world, clipped to
    /// `world_size_chunks` on every axis.
    fn all_chunk_positions(&self) -> Vec<ChunkPos> {
        let size = self.config.world_size_chunks as i32;
        let mut positions = Vec::with_capacity((size * size * size).max(0) as usize);
        for y in 0..size {
            for x in 0..size {
                for z in 0..size {
                    positions.push(ChunkPos::new(x, y, z));
                }
            }
        }
        positions
    }

    /// Generate the full world into `data_root/Worlds/<world_name>`,
    /// overwriting any existing region files there.
    pub fn build(&self, data_root: impl Into<PathBuf>, world_name: &str) -> Result<()> {
        let world_dir = data_root.into().join("Worlds").join(world_name);
        fs::create_dir_all(&world_dir)?;
        fs::write(
            world_dir.join(WORLD_INFO_FILE),
            self.config.world_size_chunks.to_le_bytes(),
        )?;

        let positions = self.all_chunk_positions();
        let encoded: Vec<(ChunkPos, Vec<u8>)> = positions
            .par_iter()
            .map(|&pos| (pos, rle::encode(&self.build_chunk(pos))))
            .collect();

        let region_size = REGION_SIZE as i32;
        let num_regions = (self.config.world_size_chunks as i32)
            .div_ceil(region_size)
            .max(1);

        for ry in 0..num_regions {
            for rx in 0..num_regions {
                for rz in 0..num_regions {
                    let region_pos = RegionPos::new(rx, ry, rz);
                    let region_path = world_dir.join(region_pos.file_name());
                    let mut region = RegionFile::open(&region_path)?;
                    for (pos, data) in &encoded {
                        if pos.region_pos() == region_pos {
                            region.write_stream(pos.local_in_region(), data)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
