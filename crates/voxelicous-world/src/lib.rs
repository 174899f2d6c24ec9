//! World generation and streaming for the Voxelicous engine: region
//! files, the world file system, the chunk manager, and the offline
//! world generator.

pub mod chunk_manager;
pub mod generation;
pub mod region_file;
pub mod world_file_system;

pub use chunk_manager::{ChunkManager, ChunkManagerConfig};
pub use generation::{AltitudeBand, TerrainConfig, WorldGenerator};
pub use region_file::RegionFile;
pub use world_file_system::WorldFileSystem;
