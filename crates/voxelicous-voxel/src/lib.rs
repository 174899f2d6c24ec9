//! Chunk voxel storage, pooling, and meshing for the Voxelicous engine.
//!
//! Blocks are stored as a flat `CHUNK_SIZE^3` array of single-byte ids,
//! run-length encoded for transport and disk storage. A chunk owns its
//! block array and a double-buffered mesh the worker and main threads
//! hand off without per-chunk locking.

pub mod chunk;
pub mod interfaces;
pub mod mesh;
pub mod mesher;
pub mod pool;
pub mod rle;

pub use chunk::Chunk;
pub use interfaces::{ChunkMeshView, DrawSink};
pub use mesh::{ChunkMesh, FaceCode, MeshSlot, Vertex};
pub use pool::{PoolAllocator, PoolHandle};
