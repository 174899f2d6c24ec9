//! The part of the core/host trait boundary that needs this crate's
//! mesh vertex type. `Camera` and `ColliderSink` live in
//! `voxelicous-core::interfaces` instead, since they don't.

use voxelicous_core::ChunkPos;

use crate::mesh::Vertex;

/// A read-only view onto a chunk's current front-buffer mesh, handed to
/// `DrawSink::draw` for each chunk the render list contains.
pub struct ChunkMeshView<'a> {
    /// Chunk this mesh belongs to, used by the host to position the draw.
    pub chunk_pos: ChunkPos,
    pub vertices: &'a [Vertex],
    pub indices: &'a [u32],
}

impl ChunkMeshView<'_> {
    /// True when this mesh has no geometry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Consumes finished chunk meshes for drawing. Called once per visible
/// chunk during `ChunkManager::render`.
pub trait DrawSink {
    /// Draw one chunk's current front-buffer mesh.
    fn draw(&mut self, mesh: &ChunkMeshView<'_>);
}
