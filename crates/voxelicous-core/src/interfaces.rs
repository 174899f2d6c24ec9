//! The trait boundary between the chunk streaming core and its host
//! program. The core is started with a `Camera` implementation and hands
//! finished meshes to a `ColliderSink`; it never reaches back into
//! rendering, physics, or windowing itself.
//!
//! `DrawSink` lives in `voxelicous-voxel` instead of here, since it is
//! parameterized over the mesh vertex type that crate owns.

use crate::math::{CameraPose, Frustum};
use crate::{BlockId, ChunkPos, WorldPos};

/// Supplies the camera pose and derived frustum the working set and
/// render list are keyed on.
pub trait Camera {
    /// Current world-space pose.
    fn pose(&self) -> CameraPose;

    /// Frustum derived from this camera's current view-projection.
    fn frustum(&self) -> Frustum;
}

/// Opaque handle to a chunk's registered collision shape. The core
/// never interprets this value; it only carries it to `ColliderSink`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColliderHandle(pub ChunkPos);

/// Registers and unregisters a chunk's collision mesh with the
/// surrounding physics system. Called only from the main thread, inside
/// `Chunk::swap_buffers`.
pub trait ColliderSink {
    /// A chunk transitioned from empty (or unregistered) to non-empty;
    /// register its current front-buffer collision mesh.
    fn add(&mut self, handle: ColliderHandle);

    /// A chunk transitioned to empty, or is being torn down; remove its
    /// collision mesh registration.
    fn remove(&mut self, handle: ColliderHandle);
}

/// Synchronous listener invoked from the thread that called
/// `set_block`/`destroy_block`, with the world-space position of the
/// affected block. No queueing: the core's contract is that listener
/// invocation is part of the mutating call, not deferred work.
pub type BlockListener = Box<dyn FnMut(WorldPos, BlockId) + Send>;
