//! The chunk: block payload, double-buffered mesh, and collision
//! registration state, with load/unload/rebuild/swap/shutdown exposed
//! to the chunk manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use voxelicous_core::constants::CHUNK_SIZE_CUBED;
use voxelicous_core::interfaces::{ColliderHandle, ColliderSink};
use voxelicous_core::{BlockId, LocalPos};

use crate::mesh::ChunkMesh;
use crate::{mesher, rle};

/// A chunk: a `CHUNK_SIZE^3` block volume plus its mesh and collision
/// registration state.
///
/// The block array lives behind a `Mutex` rather than the bare aliasing
/// discipline the double-buffered mesh gets away with: the manager's
/// worker thread (load/unload) and main thread (set/destroy) can both
/// reach a given slot's blocks, and which side currently "owns" a slot
/// is a property of the queue protocol, not something the type system
/// can see. The mesh stays lock-free; only the payload the worker and
/// main both mutate is guarded.
///
/// Invariants upheld by this type (see SPEC_FULL.md §3):
/// - `is_loaded()` implies the block array holds meaningful data.
/// - the collision registration always matches the mesh's current
///   front-buffer emptiness — `swap_buffers` keeps the two in lockstep.
/// - a chunk with `is_empty() == true` is never registered with the
///   collider sink.
pub struct Chunk {
    blocks: Mutex<Box<[BlockId]>>,
    mesh: ChunkMesh,
    is_loaded: AtomicBool,
    is_empty: AtomicBool,
    registered: AtomicBool,
}

impl Chunk {
    /// A freshly constructed, unloaded, empty chunk.
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(vec![BlockId::AIR; CHUNK_SIZE_CUBED].into_boxed_slice()),
            mesh: ChunkMesh::new(),
            is_loaded: AtomicBool::new(false),
            is_empty: AtomicBool::new(true),
            registered: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.is_loaded.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.is_empty.load(Ordering::Acquire)
    }

    #[inline]
    pub fn mesh(&self) -> &ChunkMesh {
        &self.mesh
    }

    /// Decode `rle_stream` into the block array. Returns `true` if the
    /// chunk turned out to be entirely air, letting the caller skip
    /// meshing. Pre: `!is_loaded()`. Post: `is_loaded()`.
    pub fn load(&self, rle_stream: &[u8]) -> bool {
        debug_assert!(!self.is_loaded(), "load called on an already-loaded chunk");
        let mut blocks = self.blocks.lock().unwrap();
        let empty = rle::decode(rle_stream, &mut blocks);
        self.is_loaded.store(true, Ordering::Release);
        empty
    }

    /// Encode the block array to RLE and append it to `out`. Pre:
    /// `is_loaded()`. Post: `!is_loaded()`. Mesh and collision state are
    /// left intact for slot reuse; they're only cleared by `shutdown` or
    /// replaced by a subsequent rebuild+swap.
    pub fn unload(&self, out: &mut Vec<u8>) {
        debug_assert!(self.is_loaded(), "unload called on a chunk that isn't loaded");
        let blocks = self.blocks.lock().unwrap();
        out.extend(rle::encode(&blocks));
        self.is_loaded.store(false, Ordering::Release);
    }

    /// Run the greedy mesher and write the results into the mesh's back
    /// buffer. The caller (the chunk manager) guarantees this never runs
    /// concurrently with a read of the front buffer for the same chunk.
    pub fn rebuild_mesh(&self, world_origin: [f32; 3]) {
        let (vertices, indices) = {
            let blocks = self.blocks.lock().unwrap();
            mesher::mesh(&blocks, world_origin)
        };
        let back = self.mesh.back_mut();
        back.vertices = vertices;
        back.indices = indices;
    }

    /// Publish the back buffer as the new front buffer, updating the
    /// collider registration if emptiness changed. Must run on the main
    /// thread.
    pub fn swap_buffers(&self, handle: ColliderHandle, collider: &mut dyn ColliderSink) {
        let (was_empty, is_empty) = self.mesh.swap();
        self.is_empty.store(is_empty, Ordering::Release);

        if was_empty && !is_empty {
            collider.add(handle);
            self.registered.store(true, Ordering::Release);
        } else if !was_empty && is_empty {
            collider.remove(handle);
            self.registered.store(false, Ordering::Release);
        }
        // Otherwise the registration state doesn't change; the collider
        // sink is responsible for rebinding its shape to the new front
        // buffer internally, which is opaque to the core.
    }

    /// Deregister from the collider sink if registered, and clear the
    /// mesh.
    pub fn shutdown(&self, handle: ColliderHandle, collider: &mut dyn ColliderSink) {
        if self.registered.swap(false, Ordering::AcqRel) {
            collider.remove(handle);
        }
        self.mesh.clear();
    }

    #[inline]
    pub fn get_block(&self, local: LocalPos) -> BlockId {
        self.blocks.lock().unwrap()[local.to_index()]
    }

    #[inline]
    pub fn set_block(&self, local: LocalPos, id: BlockId) {
        self.blocks.lock().unwrap()[local.to_index()] = id;
    }

    #[inline]
    pub fn destroy_block(&self, local: LocalPos) {
        self.set_block(local, BlockId::AIR);
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}
