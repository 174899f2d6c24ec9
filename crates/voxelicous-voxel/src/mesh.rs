//! Double-buffered chunk mesh storage.
//!
//! A chunk's mesh has two buffer slots. The worker writes the slot that
//! is not currently "front"; the main thread flips a single-bit selector
//! under a short critical section to publish the worker's work. This
//! mirrors the source's raw-pointer-plus-atomic convention (see
//! SPEC_FULL.md §9): the worker never touches the selector, so a reader
//! that only ever looks at the front slot the selector currently names
//! never observes a half-built mesh.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use voxelicous_core::BlockId;

/// Face a mesher-emitted quad is facing, stored alongside the block id
/// in every vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaceCode {
    East = 0,
    West = 1,
    Top = 2,
    Bottom = 3,
    North = 4,
    South = 5,
}

impl FaceCode {
    /// All six facings in the order the mesher emits them, matching the
    /// source's `NormalID` enum.
    pub const ALL: [FaceCode; 6] = [
        FaceCode::East,
        FaceCode::West,
        FaceCode::Top,
        FaceCode::Bottom,
        FaceCode::North,
        FaceCode::South,
    ];
}

/// One mesh vertex: position plus a packed block id / face code.
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    /// Bits `[0..3)` are the face code, bits `[3..11)` are the block id.
    pub packed: u32,
}

impl Vertex {
    pub fn new(position: [f32; 3], block_id: BlockId, face: FaceCode) -> Self {
        let packed = (u32::from(block_id.0) << 3) | face as u32;
        Self { position, packed }
    }

    #[inline]
    pub fn face(&self) -> FaceCode {
        match self.packed & 0b111 {
            0 => FaceCode::East,
            1 => FaceCode::West,
            2 => FaceCode::Top,
            3 => FaceCode::Bottom,
            4 => FaceCode::North,
            _ => FaceCode::South,
        }
    }

    #[inline]
    pub fn block_id(&self) -> BlockId {
        BlockId((self.packed >> 3) as u8)
    }
}

/// One buffer slot: an owned vertex/index pair.
#[derive(Default)]
pub struct MeshSlot {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshSlot {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }
}

/// A chunk's double-buffered mesh.
///
/// `front` selects which of the two slots is currently readable by the
/// renderer/collider. Only `swap_buffers` (run on the main thread) ever
/// flips it; the worker only ever writes through [`ChunkMesh::back_mut`].
pub struct ChunkMesh {
    slots: [UnsafeCell<MeshSlot>; 2],
    front: AtomicBool,
    /// Guards `swap_buffers` against concurrent swap attempts; per
    /// SPEC_FULL.md §4.5 swapping runs "under a short-lived lock shared
    /// with any concurrent swap attempts", not against the worker (which
    /// never touches the selector).
    swap_lock: Mutex<()>,
}

impl Default for ChunkMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkMesh {
    pub fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new(MeshSlot::default()),
                UnsafeCell::new(MeshSlot::default()),
            ],
            front: AtomicBool::new(false),
            swap_lock: Mutex::new(()),
        }
    }

    /// Index of the currently published front slot.
    #[inline]
    fn front_index(&self) -> usize {
        usize::from(self.front.load(Ordering::Acquire))
    }

    /// Shared access to the current front slot. Safe to call from any
    /// thread concurrently with the worker writing the back slot, since
    /// the two slots are disjoint memory and the worker never touches
    /// `front`.
    #[inline]
    pub fn front(&self) -> &MeshSlot {
        // SAFETY: the worker only ever writes `slots[!front_index()]`;
        // nothing ever mutates `slots[front_index()]` while this
        // reference is live, because flipping `front` is the one
        // operation that could make that untrue, and it happens only
        // inside `swap_buffers`'s critical section, guarded separately.
        unsafe { &*self.slots[self.front_index()].get() }
    }

    /// Exclusive access to the back slot, for the worker to write the
    /// freshly meshed geometry into.
    #[inline]
    pub fn back_mut(&self) -> &mut MeshSlot {
        let back_index = 1 - self.front_index();
        // SAFETY: only the worker thread calls `back_mut`, and it only
        // ever does so for a slot not currently selected as front, so
        // this never aliases a concurrent `front()` borrow.
        unsafe { &mut *self.slots[back_index].get() }
    }

    /// Flip the front/back selector and clear the new back buffer.
    /// Returns `(was_empty, is_empty)` for the caller to decide whether
    /// a collider registration changed.
    pub fn swap(&self) -> (bool, bool) {
        let _guard = self.swap_lock.lock().unwrap();
        let was_empty = self.front().is_empty();
        let new_front = !self.front.load(Ordering::Acquire);
        self.front.store(new_front, Ordering::Release);
        let is_empty = self.front().is_empty();
        self.back_mut().clear();
        (was_empty, is_empty)
    }

    /// Clear both slots, used on `shutdown`.
    pub fn clear(&self) {
        let _guard = self.swap_lock.lock().unwrap();
        // SAFETY: exclusive access is justified by holding `swap_lock`,
        // which serializes against any other swap/clear caller; no
        // worker write is in flight because shutdown only runs after
        // the worker thread has joined.
        unsafe {
            (*self.slots[0].get()).clear();
            (*self.slots[1].get()).clear();
        }
    }
}

// SAFETY: `ChunkMesh` only exposes shared front access and exclusive
// back access, disjoint by construction; see method-level safety notes.
unsafe impl Send for ChunkMesh {}
unsafe impl Sync for ChunkMesh {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_packs_and_unpacks_block_id_and_face() {
        let v = Vertex::new([1.0, 2.0, 3.0], BlockId(200), FaceCode::North);
        assert_eq!(v.block_id(), BlockId(200));
        assert_eq!(v.face(), FaceCode::North);
    }

    #[test]
    fn swap_publishes_worker_writes() {
        let mesh = ChunkMesh::new();
        assert!(mesh.front().is_empty());

        mesh.back_mut().vertices.push(Vertex::new(
            [0.0, 0.0, 0.0],
            BlockId(1),
            FaceCode::Top,
        ));
        mesh.back_mut().indices.extend_from_slice(&[0, 0, 0]);
        assert!(mesh.front().is_empty(), "front must be unaffected before swap");

        let (was_empty, is_empty) = mesh.swap();
        assert!(was_empty);
        assert!(!is_empty);
        assert!(!mesh.front().is_empty());
        assert!(mesh.back_mut().is_empty(), "old front becomes the cleared back");
    }

    #[test]
    fn swap_back_to_empty_reports_transition() {
        let mesh = ChunkMesh::new();
        mesh.back_mut().indices.extend_from_slice(&[0, 0, 0]);
        mesh.swap();
        assert!(!mesh.front().is_empty());

        // back is now clear; swapping again publishes emptiness.
        let (was_empty, is_empty) = mesh.swap();
        assert!(!was_empty);
        assert!(is_empty);
    }
}
