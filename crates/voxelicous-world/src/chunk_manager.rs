//! The chunk manager: working set, background loader thread, and the
//! load/rebuild/swap queues that move chunks between disk, mesh, and
//! the renderer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tracing::warn;
use voxelicous_core::constants::{
    CHUNK_SIZE, CHUNKS_TO_LOAD_PER_ITERATION, DEFAULT_VIEW_DISTANCE, MESH_SWAPS_PER_FRAME,
    POOL_SIZE,
};
use voxelicous_core::interfaces::{BlockListener, Camera, ColliderHandle, ColliderSink};
use voxelicous_core::{BlockId, ChunkPos, Error, Result, WorldPos};
use voxelicous_voxel::interfaces::{ChunkMeshView, DrawSink};
use voxelicous_voxel::Chunk;

use crate::world_file_system::WorldFileSystem;

/// Tunable parameters for a [`ChunkManager`].
pub struct ChunkManagerConfig {
    /// Root directory containing `Worlds/`.
    pub data_root: PathBuf,
    /// Horizontal view radius, in chunks.
    pub view_distance: u32,
    /// Entries drained from the swap queue per `update()` call.
    pub mesh_swaps_per_frame: usize,
    /// Entries drained from the load queue per worker iteration.
    pub chunks_to_load_per_iteration: usize,
}

impl Default for ChunkManagerConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            view_distance: DEFAULT_VIEW_DISTANCE,
            mesh_swaps_per_frame: MESH_SWAPS_PER_FRAME,
            chunks_to_load_per_iteration: CHUNKS_TO_LOAD_PER_ITERATION,
        }
    }
}

/// Working-set dimensions for a view distance: horizontal extent `H`
/// and vertical extent `U`.
fn working_set_dims(view_distance: u32) -> (i32, i32) {
    let h = 2 * view_distance as i32 + 1;
    let u = view_distance as i32 + 1;
    (h, u)
}

fn working_set_size(view_distance: u32) -> usize {
    let (h, u) = working_set_dims(view_distance);
    (h * h * u) as usize
}

/// Slot index for a world-chunk position, per the spec's modular hash:
/// `(x mod H) * H + (y mod U) * H^2 + (z mod H)`.
fn slot_index(pos: ChunkPos, h: i32, u: i32) -> usize {
    let x = pos.x.rem_euclid(h);
    let y = pos.y.rem_euclid(u);
    let z = pos.z.rem_euclid(h);
    (x * h + y * h * h + z) as usize
}

/// State shared between the main thread and the background worker.
struct Shared {
    view_distance: u32,
    slots: Vec<Chunk>,
    positions: RwLock<Vec<Option<ChunkPos>>>,
    load_queue: Mutex<std::collections::VecDeque<ChunkPos>>,
    rebuild_queue: Mutex<std::collections::VecDeque<usize>>,
    swap_queue: Mutex<std::collections::VecDeque<ChunkPos>>,
    fs: Mutex<WorldFileSystem>,
    listeners: Mutex<Vec<BlockListener>>,
    last_camera_chunk: Mutex<Option<ChunkPos>>,
    world_size_chunks: AtomicU32,
    must_shutdown: AtomicBool,
    needs_refresh: AtomicBool,
    chunks_to_load_per_iteration: usize,
    mesh_swaps_per_frame: usize,
}

impl Shared {
    fn slot(&self, pos: ChunkPos) -> usize {
        let (h, u) = working_set_dims(self.view_distance);
        slot_index(pos, h, u)
    }

    fn world_size_blocks(&self) -> i64 {
        i64::from(self.world_size_chunks.load(Ordering::Acquire)) * CHUNK_SIZE as i64
    }

    fn resolve_in_bounds_world_pos(&self, world_pos: WorldPos) -> Option<(ChunkPos, voxelicous_core::LocalPos)> {
        let bound = self.world_size_blocks();
        if world_pos.x < 0
            || world_pos.y < 0
            || world_pos.z < 0
            || world_pos.x >= bound
            || world_pos.y >= bound
            || world_pos.z >= bound
        {
            return None;
        }
        Some(world_pos.split())
    }

    fn enqueue_rebuild(&self, slot: usize) {
        let mut queue = self.rebuild_queue.lock();
        if !queue.contains(&slot) {
            queue.push_back(slot);
        }
    }

    /// Reset every slot to "empty" and clear the queues. Run before a
    /// world load/view-distance change populates slots afresh.
    fn reset_positions(&self) {
        let mut positions = self.positions.write();
        for slot in positions.iter_mut() {
            *slot = None;
        }
        self.load_queue.lock().clear();
        self.rebuild_queue.lock().clear();
        self.swap_queue.lock().clear();
    }

    /// Drain the swap queue without a budget, publishing every pending
    /// mesh. Used during shutdown so `positions` reflects reality
    /// before chunks are unloaded.
    fn drain_swap_queue_fully(&self, collider: &mut dyn ColliderSink) {
        loop {
            let next = self.swap_queue.lock().pop_front();
            let Some(pos) = next else { break };
            self.swap_one(pos, collider);
        }
    }

    fn swap_one(&self, pos: ChunkPos, collider: &mut dyn ColliderSink) {
        let slot = self.slot(pos);
        self.slots[slot].swap_buffers(ColliderHandle(pos), collider);
        self.positions.write()[slot] = Some(pos);
    }

    /// Unload every currently loaded slot, writing its RLE back to its
    /// region and releasing the region ref. Positions are left as-is
    /// (only `unload`'s loaded flag changes); a subsequent load rereads
    /// them from the now up-to-date region file.
    fn unload_all_chunks(&self) {
        let positions = self.positions.read().clone();
        let mut fs = self.fs.lock();
        for (slot, pos) in positions.iter().enumerate() {
            let Some(pos) = pos else { continue };
            if self.slots[slot].is_loaded() {
                let mut data = Vec::new();
                self.slots[slot].unload(&mut data);
                if let Err(err) = fs.write_chunk_data(*pos, &data) {
                    warn!(%err, "failed to persist chunk on shutdown");
                }
                fs.remove_region_ref(*pos);
            }
        }
    }

    /// Deregister every slot's collider registration and clear its
    /// mesh. Used when the working set itself is being torn down (view
    /// distance change, manager shutdown), as opposed to a reused slot.
    fn shutdown_all_chunks(&self, collider: &mut dyn ColliderSink) {
        let positions = self.positions.read();
        for (slot, pos) in positions.iter().enumerate() {
            let handle = ColliderHandle((*pos).unwrap_or_default());
            self.slots[slot].shutdown(handle, collider);
        }
    }

    fn drain_load_queue(&self) {
        let mut loads_left = self.chunks_to_load_per_iteration;
        while loads_left > 0 {
            let Some(pos) = self.load_queue.lock().pop_front() else {
                break;
            };
            let slot = self.slot(pos);

            let mut unload_pos = self.positions.read()[slot];
            {
                let mut swap_queue = self.swap_queue.lock();
                if let Some(idx) = swap_queue.iter().position(|p| self.slot(*p) == slot) {
                    unload_pos = Some(swap_queue.remove(idx).unwrap());
                }
            }

            let mut fs = self.fs.lock();
            if self.slots[slot].is_loaded() {
                let mut data = Vec::new();
                self.slots[slot].unload(&mut data);
                if let Some(unload_pos) = unload_pos {
                    if let Err(err) = fs.write_chunk_data(unload_pos, &data) {
                        warn!(%err, "failed to persist evicted chunk");
                    }
                    fs.remove_region_ref(unload_pos);
                }
            }

            if let Err(err) = fs.add_region_ref(pos) {
                warn!(%err, "failed to open region for chunk load");
            }
            let data = fs.get_chunk_data(pos).unwrap_or_default();
            drop(fs);

            let all_air = self.slots[slot].load(&data);
            if !all_air {
                let origin = pos.to_world_pos().to_vec3();
                self.slots[slot].rebuild_mesh([origin.x, origin.y, origin.z]);
            }

            self.swap_queue.lock().push_back(pos);
            loads_left -= 1;
        }
    }

    fn drain_rebuild_queue(&self) {
        loop {
            let Some(slot) = self.rebuild_queue.lock().pop_front() else {
                break;
            };
            let Some(pos) = self.positions.read()[slot] else {
                continue;
            };

            {
                let mut swap_queue = self.swap_queue.lock();
                if let Some(idx) = swap_queue.iter().position(|p| *p == pos) {
                    swap_queue.remove(idx);
                }
            }

            let origin = pos.to_world_pos().to_vec3();
            self.slots[slot].rebuild_mesh([origin.x, origin.y, origin.z]);
            self.swap_queue.lock().push_back(pos);
        }
    }

    /// Compute every world-chunk position that should be resident,
    /// layered so the camera's own horizontal plane loads first, then
    /// planes alternating above/below it, and push the ones not
    /// already resident onto the load queue.
    fn recompute_visible_positions(&self) {
        let Some(camera_chunk) = *self.last_camera_chunk.lock() else {
            return;
        };
        let (h, _) = working_set_dims(self.view_distance);
        let v = self.view_distance as i32;
        let world_size = i32::try_from(self.world_size_chunks.load(Ordering::Acquire))
            .unwrap_or(i32::MAX);

        let offset = ChunkPos::new(camera_chunk.x - v, camera_chunk.y, camera_chunk.z - v);
        let positions = self.positions.read();
        let mut to_load = Vec::new();

        let mut plane = |y: i32, to_load: &mut Vec<ChunkPos>| {
            if y < 0 || y >= world_size {
                return;
            }
            for dx in 0..h {
                let x = offset.x + dx;
                if x < 0 || x >= world_size {
                    continue;
                }
                for dz in 0..h {
                    let z = offset.z + dz;
                    if z < 0 || z >= world_size {
                        continue;
                    }
                    let candidate = ChunkPos::new(x, y, z);
                    let slot = self.slot(candidate);
                    if positions[slot] != Some(candidate) {
                        to_load.push(candidate);
                    }
                }
            }
        };

        plane(offset.y, &mut to_load);
        for dv in 1..=(v / 2) {
            plane(offset.y - dv, &mut to_load);
            plane(offset.y + dv, &mut to_load);
        }
        drop(positions);

        let mut queue = self.load_queue.lock();
        queue.clear();
        queue.extend(to_load);
    }
}

fn spawn_worker(shared: Arc<Shared>) -> JoinHandle<()> {
    thread::spawn(move || {
        while !shared.must_shutdown.load(Ordering::Acquire) {
            while !shared.must_shutdown.load(Ordering::Acquire)
                && !shared.needs_refresh.load(Ordering::Acquire)
            {
                shared.drain_rebuild_queue();
                shared.drain_load_queue();
            }
            shared.needs_refresh.store(false, Ordering::Release);
            shared.recompute_visible_positions();
        }
    })
}

/// The streaming chunk scheduler. Owns the working set, runs the
/// background loader thread, and answers world-space block reads and
/// writes.
pub struct ChunkManager {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl ChunkManager {
    /// Build a manager with no world loaded; call [`ChunkManager::load_world`]
    /// before using it. Fails if `config.view_distance` would require
    /// more slots than `POOL_SIZE` can back.
    pub fn new(config: ChunkManagerConfig) -> Result<Self> {
        let size = working_set_size(config.view_distance);
        if size > POOL_SIZE {
            return Err(Error::PoolExhausted(
                "working set size exceeds POOL_SIZE for the requested view distance",
            ));
        }

        let mut slots = Vec::with_capacity(size);
        slots.resize_with(size, Chunk::new);

        let shared = Arc::new(Shared {
            view_distance: config.view_distance,
            slots,
            positions: RwLock::new(vec![None; size]),
            load_queue: Mutex::new(std::collections::VecDeque::new()),
            rebuild_queue: Mutex::new(std::collections::VecDeque::new()),
            swap_queue: Mutex::new(std::collections::VecDeque::new()),
            fs: Mutex::new(WorldFileSystem::new(config.data_root)),
            listeners: Mutex::new(Vec::new()),
            last_camera_chunk: Mutex::new(None),
            world_size_chunks: AtomicU32::new(0),
            must_shutdown: AtomicBool::new(false),
            needs_refresh: AtomicBool::new(false),
            chunks_to_load_per_iteration: config.chunks_to_load_per_iteration,
            mesh_swaps_per_frame: config.mesh_swaps_per_frame,
        });

        Ok(Self {
            shared,
            worker: None,
        })
    }

    /// Register a listener invoked synchronously on every successful
    /// `set_block`/`destroy_block`.
    pub fn add_block_listener(&self, listener: BlockListener) {
        self.shared.listeners.lock().push(listener);
    }

    fn stop_worker(&mut self, collider: &mut dyn ColliderSink) {
        self.shared.must_shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.shared.drain_swap_queue_fully(collider);
        self.shared.unload_all_chunks();
        self.shared.must_shutdown.store(false, Ordering::Release);
    }

    /// Stage `name`, resize nothing, and start streaming it in.
    pub fn load_world(&mut self, name: &str, collider: &mut dyn ColliderSink) -> Result<()> {
        self.stop_worker(collider);
        {
            let mut fs = self.shared.fs.lock();
            fs.set_world(name)?;
            self.shared
                .world_size_chunks
                .store(fs.world_size_chunks(), Ordering::Release);
        }
        self.shared.reset_positions();
        self.shared.needs_refresh.store(true, Ordering::Release);
        self.worker = Some(spawn_worker(self.shared.clone()));
        Ok(())
    }

    /// Flush the temp world tree back to the canonical world directory.
    pub fn save_world(&mut self, collider: &mut dyn ColliderSink) -> Result<()> {
        self.stop_worker(collider);
        self.shared.fs.lock().save_world()?;
        self.shared.needs_refresh.store(true, Ordering::Release);
        self.worker = Some(spawn_worker(self.shared.clone()));
        Ok(())
    }

    /// Resize the working set to a new view distance, fully tearing
    /// down (including collider deregistration) every existing slot
    /// first. A `PoolExhausted` error leaves the manager unchanged.
    pub fn set_view_distance(
        &mut self,
        view_distance: u32,
        collider: &mut dyn ColliderSink,
    ) -> Result<()> {
        let size = working_set_size(view_distance);
        if size > POOL_SIZE {
            return Err(Error::PoolExhausted(
                "working set size exceeds POOL_SIZE for the requested view distance",
            ));
        }

        self.stop_worker(collider);
        self.shared.shutdown_all_chunks(collider);

        // Pull the previous Shared out from behind the Arc so its live
        // WorldFileSystem (open region handles) and registered listeners
        // carry over instead of being rebuilt from scratch. Sound because
        // `stop_worker` already joined the only other holder of a clone.
        let placeholder = Arc::new(Shared {
            view_distance,
            slots: Vec::new(),
            positions: RwLock::new(Vec::new()),
            load_queue: Mutex::new(std::collections::VecDeque::new()),
            rebuild_queue: Mutex::new(std::collections::VecDeque::new()),
            swap_queue: Mutex::new(std::collections::VecDeque::new()),
            fs: Mutex::new(WorldFileSystem::new(PathBuf::new())),
            listeners: Mutex::new(Vec::new()),
            last_camera_chunk: Mutex::new(None),
            world_size_chunks: AtomicU32::new(0),
            must_shutdown: AtomicBool::new(false),
            needs_refresh: AtomicBool::new(false),
            chunks_to_load_per_iteration: 0,
            mesh_swaps_per_frame: 0,
        });
        let old = Arc::try_unwrap(std::mem::replace(&mut self.shared, placeholder))
            .unwrap_or_else(|_| panic!("Shared had outstanding references after stop_worker"));

        let mut new_slots = Vec::with_capacity(size);
        new_slots.resize_with(size, Chunk::new);

        self.shared = Arc::new(Shared {
            view_distance,
            slots: new_slots,
            positions: RwLock::new(vec![None; size]),
            load_queue: Mutex::new(std::collections::VecDeque::new()),
            rebuild_queue: Mutex::new(std::collections::VecDeque::new()),
            swap_queue: Mutex::new(std::collections::VecDeque::new()),
            fs: Mutex::new(old.fs.into_inner()),
            listeners: Mutex::new(old.listeners.into_inner()),
            last_camera_chunk: Mutex::new(*old.last_camera_chunk.lock()),
            world_size_chunks: AtomicU32::new(old.world_size_chunks.load(Ordering::Acquire)),
            must_shutdown: AtomicBool::new(false),
            needs_refresh: AtomicBool::new(false),
            chunks_to_load_per_iteration: old.chunks_to_load_per_iteration,
            mesh_swaps_per_frame: old.mesh_swaps_per_frame,
        });

        self.shared.needs_refresh.store(true, Ordering::Release);
        self.worker = Some(spawn_worker(self.shared.clone()));

        Ok(())
    }

    /// Sample the camera, mark the working set dirty if the camera
    /// crossed a chunk boundary, and drain a budget of pending swaps.
    pub fn update(&self, camera: &dyn Camera, collider: &mut dyn ColliderSink) {
        let pose = camera.pose();
        let camera_chunk = WorldPos::from(pose.position).chunk_pos();

        let mut last = self.shared.last_camera_chunk.lock();
        if *last != Some(camera_chunk) {
            *last = Some(camera_chunk);
            self.shared.needs_refresh.store(true, Ordering::Release);
        }
        drop(last);

        let mut swapped = 0;
        loop {
            if swapped >= self.shared.mesh_swaps_per_frame {
                break;
            }
            let next = self.shared.swap_queue.lock().pop_front();
            let Some(pos) = next else { break };
            self.shared.swap_one(pos, collider);
            swapped += 1;
        }
    }

    /// World-space block read. Returns AIR if the slot doesn't hold the
    /// expected chunk (including when it's out of world bounds).
    pub fn get_block(&self, world_pos: WorldPos) -> BlockId {
        let Some((chunk_pos, local)) = self.shared.resolve_in_bounds_world_pos(world_pos) else {
            return BlockId::AIR;
        };
        let slot = self.shared.slot(chunk_pos);
        if self.shared.positions.read()[slot] != Some(chunk_pos) {
            return BlockId::AIR;
        }
        self.shared.slots[slot].get_block(local)
    }

    /// World-space block write. No-op if out of bounds or the
    /// addressed slot doesn't hold the expected chunk.
    pub fn set_block(&self, world_pos: WorldPos, id: BlockId) {
        let Some((chunk_pos, local)) = self.shared.resolve_in_bounds_world_pos(world_pos) else {
            return;
        };
        let slot = self.shared.slot(chunk_pos);
        if self.shared.positions.read()[slot] != Some(chunk_pos) {
            return;
        }
        self.shared.slots[slot].set_block(local, id);
        self.shared.enqueue_rebuild(slot);
        for listener in self.shared.listeners.lock().iter_mut() {
            listener(world_pos, id);
        }
    }

    /// World-space block destruction (set to AIR), with the same
    /// addressing rules as `set_block`.
    pub fn destroy_block(&self, world_pos: WorldPos) {
        self.set_block(world_pos, BlockId::AIR);
    }

    /// Rebuild the render list from the frustum and hand each visible
    /// chunk's front mesh to `draw_sink`.
    pub fn render(&self, camera: &dyn Camera, draw_sink: &mut dyn DrawSink) {
        let frustum = camera.frustum();
        let positions = self.shared.positions.read();
        for (slot, pos) in positions.iter().enumerate() {
            let Some(pos) = pos else { continue };
            let chunk = &self.shared.slots[slot];
            if !chunk.is_loaded() || chunk.is_empty() {
                continue;
            }
            let world = pos.to_world_pos().to_vec3();
            let center = world + glam::Vec3::splat(CHUNK_SIZE as f32 * 0.5);
            if !frustum.test_unit_aabb(center, CHUNK_SIZE as f32) {
                continue;
            }
            let front = chunk.mesh().front();
            let view = ChunkMeshView {
                chunk_pos: *pos,
                vertices: &front.vertices,
                indices: &front.indices,
            };
            draw_sink.draw(&view);
        }
    }

    /// Number of currently loaded slots.
    pub fn loaded_count(&self) -> usize {
        self.shared
            .positions
            .read()
            .iter()
            .enumerate()
            .filter(|(slot, pos)| pos.is_some() && self.shared.slots[*slot].is_loaded())
            .count()
    }

    /// Full, explicit teardown: stop the worker, flush and unload every
    /// slot, deregister every collider, and drop the region-file pool.
    /// Prefer this over relying on `Drop`, since `Drop` has no
    /// `ColliderSink` to deregister against.
    pub fn shutdown(&mut self, collider: &mut dyn ColliderSink) -> Result<()> {
        self.stop_worker(collider);
        self.shared.shutdown_all_chunks(collider);
        Ok(())
    }
}

impl Drop for ChunkManager {
    fn drop(&mut self) {
        self.shared.must_shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("chunk manager worker thread panicked");
            }
        }
        if !self.shared.positions.read().iter().all(Option::is_none) {
            warn!(
                "ChunkManager dropped without calling shutdown(); collider \
                 registrations were not deregistered"
            );
        }
    }
}
