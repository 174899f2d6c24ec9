//! Owns the currently loaded world's temp staging directory and the
//! reference-counted map of open region files.
//!
//! `set_world` copies `Worlds/<name>/` into `Worlds/Temp_World/` and all
//! reads/writes during play land in the temp copy; `save_world` is the
//! only operation that touches the canonical directory. This keeps a
//! crash or an unsaved exit from corrupting the saved world.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use voxelicous_core::coords::RegionPos;
use voxelicous_core::{ChunkPos, Error, Result};

use crate::region_file::RegionFile;

const WORLD_INFO_FILE: &str = "WorldInfo.vgw";
const TEMP_WORLD_DIR: &str = "Temp_World";

struct RegionEntry {
    file: RegionFile,
    ref_count: usize,
}

/// Staging and region-file-pool manager for the active world.
pub struct WorldFileSystem {
    data_root: PathBuf,
    world_name: Option<String>,
    world_size_chunks: u32,
    regions: HashMap<RegionPos, RegionEntry>,
}

impl WorldFileSystem {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            world_name: None,
            world_size_chunks: 0,
            regions: HashMap::new(),
        }
    }

    fn worlds_dir(&self) -> PathBuf {
        self.data_root.join("Worlds")
    }

    fn temp_dir(&self) -> PathBuf {
        self.worlds_dir().join(TEMP_WORLD_DIR)
    }

    pub fn world_size_chunks(&self) -> u32 {
        self.world_size_chunks
    }

    /// Stage `name` into the temp directory and read its `WorldInfo`.
    /// Any previously staged world (and its open region files) is
    /// dropped first.
    pub fn set_world(&mut self, name: &str) -> Result<()> {
        self.regions.clear();

        let canonical = self.worlds_dir().join(name);
        let temp = self.temp_dir();
        if temp.exists() {
            fs::remove_dir_all(&temp)?;
        }
        copy_dir_recursive(&canonical, &temp)?;

        let info_path = temp.join(WORLD_INFO_FILE);
        let bytes = fs::read(&info_path)?;
        if bytes.len() < 4 {
            return Err(Error::InvalidRegionData(format!(
                "{} is shorter than 4 bytes",
                info_path.display()
            )));
        }
        self.world_size_chunks = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.world_name = Some(name.to_string());
        debug!(name, size = self.world_size_chunks, "staged world");
        Ok(())
    }

    /// Copy the temp tree back over the canonical world directory. The
    /// temp tree itself is left in place (not reset), matching the
    /// region file handles already open against it.
    pub fn save_world(&mut self) -> Result<()> {
        let Some(name) = self.world_name.clone() else {
            return Ok(());
        };
        let canonical = self.worlds_dir().join(&name);
        if canonical.exists() {
            fs::remove_dir_all(&canonical)?;
        }
        copy_dir_recursive(&self.temp_dir(), &canonical)?;
        Ok(())
    }

    fn region_path(&self, region: RegionPos) -> PathBuf {
        self.temp_dir().join(region.file_name())
    }

    /// Open (if not already resident) and bump the ref count for the
    /// region containing `chunk_pos`.
    pub fn add_region_ref(&mut self, chunk_pos: ChunkPos) -> Result<()> {
        let region = chunk_pos.region_pos();
        if let Some(entry) = self.regions.get_mut(&region) {
            entry.ref_count += 1;
            return Ok(());
        }
        let file = RegionFile::open(&self.region_path(region))?;
        self.regions.insert(
            region,
            RegionEntry {
                file,
                ref_count: 1,
            },
        );
        Ok(())
    }

    /// Decrement the ref count for `chunk_pos`'s region, closing (and
    /// thereby flushing the table for) the file when it hits zero.
    pub fn remove_region_ref(&mut self, chunk_pos: ChunkPos) {
        let region = chunk_pos.region_pos();
        if let Some(entry) = self.regions.get_mut(&region) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
            if entry.ref_count == 0 {
                self.regions.remove(&region);
            }
        }
    }

    pub fn region_ref_count(&self) -> usize {
        self.regions.len()
    }

    /// Read `chunk_pos`'s RLE stream from its region. `None` means
    /// "absent or unreadable": the caller treats the chunk as empty.
    /// Caller must hold a ref for this chunk's region.
    pub fn get_chunk_data(&self, chunk_pos: ChunkPos) -> Option<Vec<u8>> {
        let region = chunk_pos.region_pos();
        let entry = self.regions.get(&region)?;
        let (len, offset) = entry.file.locate(chunk_pos.local_in_region()).ok()?;
        if len == 0 {
            return None;
        }
        entry.file.read_stream(offset, len)
    }

    /// Write `chunk_pos`'s RLE stream to its region. Caller must hold a
    /// ref for this chunk's region.
    pub fn write_chunk_data(&mut self, chunk_pos: ChunkPos, data: &[u8]) -> Result<()> {
        let region = chunk_pos.region_pos();
        let entry = self
            .regions
            .get_mut(&region)
            .expect("write_chunk_data called without a region ref");
        entry.file.write_stream(chunk_pos.local_in_region(), data)
    }
}

impl Drop for WorldFileSystem {
    fn drop(&mut self) {
        self.regions.clear();
        let temp = self.temp_dir();
        if temp.exists() {
            if let Err(err) = fs::remove_dir_all(&temp) {
                warn!(%err, "failed to remove temp world directory on drop");
            }
        }
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let dest_path = dst.join(entry.file_name());
        if ty.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            fs::copy(entry.path(), dest_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed_world(root: &Path, name: &str, size: u32) {
        let world_dir = root.join("Worlds").join(name);
        fs::create_dir_all(&world_dir).unwrap();
        fs::write(world_dir.join(WORLD_INFO_FILE), size.to_le_bytes()).unwrap();
    }

    #[test]
    fn set_world_stages_into_temp_and_reads_size() {
        let root = tempdir().unwrap();
        seed_world(root.path(), "Alpha", 4);

        let mut fs_handle = WorldFileSystem::new(root.path());
        fs_handle.set_world("Alpha").unwrap();
        assert_eq!(fs_handle.world_size_chunks(), 4);
        assert!(root.path().join("Worlds/Temp_World/WorldInfo.vgw").exists());
    }

    #[test]
    fn region_ref_counting_opens_and_closes() {
        let root = tempdir().unwrap();
        seed_world(root.path(), "Alpha", 4);
        let mut fs_handle = WorldFileSystem::new(root.path());
        fs_handle.set_world("Alpha").unwrap();

        let pos = ChunkPos::new(0, 0, 0);
        fs_handle.add_region_ref(pos).unwrap();
        assert_eq!(fs_handle.region_ref_count(), 1);
        fs_handle.add_region_ref(pos).unwrap();
        assert_eq!(fs_handle.region_ref_count(), 1);
        fs_handle.remove_region_ref(pos);
        assert_eq!(fs_handle.region_ref_count(), 1);
        fs_handle.remove_region_ref(pos);
        assert_eq!(fs_handle.region_ref_count(), 0);
    }

    #[test]
    fn write_then_read_chunk_data_roundtrips() {
        let root = tempdir().unwrap();
        seed_world(root.path(), "Alpha", 4);
        let mut fs_handle = WorldFileSystem::new(root.path());
        fs_handle.set_world("Alpha").unwrap();

        let pos = ChunkPos::new(1, 2, 3);
        fs_handle.add_region_ref(pos).unwrap();
        fs_handle.write_chunk_data(pos, &[9, 9, 9]).unwrap();
        let data = fs_handle.get_chunk_data(pos).unwrap();
        assert_eq!(data, vec![9, 9, 9]);
        fs_handle.remove_region_ref(pos);
    }

    #[test]
    fn save_world_copies_temp_back_to_canonical_without_resetting_temp() {
        let root = tempdir().unwrap();
        seed_world(root.path(), "Alpha", 4);
        let mut fs_handle = WorldFileSystem::new(root.path());
        fs_handle.set_world("Alpha").unwrap();

        let pos = ChunkPos::new(0, 0, 0);
        fs_handle.add_region_ref(pos).unwrap();
        fs_handle.write_chunk_data(pos, &[5, 5]).unwrap();
        fs_handle.remove_region_ref(pos);
        fs_handle.save_world().unwrap();

        let canonical_region = root
            .path()
            .join("Worlds/Alpha")
            .join(pos.region_pos().file_name());
        assert!(canonical_region.exists());
        assert!(root.path().join("Worlds/Temp_World").exists());
    }

    #[test]
    fn running_without_save_leaves_canonical_tree_untouched() {
        let root = tempdir().unwrap();
        seed_world(root.path(), "Alpha", 4);
        let canonical_dir = root.path().join("Worlds/Alpha");
        let before: Vec<_> = fs::read_dir(&canonical_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        let mut fs_handle = WorldFileSystem::new(root.path());
        fs_handle.set_world("Alpha").unwrap();
        let pos = ChunkPos::new(0, 0, 0);
        fs_handle.add_region_ref(pos).unwrap();
        fs_handle.write_chunk_data(pos, &[1, 2, 3]).unwrap();
        fs_handle.remove_region_ref(pos);
        drop(fs_handle);

        let after: Vec<_> = fs::read_dir(&canonical_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn drop_removes_temp_directory() {
        let root = tempdir().unwrap();
        seed_world(root.path(), "Alpha", 4);
        let mut fs_handle = WorldFileSystem::new(root.path());
        fs_handle.set_world("Alpha").unwrap();
        let temp_dir = root.path().join("Worlds/Temp_World");
        assert!(temp_dir.exists());

        drop(fs_handle);
        assert!(!temp_dir.exists());
    }
}
