//! Sectored on-disk region file: a `REGION_SIZE^3`-entry lookup table
//! followed by 4096-byte sectors, each sector span holding one chunk's
//! length-prefixed RLE block stream.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::warn;
use voxelicous_core::constants::{REGION_SIZE, SECTOR_SIZE};
use voxelicous_core::coords::region_table_index;
use voxelicous_core::Result;

const TABLE_ENTRIES: usize = REGION_SIZE * REGION_SIZE * REGION_SIZE;
const TABLE_BYTES: u64 = (TABLE_ENTRIES * 4) as u64;
const LENGTH_PREFIX_BYTES: u64 = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct TableEntry {
    sector_offset: u32,
    sector_count: u8,
}

impl TableEntry {
    fn pack(self) -> u32 {
        (self.sector_offset & 0x00FF_FFFF) | (u32::from(self.sector_count) << 24)
    }

    fn unpack(raw: u32) -> Self {
        Self {
            sector_offset: raw & 0x00FF_FFFF,
            sector_count: (raw >> 24) as u8,
        }
    }
}

/// One region's sectored file on disk, with its lookup table held
/// resident in memory for the lifetime of the handle.
pub struct RegionFile {
    file: File,
    table: Vec<TableEntry>,
}

impl RegionFile {
    /// Open an existing region file, or create it (zero-initialized
    /// table, no sectors) if it doesn't exist.
    pub fn open(path: &Path) -> Result<Self> {
        let existed = path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let table = if existed {
            let mut raw = vec![0u8; TABLE_BYTES as usize];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut raw)?;
            raw.chunks_exact(4)
                .map(|b| TableEntry::unpack(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
                .collect()
        } else {
            let table = vec![TableEntry::default(); TABLE_ENTRIES];
            file.set_len(TABLE_BYTES)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&vec![0u8; TABLE_BYTES as usize])?;
            table
        };

        Ok(Self { file, table })
    }

    /// Table entry index for a chunk's local-to-region coordinate.
    #[inline]
    fn entry_index(local: (u32, u32, u32)) -> usize {
        region_table_index(local)
    }

    /// `(length, sector_offset)` for a chunk, or `length == 0` if absent.
    pub fn locate(&self, local: (u32, u32, u32)) -> Result<(u32, u32)> {
        let entry = self.table[Self::entry_index(local)];
        if entry.sector_count == 0 {
            return Ok((0, 0));
        }
        let sector_start = TABLE_BYTES + u64::from(entry.sector_offset) * SECTOR_SIZE as u64;
        let mut len_buf = [0u8; 4];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(sector_start))?;
        file.read_exact(&mut len_buf)?;
        Ok((u32::from_le_bytes(len_buf), entry.sector_offset))
    }

    /// Read `length` bytes of RLE data for a chunk at `sector_offset`.
    /// A short or failing read is reported as "no data" (`Ok(None)`):
    /// the caller treats the chunk as freshly generated.
    pub fn read_stream(&self, sector_offset: u32, length: u32) -> Option<Vec<u8>> {
        let data_start =
            TABLE_BYTES + u64::from(sector_offset) * SECTOR_SIZE as u64 + LENGTH_PREFIX_BYTES;
        let mut buf = vec![0u8; length as usize];
        let mut file = &self.file;
        if file.seek(SeekFrom::Start(data_start)).is_err() {
            return None;
        }
        match file.read_exact(&mut buf) {
            Ok(()) => Some(buf),
            Err(err) => {
                warn!(%err, "short or failed region read, treating chunk as empty");
                None
            }
        }
    }

    fn total_sectors(&self) -> u32 {
        self.table
            .iter()
            .filter(|e| e.sector_count > 0)
            .map(|e| e.sector_offset + u32::from(e.sector_count))
            .max()
            .unwrap_or(0)
    }

    fn sectors_needed(data_len: usize) -> u8 {
        let total = data_len + LENGTH_PREFIX_BYTES as usize;
        total.div_ceil(SECTOR_SIZE) as u8
    }

    fn write_sector_span(&mut self, sector_offset: u32, data: &[u8], sector_count: u8) -> Result<()> {
        let start = TABLE_BYTES + u64::from(sector_offset) * SECTOR_SIZE as u64;
        let padded_len = usize::from(sector_count) * SECTOR_SIZE;
        let mut buf = vec![0u8; padded_len];
        buf[0..4].copy_from_slice(&(data.len() as u32).to_le_bytes());
        buf[4..4 + data.len()].copy_from_slice(data);
        self.file.seek(SeekFrom::Start(start))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Write a chunk's RLE stream, choosing the fresh/in-place/relocate
    /// case per the on-disk layout's constraints.
    pub fn write_stream(&mut self, local: (u32, u32, u32), data: &[u8]) -> Result<()> {
        let index = Self::entry_index(local);
        let existing = self.table[index];
        let needed = Self::sectors_needed(data.len());

        if existing.sector_count == 0 {
            let offset = self.total_sectors();
            self.write_sector_span(offset, data, needed)?;
            self.table[index] = TableEntry {
                sector_offset: offset,
                sector_count: needed,
            };
        } else if existing.sector_count >= needed {
            self.write_sector_span(existing.sector_offset, data, existing.sector_count)?;
        } else {
            self.relocate(index, existing, data, needed)?;
        }

        self.rewrite_table_entry(index)?;
        Ok(())
    }

    /// Shift every sector after the relocated chunk's old span left by
    /// that span's width, fix up every entry whose old offset was past
    /// it, then append the chunk fresh at the new end.
    fn relocate(
        &mut self,
        index: usize,
        existing: TableEntry,
        data: &[u8],
        needed: u8,
    ) -> Result<()> {
        let old_offset = existing.sector_offset;
        let old_count = u32::from(existing.sector_count);
        let total = self.total_sectors();

        let tail_start = TABLE_BYTES + u64::from(old_offset + old_count) * SECTOR_SIZE as u64;
        let tail_sectors = total.saturating_sub(old_offset + old_count);
        let tail_len = u64::from(tail_sectors) * SECTOR_SIZE as u64;

        if tail_len > 0 {
            let mut tail = vec![0u8; tail_len as usize];
            self.file.seek(SeekFrom::Start(tail_start))?;
            self.file.read_exact(&mut tail)?;
            let dest = TABLE_BYTES + u64::from(old_offset) * SECTOR_SIZE as u64;
            self.file.seek(SeekFrom::Start(dest))?;
            self.file.write_all(&tail)?;
        }

        for entry in self.table.iter_mut() {
            if entry.sector_count > 0 && entry.sector_offset > old_offset {
                entry.sector_offset -= old_count;
            }
        }

        let new_total = total - old_count;
        let new_offset = new_total;
        self.write_sector_span(new_offset, data, needed)?;
        self.table[index] = TableEntry {
            sector_offset: new_offset,
            sector_count: needed,
        };

        Ok(())
    }

    fn rewrite_table_entry(&mut self, index: usize) -> Result<()> {
        let raw = self.table[index].pack().to_le_bytes();
        self.file.seek(SeekFrom::Start((index * 4) as u64))?;
        self.file.write_all(&raw)?;
        Ok(())
    }

    /// Rewrite the full table to the start of the file. Called on drop;
    /// sectors are untouched (already on disk from prior writes).
    fn flush_table(&mut self) -> Result<()> {
        let mut raw = Vec::with_capacity(TABLE_BYTES as usize);
        for entry in &self.table {
            raw.extend_from_slice(&entry.pack().to_le_bytes());
        }
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&raw)?;
        Ok(())
    }
}

impl Drop for RegionFile {
    fn drop(&mut self) {
        if let Err(err) = self.flush_table() {
            warn!(%err, "failed to flush region file table on drop");
        }
    }
}
