//! Block identifiers and the process-wide block palette.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// A single byte block identifier. Blocks carry no per-instance data;
/// everything about a block's appearance and behavior is looked up from
/// the [`BlockPalette`] by this id.
///
/// ID 0 is reserved for air (the absence of a voxel).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct BlockId(pub u8);

impl BlockId {
    /// Air: the absence of a voxel.
    pub const AIR: Self = Self(0);

    /// Returns true if this is the air block.
    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this is a non-air block.
    #[inline]
    pub const fn is_solid(self) -> bool {
        self.0 != 0
    }
}

/// Per-block material description looked up from the palette.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMaterial {
    /// Base color (RGB, 0-255), consumed by the surrounding renderer.
    pub color: [u8; 3],
    /// Opaque material flags, meaningful only to the surrounding renderer.
    pub material_flags: u32,
}

/// Process-wide `id -> material` table.
///
/// The core never invents block meanings; the host program populates
/// this table before starting the chunk manager, and the mesher/render
/// path only ever looks up a [`BlockId`] here to decide what's air
/// versus solid (`BlockId::is_air`) — the actual color/flags are passed
/// through to the draw sink untouched.
#[derive(Clone, Debug)]
pub struct BlockPalette {
    entries: [BlockMaterial; 256],
}

impl BlockPalette {
    /// An empty palette; every id maps to a zeroed material until set.
    pub fn new() -> Self {
        Self {
            entries: [BlockMaterial::default(); 256],
        }
    }

    /// Register (or overwrite) the material for a block id.
    pub fn set(&mut self, id: BlockId, material: BlockMaterial) {
        self.entries[id.0 as usize] = material;
    }

    /// Look up the material for a block id.
    #[inline]
    pub fn get(&self, id: BlockId) -> BlockMaterial {
        self.entries[id.0 as usize]
    }
}

impl Default for BlockPalette {
    fn default() -> Self {
        Self::new()
    }
}
