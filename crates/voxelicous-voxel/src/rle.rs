//! Run-length encoding for a chunk's block array.
//!
//! For each row `(y, x)` the stream holds a sequence of `(id: u8,
//! run: u8)` pairs whose runs sum to `CHUNK_SIZE` along Z. Decoding is
//! total: there are no escape sequences and no variable-width fields.

use voxelicous_core::constants::CHUNK_SIZE;
use voxelicous_core::BlockId;

/// Decode an RLE stream into a flat `CHUNK_SIZE^3` block array (row order
/// `y, x, z` with `z` unit-stride, matching [`voxelicous_core::coords::LocalPos::to_index`]).
///
/// Returns `true` if every decoded block is air, letting the caller skip
/// meshing a chunk that turned out to be empty.
pub fn decode(stream: &[u8], blocks: &mut [BlockId]) -> bool {
    assert_eq!(blocks.len(), CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE);

    let mut cursor = 0usize;
    let mut empty_acc: i64 = 0;

    for y in 0..CHUNK_SIZE {
        for x in 0..CHUNK_SIZE {
            let mut z = 0usize;
            while z < CHUNK_SIZE {
                let id = stream[cursor];
                let run = stream[cursor + 1] as usize;
                cursor += 2;

                for _ in 0..run {
                    let index = y * CHUNK_SIZE * CHUNK_SIZE + x * CHUNK_SIZE + z;
                    blocks[index] = BlockId(id);
                    empty_acc += i64::from(id) - i64::from(BlockId::AIR.0);
                    z += 1;
                }
            }
        }
    }

    empty_acc == 0
}

/// Encode a flat `CHUNK_SIZE^3` block array into an RLE stream.
pub fn encode(blocks: &[BlockId]) -> Vec<u8> {
    assert_eq!(blocks.len(), CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE);

    let mut out = Vec::new();
    for y in 0..CHUNK_SIZE {
        for x in 0..CHUNK_SIZE {
            let mut z = 0usize;
            while z < CHUNK_SIZE {
                let index = y * CHUNK_SIZE * CHUNK_SIZE + x * CHUNK_SIZE + z;
                let id = blocks[index];
                let mut run: u8 = 1;
                z += 1;
                while z < CHUNK_SIZE {
                    let next_index = y * CHUNK_SIZE * CHUNK_SIZE + x * CHUNK_SIZE + z;
                    if blocks[next_index] != id || run == u8::MAX {
                        break;
                    }
                    run += 1;
                    z += 1;
                }
                out.push(id.0);
                out.push(run);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_blocks() -> Vec<BlockId> {
        vec![BlockId::AIR; CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE]
    }

    #[test]
    fn all_air_round_trips_and_reports_empty() {
        let blocks = empty_blocks();
        let stream = encode(&blocks);
        let mut decoded = empty_blocks();
        let is_empty = decode(&stream, &mut decoded);
        assert!(is_empty);
        assert_eq!(blocks, decoded);
    }

    #[test]
    fn single_solid_block_round_trips_and_reports_non_empty() {
        let mut blocks = empty_blocks();
        blocks[0] = BlockId(3);
        let stream = encode(&blocks);
        let mut decoded = empty_blocks();
        let is_empty = decode(&stream, &mut decoded);
        assert!(!is_empty);
        assert_eq!(blocks, decoded);
    }

    #[test]
    fn checkerboard_round_trips() {
        let mut blocks = empty_blocks();
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                for z in 0..CHUNK_SIZE {
                    if (x + y + z) % 2 == 0 {
                        let index = y * CHUNK_SIZE * CHUNK_SIZE + x * CHUNK_SIZE + z;
                        blocks[index] = BlockId(7);
                    }
                }
            }
        }
        let stream = encode(&blocks);
        let mut decoded = empty_blocks();
        decode(&stream, &mut decoded);
        assert_eq!(blocks, decoded);
    }

    #[test]
    fn stream_length_matches_row_run_count() {
        let blocks = empty_blocks();
        let stream = encode(&blocks);
        // Every row is a single all-air run: one (id, run) pair per row.
        assert_eq!(stream.len(), CHUNK_SIZE * CHUNK_SIZE * 2);
    }
}
