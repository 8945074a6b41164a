//! Sparse binary serialization for [`ChunkSpan`].
//!
//! The same layout is used on disk and on the wire:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 1 | Format version (`u8`, currently 1) |
//! | 1 | 4 | Chunk X (`i32`, little-endian) |
//! | 5 | 4 | Chunk Y (`i32`, little-endian) |
//! | 9 | 4 | Chunk Z (`i32`, little-endian) |
//! | 13 | 4 | Non-empty cell count (`u32`, little-endian) |
//! | 17 | N×5 | Entries: flat index (`u32` LE) + block id (`u8`) |
//!
//! Only non-[`Block::Empty`](crate::Block::Empty) cells are written, in
//! ascending flat-index order; absent indices deserialize as `Empty`. Total
//! length is therefore `17 + 5 × nonempty_count` bytes.

use strata_coords::{AbsoluteChunkPosition, CHUNK_VOLUME};

use crate::block::Block;
use crate::chunk::ChunkSpan;

/// Current codec version, written as the first byte.
pub const CODEC_VERSION: u8 = 1;

const HEADER_LEN: usize = 1 + 3 * 4 + 4;
const ENTRY_LEN: usize = 4 + 1;

/// Errors that make a serialized chunk unusable.
#[derive(Debug, thiserror::Error)]
pub enum ChunkCodecError {
    /// The version byte is not one this build understands.
    #[error("unsupported chunk codec version: {0}")]
    UnsupportedVersion(u8),
    /// The buffer ends before the declared content does.
    #[error("chunk data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
    /// An entry's flat index does not fit in the chunk volume.
    #[error("block index {0} out of range")]
    IndexOutOfRange(u32),
    /// An entry carries a block id outside the known set.
    #[error(transparent)]
    UnknownBlock(#[from] crate::block::UnknownBlock),
}

impl ChunkSpan {
    /// Serializes this chunk to the sparse binary format.
    pub fn serialize(&self) -> Vec<u8> {
        let nonempty = self.nonempty_count();
        let mut out = Vec::with_capacity(HEADER_LEN + nonempty * ENTRY_LEN);

        out.push(CODEC_VERSION);
        let pos = self.position();
        out.extend_from_slice(&pos.x.to_le_bytes());
        out.extend_from_slice(&pos.y.to_le_bytes());
        out.extend_from_slice(&pos.z.to_le_bytes());
        out.extend_from_slice(&(nonempty as u32).to_le_bytes());

        for (index, block) in self.blocks().iter().enumerate() {
            if !block.is_empty() {
                out.extend_from_slice(&(index as u32).to_le_bytes());
                out.push(block.id());
            }
        }

        out
    }

    /// Deserializes a chunk from the sparse binary format.
    pub fn from_serialized(data: &[u8]) -> Result<Self, ChunkCodecError> {
        if data.is_empty() {
            return Err(ChunkCodecError::Truncated {
                expected: HEADER_LEN,
                actual: 0,
            });
        }
        let version = data[0];
        if version != CODEC_VERSION {
            return Err(ChunkCodecError::UnsupportedVersion(version));
        }
        if data.len() < HEADER_LEN {
            return Err(ChunkCodecError::Truncated {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }

        let read_u32 = |at: usize| {
            u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
        };
        let position = AbsoluteChunkPosition::new(
            read_u32(1) as i32,
            read_u32(5) as i32,
            read_u32(9) as i32,
        );
        let count = read_u32(13) as usize;

        let expected = HEADER_LEN + count * ENTRY_LEN;
        if data.len() < expected {
            return Err(ChunkCodecError::Truncated {
                expected,
                actual: data.len(),
            });
        }

        let mut blocks = Box::new([Block::Empty; CHUNK_VOLUME]);
        for entry in 0..count {
            let at = HEADER_LEN + entry * ENTRY_LEN;
            let index = read_u32(at);
            if index as usize >= CHUNK_VOLUME {
                return Err(ChunkCodecError::IndexOutOfRange(index));
            }
            blocks[index as usize] = Block::try_from(data[at + 4])?;
        }
        Ok(ChunkSpan::from_blocks(position, blocks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_coords::{ChunkLocalPosition, CHUNK_HEIGHT, CHUNK_WIDTH};

    #[test]
    fn test_round_trip_preserves_every_cell() {
        let mut chunk = ChunkSpan::new(AbsoluteChunkPosition::new(-4, 2, 100));
        chunk.set(ChunkLocalPosition::new(0, 0, 0), Block::Bedrock);
        chunk.set(ChunkLocalPosition::new(15, 15, 15), Block::Leaves);
        chunk.set(ChunkLocalPosition::new(7, 3, 11), Block::Water);
        chunk.set(ChunkLocalPosition::new(1, 1, 1), Block::Air);

        let bytes = chunk.serialize();
        let restored = ChunkSpan::from_serialized(&bytes).expect("round trip");
        assert_eq!(restored, chunk);
    }

    #[test]
    fn test_length_is_header_plus_five_per_entry() {
        let mut chunk = ChunkSpan::new(AbsoluteChunkPosition::new(0, 0, 0));
        assert_eq!(chunk.serialize().len(), 17);

        for x in 0..9u8 {
            chunk.set(ChunkLocalPosition::new(x, 0, 0), Block::Sand);
        }
        assert_eq!(chunk.serialize().len(), 17 + 9 * 5);
    }

    #[test]
    fn test_exact_bytes_for_known_chunk() {
        // Chunk (-1, 0, 5) with exactly two non-empty cells.
        let mut chunk = ChunkSpan::new(AbsoluteChunkPosition::new(-1, 0, 5));
        chunk.set(ChunkLocalPosition::from_flat_index(0), Block::Stone);
        let second = 5 * CHUNK_WIDTH * CHUNK_HEIGHT + 2 * CHUNK_WIDTH + 1;
        chunk.set(ChunkLocalPosition::from_flat_index(second), Block::Grass);

        let bytes = chunk.serialize();
        let mut expected = vec![0x01];
        expected.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]); // x = -1
        expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // y = 0
        expected.extend_from_slice(&[0x05, 0x00, 0x00, 0x00]); // z = 5
        expected.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]); // count = 2
        expected.extend_from_slice(&0u32.to_le_bytes());
        expected.push(Block::Stone.id());
        expected.extend_from_slice(&(second as u32).to_le_bytes());
        expected.push(Block::Grass.id());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_entries_are_ascending_by_index() {
        let mut chunk = ChunkSpan::new(AbsoluteChunkPosition::new(0, 0, 0));
        chunk.set(ChunkLocalPosition::new(15, 15, 15), Block::Stone);
        chunk.set(ChunkLocalPosition::new(0, 0, 0), Block::Dirt);
        chunk.set(ChunkLocalPosition::new(8, 0, 0), Block::Wood);

        let bytes = chunk.serialize();
        let mut last = None;
        for entry in bytes[17..].chunks(5) {
            let index = u32::from_le_bytes(entry[..4].try_into().unwrap());
            if let Some(prev) = last {
                assert!(index > prev, "indices must ascend: {prev} then {index}");
            }
            last = Some(index);
        }
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = ChunkSpan::new(AbsoluteChunkPosition::new(0, 0, 0)).serialize();
        bytes[0] = 9;
        assert!(matches!(
            ChunkSpan::from_serialized(&bytes),
            Err(ChunkCodecError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let mut chunk = ChunkSpan::new(AbsoluteChunkPosition::new(0, 0, 0));
        chunk.set(ChunkLocalPosition::new(3, 3, 3), Block::Stone);
        let bytes = chunk.serialize();

        for cut in [0, 5, 16, bytes.len() - 1] {
            assert!(
                matches!(
                    ChunkSpan::from_serialized(&bytes[..cut]),
                    Err(ChunkCodecError::Truncated { .. })
                ),
                "cut at {cut} must be rejected"
            );
        }
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut bytes = ChunkSpan::new(AbsoluteChunkPosition::new(0, 0, 0)).serialize();
        bytes[13..17].copy_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&(CHUNK_VOLUME as u32).to_le_bytes());
        bytes.push(Block::Stone.id());
        assert!(matches!(
            ChunkSpan::from_serialized(&bytes),
            Err(ChunkCodecError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_unknown_block_id_rejected() {
        let mut bytes = ChunkSpan::new(AbsoluteChunkPosition::new(0, 0, 0)).serialize();
        bytes[13..17].copy_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.push(200);
        assert!(matches!(
            ChunkSpan::from_serialized(&bytes),
            Err(ChunkCodecError::UnknownBlock(_))
        ));
    }
}
