//! Dense per-chunk block storage.

use strata_coords::{AbsoluteChunkPosition, ChunkLocalPosition, CHUNK_VOLUME};

use crate::block::Block;

/// A chunk's resident state: a dense block array tagged with the chunk's
/// position on the chunk grid.
///
/// The position is fixed at construction; only the block contents mutate,
/// and only through [`ChunkSpan::set`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkSpan {
    position: AbsoluteChunkPosition,
    blocks: Box<[Block; CHUNK_VOLUME]>,
}

impl ChunkSpan {
    /// Creates an all-[`Block::Empty`] chunk at the given position.
    pub fn new(position: AbsoluteChunkPosition) -> Self {
        Self {
            position,
            blocks: Box::new([Block::Empty; CHUNK_VOLUME]),
        }
    }

    /// Creates a chunk from a full block array.
    pub fn from_blocks(position: AbsoluteChunkPosition, blocks: Box<[Block; CHUNK_VOLUME]>) -> Self {
        Self { position, blocks }
    }

    /// The chunk's position on the chunk grid.
    pub fn position(&self) -> AbsoluteChunkPosition {
        self.position
    }

    /// Returns the block at a chunk-local position.
    pub fn get(&self, local: ChunkLocalPosition) -> Block {
        self.blocks[local.flat_index()]
    }

    /// Sets the block at a chunk-local position.
    pub fn set(&mut self, local: ChunkLocalPosition, block: Block) {
        self.blocks[local.flat_index()] = block;
    }

    /// The dense block array in flat-index order.
    pub fn blocks(&self) -> &[Block; CHUNK_VOLUME] {
        &self.blocks
    }

    /// Number of non-[`Block::Empty`] cells.
    pub fn nonempty_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_empty()).count()
    }
}
