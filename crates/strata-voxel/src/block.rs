//! The closed set of block types.

use serde::{Deserialize, Serialize};

/// A single voxel's block type, stored as one byte.
///
/// [`Block::Empty`] is the "absent / undefined" sentinel: sparse chunk
/// serialization omits it, and it is what unloaded space reads as.
/// [`Block::Air`] is explicitly present but transparent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Block {
    /// Absent / undefined space.
    #[default]
    Empty = 0,
    /// Transparent but explicitly present.
    Air = 1,
    /// Grass.
    Grass = 2,
    /// Stone.
    Stone = 3,
    /// Water.
    Water = 4,
    /// Sand.
    Sand = 5,
    /// Wood.
    Wood = 6,
    /// Leaves.
    Leaves = 7,
    /// Bedrock.
    Bedrock = 8,
    /// Dirt.
    Dirt = 9,
}

/// Error returned when a byte does not name a known block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown block id: {0}")]
pub struct UnknownBlock(pub u8);

impl Block {
    /// Returns `true` for the [`Block::Empty`] sentinel.
    pub fn is_empty(self) -> bool {
        self == Block::Empty
    }

    /// The block's one-byte id.
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Block {
    type Error = UnknownBlock;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Block::Empty),
            1 => Ok(Block::Air),
            2 => Ok(Block::Grass),
            3 => Ok(Block::Stone),
            4 => Ok(Block::Water),
            5 => Ok(Block::Sand),
            6 => Ok(Block::Wood),
            7 => Ok(Block::Leaves),
            8 => Ok(Block::Bedrock),
            9 => Ok(Block::Dirt),
            other => Err(UnknownBlock(other)),
        }
    }
}
