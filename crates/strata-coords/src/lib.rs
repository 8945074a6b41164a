//! Position frames and chunk-grid coordinate conversions.
//!
//! The world is addressed in four frames: absolute block coordinates (i64),
//! absolute precise coordinates (f64, for entities), chunk-grid coordinates
//! (i32), and chunk-local coordinates (u8, bounded by the chunk dimensions).
//! Conversions between block and chunk frames use euclidean division so that
//! negative coordinates floor correctly instead of truncating toward zero.

use serde::{Deserialize, Serialize};

/// Chunk extent along X, in blocks.
pub const CHUNK_WIDTH: usize = 16;
/// Chunk extent along Y, in blocks.
pub const CHUNK_HEIGHT: usize = 16;
/// Chunk extent along Z, in blocks.
pub const CHUNK_DEPTH: usize = 16;
/// Total number of block slots in a chunk.
pub const CHUNK_VOLUME: usize = CHUNK_WIDTH * CHUNK_HEIGHT * CHUNK_DEPTH;

// ---------------------------------------------------------------------------
// Absolute frames
// ---------------------------------------------------------------------------

/// A position in absolute block coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbsoluteBlockPosition {
    /// Block-grid X coordinate.
    pub x: i64,
    /// Block-grid Y coordinate.
    pub y: i64,
    /// Block-grid Z coordinate.
    pub z: i64,
}

impl AbsoluteBlockPosition {
    /// Creates a new absolute block position.
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Returns the chunk containing this block.
    pub fn chunk(self) -> AbsoluteChunkPosition {
        AbsoluteChunkPosition {
            x: self.x.div_euclid(CHUNK_WIDTH as i64) as i32,
            y: self.y.div_euclid(CHUNK_HEIGHT as i64) as i32,
            z: self.z.div_euclid(CHUNK_DEPTH as i64) as i32,
        }
    }

    /// Returns this block's position within its chunk.
    pub fn chunk_local(self) -> ChunkLocalPosition {
        ChunkLocalPosition::new(
            self.x.rem_euclid(CHUNK_WIDTH as i64) as u8,
            self.y.rem_euclid(CHUNK_HEIGHT as i64) as u8,
            self.z.rem_euclid(CHUNK_DEPTH as i64) as u8,
        )
    }
}

/// A position in absolute precise (floating-point) coordinates, used for
/// entities that move continuously between block boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AbsolutePrecisePosition {
    /// Precise X coordinate.
    pub x: f64,
    /// Precise Y coordinate.
    pub y: f64,
    /// Precise Z coordinate.
    pub z: f64,
}

impl AbsolutePrecisePosition {
    /// Creates a new precise position.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Floors each coordinate to the block containing it.
    pub fn block(self) -> AbsoluteBlockPosition {
        AbsoluteBlockPosition {
            x: self.x.floor() as i64,
            y: self.y.floor() as i64,
            z: self.z.floor() as i64,
        }
    }
}

/// A position on the chunk grid.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AbsoluteChunkPosition {
    /// Chunk-grid X coordinate.
    pub x: i32,
    /// Chunk-grid Y coordinate.
    pub y: i32,
    /// Chunk-grid Z coordinate.
    pub z: i32,
}

impl AbsoluteChunkPosition {
    /// Creates a new chunk-grid position.
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the absolute block position of this chunk's origin corner
    /// (the block with the smallest coordinates on every axis).
    pub fn origin(self) -> AbsoluteBlockPosition {
        AbsoluteBlockPosition {
            x: self.x as i64 * CHUNK_WIDTH as i64,
            y: self.y as i64 * CHUNK_HEIGHT as i64,
            z: self.z as i64 * CHUNK_DEPTH as i64,
        }
    }

    /// Returns the chunk offset by `(dx, dy, dz)` on the chunk grid.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

/// Chebyshev (∞-norm) distance between two chunk positions.
///
/// This is the metric used for both residency (load radius) and update
/// filtering (render distance): a radius-`r` neighborhood is the full
/// `(2r+1)³` cube around the center.
pub fn chebyshev_distance(a: AbsoluteChunkPosition, b: AbsoluteChunkPosition) -> u32 {
    let dx = (a.x as i64 - b.x as i64).unsigned_abs();
    let dy = (a.y as i64 - b.y as i64).unsigned_abs();
    let dz = (a.z as i64 - b.z as i64).unsigned_abs();
    dx.max(dy).max(dz) as u32
}

// ---------------------------------------------------------------------------
// Chunk-local frame
// ---------------------------------------------------------------------------

/// A position inside a chunk.
///
/// Invariant: `x < CHUNK_WIDTH`, `y < CHUNK_HEIGHT`, `z < CHUNK_DEPTH`.
/// Constructing an out-of-range local position is a programming error and
/// panics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkLocalPosition {
    x: u8,
    y: u8,
    z: u8,
}

impl ChunkLocalPosition {
    /// Creates a new chunk-local position.
    ///
    /// # Panics
    ///
    /// Panics if any coordinate is outside the chunk dimensions.
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        assert!(
            (x as usize) < CHUNK_WIDTH && (y as usize) < CHUNK_HEIGHT && (z as usize) < CHUNK_DEPTH,
            "chunk-local position ({x}, {y}, {z}) out of range"
        );
        Self { x, y, z }
    }

    /// Local X coordinate.
    pub fn x(self) -> u8 {
        self.x
    }

    /// Local Y coordinate.
    pub fn y(self) -> u8 {
        self.y
    }

    /// Local Z coordinate.
    pub fn z(self) -> u8 {
        self.z
    }

    /// Flat index into a dense chunk array (x fastest, then y, then z).
    pub fn flat_index(self) -> usize {
        self.x as usize + self.y as usize * CHUNK_WIDTH + self.z as usize * CHUNK_WIDTH * CHUNK_HEIGHT
    }

    /// Inverse of [`flat_index`](Self::flat_index).
    ///
    /// # Panics
    ///
    /// Panics if `index >= CHUNK_VOLUME`.
    pub fn from_flat_index(index: usize) -> Self {
        assert!(index < CHUNK_VOLUME, "flat index {index} out of range");
        Self {
            x: (index % CHUNK_WIDTH) as u8,
            y: (index / CHUNK_WIDTH % CHUNK_HEIGHT) as u8,
            z: (index / (CHUNK_WIDTH * CHUNK_HEIGHT)) as u8,
        }
    }

    /// Converts this local position back to an absolute block position given
    /// the containing chunk.
    pub fn to_absolute(self, chunk: AbsoluteChunkPosition) -> AbsoluteBlockPosition {
        let origin = chunk.origin();
        AbsoluteBlockPosition {
            x: origin.x + self.x as i64,
            y: origin.y + self.y as i64,
            z: origin.z + self.z as i64,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
