//! The world-facing generation seam and the built-in terrain presets.

use noise::Perlin;
use strata_coords::{AbsoluteChunkPosition, CHUNK_VOLUME};
use strata_voxel::{Block, ChunkSpan};

use crate::overlay::Overlay;

/// Produces chunk contents on demand.
///
/// Implementations must be deterministic: the same `(position, seed)` must
/// yield byte-identical chunks on every call and every host.
pub trait ChunkGenerator: Send + Sync {
    /// Generates the chunk at `position` under the given world seed.
    fn generate(&self, position: AbsoluteChunkPosition, seed: u64) -> ChunkSpan;
}

/// A [`ChunkGenerator`] that evaluates a configured [`Overlay`] tree.
#[derive(Clone, Debug)]
pub struct OverlayPipeline {
    overlay: Overlay,
}

impl OverlayPipeline {
    /// Wraps an overlay tree as a chunk generator.
    pub fn new(overlay: Overlay) -> Self {
        Self { overlay }
    }

    /// The configured overlay tree.
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }
}

impl ChunkGenerator for OverlayPipeline {
    fn generate(&self, position: AbsoluteChunkPosition, seed: u64) -> ChunkSpan {
        let noise = Perlin::new(seed as u32);
        let mut blocks = Box::new([Block::Empty; CHUNK_VOLUME]);
        self.overlay.generate_into(&mut blocks, position, None, &noise);
        ChunkSpan::from_blocks(position, blocks)
    }
}

/// The default overworld stack: a grass cap over a dirt band over a
/// noise-shaped stone body, with a bedrock floor.
pub fn overworld() -> OverlayPipeline {
    OverlayPipeline::new(Overlay::Chain(vec![
        Overlay::Surface { block: Block::Grass },
        Overlay::LayerReplace {
            from: Block::Stone,
            to: Block::Dirt,
            from_top: 0,
            thickness: 3,
        },
        Overlay::PerlinNoise {
            frequency: 0.07,
            threshold: 0.55,
            base_thickness: 2,
            max_extra: 1,
            block: Block::Bedrock,
        },
        Overlay::TerrainHeight {
            frequency: 0.01,
            base_height: 8,
            variation: 6,
            block: Block::Stone,
        },
    ]))
}

/// A flat world filled with `block` below the given absolute height.
pub fn flatworld(height: i64, block: Block) -> OverlayPipeline {
    OverlayPipeline::new(Overlay::Heightmap { height, block })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use strata_coords::ChunkLocalPosition;

    #[test]
    fn test_pipeline_generates_at_requested_position() {
        let generator = flatworld(3, Block::Grass);
        let chunk = generator.generate(AbsoluteChunkPosition::new(2, 0, -1), 0);
        assert_eq!(chunk.position(), AbsoluteChunkPosition::new(2, 0, -1));
        assert_eq!(chunk.get(ChunkLocalPosition::new(0, 2, 0)), Block::Grass);
        assert_eq!(chunk.get(ChunkLocalPosition::new(0, 3, 0)), Block::Empty);
    }

    #[test]
    fn test_pipeline_is_deterministic_per_seed() {
        let generator = overworld();
        let pos = AbsoluteChunkPosition::new(0, 0, 0);
        let a = generator.generate(pos, 42);
        let b = generator.generate(pos, 42);
        assert_eq!(a, b);
        assert_eq!(a.serialize(), b.serialize());
    }

    #[test]
    fn test_overworld_ground_chunk_has_expected_strata() {
        let generator = overworld();
        let chunk = generator.generate(AbsoluteChunkPosition::new(0, 0, 0), 42);

        // Bedrock floor at the world bottom.
        assert_eq!(chunk.get(ChunkLocalPosition::new(0, 0, 0)), Block::Bedrock);
        // Stone somewhere in the body, dirt and a grass cap above it.
        let mut seen = [false; 3];
        for y in 0..16u8 {
            match chunk.get(ChunkLocalPosition::new(8, y, 8)) {
                Block::Stone => seen[0] = true,
                Block::Dirt => seen[1] = true,
                Block::Grass => seen[2] = true,
                _ => {}
            }
        }
        assert!(seen.iter().all(|s| *s), "expected stone, dirt, and grass in a surface column");
    }

    #[test]
    fn test_chunks_above_terrain_are_empty() {
        let generator = overworld();
        let chunk = generator.generate(AbsoluteChunkPosition::new(0, 4, 0), 42);
        assert_eq!(chunk.nonempty_count(), 0);
    }
}
