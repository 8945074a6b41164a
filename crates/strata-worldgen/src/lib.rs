//! Composable terrain overlays and deterministic chunk generation.
//!
//! An [`Overlay`] is a pure transform that writes a full chunk buffer from
//! the chunk's position, the world seed, and an optional parent buffer.
//! Overlays compose into chains (top-most first, evaluated bottom-up) and
//! into overwrite / fallback pairs; the composed tree is an owned value with
//! no shared state, so the same `(position, seed, config)` always produces
//! byte-identical output.

mod overlay;
mod pipeline;

pub use overlay::{BlockBuffer, Overlay, THICKNESS_CEILING};
pub use pipeline::{flatworld, overworld, ChunkGenerator, OverlayPipeline};
