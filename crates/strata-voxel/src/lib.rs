//! Block types, dense chunk storage, and the sparse chunk codec.

mod block;
mod chunk;
mod codec;

pub use block::{Block, UnknownBlock};
pub use chunk::ChunkSpan;
pub use codec::{ChunkCodecError, CODEC_VERSION};
