//! Length-prefixed framing for the RPC stream.
//!
//! Each frame is a `u32` little-endian payload length followed by that many
//! payload bytes; the prefix does not count itself. The cap defaults to
//! comfortably above a fully-populated chunk payload so a single `GetChunk`
//! response always fits in one frame.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Upper bound on a single frame's payload.
#[derive(Debug, Clone, Copy)]
pub struct FrameLimit {
    /// Maximum payload size in bytes.
    pub max_payload: u32,
}

impl Default for FrameLimit {
    fn default() -> Self {
        Self {
            max_payload: 64 * 1024,
        }
    }
}

/// Framing failures. Oversize and I/O errors are protocol errors: the
/// server closes the offending connection and keeps serving others.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame declared (or a write attempted) a payload over the cap.
    #[error("frame payload of {size} bytes exceeds the {max} byte cap")]
    Oversize {
        /// Declared or attempted payload size.
        size: u32,
        /// Configured cap.
        max: u32,
    },
    /// The peer closed the stream mid-frame (or cleanly between frames).
    #[error("connection closed")]
    ConnectionClosed,
    /// Any other stream error.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads one frame, returning its payload.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    limit: FrameLimit,
) -> Result<Vec<u8>, FrameError> {
    let mut prefix = [0u8; 4];
    if let Err(err) = reader.read_exact(&mut prefix).await {
        return Err(closed_or_io(err));
    }

    let len = u32::from_le_bytes(prefix);
    if len > limit.max_payload {
        return Err(FrameError::Oversize {
            size: len,
            max: limit.max_payload,
        });
    }

    let mut payload = vec![0u8; len as usize];
    if len > 0 {
        reader
            .read_exact(&mut payload)
            .await
            .map_err(closed_or_io)?;
    }
    Ok(payload)
}

/// Writes one frame around the given payload.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    limit: FrameLimit,
) -> Result<(), FrameError> {
    let len = payload.len() as u32;
    if len > limit.max_payload {
        return Err(FrameError::Oversize {
            size: len,
            max: limit.max_payload,
        });
    }

    writer.write_all(&len.to_le_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;
    Ok(())
}

fn closed_or_io(err: std::io::Error) -> FrameError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut a, mut b) = duplex(4096);
        let limit = FrameLimit::default();

        write_frame(&mut a, b"get chunk", limit).await.unwrap();
        let payload = read_frame(&mut b, limit).await.unwrap();
        assert_eq!(payload, b"get chunk");
    }

    #[tokio::test]
    async fn test_frames_stay_separate() {
        let (mut a, mut b) = duplex(4096);
        let limit = FrameLimit::default();

        write_frame(&mut a, b"one", limit).await.unwrap();
        write_frame(&mut a, b"", limit).await.unwrap();
        write_frame(&mut a, b"three", limit).await.unwrap();

        assert_eq!(read_frame(&mut b, limit).await.unwrap(), b"one");
        assert_eq!(read_frame(&mut b, limit).await.unwrap(), b"");
        assert_eq!(read_frame(&mut b, limit).await.unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_prefix_is_little_endian() {
        let (mut a, mut b) = duplex(4096);
        a.write_all(&7u32.to_le_bytes()).await.unwrap();
        a.write_all(b"chunked").await.unwrap();
        a.flush().await.unwrap();

        let payload = read_frame(&mut b, FrameLimit::default()).await.unwrap();
        assert_eq!(payload, b"chunked");
    }

    #[tokio::test]
    async fn test_oversize_frame_rejected_both_ways() {
        let limit = FrameLimit { max_payload: 8 };

        let (mut a, mut b) = duplex(4096);
        let result = write_frame(&mut a, &[0u8; 64], limit).await;
        assert!(matches!(result, Err(FrameError::Oversize { size: 64, .. })));

        a.write_all(&1_000_000u32.to_le_bytes()).await.unwrap();
        a.flush().await.unwrap();
        let result = read_frame(&mut b, limit).await;
        assert!(matches!(result, Err(FrameError::Oversize { .. })));
    }

    #[tokio::test]
    async fn test_peer_close_detected() {
        let (a, mut b) = duplex(4096);
        drop(a);
        let result = read_frame(&mut b, FrameLimit::default()).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_close_mid_payload_detected() {
        let (mut a, mut b) = duplex(4096);
        a.write_all(&100u32.to_le_bytes()).await.unwrap();
        a.write_all(b"short").await.unwrap();
        a.flush().await.unwrap();
        drop(a);

        let result = read_frame(&mut b, FrameLimit::default()).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_default_cap_fits_a_full_chunk_payload() {
        use strata_coords::CHUNK_VOLUME;
        // Sparse codec worst case: header + 5 bytes per cell.
        let worst_case = 17 + 5 * CHUNK_VOLUME as u32;
        assert!(FrameLimit::default().max_payload > worst_case);
    }
}
