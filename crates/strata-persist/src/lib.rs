//! Durable chunk persistence.
//!
//! The [`ChunkPersistence`] trait is the seam the world uses to save and
//! restore chunks; [`FileChunkStore`] is the reference backend, a single-file
//! key-value store with upsert semantics. Records are appended, an in-memory
//! index maps each chunk position to its latest record, and [`FileChunkStore::compact`]
//! rewrites the file down to live records on clean shutdown.
//!
//! ## File layout
//!
//! ```text
//! [magic "SCKV"][version:u8=1]
//! repeat:
//!   [cx:i32 LE][cy:i32 LE][cz:i32 LE][len:u32 LE][payload: len bytes]
//! ```
//!
//! The payload is the sparse chunk serialization from `strata-voxel`. A key
//! appearing more than once is an upsert: the last record wins.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rustc_hash::FxHashMap;
use strata_coords::AbsoluteChunkPosition;
use strata_voxel::ChunkSpan;

const MAGIC: [u8; 4] = *b"SCKV";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: u64 = 5;
const RECORD_HEADER_LEN: u64 = 12 + 4;

/// Errors from the persistence layer.
///
/// A load that hits a malformed payload is NOT an error: the chunk is
/// logged and treated as absent. Errors here are I/O failures and an
/// unusable store file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The underlying file operation failed.
    #[error("chunk store I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The file exists but does not start with a valid store header.
    #[error("not a chunk store file (bad magic or version): {path}")]
    BadHeader {
        /// Path of the offending file.
        path: PathBuf,
    },
}

/// Outcome of a best-effort [`ChunkPersistence::save_all`].
#[derive(Debug, Default)]
pub struct SaveAllReport {
    /// Number of chunks written successfully.
    pub saved: usize,
    /// Chunks that failed, with the error that stopped each one.
    pub failed: Vec<(AbsoluteChunkPosition, PersistError)>,
}

impl SaveAllReport {
    /// `true` when every chunk was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Save/load seam between the world and durable storage.
pub trait ChunkPersistence: Send + Sync {
    /// Writes one chunk, replacing any previous record for its position.
    fn save_chunk(&self, chunk: &ChunkSpan) -> Result<(), PersistError>;

    /// Reads the chunk stored for `position`.
    ///
    /// Returns `Ok(None)` when the position has no record, and also when the
    /// stored payload is malformed (logged, treated as absent).
    fn load_chunk(&self, position: AbsoluteChunkPosition)
        -> Result<Option<ChunkSpan>, PersistError>;

    /// Writes every chunk in the iterator, best-effort: one failed chunk is
    /// recorded in the report and does not abort the rest.
    fn save_all(&self, chunks: &mut dyn Iterator<Item = &ChunkSpan>) -> SaveAllReport {
        let mut report = SaveAllReport::default();
        for chunk in chunks {
            match self.save_chunk(chunk) {
                Ok(()) => report.saved += 1,
                Err(err) => {
                    tracing::warn!(position = ?chunk.position(), %err, "failed to save chunk");
                    report.failed.push((chunk.position(), err));
                }
            }
        }
        report
    }
}

impl<T: ChunkPersistence + ?Sized> ChunkPersistence for std::sync::Arc<T> {
    fn save_chunk(&self, chunk: &ChunkSpan) -> Result<(), PersistError> {
        (**self).save_chunk(chunk)
    }

    fn load_chunk(
        &self,
        position: AbsoluteChunkPosition,
    ) -> Result<Option<ChunkSpan>, PersistError> {
        (**self).load_chunk(position)
    }

    fn save_all(&self, chunks: &mut dyn Iterator<Item = &ChunkSpan>) -> SaveAllReport {
        (**self).save_all(chunks)
    }
}

// ---------------------------------------------------------------------------
// FileChunkStore
// ---------------------------------------------------------------------------

struct RecordRef {
    /// Offset of the payload bytes (past the record header).
    payload_at: u64,
    payload_len: u32,
}

struct StoreInner {
    file: File,
    index: FxHashMap<AbsoluteChunkPosition, RecordRef>,
    /// End of the last valid record; appends go here.
    end: u64,
}

/// Single-file chunk store.
///
/// All methods take `&self`; the file handle and index live behind one
/// mutex, so a store can be shared between the RPC handlers and the
/// lifecycle loop.
pub struct FileChunkStore {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

impl FileChunkStore {
    /// Opens (or creates) the store at `path`.
    ///
    /// Opening is idempotent: an empty or missing file gets a fresh header,
    /// an existing file is scanned to rebuild the position index. A torn
    /// trailing record (e.g. from a crash mid-append) is logged and
    /// discarded; everything before it is kept.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_len = file.metadata()?.len();
        if file_len == 0 {
            file.write_all(&MAGIC)?;
            file.write_all(&[FORMAT_VERSION])?;
            file.flush()?;
            return Ok(Self {
                path,
                inner: Mutex::new(StoreInner {
                    file,
                    index: FxHashMap::default(),
                    end: HEADER_LEN,
                }),
            });
        }

        let mut header = [0u8; HEADER_LEN as usize];
        if file_len < HEADER_LEN {
            return Err(PersistError::BadHeader { path });
        }
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;
        if header[..4] != MAGIC || header[4] != FORMAT_VERSION {
            return Err(PersistError::BadHeader { path });
        }

        let (index, end) = scan_records(&mut file, file_len)?;
        Ok(Self {
            path,
            inner: Mutex::new(StoreInner { file, index, end }),
        })
    }

    /// Path this store was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct chunk positions currently stored.
    pub fn chunk_count(&self) -> usize {
        self.inner.lock().expect("chunk store lock").index.len()
    }

    /// Rewrites the file so it contains exactly one record per live
    /// position, dropping superseded ones. Called on clean shutdown.
    pub fn compact(&self) -> Result<(), PersistError> {
        let mut inner = self.inner.lock().expect("chunk store lock");

        // Read every live payload before rewriting.
        let positions: Vec<AbsoluteChunkPosition> = inner.index.keys().copied().collect();
        let mut live = Vec::with_capacity(positions.len());
        for pos in positions {
            let record = &inner.index[&pos];
            let (at, len) = (record.payload_at, record.payload_len);
            let mut payload = vec![0u8; len as usize];
            inner.file.seek(SeekFrom::Start(at))?;
            inner.file.read_exact(&mut payload)?;
            live.push((pos, payload));
        }

        inner.file.set_len(HEADER_LEN)?;
        inner.file.seek(SeekFrom::Start(HEADER_LEN))?;
        inner.index.clear();
        inner.end = HEADER_LEN;
        for (pos, payload) in live {
            append_record(&mut inner, pos, &payload)?;
        }
        inner.file.flush()?;
        Ok(())
    }
}

impl ChunkPersistence for FileChunkStore {
    fn save_chunk(&self, chunk: &ChunkSpan) -> Result<(), PersistError> {
        let payload = chunk.serialize();
        let mut inner = self.inner.lock().expect("chunk store lock");
        append_record(&mut inner, chunk.position(), &payload)?;
        inner.file.flush()?;
        Ok(())
    }

    fn load_chunk(
        &self,
        position: AbsoluteChunkPosition,
    ) -> Result<Option<ChunkSpan>, PersistError> {
        let mut inner = self.inner.lock().expect("chunk store lock");
        let Some(record) = inner.index.get(&position) else {
            return Ok(None);
        };
        let (at, len) = (record.payload_at, record.payload_len);
        let mut payload = vec![0u8; len as usize];
        inner.file.seek(SeekFrom::Start(at))?;
        inner.file.read_exact(&mut payload)?;

        match ChunkSpan::from_serialized(&payload) {
            Ok(chunk) if chunk.position() == position => Ok(Some(chunk)),
            Ok(chunk) => {
                tracing::warn!(
                    expected = ?position,
                    found = ?chunk.position(),
                    "stored chunk position disagrees with its key; treating as absent"
                );
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(?position, %err, "malformed chunk record; treating as absent");
                Ok(None)
            }
        }
    }
}

fn append_record(
    inner: &mut StoreInner,
    position: AbsoluteChunkPosition,
    payload: &[u8],
) -> Result<(), PersistError> {
    let at = inner.end;
    inner.file.seek(SeekFrom::Start(at))?;
    inner.file.write_all(&position.x.to_le_bytes())?;
    inner.file.write_all(&position.y.to_le_bytes())?;
    inner.file.write_all(&position.z.to_le_bytes())?;
    inner.file.write_all(&(payload.len() as u32).to_le_bytes())?;
    inner.file.write_all(payload)?;

    inner.end = at + RECORD_HEADER_LEN + payload.len() as u64;
    inner.index.insert(
        position,
        RecordRef {
            payload_at: at + RECORD_HEADER_LEN,
            payload_len: payload.len() as u32,
        },
    );
    Ok(())
}

fn scan_records(
    file: &mut File,
    file_len: u64,
) -> Result<(FxHashMap<AbsoluteChunkPosition, RecordRef>, u64), PersistError> {
    let mut index = FxHashMap::default();
    let mut at = HEADER_LEN;

    file.seek(SeekFrom::Start(at))?;
    while at + RECORD_HEADER_LEN <= file_len {
        let mut header = [0u8; RECORD_HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        let x = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let y = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let z = i32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        let len = u32::from_le_bytes([header[12], header[13], header[14], header[15]]);

        let payload_at = at + RECORD_HEADER_LEN;
        if payload_at + len as u64 > file_len {
            tracing::warn!(offset = at, "torn trailing record in chunk store; discarding");
            break;
        }
        index.insert(
            AbsoluteChunkPosition::new(x, y, z),
            RecordRef {
                payload_at,
                payload_len: len,
            },
        );
        at = payload_at + len as u64;
        file.seek(SeekFrom::Start(at))?;
    }

    if at < file_len {
        tracing::warn!(
            valid_end = at,
            file_len,
            "chunk store has trailing garbage; appends will overwrite it"
        );
    }
    Ok((index, at))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
