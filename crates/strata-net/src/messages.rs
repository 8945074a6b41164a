//! RPC message types and their versioned postcard encoding.
//!
//! Wire format of a payload: `[version: u8] [postcard-encoded enum]`.
//! Every response carries `success` and an `error_message` that is empty on
//! success. Chunk bytes inside [`GetChunkResponse`] use the sparse chunk
//! codec from `strata-voxel`, identical to the on-disk format.

use serde::{Deserialize, Serialize};
use strata_coords::AbsoluteChunkPosition;

/// Current wire-protocol version, prepended to every payload.
pub const PROTOCOL_VERSION: u8 = 1;

/// Observer identity and block-grid position attached to chunk reads and
/// block edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPositionMsg {
    /// Client-chosen player identifier.
    pub player_id: String,
    /// Block-grid X.
    pub x: i64,
    /// Block-grid Y.
    pub y: i64,
    /// Block-grid Z.
    pub z: i64,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A client-to-server call. The enum discriminant is the method tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Liveness probe.
    Ping,
    /// Ask for the server's identifying string.
    GetServerInfo,
    /// Fetch one chunk's serialized contents.
    GetChunk {
        /// Chunk-grid X.
        x: i32,
        /// Chunk-grid Y.
        y: i32,
        /// Chunk-grid Z.
        z: i32,
        /// Optional observer, for logging/observability.
        player_position: Option<PlayerPositionMsg>,
    },
    /// Drain the dirty chunks within render distance of the player.
    GetUpdatedChunks {
        /// The observing player.
        player_position: PlayerPositionMsg,
        /// Chebyshev radius, in chunks.
        render_distance: i32,
    },
    /// Write one block.
    PlaceBlock {
        /// Block-grid X.
        x: i64,
        /// Block-grid Y.
        y: i64,
        /// Block-grid Z.
        z: i64,
        /// Block id to place.
        block_type: u32,
        /// Optional acting player.
        player_position: Option<PlayerPositionMsg>,
    },
    /// Clear one block (equivalent to placing `Empty`).
    BreakBlock {
        /// Block-grid X.
        x: i64,
        /// Block-grid Y.
        y: i64,
        /// Block-grid Z.
        z: i64,
        /// Optional acting player.
        player_position: Option<PlayerPositionMsg>,
    },
    /// Read one block.
    GetBlockAt {
        /// Block-grid X.
        x: i64,
        /// Block-grid Y.
        y: i64,
        /// Block-grid Z.
        z: i64,
    },
    /// Open a session and spawn the player.
    ConnectPlayer {
        /// Display name; must be non-empty.
        player_name: String,
        /// Requested spawn X.
        spawn_x: f64,
        /// Requested spawn Y.
        spawn_y: f64,
        /// Requested spawn Z.
        spawn_z: f64,
    },
    /// Renew a session's timeout window.
    RefreshSession {
        /// The session to refresh.
        session_token: String,
    },
    /// Report the player's new position (also refreshes the session).
    UpdatePlayerPosition {
        /// The moving player's session.
        session_token: String,
        /// Precise X.
        x: f64,
        /// Precise Y.
        y: f64,
        /// Precise Z.
        z: f64,
    },
    /// Close a session and despawn the player.
    DisconnectPlayer {
        /// The session to close.
        session_token: String,
    },
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Success flag plus error text, shared by the methods with no other payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the call succeeded.
    pub success: bool,
    /// Human-readable failure reason; empty on success.
    pub error_message: String,
}

impl StatusResponse {
    /// A successful status.
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: String::new(),
        }
    }

    /// A failed status with the given reason.
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: reason.into(),
        }
    }
}

/// Reply to [`Request::GetServerInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfoResponse {
    /// Whether the call succeeded.
    pub success: bool,
    /// Opaque server-identifying string.
    pub server_info: String,
    /// Failure reason; empty on success.
    pub error_message: String,
}

/// Reply to [`Request::GetChunk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetChunkResponse {
    /// Whether the call succeeded. A missing chunk is still a success,
    /// just with no payload.
    pub success: bool,
    /// Sparse chunk serialization; `None` when the chunk is not loaded.
    pub chunk_data: Option<Vec<u8>>,
    /// Failure reason; empty on success.
    pub error_message: String,
}

/// Reply to [`Request::GetUpdatedChunks`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedChunksResponse {
    /// Whether the call succeeded.
    pub success: bool,
    /// Chunks dirtied since this observer's last drain, within range.
    pub updated_chunks: Vec<AbsoluteChunkPosition>,
    /// Failure reason; empty on success.
    pub error_message: String,
}

/// Reply to [`Request::GetBlockAt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlockResponse {
    /// Whether the call succeeded.
    pub success: bool,
    /// Block id at the position; `Empty` when the chunk is not loaded.
    pub block_type: u32,
    /// Failure reason; empty on success.
    pub error_message: String,
}

/// Reply to [`Request::ConnectPlayer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectPlayerResponse {
    /// Whether the call succeeded.
    pub success: bool,
    /// Opaque session token for subsequent calls.
    pub session_token: String,
    /// Server-assigned player id.
    pub player_id: String,
    /// Actual spawn X.
    pub actual_spawn_x: f64,
    /// Actual spawn Y.
    pub actual_spawn_y: f64,
    /// Actual spawn Z.
    pub actual_spawn_z: f64,
    /// Failure reason; empty on success.
    pub error_message: String,
}

/// A server-to-client reply. Always the same variant as the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Reply to `Ping`.
    Ping(StatusResponse),
    /// Reply to `GetServerInfo`.
    GetServerInfo(ServerInfoResponse),
    /// Reply to `GetChunk`.
    GetChunk(GetChunkResponse),
    /// Reply to `GetUpdatedChunks`.
    GetUpdatedChunks(UpdatedChunksResponse),
    /// Reply to `PlaceBlock`.
    PlaceBlock(StatusResponse),
    /// Reply to `BreakBlock`.
    BreakBlock(StatusResponse),
    /// Reply to `GetBlockAt`.
    GetBlockAt(GetBlockResponse),
    /// Reply to `ConnectPlayer`.
    ConnectPlayer(ConnectPlayerResponse),
    /// Reply to `RefreshSession`.
    RefreshSession(StatusResponse),
    /// Reply to `UpdatePlayerPosition`.
    UpdatePlayerPosition(StatusResponse),
    /// Reply to `DisconnectPlayer`.
    DisconnectPlayer(StatusResponse),
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Errors that make an incoming payload undecodable.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// No bytes at all, not even a version byte.
    #[error("empty payload")]
    EmptyPayload,
    /// Version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),
    /// The postcard body failed to parse.
    #[error("malformed message: {0}")]
    Postcard(#[from] postcard::Error),
}

/// Encodes a request behind the protocol version byte.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, postcard::Error> {
    encode(request)
}

/// Decodes a request payload.
pub fn decode_request(payload: &[u8]) -> Result<Request, MessageError> {
    decode(payload)
}

/// Encodes a response behind the protocol version byte.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, postcard::Error> {
    encode(response)
}

/// Decodes a response payload.
pub fn decode_response(payload: &[u8]) -> Result<Response, MessageError> {
    decode(payload)
}

fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(message)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode<T: for<'de> Deserialize<'de>>(payload: &[u8]) -> Result<T, MessageError> {
    let Some((&version, body)) = payload.split_first() else {
        return Err(MessageError::EmptyPayload);
    };
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
