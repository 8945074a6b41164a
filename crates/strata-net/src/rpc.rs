//! Maps wire requests onto world operations.
//!
//! Dispatch is a plain function so the contracts can be tested without a
//! socket. Every outcome, including failure, is a normal [`Response`]; the
//! connection only drops on framing or decoding errors, never on a bad
//! request.

use strata_coords::{AbsoluteBlockPosition, AbsoluteChunkPosition, AbsolutePrecisePosition};
use strata_voxel::Block;
use strata_world::World;

use crate::messages::{
    ConnectPlayerResponse, GetBlockResponse, GetChunkResponse, PlayerPositionMsg, Request,
    Response, ServerInfoResponse, StatusResponse, UpdatedChunksResponse,
};

/// Dispatch-time configuration.
#[derive(Debug, Clone)]
pub struct RpcOptions {
    /// String returned by `GetServerInfo`.
    pub server_info: String,
    /// When set, `PlaceBlock`/`BreakBlock` require the acting player (named
    /// in `player_position`) to hold a live session. Off by default: the
    /// protocol does not carry a token on edits, so this gate matches the
    /// player id against the live session set.
    pub require_session_for_edits: bool,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            server_info: "strata world server".to_string(),
            require_session_for_edits: false,
        }
    }
}

const NO_WORLD: &str = "no world attached";
const CHUNK_NOT_LOADED: &str = "chunk not loaded";
const INVALID_SESSION: &str = "invalid or expired session token";
const EMPTY_NAME: &str = "player name cannot be empty";
const EMPTY_TOKEN: &str = "session token cannot be empty";

/// Handles one request against the world.
pub fn handle_request(world: Option<&World>, options: &RpcOptions, request: Request) -> Response {
    match request {
        Request::Ping => Response::Ping(StatusResponse::ok()),

        Request::GetServerInfo => Response::GetServerInfo(ServerInfoResponse {
            success: true,
            server_info: options.server_info.clone(),
            error_message: String::new(),
        }),

        Request::GetChunk {
            x,
            y,
            z,
            player_position,
        } => {
            let Some(world) = world else {
                return Response::GetChunk(GetChunkResponse {
                    success: false,
                    chunk_data: None,
                    error_message: NO_WORLD.to_string(),
                });
            };
            let position = AbsoluteChunkPosition::new(x, y, z);
            let chunk_data = world.serialized_chunk_at(position);
            tracing::debug!(
                ?position,
                player = player_position.as_ref().map(|p| p.player_id.as_str()),
                loaded = chunk_data.is_some(),
                "GetChunk"
            );
            // A chunk outside the resident set is not an error; the client
            // gets a successful reply with no payload.
            Response::GetChunk(GetChunkResponse {
                success: true,
                chunk_data,
                error_message: String::new(),
            })
        }

        Request::GetUpdatedChunks {
            player_position,
            render_distance,
        } => {
            let Some(world) = world else {
                return Response::GetUpdatedChunks(UpdatedChunksResponse {
                    success: false,
                    updated_chunks: Vec::new(),
                    error_message: NO_WORLD.to_string(),
                });
            };
            let observer = AbsoluteBlockPosition::new(
                player_position.x,
                player_position.y,
                player_position.z,
            );
            let updated_chunks =
                world.drain_updated_chunks_in_range(observer, render_distance.max(0) as u32);
            tracing::debug!(
                player = %player_position.player_id,
                count = updated_chunks.len(),
                "GetUpdatedChunks"
            );
            Response::GetUpdatedChunks(UpdatedChunksResponse {
                success: true,
                updated_chunks,
                error_message: String::new(),
            })
        }

        Request::PlaceBlock {
            x,
            y,
            z,
            block_type,
            player_position,
        } => Response::PlaceBlock(place_block(
            world,
            options,
            AbsoluteBlockPosition::new(x, y, z),
            block_type,
            player_position.as_ref(),
        )),

        Request::BreakBlock {
            x,
            y,
            z,
            player_position,
        } => Response::BreakBlock(place_block(
            world,
            options,
            AbsoluteBlockPosition::new(x, y, z),
            Block::Empty.id() as u32,
            player_position.as_ref(),
        )),

        Request::GetBlockAt { x, y, z } => {
            let Some(world) = world else {
                return Response::GetBlockAt(GetBlockResponse {
                    success: false,
                    block_type: Block::Empty.id() as u32,
                    error_message: NO_WORLD.to_string(),
                });
            };
            let block = world
                .get_block_if_loaded(AbsoluteBlockPosition::new(x, y, z))
                .unwrap_or(Block::Empty);
            Response::GetBlockAt(GetBlockResponse {
                success: true,
                block_type: block.id() as u32,
                error_message: String::new(),
            })
        }

        Request::ConnectPlayer {
            player_name,
            spawn_x,
            spawn_y,
            spawn_z,
        } => {
            let failure = |reason: &str| {
                Response::ConnectPlayer(ConnectPlayerResponse {
                    success: false,
                    session_token: String::new(),
                    player_id: String::new(),
                    actual_spawn_x: 0.0,
                    actual_spawn_y: 0.0,
                    actual_spawn_z: 0.0,
                    error_message: reason.to_string(),
                })
            };
            let Some(world) = world else {
                return failure(NO_WORLD);
            };
            if player_name.is_empty() {
                return failure(EMPTY_NAME);
            }

            let spawn = AbsolutePrecisePosition::new(spawn_x, spawn_y, spawn_z);
            let session_token = world.create_player_session(&player_name, spawn);
            tracing::info!(player = %player_name, token_prefix = &session_token[..8], "player connected");
            Response::ConnectPlayer(ConnectPlayerResponse {
                success: true,
                session_token,
                player_id: player_name,
                actual_spawn_x: spawn.x,
                actual_spawn_y: spawn.y,
                actual_spawn_z: spawn.z,
                error_message: String::new(),
            })
        }

        Request::RefreshSession { session_token } => {
            let Some(world) = world else {
                return Response::RefreshSession(StatusResponse::fail(NO_WORLD));
            };
            if session_token.is_empty() {
                return Response::RefreshSession(StatusResponse::fail(EMPTY_TOKEN));
            }
            if world.refresh_player_session(&session_token) {
                Response::RefreshSession(StatusResponse::ok())
            } else {
                Response::RefreshSession(StatusResponse::fail(INVALID_SESSION))
            }
        }

        Request::UpdatePlayerPosition {
            session_token,
            x,
            y,
            z,
        } => {
            let Some(world) = world else {
                return Response::UpdatePlayerPosition(StatusResponse::fail(NO_WORLD));
            };
            if session_token.is_empty() {
                return Response::UpdatePlayerPosition(StatusResponse::fail(EMPTY_TOKEN));
            }
            if !world.is_valid_session(&session_token) {
                return Response::UpdatePlayerPosition(StatusResponse::fail(INVALID_SESSION));
            }
            if world.update_player_position(&session_token, AbsolutePrecisePosition::new(x, y, z)) {
                Response::UpdatePlayerPosition(StatusResponse::ok())
            } else {
                Response::UpdatePlayerPosition(StatusResponse::fail(
                    "failed to update player position",
                ))
            }
        }

        Request::DisconnectPlayer { session_token } => {
            let Some(world) = world else {
                return Response::DisconnectPlayer(StatusResponse::fail(NO_WORLD));
            };
            if session_token.is_empty() {
                return Response::DisconnectPlayer(StatusResponse::fail(EMPTY_TOKEN));
            }
            match world.get_player_session(&session_token) {
                Some(session) => {
                    tracing::info!(player = %session.player_name, "player disconnected");
                    world.disconnect_player_by_session(&session_token);
                    Response::DisconnectPlayer(StatusResponse::ok())
                }
                None => Response::DisconnectPlayer(StatusResponse::fail(INVALID_SESSION)),
            }
        }
    }
}

fn place_block(
    world: Option<&World>,
    options: &RpcOptions,
    position: AbsoluteBlockPosition,
    block_type: u32,
    player: Option<&PlayerPositionMsg>,
) -> StatusResponse {
    let Some(world) = world else {
        return StatusResponse::fail(NO_WORLD);
    };
    if options.require_session_for_edits && !edit_authorized(world, player) {
        return StatusResponse::fail(INVALID_SESSION);
    }

    let block = match u8::try_from(block_type).ok().and_then(|id| Block::try_from(id).ok()) {
        Some(block) => block,
        None => return StatusResponse::fail(format!("unknown block type: {block_type}")),
    };

    if world.set_block_if_loaded(position, block) {
        tracing::debug!(?position, ?block, "block placed");
        StatusResponse::ok()
    } else {
        StatusResponse::fail(CHUNK_NOT_LOADED)
    }
}

/// Edits carry no session token on the wire, so the optional session gate
/// accepts an edit when the named player currently holds a live session.
fn edit_authorized(world: &World, player: Option<&PlayerPositionMsg>) -> bool {
    let Some(player) = player else {
        return false;
    };
    world
        .active_sessions()
        .iter()
        .any(|session| session.player_name == player.player_id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
