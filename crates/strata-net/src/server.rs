//! The TCP RPC server and its background tasks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

use strata_world::World;

use crate::framing::{read_frame, write_frame, FrameError, FrameLimit};
use crate::messages::{decode_request, encode_response};
use crate::rpc::{handle_request, RpcOptions};

/// How often the session-cleanup task sweeps expired sessions.
pub const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Listener configuration for [`RpcServer`].
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Address to bind.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent client connections.
    pub max_connections: usize,
    /// Per-frame payload cap.
    pub frame_limit: FrameLimit,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7878".parse().expect("literal socket address"),
            max_connections: 64,
            frame_limit: FrameLimit::default(),
        }
    }
}

/// Accepts connections and runs one request/response loop per client.
///
/// A framing or decoding error closes that client's connection; the server
/// itself only stops on [`RpcServer::shutdown`].
pub struct RpcServer {
    world: Arc<World>,
    options: RpcOptions,
    config: RpcServerConfig,
    connection_permits: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RpcServer {
    /// Creates a server around a world.
    pub fn new(world: Arc<World>, options: RpcOptions, config: RpcServerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            world,
            options,
            connection_permits: Arc::new(Semaphore::new(config.max_connections)),
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// A receiver on the server's shutdown signal, for wiring background
    /// tasks to the same lifecycle.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Signals every loop (accept, connections, background tasks) to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("server listening on {}", self.config.bind_addr);
        self.run_with_listener(listener).await
    }

    /// Serves on a pre-bound listener (lets tests use an ephemeral port).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    let Ok(permit) = Arc::clone(&self.connection_permits).try_acquire_owned()
                    else {
                        tracing::warn!(%peer, "connection limit reached, rejecting");
                        continue;
                    };
                    stream.set_nodelay(true)?;
                    tracing::info!(%peer, "client connected");

                    let world = Arc::clone(&self.world);
                    let options = self.options.clone();
                    let frame_limit = self.config.frame_limit;
                    let task_shutdown = self.shutdown_rx.clone();
                    tokio::spawn(async move {
                        serve_connection(stream, world, options, frame_limit, task_shutdown).await;
                        tracing::info!(%peer, "client disconnected");
                        drop(permit);
                    });
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("server stopping, no longer accepting connections");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// One client's request/response loop.
async fn serve_connection(
    mut stream: TcpStream,
    world: Arc<World>,
    options: RpcOptions,
    frame_limit: FrameLimit,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let payload = tokio::select! {
            frame = read_frame(&mut stream, frame_limit) => match frame {
                Ok(payload) => payload,
                Err(FrameError::ConnectionClosed) => break,
                Err(err) => {
                    tracing::warn!(%err, "dropping connection on framing error");
                    break;
                }
            },
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        };

        let request = match decode_request(&payload) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(%err, "dropping connection on undecodable request");
                break;
            }
        };

        let response = handle_request(Some(&world), &options, request);
        let encoded = match encode_response(&response) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::error!(%err, "failed to encode response");
                break;
            }
        };
        if let Err(err) = write_frame(&mut stream, &encoded, frame_limit).await {
            tracing::warn!(%err, "dropping connection on write error");
            break;
        }
    }
}

/// Spawns the session-cleanup tick: every second, expired sessions are
/// swept and their entities despawned. Stops when the shutdown signal
/// flips.
pub fn spawn_session_cleanup(
    world: Arc<World>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let removed = world.cleanup_expired_sessions();
                    if !removed.is_empty() {
                        tracing::info!(count = removed.len(), "expired sessions removed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Spawns the anchor-maintenance loop: periodically reconciles the resident
/// chunk set with the anchors (loading, generating, and evicting as
/// needed). Stops when the shutdown signal flips.
pub fn spawn_anchor_maintenance(
    world: Arc<World>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    world.ensure_chunks_loaded();
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
