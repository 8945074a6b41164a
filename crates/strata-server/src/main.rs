//! The binary entry point for the Strata world server.
//!
//! Wires configuration, logging, persistence, generation, the world, and
//! the RPC listener together, runs until interrupted, then shuts down in
//! order: stop accepting, join the background tasks, flush resident chunks,
//! compact the store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use strata_config::{CliArgs, Config};
use strata_coords::AbsoluteBlockPosition;
use strata_net::{
    spawn_anchor_maintenance, spawn_session_cleanup, RpcOptions, RpcServer, RpcServerConfig,
};
use strata_persist::{ChunkPersistence, FileChunkStore};
use strata_world::{World, WorldOptions};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("strata-server failed to start: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(&args);

    strata_log::init_logging(&config.debug.log_level, None);

    // Startup resources: a failed bind or store open is a non-zero exit.
    let store = match &config.world.persistence_path {
        Some(path) => Some(Arc::new(FileChunkStore::open(path)?)),
        None => None,
    };
    if let Some(store) = &store {
        tracing::info!(
            path = %store.path().display(),
            chunks = store.chunk_count(),
            "chunk store open"
        );
    }

    let world = Arc::new(World::new(WorldOptions {
        generator: Some(Box::new(strata_worldgen::overworld())),
        persistence: store
            .as_ref()
            .map(|s| Box::new(Arc::clone(s)) as Box<dyn ChunkPersistence>),
        anchors: config
            .world
            .anchors
            .iter()
            .map(|&(x, y, z)| AbsoluteBlockPosition::new(x, y, z))
            .collect(),
        radius_in_chunks: config.world.load_radius,
        seed: config.world.seed,
        session_timeout: Duration::from_secs(config.session.timeout_secs),
    }));

    // Bring the initial working set up before accepting clients.
    world.ensure_chunks_loaded();
    tracing::info!(
        chunks = world.loaded_chunk_count(),
        seed = config.world.seed,
        radius = config.world.load_radius,
        "world ready"
    );

    let bind_addr = format!("{}:{}", config.network.bind_address, config.network.port).parse()?;
    let server = Arc::new(RpcServer::new(
        Arc::clone(&world),
        RpcOptions {
            server_info: format!(
                "strata world server v{} on port {}",
                env!("CARGO_PKG_VERSION"),
                config.network.port
            ),
            require_session_for_edits: config.session.require_session_for_edits,
        },
        RpcServerConfig {
            bind_addr,
            max_connections: config.network.max_connections as usize,
            ..RpcServerConfig::default()
        },
    ));

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "listening");

    let cleanup_task = spawn_session_cleanup(Arc::clone(&world), server.shutdown_signal());
    let maintenance_task = spawn_anchor_maintenance(
        Arc::clone(&world),
        Duration::from_millis(config.world.maintenance_interval_ms),
        server.shutdown_signal(),
    );
    let accept_server = Arc::clone(&server);
    let accept_task =
        tokio::spawn(async move { accept_server.run_with_listener(listener).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");

    // Ordered shutdown: stop accepting, join tasks, then flush state.
    server.shutdown();
    accept_task.await??;
    cleanup_task.await?;
    maintenance_task.await?;

    if let Some(report) = world.save_all_chunks() {
        tracing::info!(saved = report.saved, failed = report.failed.len(), "world saved");
    }
    if let Some(store) = &store {
        store.compact()?;
        tracing::info!("chunk store compacted");
    }

    tracing::info!("shutdown complete");
    Ok(())
}
