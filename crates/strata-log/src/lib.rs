//! Structured logging for the Strata server.
//!
//! Console output goes through the `tracing` ecosystem: an `EnvFilter`
//! (honoring `RUST_LOG`, falling back to the configured level) and an `fmt`
//! layer with an uptime timer. When a log directory is given, a JSON file
//! layer is added for post-mortem analysis.

use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber.
///
/// `level` is the fallback filter when `RUST_LOG` is unset (e.g. `"info"`
/// or `"info,strata_net=debug"`). Passing a `log_dir` adds a JSON file
/// layer writing to `strata-server.log` inside it.
pub fn init_logging(level: &str, log_dir: Option<&Path>) {
    let fallback = if level.is_empty() { "info" } else { level };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(log_dir) = log_dir {
        if std::fs::create_dir_all(log_dir).is_ok() {
            if let Ok(log_file) = std::fs::File::create(log_dir.join("strata-server.log")) {
                let file_layer = fmt::layer()
                    .with_writer(log_file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(fmt::time::uptime())
                    .json();
                subscriber.with(file_layer).init();
                return;
            }
        }
        subscriber.init();
        tracing::warn!("could not open log directory {}", log_dir.display());
        return;
    }

    subscriber.init();
}

/// The filter used when neither `RUST_LOG` nor config says otherwise.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}
