//! Server configuration.
//!
//! Settings persist to disk as RON and every section tolerates missing
//! fields via serde defaults, so old config files keep working as the
//! schema grows. CLI arguments override whatever was loaded.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, NetworkConfig, SessionConfig, WorldConfig};
pub use error::ConfigError;
