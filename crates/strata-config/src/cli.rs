//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Strata world server command-line arguments.
///
/// CLI values override settings loaded from `server.ron`.
#[derive(Parser, Debug)]
#[command(name = "strata-server", about = "Strata voxel world server")]
pub struct CliArgs {
    /// Address to bind.
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Chunk store file path.
    #[arg(long)]
    pub persistence: Option<PathBuf>,

    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Load radius in chunks.
    #[arg(long)]
    pub load_radius: Option<u32>,

    /// Session timeout in seconds.
    #[arg(long)]
    pub session_timeout: Option<u64>,

    /// Load anchor as "x,y,z" block coordinates; repeatable. Overrides the
    /// configured anchor list entirely when given.
    #[arg(long = "anchor", value_parser = parse_anchor)]
    pub anchors: Vec<(i64, i64, i64)>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to the config directory (overrides the default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_anchor(raw: &str) -> Result<(i64, i64, i64), String> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected \"x,y,z\", got {raw:?}"));
    }
    let mut coords = [0i64; 3];
    for (slot, part) in coords.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse()
            .map_err(|_| format!("bad coordinate {part:?} in anchor {raw:?}"))?;
    }
    Ok((coords[0], coords[1], coords[2]))
}

impl Config {
    /// Applies CLI overrides on top of a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref bind) = args.bind {
            self.network.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.network.port = port;
        }
        if let Some(ref path) = args.persistence {
            self.world.persistence_path = Some(path.clone());
        }
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(radius) = args.load_radius {
            self.world.load_radius = radius;
        }
        if let Some(timeout) = args.session_timeout {
            self.session.timeout_secs = timeout;
        }
        if !args.anchors.is_empty() {
            self.world.anchors = args.anchors.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_args() -> CliArgs {
        CliArgs {
            bind: None,
            port: None,
            persistence: None,
            seed: None,
            load_radius: None,
            session_timeout: None,
            anchors: vec![],
            log_level: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            port: Some(4040),
            seed: Some(1234),
            anchors: vec![(16, 0, -16)],
            ..no_args()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.port, 4040);
        assert_eq!(config.world.seed, 1234);
        assert_eq!(config.world.anchors, vec![(16, 0, -16)]);
        // Untouched fields keep their defaults.
        assert_eq!(config.network.bind_address, "0.0.0.0");
        assert_eq!(config.session.timeout_secs, 5);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&no_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_anchor_parsing() {
        assert_eq!(parse_anchor("1,2,3"), Ok((1, 2, 3)));
        assert_eq!(parse_anchor(" -16 , 0 , 1024 "), Ok((-16, 0, 1024)));
        assert!(parse_anchor("1,2").is_err());
        assert!(parse_anchor("a,b,c").is_err());
    }

    #[test]
    fn test_args_parse_from_command_line() {
        let args = CliArgs::parse_from([
            "strata-server",
            "--port",
            "5000",
            "--anchor",
            "0,0,0",
            "--anchor",
            "160,0,160",
        ]);
        assert_eq!(args.port, Some(5000));
        assert_eq!(args.anchors, vec![(0, 0, 0), (160, 0, 160)]);
    }
}
