//! Skiff Daemon
//!
//! HTTP server sharing one directory tree.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use daemon::config::{default_config_path, Config};
use daemon::router::{build, AppState};
use sandbox::Policy;

/// Skiff - share one directory over HTTP.
#[derive(Parser, Debug)]
#[command(name = "skiff")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory to share (overrides the config file)
    pub root: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// URL prefix the share is mounted under, e.g. /files/
    #[arg(long)]
    pub prefix: Option<String>,

    /// Follow symlinks. WARNING: symlinks will by nature allow escaping
    /// the shared directory
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Show hidden files and directories
    #[arg(long)]
    pub include_hidden: bool,

    /// Read-only mode: no upload, move, remove, or mkdir
    #[arg(long)]
    pub read_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Layer CLI flags over the loaded configuration. Flags win.
    fn apply_to(&self, config: &mut Config) {
        if let Some(root) = &self.root {
            config.share.root = root.clone();
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(prefix) = &self.prefix {
            config.server.prefix = prefix.clone();
        }
        if self.follow_symlinks {
            config.share.follow_symlinks = true;
        }
        if self.include_hidden {
            config.share.skip_hidden = false;
        }
        if self.read_only {
            config.share.read_only = true;
        }
        if self.verbose {
            config.log.level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration, then layer env and CLI overrides on top.
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();
    cli.apply_to(&mut config);
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(config.log.level.to_lowercase())
        .init();

    if !config.share.root.is_dir() {
        anyhow::bail!("{} is not a directory", config.share.root.display());
    }

    let policy = Policy::new(&config.share.root)
        .with_context(|| format!("Failed to open share root: {}", config.share.root.display()))?
        .route_prefix(&config.server.prefix)
        .skip_hidden(config.share.skip_hidden)
        .follow_symlinks(config.share.follow_symlinks)
        .read_only(config.share.read_only);

    if policy.follows_symlinks() {
        tracing::warn!("Following symlinks; targets outside the share are reachable");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        "Serving {} on http://{}{}{}",
        policy.root().display(),
        addr,
        policy.prefix(),
        if policy.is_read_only() {
            " (read-only)"
        } else {
            ""
        }
    );

    let app = build(AppState::new(policy));
    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_invocation() {
        let cli = Cli::try_parse_from(["skiff"]).unwrap();
        assert!(cli.root.is_none());
        assert!(!cli.read_only);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_positional_root() {
        let cli = Cli::try_parse_from(["skiff", "/srv/data"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/srv/data")));
    }

    #[test]
    fn test_listen_flags() {
        let cli = Cli::try_parse_from(["skiff", "--host", "0.0.0.0", "-p", "8080"]).unwrap();
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn test_share_flags() {
        let cli = Cli::try_parse_from([
            "skiff",
            "--prefix",
            "/files/",
            "--follow-symlinks",
            "--include-hidden",
            "--read-only",
        ])
        .unwrap();
        assert_eq!(cli.prefix.as_deref(), Some("/files/"));
        assert!(cli.follow_symlinks);
        assert!(cli.include_hidden);
        assert!(cli.read_only);
    }

    #[test]
    fn test_config_flag() {
        let cli = Cli::try_parse_from(["skiff", "-c", "/etc/skiff.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/skiff.toml")));
    }

    #[test]
    fn test_invalid_port_fails() {
        let result = Cli::try_parse_from(["skiff", "--port", "not-a-port"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "skiff",
            "/srv/share",
            "--port",
            "9000",
            "--read-only",
            "--include-hidden",
            "-v",
        ])
        .unwrap();

        let mut config = Config::default();
        cli.apply_to(&mut config);

        assert_eq!(config.share.root, PathBuf::from("/srv/share"));
        assert_eq!(config.server.port, 9000);
        assert!(config.share.read_only);
        assert!(!config.share.skip_hidden);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_unset_flags_keep_config_values() {
        let cli = Cli::try_parse_from(["skiff"]).unwrap();

        let mut config = Config::default();
        config.server.port = 4444;
        config.share.read_only = true;
        cli.apply_to(&mut config);

        assert_eq!(config.server.port, 4444);
        assert!(config.share.read_only);
    }
}
