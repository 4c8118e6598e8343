//! Skiff daemon library.
//!
//! Serves one directory tree over HTTP: listings, raw file bytes, zip
//! downloads of subtrees, and (unless read-only) mutations and uploads.
//! All path decisions are delegated to the `sandbox` crate; this crate
//! owns configuration, routing, and presentation.
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with env overrides
//! - [`router`]: axum routes and request handlers
//! - [`ui`]: HTML rendering of directory listings

pub mod config;
pub mod router;
pub mod ui;

pub use config::{default_config_path, Config, ConfigError};
pub use router::{build, AppState};
