//! Immutable per-process sharing policy.
//!
//! A [`Policy`] is built once at startup from the configuration and then
//! shared read-only across all requests. It carries the canonical shared
//! root, the URL prefix the share is mounted under, and the three
//! behaviour switches (hidden files, symlinks, read-only mode).

use std::io;
use std::path::{Path, PathBuf};

/// Immutable sharing policy for one daemon process.
///
/// The root is canonicalized at construction so that later boundary
/// checks compare against a stable absolute path.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Canonical absolute path bounding all filesystem access.
    root: PathBuf,
    /// URL prefix the share is mounted under. Starts and ends with `/`.
    route_prefix: String,
    /// Skip path segments starting with `.` (default: true).
    skip_hidden: bool,
    /// Follow symlinks out of the root (default: false).
    follow_symlinks: bool,
    /// Disable all mutating operations (default: false).
    read_only: bool,
}

impl Policy {
    /// Create a policy rooted at `root`.
    ///
    /// The path is canonicalized; it must exist. Defaults: prefix `/`,
    /// hidden files skipped, symlinks not followed, writes allowed.
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self {
            root,
            route_prefix: "/".to_string(),
            skip_hidden: true,
            follow_symlinks: false,
            read_only: false,
        })
    }

    /// Set the URL prefix the share is mounted under.
    ///
    /// The caller is responsible for passing a prefix that starts and
    /// ends with `/`; the daemon validates this at config load.
    pub fn route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    /// Set whether hidden path segments are rejected and filtered.
    pub fn skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    /// Set whether symlinks may escape the root.
    ///
    /// When disabled (the default), resolution rejects paths whose
    /// symlink-resolved form lies outside the root, and listings do not
    /// show symlinked entries.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set read-only mode.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// The canonical shared root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The URL prefix the share is mounted under.
    pub fn prefix(&self) -> &str {
        &self.route_prefix
    }

    /// Whether hidden path segments are rejected and filtered.
    pub fn skips_hidden(&self) -> bool {
        self.skip_hidden
    }

    /// Whether symlinks may escape the root.
    pub fn follows_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    /// Whether mutating operations are disabled.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let policy = Policy::new(dir.path()).unwrap();

        assert_eq!(policy.prefix(), "/");
        assert!(policy.skips_hidden());
        assert!(!policy.follows_symlinks());
        assert!(!policy.is_read_only());
    }

    #[test]
    fn test_root_is_canonicalized() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let policy = Policy::new(dir.path().join("sub").join("..")).unwrap();
        assert_eq!(policy.root(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_missing_root_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(Policy::new(dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_builders() {
        let dir = TempDir::new().unwrap();
        let policy = Policy::new(dir.path())
            .unwrap()
            .route_prefix("/files/")
            .skip_hidden(false)
            .follow_symlinks(true)
            .read_only(true);

        assert_eq!(policy.prefix(), "/files/");
        assert!(!policy.skips_hidden());
        assert!(policy.follows_symlinks());
        assert!(policy.is_read_only());
    }
}
