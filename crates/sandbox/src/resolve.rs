//! Untrusted path resolution against the shared root.
//!
//! This module turns a client-supplied path string (from a URL path or
//! an RPC argument) into a verified absolute filesystem path, or rejects
//! it. Everything else in the crate consumes the [`Resolved`] values
//! produced here; nothing else can construct one.
//!
//! # Security
//!
//! The hidden-segment check runs in two phases and both are load
//! bearing: the raw request string is inspected *before* symlinks are
//! resolved (a hidden segment could otherwise hide behind a symlink),
//! and the symlink-resolved path is checked against the root boundary
//! *after*. Collapsing either phase into the other reopens a bypass.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::policy::Policy;

/// Rejection of an untrusted path.
///
/// Deliberately carries no detail: traversal, hidden-segment, and
/// symlink rejections are indistinguishable to the caller so the error
/// cannot be used as a sandbox-probing oracle. The reason is logged at
/// debug level server-side.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid path")]
pub struct ResolveError(());

/// An absolute filesystem path verified to lie within the shared root.
///
/// Only [`Policy::resolve`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved(PathBuf);

impl Resolved {
    /// The verified absolute path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for Resolved {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Policy {
    /// Resolve an untrusted path string to a verified location.
    ///
    /// `raw` is the percent-decoded request path, prefix included, e.g.
    /// `/sub/file.txt` or `/files/sub/` when mounted under `/files/`.
    ///
    /// The steps, in order:
    /// 1. Strip the route prefix; a missing prefix is malformed.
    /// 2. Join the remainder onto the root lexically, collapsing `.`
    ///    and `..` without touching the filesystem.
    /// 3. Reject unless the result still lies under the root.
    /// 4. When hidden files are skipped, reject any `/.`-prefixed
    ///    segment in the *raw* string (pre-canonicalization phase).
    /// 5. When symlinks are not followed, resolve them best-effort and
    ///    reject if the real path escapes the root. A target that does
    ///    not exist yet is fine here; later filesystem calls surface it.
    pub fn resolve(&self, raw: &str) -> Result<Resolved, ResolveError> {
        let rel = match raw.strip_prefix(self.prefix()) {
            Some(rel) => rel,
            None if raw == self.prefix().trim_end_matches('/') => "",
            None => return reject(raw, "outside route prefix"),
        };

        let candidate = lexical_absolute(&self.root().join(rel));
        if !candidate.starts_with(self.root()) {
            return reject(raw, "escapes root");
        }

        if self.skips_hidden() && raw.contains("/.") {
            return reject(raw, "hidden segment");
        }

        if !self.follows_symlinks() {
            // Best-effort: canonicalize fails for paths that do not
            // exist yet (fresh upload targets, mkdirp arguments) and
            // that is not a rejection.
            if let Ok(real) = candidate.canonicalize() {
                if !real.starts_with(self.root()) {
                    return reject(raw, "symlink escapes root");
                }
            }
        }

        Ok(Resolved(candidate))
    }
}

fn reject(raw: &str, reason: &str) -> Result<Resolved, ResolveError> {
    tracing::debug!(path = raw, reason, "rejected path");
    Err(ResolveError(()))
}

/// Normalize an absolute path lexically: collapse `.` and `..` segments
/// without consulting the filesystem. `..` is allowed to climb past the
/// root's own components so that traversal attempts land *outside* the
/// shared root and fail the boundary check, rather than being silently
/// clamped inside it.
fn lexical_absolute(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {
                out.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                // pop() is a no-op at the filesystem root.
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn policy(dir: &TempDir) -> Policy {
        Policy::new(dir.path()).unwrap()
    }

    #[test]
    fn test_resolve_root() {
        let dir = TempDir::new().unwrap();
        let resolved = policy(&dir).resolve("/").unwrap();
        assert_eq!(resolved.as_path(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_plain_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let resolved = policy(&dir).resolve("/a.txt").unwrap();
        assert!(resolved.as_path().ends_with("a.txt"));
        assert!(resolved.as_path().starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_resolve_nonexistent_is_fine() {
        // Upload destinations and mkdirp arguments do not exist yet.
        let dir = TempDir::new().unwrap();
        assert!(policy(&dir).resolve("/new-dir/new-file.bin").is_ok());
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let p = policy(&dir);

        assert!(p.resolve("/../etc/passwd").is_err());
        assert!(p.resolve("/../../../../etc/passwd").is_err());
        assert!(p.resolve("/sub/../../etc/passwd").is_err());
    }

    #[test]
    fn test_inside_traversal_caught_by_hidden_check() {
        // `..` is itself a `.`-prefixed segment, so even traversal that
        // stays inside the root is rejected while hidden files are
        // skipped. With the hidden filter off it collapses cleanly.
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();

        assert!(policy(&dir).resolve("/sub/../a.txt").is_err());

        let resolved = policy(&dir)
            .skip_hidden(false)
            .resolve("/sub/../a.txt")
            .unwrap();
        assert!(resolved.as_path().ends_with("a.txt"));
    }

    #[test]
    fn test_sibling_prefix_not_confused_with_root() {
        // `/tmp/xyz-evil` must not pass a boundary check for `/tmp/xyz`.
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("share");
        fs::create_dir(&root).unwrap();
        fs::create_dir(parent.path().join("share-evil")).unwrap();

        let p = Policy::new(&root).unwrap();
        assert!(p.resolve("/../share-evil/x").is_err());
    }

    #[test]
    fn test_hidden_segment_rejected() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let p = policy(&dir);

        assert!(p.resolve("/.git").is_err());
        assert!(p.resolve("/.git/config").is_err());
        assert!(p.resolve("/sub/.hidden").is_err());
    }

    #[test]
    fn test_hidden_segment_allowed_when_not_skipping() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let p = policy(&dir).skip_hidden(false);
        assert!(p.resolve("/.git").is_ok());
    }

    #[test]
    fn test_hidden_check_applies_to_missing_targets() {
        // The raw-string phase fires regardless of what the segment is.
        let dir = TempDir::new().unwrap();
        assert!(policy(&dir).resolve("/.does-not-exist").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        use std::os::unix::fs::symlink;

        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret"), "s").unwrap();
        let dir = TempDir::new().unwrap();
        symlink(outside.path().join("secret"), dir.path().join("leak")).unwrap();

        let p = policy(&dir);
        assert!(p.resolve("/leak").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_allowed_when_following() {
        use std::os::unix::fs::symlink;

        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret"), "s").unwrap();
        let dir = TempDir::new().unwrap();
        symlink(outside.path().join("secret"), dir.path().join("leak")).unwrap();

        let p = policy(&dir).follow_symlinks(true);
        assert!(p.resolve("/leak").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_allowed() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real"), "x").unwrap();
        symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        assert!(policy(&dir).resolve("/alias").is_ok());
    }

    #[test]
    fn test_route_prefix_required() {
        let dir = TempDir::new().unwrap();
        let p = policy(&dir).route_prefix("/files/");

        assert!(p.resolve("/files/a.txt").is_ok());
        assert!(p.resolve("/other/a.txt").is_err());
        assert!(p.resolve("a.txt").is_err());
        // The bare mount point (no trailing slash) is the share root.
        assert!(p.resolve("/files").is_ok());
    }

    #[test]
    fn test_lexical_absolute() {
        assert_eq!(
            lexical_absolute(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(
            lexical_absolute(Path::new("/a/../../..")),
            PathBuf::from("/")
        );
    }
}
