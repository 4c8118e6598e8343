//! Mutation RPC dispatch.
//!
//! Decodes the JSON call body (`{"call": "...", "args": [...]}`) and
//! performs the requested mutation. Every path argument goes through
//! the resolver on its own; in particular both ends of a move must
//! individually satisfy the sandbox boundary, so one valid argument can
//! never smuggle the other outside.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::policy::Policy;
use crate::resolve::ResolveError;

/// A decoded mutation request.
#[derive(Debug, Clone, Deserialize)]
pub struct Call {
    /// Operation name: `mkdirp`, `mv`, or `rm`.
    pub call: String,
    /// Raw path arguments, resolved at dispatch time.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Errors from mutation dispatch.
#[derive(Debug, Error)]
pub enum OpError {
    /// A path argument failed resolution.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The call name is not one of the known operations.
    #[error("unknown call: {0}")]
    UnknownCall(String),

    /// The call is missing a path argument.
    #[error("missing argument for {0}")]
    MissingArg(&'static str),

    /// The filesystem operation itself failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Perform one mutation. The daemon only routes here when the policy is
/// not read-only.
pub fn dispatch(policy: &Policy, call: &Call) -> Result<(), OpError> {
    match call.call.as_str() {
        "mkdirp" => {
            let path = resolve_arg(policy, call, 0, "mkdirp")?;
            // create_dir_all succeeds if the directory already exists.
            fs::create_dir_all(path)?;
        }
        "mv" => {
            let src = resolve_arg(policy, call, 0, "mv")?;
            let dst = resolve_arg(policy, call, 1, "mv")?;
            fs::rename(src, dst)?;
        }
        "rm" => {
            let path = resolve_arg(policy, call, 0, "rm")?;
            remove_all(&path)?;
        }
        other => return Err(OpError::UnknownCall(other.to_string())),
    }
    Ok(())
}

fn resolve_arg(
    policy: &Policy,
    call: &Call,
    index: usize,
    op: &'static str,
) -> Result<std::path::PathBuf, OpError> {
    let raw = call.args.get(index).ok_or(OpError::MissingArg(op))?;
    Ok(policy.resolve(raw)?.as_path().to_path_buf())
}

/// Remove a file, symlink, or directory subtree. Removing a path that
/// does not exist is a successful no-op.
fn remove_all(path: &Path) -> std::io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
