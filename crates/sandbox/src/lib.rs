//! # Skiff Sandbox Library
//!
//! This crate provides the sandboxed filesystem layer for Skiff,
//! confining every operation to a single shared root directory.
//!
//! ## Overview
//!
//! All components operate on a [`Policy`] built once at startup and on
//! [`Resolved`] paths that can only be produced by the resolver:
//!
//! - **Path Resolution**: Turn an untrusted, client-supplied path string
//!   into a verified location inside the shared root
//! - **Directory Listing**: Enumerate a directory with hidden-file and
//!   symlink filtering and stable ordering
//! - **Archive Streaming**: Stream a subtree as a flat, stored zip
//!   archive without buffering it in memory
//! - **Mutations**: Create directories, move entries, and remove
//!   subtrees through a single RPC dispatcher
//!
//! # Security
//!
//! The resolver is the only source of [`Resolved`] values. It rejects
//! traversal outside the root, hidden path segments when the policy
//! skips hidden files, and symlinks escaping the root when the policy
//! does not follow symlinks. Rejections are deliberately opaque: every
//! failure surfaces as the same `invalid path` error so that callers
//! cannot probe where the sandbox boundary lies.
//!
//! ## Modules
//!
//! - [`policy`]: Immutable per-process policy (root, prefix, flags)
//! - [`resolve`]: Untrusted path string to verified path
//! - [`list`]: Directory listing for the presentation layer
//! - [`archive`]: Streamed zip archives of subtrees
//! - [`ops`]: Mutation RPC dispatch (mkdirp, mv, rm)

pub mod archive;
pub mod list;
pub mod ops;
pub mod policy;
pub mod resolve;

pub use archive::{write_zip, ArchiveError};
pub use list::{list, Entry, Listing};
pub use ops::{dispatch, Call, OpError};
pub use policy::Policy;
pub use resolve::{Resolved, ResolveError};
