//! Streamed zip archives of a subtree.
//!
//! Walks a verified subtree depth-first and writes a flat zip archive
//! directly to the output as it goes: no directory entries, no
//! temporary file, no in-memory buffering of the archive. Entries are
//! stored uncompressed on purpose, trading size for throughput on
//! content that is typically compressed already.
//!
//! Because bytes for earlier entries have been flushed to the client by
//! the time a later entry fails, an error mid-walk necessarily leaves
//! the response truncated. That is the accepted failure mode of the
//! streaming design.

use std::path::{Component, Path, PathBuf};

use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio_util::compat::TokioAsyncReadCompatExt;
use walkdir::WalkDir;

use crate::policy::Policy;
use crate::resolve::Resolved;

/// Errors aborting an archive stream.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A symlink was encountered anywhere in the subtree. The walk does
    /// not follow symlinks, and silently skipping one would make the
    /// archive differ from what the listing promises, so the whole
    /// stream is aborted instead.
    #[error("symlink not allowed in zip downloads: {0}")]
    Symlink(PathBuf),

    /// The walk itself failed (permissions, vanished entry).
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Writing the archive failed.
    #[error("zip error: {0}")]
    Zip(#[from] async_zip::error::ZipError),

    /// Reading a file or writing to the output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stream the subtree rooted at `subtree` as a stored zip archive into
/// `out`.
///
/// Entry names are relative to `subtree` with forward slashes on every
/// platform. Hidden entries are pruned (including whole hidden
/// directories) when the policy skips hidden files.
pub async fn write_zip<W>(
    policy: &Policy,
    subtree: &Resolved,
    out: W,
) -> Result<(), ArchiveError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = ZipFileWriter::with_tokio(out);

    let mut walk = WalkDir::new(subtree.as_path()).into_iter();
    while let Some(entry) = walk.next() {
        let entry = entry?;

        if entry.path_is_symlink() {
            return Err(ArchiveError::Symlink(entry.path().to_path_buf()));
        }

        let rel = match entry.path().strip_prefix(subtree.as_path()) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue, // the subtree root itself
        };

        if policy.skips_hidden() && has_hidden_component(rel) {
            if entry.file_type().is_dir() {
                walk.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_dir() {
            continue; // directories are implied by entry paths
        }

        let name = slash_path(rel);
        let builder = ZipEntryBuilder::new(name.into(), Compression::Stored);
        let mut entry_writer = writer.write_entry_stream(builder).await?;

        let file = tokio::fs::File::open(entry.path()).await?;
        futures_util::io::copy(file.compat(), &mut entry_writer).await?;
        entry_writer.close().await?;
    }

    writer.close().await?;
    Ok(())
}

fn has_hidden_component(rel: &Path) -> bool {
    rel.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Join path components with `/` regardless of host convention, keeping
/// archive contents identical across platforms.
fn slash_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
