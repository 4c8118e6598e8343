//! Directory listing for the presentation layer.
//!
//! Produces the entry set for one directory: hidden and symlink filters
//! applied per policy, case-insensitive ordering, folders and files
//! partitioned, and a synthetic parent entry when the listed directory
//! is not the share root itself.

use std::fs;
use std::io;

use tracing::warn;

use crate::policy::Policy;
use crate::resolve::Resolved;

/// One listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Entry name (no path).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes. `None` for directories.
    pub size: Option<u64>,
    /// Lowercase extension after the last `.`; empty when absent or for
    /// directories.
    pub ext: String,
}

/// Entries of one directory, folders and files separated, each sorted
/// case-insensitively ascending by name.
#[derive(Debug, Default)]
pub struct Listing {
    pub folders: Vec<Entry>,
    pub files: Vec<Entry>,
}

/// List the immediate children of a verified directory.
///
/// Each child is re-stat'ed individually rather than trusting the bulk
/// read: an entry vanishing between enumeration and inspection is
/// skipped with a warning, not a request failure. A failure to read the
/// directory itself is terminal.
pub fn list(policy: &Policy, dir: &Resolved) -> io::Result<Listing> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir.as_path())? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if policy.skips_hidden() && name.starts_with('.') {
            continue;
        }
        if !policy.follows_symlinks() {
            match entry.file_type() {
                Ok(ft) if ft.is_symlink() => continue,
                Ok(_) => {}
                Err(err) => {
                    warn!(name, %err, "cannot inspect entry, skipping");
                    continue;
                }
            }
        }

        // Re-stat; follows symlinks, which only remain here when the
        // policy allows them.
        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(err) => {
                warn!(name, %err, "cannot stat entry, skipping");
                continue;
            }
        };

        let is_dir = meta.is_dir();
        children.push(Entry {
            ext: if is_dir { String::new() } else { extension(&name) },
            size: if is_dir { None } else { Some(meta.len()) },
            name,
            is_dir,
        });
    }

    children.sort_by_key(|e| e.name.to_lowercase());

    let mut listing = Listing::default();
    if dir.as_path() != policy.root() {
        listing.folders.push(Entry {
            name: "..".to_string(),
            is_dir: true,
            size: None,
            ext: String::new(),
        });
    }
    for entry in children {
        if entry.is_dir {
            listing.folders.push(entry);
        } else {
            listing.files.push(entry);
        }
    }
    Ok(listing)
}

/// Lowercase extension after the last `.`, empty when there is none.
fn extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}
