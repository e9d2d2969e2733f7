//! Recursive directory traversal.
//!
//! [`walk`] enumerates the entries under a root with `walkdir` and hands each
//! payload entry to a visitor. Only regular files are payload: directories
//! are skipped unless [`WalkOptions::include_dirs`] is set, and FIFOs,
//! sockets and devices are always skipped. Paths listed in
//! [`WalkOptions::exclude`] are never yielded.
//!
//! Symlinks are not descended into unless `follow_symlinks` is set. A symlink
//! entry that resolves to a file is yielded; one that resolves to a directory
//! is treated as a directory; a dangling one is yielded so the consumer sees
//! the read failure.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{IndexError, Result};

/// A single entry handed to the walk visitor.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    /// Size in bytes (0 when metadata is unavailable).
    pub len: u64,
}

#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub recursive: bool,
    pub include_dirs: bool,
    pub follow_symlinks: bool,
    /// Paths never yielded, compared after normalization.
    pub exclude: Vec<PathBuf>,
    /// Globs matched against the path relative to the root.
    pub exclude_globs: Vec<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            include_dirs: false,
            follow_symlinks: false,
            exclude: Vec::new(),
            exclude_globs: Vec::new(),
        }
    }
}

/// Walk `root`, invoking `visit` for every payload entry.
///
/// Fails with [`IndexError::Walk`] if the root does not exist or cannot be
/// read. Unreadable entries below the root are logged and skipped. An error
/// returned by the visitor stops the walk and is returned as-is.
pub fn walk<F>(root: &Path, options: &WalkOptions, mut visit: F) -> Result<()>
where
    F: FnMut(&WalkEntry) -> Result<()>,
{
    let root_meta = std::fs::metadata(root).map_err(|e| IndexError::Walk {
        root: root.to_path_buf(),
        message: e.to_string(),
    })?;

    let excluded = Exclusions::new(&options.exclude);
    let globs = build_globset(&options.exclude_globs).map_err(|e| IndexError::Walk {
        root: root.to_path_buf(),
        message: e.to_string(),
    })?;

    if !root_meta.is_dir() {
        if !root_meta.is_file() {
            tracing::debug!(path = %root.display(), "root is not a regular file");
            return Ok(());
        }
        // A single file root is its own payload
        let entry = WalkEntry {
            path: root.to_path_buf(),
            is_dir: false,
            len: root_meta.len(),
        };
        if !excluded.contains(&entry.path) {
            visit(&entry)?;
        }
        return Ok(());
    }

    let mut walker = WalkDir::new(root).follow_links(options.follow_symlinks);
    if !options.recursive {
        walker = walker.max_depth(1);
    }

    for item in walker {
        let dent = match item {
            Ok(dent) => dent,
            Err(e) if e.depth() == 0 => {
                return Err(IndexError::Walk {
                    root: root.to_path_buf(),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if dent.depth() == 0 {
            continue;
        }

        let path = dent.path();
        let file_type = dent.file_type();

        let (is_dir, is_file, len) = if file_type.is_symlink() {
            // Resolve the link target; dangling links stay payload
            match std::fs::metadata(path) {
                Ok(meta) => (meta.is_dir(), meta.is_file(), meta.len()),
                Err(_) => (false, true, 0),
            }
        } else {
            let len = dent.metadata().map(|m| m.len()).unwrap_or(0);
            (file_type.is_dir(), file_type.is_file(), len)
        };

        if is_dir {
            if !options.include_dirs {
                continue;
            }
        } else if !is_file {
            // FIFOs, sockets and devices block or never reach EOF
            tracing::debug!(path = %path.display(), "skipping special file");
            continue;
        }

        if !globs.is_empty() {
            let relative = path.strip_prefix(root).unwrap_or(path);
            if globs.is_match(relative) {
                tracing::debug!(path = %path.display(), "excluded by glob");
                continue;
            }
        }

        if excluded.contains(path) {
            tracing::debug!(path = %path.display(), "excluded");
            continue;
        }

        visit(&WalkEntry {
            path: path.to_path_buf(),
            is_dir,
            len,
        })?;
    }

    Ok(())
}

/// Normalize a path for identity comparison.
///
/// Canonicalizes when the path exists; otherwise canonicalizes the parent and
/// re-attaches the file name, so paths of files not yet created still match.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

/// Excluded paths, indexed by file name so most entries skip normalization.
struct Exclusions {
    names: HashSet<OsString>,
    paths: HashSet<PathBuf>,
}

impl Exclusions {
    fn new(paths: &[PathBuf]) -> Self {
        Self {
            names: paths
                .iter()
                .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
                .collect(),
            paths: paths.iter().map(|p| normalize_path(p)).collect(),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) if self.names.contains(name) => {
                self.paths.contains(&normalize_path(path))
            }
            _ => false,
        }
    }
}

fn build_globset(patterns: &[String]) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}
