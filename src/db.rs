//! SQLite database connection management.
//!
//! Provides a connection pool to the on-disk index with WAL mode enabled so
//! a query can read while an ingestion run writes. The database file and its
//! parent directories are created automatically if they don't exist.
//!
//! # Backing files
//!
//! A store at `hashdex.db` may also own `hashdex.db-wal`, `hashdex.db-shm`
//! and `hashdex.db-journal`. Truncation removes all of them, and the
//! ingestion walk excludes all of them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// Create a connection pool to the SQLite database at `path`.
///
/// - Creates the database file and parent directories if they don't exist.
/// - Enables WAL journal mode and a busy timeout.
/// - Returns a pool with up to 5 connections.
pub async fn connect(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// The store file followed by every sidecar SQLite may create next to it.
pub fn backing_files(path: &Path) -> Vec<PathBuf> {
    let mut files = vec![path.to_path_buf()];
    for suffix in SIDECAR_SUFFIXES {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        files.push(PathBuf::from(name));
    }
    files
}

/// Delete the store file and its sidecars.
///
/// Returns `true` if the store file itself existed.
pub fn remove_store_files(path: &Path) -> std::io::Result<bool> {
    let existed = path.exists();
    for file in backing_files(path) {
        match std::fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(existed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backing_files_include_sidecars() {
        let files = backing_files(Path::new("/data/index.db"));
        assert_eq!(
            files,
            vec![
                PathBuf::from("/data/index.db"),
                PathBuf::from("/data/index.db-wal"),
                PathBuf::from("/data/index.db-shm"),
                PathBuf::from("/data/index.db-journal"),
            ]
        );
    }

    #[test]
    fn remove_reports_whether_store_existed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("index.db");

        assert!(!remove_store_files(&path).unwrap());

        std::fs::write(&path, b"x").unwrap();
        std::fs::write(tmp.path().join("index.db-wal"), b"x").unwrap();
        assert!(remove_store_files(&path).unwrap());
        assert!(!path.exists());
        assert!(!tmp.path().join("index.db-wal").exists());
    }
}
