//! Index storage.
//!
//! The [`FileStore`] trait is the contract the ingestion and query paths
//! use: append a record, run a read query, count rows. [`SqliteStore`] is
//! the on-disk implementation.
//!
//! Implementations must be `Send + Sync`: an ingestion run calls
//! [`FileStore::insert`] from one task per file, concurrently. Writes must be
//! linearized by the store so that none are lost.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, Row, SqlitePool, TypeInfo, ValueRef};
use tokio::sync::Mutex;

use crate::db;
use crate::error::{IndexError, Result};
use crate::migrate;
use crate::models::{FieldValue, FileRecord, ResultSet};

/// Abstract storage backend for file fingerprints.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Append one record and return its id.
    ///
    /// Fails with [`IndexError::Insert`].
    async fn insert(&self, source: &str, path: &Path, hash: &str) -> Result<i64>;

    /// Run a caller-supplied read statement verbatim.
    async fn query(&self, sql: &str) -> Result<ResultSet>;

    /// Number of records, optionally restricted to one source tag.
    async fn count(&self, source: Option<&str>) -> Result<i64>;

    /// On-disk files backing this store, which an ingestion walk must skip.
    fn backing_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// SQLite implementation of [`FileStore`].
///
/// Holds the pool plus a write gate: inserts are serialized through the
/// gate, reads are not.
pub struct SqliteStore {
    path: PathBuf,
    pool: SqlitePool,
    write_gate: Mutex<()>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    ///
    /// With `truncate`, an existing store file and its sidecars are deleted
    /// first. The `files` table is created if absent.
    pub async fn open(path: &Path, truncate: bool) -> Result<Self> {
        let open_err = |message: String| IndexError::StoreOpen {
            path: path.to_path_buf(),
            message,
        };

        if truncate && db::remove_store_files(path).map_err(|e| open_err(e.to_string()))? {
            tracing::info!(path = %path.display(), "truncated index store");
        }

        let pool = db::connect(path)
            .await
            .map_err(|e| open_err(e.to_string()))?;
        migrate::run_migrations(&pool)
            .await
            .map_err(|e| open_err(e.to_string()))?;

        tracing::info!(path = %path.display(), "opened index store");

        Ok(Self {
            path: path.to_path_buf(),
            pool,
            write_gate: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in insertion order, optionally restricted to one source.
    pub async fn records(&self, source: Option<&str>) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            "SELECT id, source, path, hash FROM files WHERE ?1 IS NULL OR source = ?1 ORDER BY id",
        )
        .bind(source)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| FileRecord {
                id: row.get("id"),
                source: row.get("source"),
                path: row.get("path"),
                hash: row.get("hash"),
            })
            .collect())
    }

    /// Release the connection pool.
    ///
    /// Consumes the store, so it can only happen once. The WAL is
    /// checkpointed first so the store file is self-contained afterwards.
    pub async fn close(self) -> Result<()> {
        let checkpoint = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await;
        self.pool.close().await;

        checkpoint.map_err(|e| IndexError::StoreClose(e.to_string()))?;
        tracing::debug!(path = %self.path.display(), "closed index store");
        Ok(())
    }
}

#[async_trait]
impl FileStore for SqliteStore {
    async fn insert(&self, source: &str, path: &Path, hash: &str) -> Result<i64> {
        // Lossy conversion would let distinct files share one stored path
        let path_text = path.to_str().ok_or_else(|| IndexError::Insert {
            path: path.to_path_buf(),
            message: "path is not valid UTF-8".to_string(),
        })?;

        let _guard = self.write_gate.lock().await;

        let result = sqlx::query("INSERT INTO files (source, path, hash) VALUES (?, ?, ?)")
            .bind(source)
            .bind(path_text)
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::Insert {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(result.last_insert_rowid())
    }

    async fn query(&self, sql: &str) -> Result<ResultSet> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => {
                // No rows to read names from; ask the engine for the statement shape
                let describe = (&self.pool).describe(sql).await?;
                describe
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            }
        };

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut fields = Vec::with_capacity(columns.len());
            for idx in 0..row.len() {
                fields.push(decode_field(row, idx)?);
            }
            data.push(fields);
        }

        Ok(ResultSet {
            columns,
            rows: data,
        })
    }

    async fn count(&self, source: Option<&str>) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE ?1 IS NULL OR source = ?1")
                .bind(source)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    fn backing_files(&self) -> Vec<PathBuf> {
        db::backing_files(&self.path)
    }
}

/// Decode one column by the storage class of its value.
fn decode_field(row: &SqliteRow, idx: usize) -> Result<FieldValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => FieldValue::Integer(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" => FieldValue::Real(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => FieldValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        _ => FieldValue::Text(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_temp(tmp: &TempDir) -> SqliteStore {
        SqliteStore::open(&tmp.path().join("index.db"), false)
            .await
            .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_path_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        let store = open_temp(&tmp).await;
        let path = tmp.path().join(OsStr::from_bytes(b"bad\xff.txt"));

        let err = store
            .insert("t1", &path, "49f68a5c8493ec2c0bf489821c21fc3b")
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::Insert { .. }));
        assert!(err.is_per_file());
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let tmp = TempDir::new().unwrap();
        let store = open_temp(&tmp).await;

        let first = store.insert("t1", Path::new("a.txt"), "aa").await.unwrap();
        let second = store.insert("t1", Path::new("b.txt"), "bb").await.unwrap();
        assert!(second > first);

        let records = store.records(None).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "a.txt");
        assert_eq!(records[1].hash, "bb");
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicates_are_appended() {
        let tmp = TempDir::new().unwrap();
        let store = open_temp(&tmp).await;

        store.insert("t1", Path::new("a.txt"), "aa").await.unwrap();
        store.insert("t1", Path::new("a.txt"), "aa").await.unwrap();

        assert_eq!(store.count(Some("t1")).await.unwrap(), 2);
        assert_eq!(store.count(Some("other")).await.unwrap(), 0);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_keeps_rows_and_truncate_drops_them() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.db");

        let store = SqliteStore::open(&path, false).await.unwrap();
        store.insert("t1", Path::new("a.txt"), "aa").await.unwrap();
        store.close().await.unwrap();

        let store = SqliteStore::open(&path, false).await.unwrap();
        assert_eq!(store.count(None).await.unwrap(), 1);
        store.close().await.unwrap();

        let store = SqliteStore::open(&path, true).await.unwrap();
        assert_eq!(store.count(None).await.unwrap(), 0);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_inserts_are_not_lost() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(open_temp(&tmp).await);

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..200 {
            let store = Arc::clone(&store);
            tasks.spawn(async move {
                let path = PathBuf::from(format!("f{i}.txt"));
                store.insert("t1", &path, "00").await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        assert_eq!(store.count(None).await.unwrap(), 200);
    }

    #[tokio::test]
    async fn query_returns_columns_and_typed_fields() {
        let tmp = TempDir::new().unwrap();
        let store = open_temp(&tmp).await;
        store.insert("t1", Path::new("a.txt"), "aa").await.unwrap();

        let rs = store
            .query("select id, source, 1.5 as ratio, null as nothing, x'ff' as raw from files")
            .await
            .unwrap();

        assert_eq!(rs.columns, vec!["id", "source", "ratio", "nothing", "raw"]);
        assert_eq!(rs.row_count(), 1);
        assert_eq!(rs.rows[0][0], FieldValue::Integer(1));
        assert_eq!(rs.rows[0][1], FieldValue::Text("t1".to_string()));
        assert_eq!(rs.rows[0][2], FieldValue::Real(1.5));
        assert_eq!(rs.rows[0][3], FieldValue::Null);
        assert_eq!(rs.rows[0][4], FieldValue::Blob(vec![0xff]));
        assert_eq!(rs.field(0, 4).as_deref(), Some("x'ff'"));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_result_still_has_columns() {
        let tmp = TempDir::new().unwrap();
        let store = open_temp(&tmp).await;

        let rs = store.query("select source, path from files").await.unwrap();
        assert_eq!(rs.columns, vec!["source", "path"]);
        assert!(rs.rows.is_empty());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn bad_sql_surfaces_engine_error() {
        let tmp = TempDir::new().unwrap();
        let store = open_temp(&tmp).await;

        let err = store.query("select nope from files").await.unwrap_err();
        assert!(matches!(err, IndexError::Sql(_)));
        assert!(err.to_string().contains("no such column"));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn unopenable_path_is_store_open_error() {
        let tmp = TempDir::new().unwrap();
        // A directory cannot be opened as a database file
        let err = SqliteStore::open(tmp.path(), false).await.err().unwrap();
        assert!(matches!(err, IndexError::StoreOpen { .. }));
    }
}
