//! Schema creation.
//!
//! The index has a single table and no schema versioning:
//!
//! ```text
//! files(id INTEGER PRIMARY KEY AUTOINCREMENT, source TEXT, path TEXT, hash TEXT)
//! ```
//!
//! There is deliberately no uniqueness constraint on `(source, path)` or
//! `(path, hash)`: re-ingesting a tree appends rows.

use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT,
            path TEXT,
            hash TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
