//! # hashdex
//!
//! Index files under a directory tree by content fingerprint, and query the
//! index with SQL.
//!
//! An ingestion run walks a tree, fingerprints every regular file (MD5 hex)
//! and appends one `(source, path, hash)` row per file to a SQLite table.
//! The source tag labels the batch. Rows are never deduplicated or updated:
//! ingesting the same tree twice doubles its rows.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────┐   ┌──────────────┐
//! │  Walker  │──▶│  Ingestor             │──▶│  SqliteStore │
//! │ walkdir  │   │ task per file:        │   │  files table │
//! └──────────┘   │ fingerprint + insert  │   └──────┬───────┘
//!                └───────────────────────┘          │
//!                                                   ▼
//!                                            ┌──────────────┐
//!                                            │  run_query   │
//!                                            │ table / JSON │
//!                                            └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`fingerprint`] | Streaming content digests |
//! | [`walker`] | Recursive directory traversal |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`store`] | Store trait and SQLite implementation |
//! | [`ingest`] | Concurrent ingestion pipeline |
//! | [`query`] | Ad-hoc read queries |
//! | [`progress`] | Ingestion progress on stderr |

pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod query;
pub mod store;
pub mod walker;

pub use error::{IndexError, Result};
pub use ingest::{IngestOptions, IngestReport, Ingestor};
pub use store::{FileStore, SqliteStore};
