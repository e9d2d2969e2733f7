//! Ingestion pipeline orchestration.
//!
//! Coordinates one ingestion run: validate → walk → fingerprint → insert.
//! The walk runs on the blocking pool and launches one tokio task per
//! discovered file as it goes. Each task fingerprints its file and appends a
//! record to the store. The run returns once every launched task has
//! finished; the [`JoinSet`] holding them is the completion barrier.
//!
//! # Failure isolation
//!
//! A task that fails (unreadable file, rejected insert) is logged and
//! recorded in [`IngestReport::failures`]. It never aborts its siblings or
//! the run. Only validation and an unreadable walk root are fatal.
//!
//! # Concurrency
//!
//! By default nothing bounds the number of in-flight tasks. With
//! [`IngestOptions::max_concurrency`] set, a semaphore caps how many tasks
//! do file and store I/O at once; tasks are still launched one per file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{IndexError, Result};
use crate::fingerprint::fingerprint;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};
use crate::store::FileStore;
use crate::walker::{walk, WalkOptions};

/// Completed files between two progress events.
const PROGRESS_INTERVAL: u64 = 500;

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub follow_symlinks: bool,
    /// Upper bound on in-flight file tasks. `None` or `Some(0)` is unbounded.
    pub max_concurrency: Option<usize>,
    /// Relative-path globs to skip.
    pub exclude_globs: Vec<String>,
    /// Extra paths to skip, on top of the store's own backing files.
    pub exclude: Vec<PathBuf>,
}

/// A file that was discovered but not recorded.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: IndexError,
}

/// Outcome of one ingestion run.
#[derive(Debug)]
pub struct IngestReport {
    pub source: String,
    /// Files discovered by the walk (one task each).
    pub discovered: usize,
    /// Records written.
    pub inserted: usize,
    pub failures: Vec<FileFailure>,
    /// Tasks that ended without reporting, e.g. aborted at runtime shutdown.
    ///
    /// `discovered == inserted + failed() + cancelled` always holds.
    pub cancelled: usize,
}

impl IngestReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Drives ingestion runs against one store.
pub struct Ingestor {
    store: Arc<dyn FileStore>,
    options: IngestOptions,
    progress: Box<dyn IngestProgressReporter>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            store,
            options: IngestOptions::default(),
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn IngestProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Ingest every file under `root`, tagging records with `source`.
    ///
    /// Fails with [`IndexError::Validation`] before any I/O if `root` does
    /// not exist or `source` is empty, and with [`IndexError::Walk`] if the
    /// root cannot be read. Per-file failures are returned in the report.
    pub async fn ingest(&self, source: &str, root: &Path) -> Result<IngestReport> {
        validate(source, root)?;

        self.progress.report(IngestProgressEvent::Discovering {
            source: source.to_string(),
        });

        let tasks = self.launch(source, root).await?;
        let report = drain(source, tasks, self.progress.as_ref()).await;

        tracing::info!(
            source,
            discovered = report.discovered,
            inserted = report.inserted,
            failed = report.failed(),
            cancelled = report.cancelled,
            "ingestion finished"
        );

        Ok(report)
    }

    /// Walk `root` on the blocking pool, spawning one task per file.
    async fn launch(&self, source: &str, root: &Path) -> Result<JoinSet<FileResult>> {
        let mut exclude = self.store.backing_files();
        exclude.extend(self.options.exclude.iter().cloned());

        let walk_options = WalkOptions {
            recursive: true,
            include_dirs: false,
            follow_symlinks: self.options.follow_symlinks,
            exclude,
            exclude_globs: self.options.exclude_globs.clone(),
        };

        let limiter = self
            .options
            .max_concurrency
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));

        let handle = Handle::current();
        let store = Arc::clone(&self.store);
        let source: Arc<str> = Arc::from(source);
        let walk_root = root.to_path_buf();

        let walked = tokio::task::spawn_blocking(move || -> Result<JoinSet<FileResult>> {
            let mut tasks = JoinSet::new();
            walk(&walk_root, &walk_options, |entry| {
                tasks.spawn_on(
                    process_file(
                        Arc::clone(&store),
                        Arc::clone(&source),
                        entry.path.clone(),
                        limiter.clone(),
                    ),
                    &handle,
                );
                Ok(())
            })?;
            Ok(tasks)
        })
        .await;

        match walked {
            Ok(tasks) => tasks,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(IndexError::Walk {
                root: root.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }
}

type FileResult = std::result::Result<(), FileFailure>;

/// Wait for every task in `tasks`, tallying each into the report.
///
/// A panicking task re-raises its panic here. A task that was cancelled
/// counts toward [`IngestReport::cancelled`].
async fn drain(
    source: &str,
    mut tasks: JoinSet<FileResult>,
    progress: &dyn IngestProgressReporter,
) -> IngestReport {
    let discovered = tasks.len();
    let mut report = IngestReport {
        source: source.to_string(),
        discovered,
        inserted: 0,
        failures: Vec::new(),
        cancelled: 0,
    };

    let mut done = 0u64;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => report.inserted += 1,
            Ok(Err(failure)) => {
                tracing::warn!(
                    path = %failure.path.display(),
                    error = %failure.error,
                    "skipping file"
                );
                report.failures.push(failure);
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::error!(error = %e, "ingest task cancelled");
                report.cancelled += 1;
            }
        }

        done += 1;
        if done % PROGRESS_INTERVAL == 0 || done == discovered as u64 {
            progress.report(IngestProgressEvent::Ingesting {
                source: source.to_string(),
                n: done,
                total: discovered as u64,
            });
        }
    }

    report
}

/// Fingerprint one file and append its record.
async fn process_file(
    store: Arc<dyn FileStore>,
    source: Arc<str>,
    path: PathBuf,
    limiter: Option<Arc<Semaphore>>,
) -> FileResult {
    let _permit = match limiter {
        Some(semaphore) => semaphore.acquire_owned().await.ok(),
        None => None,
    };

    let hash = match fingerprint(&path).await {
        Ok(hash) => hash,
        Err(error) => return Err(FileFailure { path, error }),
    };

    match store.insert(&source, &path, &hash).await {
        Ok(id) => {
            tracing::debug!(id, path = %path.display(), %hash, "recorded");
            Ok(())
        }
        Err(error) => Err(FileFailure { path, error }),
    }
}

fn validate(source: &str, root: &Path) -> Result<()> {
    if !root.exists() {
        return Err(IndexError::Validation(format!(
            "directory not found: {}",
            root.display()
        )));
    }
    if source.trim().is_empty() {
        return Err(IndexError::Validation("source tag is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_missing_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = validate("t1", &tmp.path().join("missing")).unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));
        assert!(err.to_string().contains("directory not found"));
    }

    #[test]
    fn validation_rejects_blank_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            validate("", tmp.path()),
            Err(IndexError::Validation(_))
        ));
        assert!(matches!(
            validate("  ", tmp.path()),
            Err(IndexError::Validation(_))
        ));
        assert!(validate("t1", tmp.path()).is_ok());
    }

    #[tokio::test]
    async fn drain_accounts_for_every_task() {
        let mut tasks: JoinSet<FileResult> = JoinSet::new();
        tasks.spawn(async { Ok(()) });
        tasks.spawn(async {
            Err(FileFailure {
                path: PathBuf::from("/tmp/gone.txt"),
                error: IndexError::Validation("gone".to_string()),
            })
        });
        let stuck = tasks.spawn(std::future::pending());
        stuck.abort();

        let report = drain("t1", tasks, &NoProgress).await;

        assert_eq!(report.discovered, 3);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.cancelled, 1);
        assert_eq!(
            report.discovered,
            report.inserted + report.failed() + report.cancelled
        );
    }
}
