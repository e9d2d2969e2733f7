//! TOML configuration.
//!
//! Every field has a default, so the file is optional. Command-line flags
//! override whatever the file sets.
//!
//! ```toml
//! [db]
//! path = "hashdex.db"
//!
//! [ingest]
//! follow_symlinks = false
//! max_concurrency = 0
//! exclude_globs = ["**/.git/**"]
//!
//! [log]
//! level = "warn"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::Glob;
use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("hashdex.db")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngestConfig {
    #[serde(default)]
    pub follow_symlinks: bool,
    /// 0 means one unbounded task per file.
    #[serde(default)]
    pub max_concurrency: usize,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.db.path.as_os_str().is_empty() {
            anyhow::bail!("db.path must not be empty");
        }

        self.log
            .level
            .parse::<LevelFilter>()
            .map_err(|_| anyhow::anyhow!("log.level '{}' is not a log level", self.log.level))?;

        for pattern in &self.ingest.exclude_globs {
            Glob::new(pattern)
                .with_context(|| format!("ingest.exclude_globs: invalid glob '{}'", pattern))?;
        }

        Ok(())
    }
}
