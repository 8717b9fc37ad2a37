//! Runtime configuration.
//!
//! Resolution order, later wins: built-in defaults → `config.toml` in the
//! data directory → environment variables (`RESTUDY_BASE_URL`,
//! `RESTUDY_DATA_DIR`) → command-line flags.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default server address for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

const CONFIG_FILE: &str = "config.toml";

/// On-disk configuration shape.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolve configuration for the given data-dir and base-url
    /// overrides (typically CLI flags).
    pub fn resolve(data_dir: Option<PathBuf>, base_url: Option<String>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => match std::env::var_os("RESTUDY_DATA_DIR") {
                Some(dir) => PathBuf::from(dir),
                None => default_data_dir(),
            },
        };

        let file = load_config_file(&data_dir.join(CONFIG_FILE))?;

        let base_url = base_url
            .or_else(|| std::env::var("RESTUDY_BASE_URL").ok())
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self { base_url, data_dir })
    }

    /// Path of the identity database inside the data dir.
    pub fn identity_db_path(&self) -> PathBuf {
        self.data_dir.join("identity.db")
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("failed to create data directory {}", self.data_dir.display())
        })
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "restudy")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".restudy"))
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}
