//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths to the sitegist data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Page/chunk database directory (`data/pagedb/`).
    pub pagedb: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            pagedb: root.join("pagedb"),
            root,
        };
        std::fs::create_dir_all(&paths.pagedb)?;
        Ok(paths)
    }
}

/// Top-level sitegist configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitegistConfig {
    /// Data directory paths.
    pub data_paths: DataPaths,
}

impl SitegistConfig {
    /// Create configuration from environment and defaults.
    ///
    /// `SITEGIST_DATA_DIR` overrides the data root when set.
    pub fn from_env(default_data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = std::env::var("SITEGIST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir.as_ref().to_path_buf());

        let data_paths = DataPaths::new(root)?;
        Ok(Self { data_paths })
    }
}
