//! Application settings.
//!
//! Loaded from a JSON file with serde defaults, then validated. Loading
//! ensures the upload and output directories exist, so callers can treat
//! the paths as usable once `Settings` is in hand.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory where source audio files live.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Directory where transcript artifacts are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Job database path; `None` uses the canonical per-user location.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Number of worker slots. Each slot owns its own engine instances,
    /// so this bounds concurrent model runtimes, not just threads.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Jobs a slot processes before it is recycled.
    #[serde(default = "default_max_jobs_per_slot")]
    pub max_jobs_per_slot: usize,
}

fn default_upload_dir() -> PathBuf {
    data_dir().join("uploads")
}

fn default_output_dir() -> PathBuf {
    data_dir().join("outputs")
}

fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scriven")
}

fn default_worker_count() -> usize {
    1
}

fn default_max_jobs_per_slot() -> usize {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            db_path: None,
            worker_count: default_worker_count(),
            max_jobs_per_slot: default_max_jobs_per_slot(),
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file and prepares the directories.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::load_from_str(&content)
    }

    /// Parses settings from a JSON string and prepares the directories.
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(content)?;
        settings.validate()?;
        settings.ensure_directories()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Validation {
                message: "worker_count must be at least 1".to_string(),
            });
        }
        if self.max_jobs_per_slot == 0 {
            return Err(ConfigError::Validation {
                message: "max_jobs_per_slot must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The worker slot count actually used: the configured value capped
    /// at the number of available cores. Each slot owns a model runtime,
    /// so oversubscribing cores only multiplies memory.
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count.min(num_cpus::get().max(1))
    }

    /// Creates the upload/output directories (and the database parent
    /// directory if a path was given).
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.upload_dir, &self.output_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
        }
        if let Some(parent) = self.db_path.as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}
