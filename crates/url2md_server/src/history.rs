use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use url2md_core::{ConversionJob, LifecycleStore};
use url2md_logging::{conv_info, conv_warn};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history directory unusable: {0}")]
    Directory(String),
    #[error("failed to serialize history: {0}")]
    Serialize(#[from] ron::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedHistory {
    jobs: Vec<ConversionJob>,
}

/// Loads saved jobs into `store`. Returns how many were restored.
///
/// A missing file is a fresh start. An unreadable or corrupt file is logged
/// and ignored so a bad history never blocks startup.
pub fn load_into(store: &LifecycleStore, path: &Path) -> usize {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return 0,
        Err(err) => {
            conv_warn!("Failed to read job history from {:?}: {}", path, err);
            return 0;
        }
    };

    let history: PersistedHistory = match ron::from_str(&content) {
        Ok(history) => history,
        Err(err) => {
            conv_warn!("Failed to parse job history from {:?}: {}", path, err);
            return 0;
        }
    };

    let restored = store.restore(history.jobs);
    conv_info!("Loaded job history from {:?}", path);
    restored
}

/// Atomically replaces `path` with the store's current jobs.
pub fn save(store: &LifecycleStore, path: &Path) -> Result<PathBuf, HistoryError> {
    let history = PersistedHistory {
        jobs: store.snapshot(),
    };
    let content = ron::ser::to_string_pretty(&history, ron::ser::PrettyConfig::new())?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| HistoryError::Directory(e.to_string()))?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| HistoryError::Io(e.error))?;

    conv_info!("Saved {} conversions to {:?}", history.jobs.len(), path);
    Ok(path.to_path_buf())
}
