//! On-disk run state: one JSON `RefreshState` file per job.

use clawmemory_types::RefreshState;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum StateError {
    Io { path: PathBuf, source: io::Error },
    /// The file exists but does not hold a valid record. Never papered over
    /// with a default.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "State file {} unreadable: {}", path.display(), source)
            }
            Self::Parse { path, source } => {
                write!(f, "State file {} is corrupt: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, job: &str) -> PathBuf {
        self.dir.join(format!("{}_state.json", job))
    }

    /// Load a job's state. `Ok(None)` means the job has never run.
    pub fn load(&self, job: &str) -> Result<Option<RefreshState>, StateError> {
        let path = self.path_for(job);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StateError::Io { path, source }),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StateError::Parse { path, source })
    }

    pub fn load_or_default(&self, job: &str) -> Result<RefreshState, StateError> {
        Ok(self.load(job)?.unwrap_or_default())
    }

    /// Write a job's state, creating the state directory if needed. The file
    /// is replaced wholesale.
    pub fn save(&self, job: &str, state: &RefreshState) -> Result<(), StateError> {
        fs::create_dir_all(&self.dir).map_err(|source| StateError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(job);
        let mut json = serde_json::to_string_pretty(state).map_err(|e| StateError::Io {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        json.push('\n');

        fs::write(&path, json).map_err(|source| StateError::Io { path, source })?;
        log::debug!("[STATE] Saved {} state (failures: {})", job, state.failures);
        Ok(())
    }
}
