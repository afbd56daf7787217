//! Persistence of the mission queue
//!
//! The mission task rewrites its queue after every change so an interrupted
//! run resumes where it stopped.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_json::Value;

use super::settings::{WorkEntry, LAST_RUN_FORMAT};
use super::ConfigError;

/// Where the mission queue and last-run stamp are saved
pub trait SettingsStore {
    fn save_queue(&mut self, queue: &[WorkEntry]) -> Result<(), ConfigError>;

    fn save_last_run(&mut self, at: NaiveDateTime) -> Result<(), ConfigError>;
}

/// Rewrites `farming.mission.queue` and `farming.mission.last_run` in the
/// config file, leaving every other key as it was
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut doc: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let mission = doc
            .pointer_mut("/farming/mission")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| ConfigError::Invalid("config has no farming.mission section".to_string()))?;
        mission.insert(key.to_string(), value);

        let out = serde_json::to_string_pretty(&doc).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, out).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl SettingsStore for JsonFileStore {
    fn save_queue(&mut self, queue: &[WorkEntry]) -> Result<(), ConfigError> {
        let value = serde_json::to_value(queue).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        self.update("queue", value)
    }

    fn save_last_run(&mut self, at: NaiveDateTime) -> Result<(), ConfigError> {
        self.update("last_run", Value::String(at.format(LAST_RUN_FORMAT).to_string()))
    }
}

/// Keeps the saved state in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub queue: Vec<WorkEntry>,
    pub last_run: Option<NaiveDateTime>,
    pub saves: usize,
}

impl SettingsStore for MemoryStore {
    fn save_queue(&mut self, queue: &[WorkEntry]) -> Result<(), ConfigError> {
        self.queue = queue.to_vec();
        self.saves += 1;
        Ok(())
    }

    fn save_last_run(&mut self, at: NaiveDateTime) -> Result<(), ConfigError> {
        self.last_run = Some(at);
        Ok(())
    }
}
