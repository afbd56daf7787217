//! Configuration module
//!
//! Loads and validates `config.json`, and persists the parts of it the
//! automation itself changes (the mission queue and its last-run stamp).

pub mod settings;
pub mod store;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use settings::{
    RankPreference, Settings, StageMode, StageRun, TimingSettings, WorkEntry,
};
pub use store::{JsonFileStore, MemoryStore, SettingsStore};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path} could not be read: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Settings {
    /// Read settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Initializing config module");
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the settings against the installed assets.
    ///
    /// The configured server needs a template directory under `assets_root`
    /// and at least one feature has to be enabled.
    pub fn validate(&self, assets_root: &Path) -> Result<(), ConfigError> {
        log::info!("Validating config");
        let server = self.login.server;
        if !assets_root.join(server.dir_name()).is_dir() {
            return Err(ConfigError::Invalid(format!(
                "no assets for server {} under {}",
                server,
                assets_root.display()
            )));
        }

        if !self.any_enabled() {
            return Err(ConfigError::Invalid(
                "all modules are disabled, consider checking your config".to_string(),
            ));
        }

        let mission = &self.farming.mission;
        if mission.enabled
            && !mission.preferred_template.is_empty()
            && !mission.templates.contains_key(&mission.preferred_template)
        {
            return Err(ConfigError::Invalid(format!(
                "preferred mission template {:?} is not defined",
                mission.preferred_template
            )));
        }

        let mut entries = mission.queue.iter().chain(mission.templates.values().flatten());
        if let Some(entry) = entries.find(|e| e.runs == 0) {
            return Err(ConfigError::Invalid(format!(
                "mission entry {} {} has no runs",
                entry.mode.label(),
                entry.stage
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_bad_json() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate() {
        let assets = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();

        assert!(matches!(
            settings.validate(assets.path()),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::create_dir(assets.path().join("EN")).unwrap();
        settings.validate(assets.path()).unwrap();

        settings.login.enabled = false;
        assert!(matches!(
            settings.validate(assets.path()),
            Err(ConfigError::Invalid(_))
        ));

        settings.farming.enabled = true;
        settings.farming.mission.enabled = true;
        settings.farming.mission.preferred_template = "weekly".to_string();
        assert!(settings.validate(assets.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_run_entries() {
        let assets = tempfile::tempdir().unwrap();
        std::fs::create_dir(assets.path().join("EN")).unwrap();
        let mut settings = Settings::default();
        settings.farming.mission.queue = vec![WorkEntry::new(StageMode::Normal, "1-1", 3)];
        settings.validate(assets.path()).unwrap();

        settings
            .farming
            .mission
            .templates
            .insert("daily".to_string(), vec![WorkEntry::new(StageMode::Hard, "2-3", 0)]);
        assert!(matches!(
            settings.validate(assets.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
