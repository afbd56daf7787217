//! Errors surfaced at the orchestrator boundary
//!
//! Lower layers keep their own error enums; everything a task can fail with
//! ends up here so the orchestrator can match on a closed set.

use thiserror::Error;

use crate::android::DeviceError;
use crate::config::ConfigError;
use crate::vision::VisionError;

#[derive(Debug, Error)]
pub enum AutomationError {
    /// The foreground app is not the game
    #[error("game is not running")]
    GameNotRunning,
    /// The same input was repeated past its limit
    #[error("game appears to be stuck")]
    GameStuck,
    /// OCR found no text where text was expected
    #[error("OCR returned no text")]
    OcrEmpty,
    #[error("interrupted by user")]
    Interrupted,
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("vision error: {0}")]
    Vision(VisionError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Task-specific failure that none of the above describes
    #[error("{0}")]
    Task(String),
}

impl From<VisionError> for AutomationError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::NoText => AutomationError::OcrEmpty,
            other => AutomationError::Vision(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;

/// Environment problems found before any task runs
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("resolution is {width}x{height}, the game must run at 1280x720")]
    Resolution { width: u32, height: u32 },
    #[error("{0} is not installed")]
    NotInstalled(String),
    #[error("unable to connect to the device: {0}")]
    Device(#[from] DeviceError),
    #[error("vision setup failed: {0}")]
    Vision(#[from] VisionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ocr_maps_to_tag() {
        let err: AutomationError = VisionError::NoText.into();
        assert!(matches!(err, AutomationError::OcrEmpty));

        let err: AutomationError = VisionError::AssetNotFound("goto/home".into()).into();
        assert!(matches!(err, AutomationError::Vision(_)));
    }
}
