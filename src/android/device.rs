//! Device transport seam
//!
//! Everything above this layer talks to the phone through [`Device`], so the
//! real ADB link and the test doubles are interchangeable.

use std::path::Path;

use thiserror::Error;

/// Errors raised by the device transport
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("adb executable not found in PATH")]
    AdbNotFound,
    #[error("adb command failed: {0}")]
    CommandFailed(String),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("unexpected device output: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Commands the automation needs from a connected Android device.
///
/// Only the three transport primitives are required. The higher level
/// helpers are expressed through `shell` and may be overridden by
/// implementations that have a faster path.
pub trait Device: Send {
    /// Run a shell command and return its stdout as text
    fn shell(&mut self, command: &str) -> DeviceResult<String>;

    /// Run a command through `exec-out` and return the raw bytes
    fn exec_out(&mut self, command: &str) -> DeviceResult<Vec<u8>>;

    /// Copy a host file onto the device
    fn push(&mut self, local: &Path, remote: &str) -> DeviceResult<()>;

    /// PNG screenshot staged in device storage, then read back.
    ///
    /// Nothing is streamed while `screencap` runs, so shells that mangle a
    /// live `exec-out` stream still return intact bytes.
    fn screenshot(&mut self) -> DeviceResult<Vec<u8>> {
        self.shell(&format!("screencap -p {}", SCREENSHOT_REMOTE_PATH))?;
        self.exec_out(&format!("cat {}", SCREENSHOT_REMOTE_PATH))
    }

    fn tap(&mut self, x: i32, y: i32) -> DeviceResult<()> {
        self.shell(&format!("input tap {} {}", x, y)).map(|_| ())
    }

    fn swipe(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u32) -> DeviceResult<()> {
        self.shell(&format!(
            "input swipe {} {} {} {} {}",
            x1, y1, x2, y2, duration_ms
        ))
        .map(|_| ())
    }

    /// Package owning the focused window, if any
    fn current_package(&mut self) -> DeviceResult<Option<String>> {
        let output = self.shell("dumpsys window windows")?;
        Ok(parse_current_package(&output))
    }

    /// Launch an app through its launcher intent
    fn app_start(&mut self, package: &str) -> DeviceResult<()> {
        self.shell(&format!(
            "monkey -p {} -c android.intent.category.LAUNCHER 1",
            package
        ))
        .map(|_| ())
    }

    fn app_stop(&mut self, package: &str) -> DeviceResult<()> {
        self.shell(&format!("am force-stop {}", package)).map(|_| ())
    }

    fn installed_packages(&mut self) -> DeviceResult<Vec<String>> {
        let output = self.shell("pm list packages")?;
        Ok(parse_packages(&output))
    }

    /// Effective screen size, an override size wins over the physical one
    fn screen_size(&mut self) -> DeviceResult<(u32, u32)> {
        let output = self.shell("wm size")?;
        parse_wm_size(&output).ok_or_else(|| DeviceError::Parse(output.trim().to_string()))
    }
}

/// Where [`Device::screenshot`] stages its file
pub const SCREENSHOT_REMOTE_PATH: &str = "/data/local/tmp/arona.png";

/// Extract the focused package from `dumpsys window` output.
///
/// The relevant line looks like
/// `mCurrentFocus=Window{1a2b u0 com.nexon.bluearchive/com.nexon.MainActivity}`.
pub fn parse_current_package(output: &str) -> Option<String> {
    let line = output
        .lines()
        .find(|l| l.contains("mCurrentFocus"))
        .or_else(|| output.lines().find(|l| l.contains("mFocusedApp")))?;

    let activity = line.split_whitespace().find(|token| token.contains('/'))?;
    let package = activity.split('/').next()?.trim_start_matches('{');
    if package.is_empty() {
        None
    } else {
        Some(package.to_string())
    }
}

/// Parse `pm list packages` into bare package names
pub fn parse_packages(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse `wm size` output, preferring `Override size` when present
pub fn parse_wm_size(output: &str) -> Option<(u32, u32)> {
    let pick = |prefix: &str| {
        output
            .lines()
            .find_map(|line| line.trim().strip_prefix(prefix))
            .and_then(parse_dimensions)
    };
    pick("Override size:").or_else(|| pick("Physical size:"))
}

fn parse_dimensions(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_current_package() {
        let output = "  mCurrentFocus=Window{5e2f3c1 u0 com.nexon.bluearchive/com.nexon.bluearchive.MxUnityPlayerActivity}\n  mFocusedApp=ActivityRecord{...}";
        assert_eq!(
            parse_current_package(output).as_deref(),
            Some("com.nexon.bluearchive")
        );
    }

    #[test]
    fn test_parse_current_package_missing() {
        assert_eq!(parse_current_package("mCurrentFocus=null"), None);
        assert_eq!(parse_current_package(""), None);
    }

    #[test]
    fn test_parse_packages() {
        let output = "package:com.android.settings\npackage:com.nexon.bluearchive\n\n";
        assert_eq!(
            parse_packages(output),
            vec!["com.android.settings", "com.nexon.bluearchive"]
        );
    }

    #[test]
    fn test_parse_wm_size_override_wins() {
        let output = "Physical size: 1920x1080\nOverride size: 1280x720\n";
        assert_eq!(parse_wm_size(output), Some((1280, 720)));
        assert_eq!(parse_wm_size("Physical size: 1280x720"), Some((1280, 720)));
        assert_eq!(parse_wm_size("error: no devices"), None);
    }
}
