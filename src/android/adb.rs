//! ADB command-line transport
//!
//! Every command is pinned to the transport id resolved at connect time, so
//! a second emulator attached later cannot steal the session.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use super::device::{Device, DeviceError, DeviceResult};

/// A device reached through the `adb` executable
#[derive(Debug, Clone)]
pub struct AdbDevice {
    adb_path: PathBuf,
    service: String,
    transport_id: String,
}

impl AdbDevice {
    /// Restart the adb server and attach to `service`.
    ///
    /// `service` containing a `:` is treated as a TCP address and connected
    /// to first; anything else is looked up among the USB devices.
    pub fn connect(service: &str) -> DeviceResult<Self> {
        let adb_path = resolve_adb()?;

        run(&adb_path, &["kill-server"])?;
        run(&adb_path, &["start-server"])?;

        if service.contains(':') {
            let output = run(&adb_path, &["connect", service])?;
            let response = String::from_utf8_lossy(&output.stdout);
            if !(response.starts_with("connected") || response.starts_with("already")) {
                return Err(DeviceError::DeviceNotFound(format!(
                    "{}: {}",
                    service,
                    response.trim()
                )));
            }
        }

        let output = run(&adb_path, &["devices", "-l"])?;
        let listing = String::from_utf8_lossy(&output.stdout);
        let transport_id = parse_transport_id(&listing, service)
            .ok_or_else(|| DeviceError::DeviceNotFound(service.to_string()))?;

        log::info!("Waiting for device [{}] to be authorized...", service);
        run(&adb_path, &["-t", &transport_id, "wait-for-device"])?;
        log::info!(
            "Connected to [{}] with transport_id({})",
            service,
            transport_id
        );

        Ok(Self {
            adb_path,
            service: service.to_string(),
            transport_id,
        })
    }

    pub fn transport_id(&self) -> &str {
        &self.transport_id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn command(&self, args: &[&str]) -> DeviceResult<Output> {
        let mut full = vec!["-t", self.transport_id.as_str()];
        full.extend_from_slice(args);
        log::debug!("adb {}", full.join(" "));
        run(&self.adb_path, &full)
    }
}

impl Device for AdbDevice {
    fn shell(&mut self, command: &str) -> DeviceResult<String> {
        let mut args = vec!["shell"];
        args.extend(command.split(' ').filter(|a| !a.is_empty()));
        let output = self.command(&args)?;
        if !output.status.success() {
            return Err(DeviceError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn exec_out(&mut self, command: &str) -> DeviceResult<Vec<u8>> {
        let mut args = vec!["exec-out"];
        args.extend(command.split(' ').filter(|a| !a.is_empty()));
        Ok(self.command(&args)?.stdout)
    }

    fn push(&mut self, local: &Path, remote: &str) -> DeviceResult<()> {
        let local = local.to_string_lossy();
        let output = self.command(&["push", &local, remote])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(DeviceError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

fn run(adb_path: &Path, args: &[&str]) -> DeviceResult<Output> {
    Command::new(adb_path)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DeviceError::AdbNotFound,
            _ => DeviceError::Io(e),
        })
}

/// `adb` next to the executable wins over the one on PATH
fn resolve_adb() -> DeviceResult<PathBuf> {
    let name = if cfg!(windows) { "adb.exe" } else { "adb" };

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let bundled = parent.join("platform-tools").join(name);
            if bundled.exists() {
                return Ok(bundled);
            }
        }
    }

    let paths = std::env::var_os("PATH").ok_or(DeviceError::AdbNotFound)?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or(DeviceError::AdbNotFound)
}

/// Find the transport id of `service` in `adb devices -l` output.
///
/// Lines without a transport id (the header, offline entries) are ignored.
pub fn parse_transport_id(listing: &str, service: &str) -> Option<String> {
    listing
        .lines()
        .filter(|line| line.contains("transport_id:"))
        .find(|line| line.contains(service))
        .and_then(|line| line.split("transport_id:").nth(1))
        .map(|id| id.split_whitespace().next().unwrap_or_default().to_string())
        .filter(|id| !id.is_empty())
}
