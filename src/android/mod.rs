//! Android device access
//!
//! The ADB transport, the [`Device`] seam over it, and the input executor
//! that guards every touch with a foreground check and freeze detection.

pub mod adb;
pub mod device;
pub mod input;

pub use adb::AdbDevice;
pub use device::{Device, DeviceError, DeviceResult};
pub use input::{ActionExecutor, ActionRepeat};
