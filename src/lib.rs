//! Arona - screen-reading Blue Archive automation over ADB
//!
//! This library drives the game by capturing the device screen, locating
//! icons and text through template matching and OCR, and injecting touch
//! input. Navigation, stage sweeping and the daily activities are built on
//! top of those primitives.
//!
//! ## Layers
//!
//! - `android`: the ADB transport and the input executor with stuck detection
//! - `vision`: screen capture, template matching and OCR
//! - `game`: the navigation router and the sweep controller
//! - `tasks`: one module per in-game activity
//! - `orchestrator`: runs the tasks and recovers from crashes and freezes

pub mod android;
pub mod config;
pub mod driver;
pub mod error;
pub mod game;
pub mod orchestrator;
pub mod session;
pub mod stealth;
pub mod tasks;
pub mod vision;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::Driver;
pub use error::{AutomationError, Result};
pub use session::Session;

/// Package name of the game client
pub const GAME_PACKAGE: &str = "com.nexon.bluearchive";

/// The only screen size the coordinate tables are valid for
pub const SCREEN_WIDTH: u32 = 1280;
pub const SCREEN_HEIGHT: u32 = 720;

/// An input sent to the device.
///
/// Also serves as the signature compared by the stuck detector, so two
/// actions are "the same" only when every field matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Tap at a specific screen coordinate
    Touch { x: i32, y: i32 },
    /// Swipe from one point to another
    Swipe {
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        duration_ms: u32,
    },
}
