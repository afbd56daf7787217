//! Touch and swipe execution with freeze detection
//!
//! A frozen game keeps showing the same screen, so the automation keeps
//! choosing the same input. Counting identical consecutive inputs is how a
//! freeze is noticed.

use crate::error::{AutomationError, Result};
use crate::stealth::Humanizer;
use crate::vision::region::Region;
use crate::Action;

use super::device::Device;

/// Identical consecutive touches allowed before the game counts as stuck
pub const TOUCH_REPEAT_LIMIT: u32 = 60;
/// Identical consecutive swipes allowed before the game counts as stuck
pub const SWIPE_REPEAT_LIMIT: u32 = 35;

/// Tracks how often the same action has been issued in a row
#[derive(Debug, Clone)]
pub struct ActionRepeat {
    last: Option<Action>,
    count: u32,
    limit: u32,
}

impl ActionRepeat {
    pub fn new(limit: u32) -> Self {
        Self {
            last: None,
            count: 0,
            limit,
        }
    }

    /// Record `action`. Fails without recording once the run of identical
    /// actions would exceed the limit.
    pub fn record(&mut self, action: Action) -> Result<()> {
        if self.last == Some(action) {
            if self.count >= self.limit {
                return Err(AutomationError::GameStuck);
            }
            self.count += 1;
        } else {
            self.last = Some(action);
            self.count = 1;
        }
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last(&self) -> Option<Action> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.count = 0;
    }
}

/// Sends input to the game, refusing when it is not in the foreground
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    package: String,
    touch_repeat: ActionRepeat,
    swipe_repeat: ActionRepeat,
    game_started: bool,
}

impl ActionExecutor {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            touch_repeat: ActionRepeat::new(TOUCH_REPEAT_LIMIT),
            swipe_repeat: ActionRepeat::new(SWIPE_REPEAT_LIMIT),
            game_started: false,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Whether the game has been seen in the foreground at least once
    pub fn game_started(&self) -> bool {
        self.game_started
    }

    pub fn touch_repeat(&self) -> &ActionRepeat {
        &self.touch_repeat
    }

    pub fn swipe_repeat(&self) -> &ActionRepeat {
        &self.swipe_repeat
    }

    /// Forget the repeat history, used after the game was restarted
    pub fn reset_records(&mut self) {
        self.touch_repeat.reset();
        self.swipe_repeat.reset();
    }

    /// Fail with [`AutomationError::GameNotRunning`] unless the game owns
    /// the focused window
    pub fn check_game_status(&mut self, device: &mut dyn Device) -> Result<()> {
        match device.current_package()? {
            Some(package) if package == self.package => {
                self.game_started = true;
                Ok(())
            }
            other => {
                log::debug!("Foreground package is {:?}", other);
                Err(AutomationError::GameNotRunning)
            }
        }
    }

    pub fn touch(&mut self, device: &mut dyn Device, x: i32, y: i32) -> Result<()> {
        self.touch_repeat.record(Action::Touch { x, y })?;
        self.check_game_status(device)?;
        device.tap(x, y)?;
        Ok(())
    }

    /// Touch a uniformly random pixel of `region`
    pub fn touch_random(
        &mut self,
        device: &mut dyn Device,
        humanizer: &mut Humanizer,
        region: &Region,
    ) -> Result<()> {
        let point = humanizer.random_point(region);
        self.touch(device, point.x, point.y)
    }

    pub fn swipe(
        &mut self,
        device: &mut dyn Device,
        (x1, y1): (i32, i32),
        (x2, y2): (i32, i32),
        duration_ms: u32,
    ) -> Result<()> {
        self.swipe_repeat.record(Action::Swipe {
            start_x: x1,
            start_y: y1,
            end_x: x2,
            end_y: y2,
            duration_ms,
        })?;
        self.check_game_status(device)?;
        device.swipe(x1, y1, x2, y2, duration_ms)?;
        Ok(())
    }
}
