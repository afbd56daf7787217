//! Sweep controller
//!
//! Drives the repeat counter of the sweep dialog to the wanted value, then
//! runs the sweep. The counter only moves one step per tap and stops moving
//! once the stage's resource runs out, which is reported as an incomplete
//! sweep rather than a failure.

use crate::driver::Driver;
use crate::error::{AutomationError, Result};
use crate::vision::Region;

pub const MINUS: (i32, i32) = (835, 300);
pub const PLUS: (i32, i32) = (1035, 295);
pub const COUNTER: Region = Region::new(885, 280, 105, 40);

/// Start button of the sweep dialog
pub const START: (i32, i32) = (940, 400);
/// Confirm button of the "are you sure" prompt
pub const CONFIRM: (i32, i32) = (770, 500);

pub mod markers {
    /// The sweep dialog is open
    pub const SWEEP: &str = "farming/sweep";
    pub const CONFIRM: &str = "farming/confirm";
    pub const COMPLETE: &str = "farming/sweep_complete";
    /// The stage has not been cleared with three stars
    pub const STARS_REQUIRED: &str = "farming/stars_required";
}

/// Captures without any sweep marker before the sweep counts as stuck
const CONFIRM_IDLE_LIMIT: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Success,
    /// Ran this many times, fewer than asked
    Incomplete(u32),
    /// The stage cannot be swept
    Failed,
}

fn read_counter(driver: &mut dyn Driver) -> Result<u32> {
    let text = driver.read_text(COUNTER, true)?;
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        log::warn!("Sweep counter unreadable: {:?}", text);
        return Err(AutomationError::OcrEmpty);
    }
    text.parse().map_err(|_| AutomationError::OcrEmpty)
}

fn tap_times(driver: &mut dyn Driver, (x, y): (i32, i32), times: u32) -> Result<()> {
    for _ in 0..times {
        driver.touch(x, y)?;
        let pause = driver.timings().tap_interval;
        driver.sleep(pause);
    }
    Ok(())
}

/// Sweep the open stage `target` times.
///
/// Expects the sweep dialog to be showing. A counter that reads the same
/// value twice while still below target means the resource is exhausted;
/// the sweep then runs for what is available.
pub fn sweep(driver: &mut dyn Driver, target: u32) -> Result<SweepOutcome> {
    if driver.is_visible(markers::STARS_REQUIRED)? {
        log::error!("3 stars not achieved. Unable to sweep");
        return Ok(SweepOutcome::Failed);
    }

    if target == 0 {
        log::warn!("Sweep asked for no runs. Skipping stage...");
        return Ok(SweepOutcome::Failed);
    }

    let mut target = target;
    let mut outcome = SweepOutcome::Success;
    let mut last: Option<u32> = None;

    loop {
        driver.tick()?;
        let current = read_counter(driver)?;
        log::debug!("Sweep counter {} of {}", current, target);

        if current == 0 {
            return Ok(SweepOutcome::Incomplete(0));
        }

        if current < target {
            if last == Some(current) {
                target = current;
                outcome = SweepOutcome::Incomplete(current);
            } else {
                tap_times(driver, PLUS, target - current)?;
                last = Some(current);
                continue;
            }
        }

        if current > target {
            if last == Some(current) {
                log::error!("Sweep counter stopped at {} above {}", current, target);
                return Ok(SweepOutcome::Failed);
            }
            tap_times(driver, MINUS, current - target)?;
            last = Some(current);
            continue;
        }

        confirm(driver)?;
        if outcome == SweepOutcome::Success {
            log::info!("Sweep completed successfully");
        }
        return Ok(outcome);
    }
}

/// Press through the start and confirm prompts until the sweep finishes
fn confirm(driver: &mut dyn Driver) -> Result<()> {
    let mut idle = 0;
    loop {
        let pause = driver.timings().tap_interval;
        driver.wait_refresh(pause)?;

        if driver.is_visible(markers::SWEEP)? {
            driver.touch(START.0, START.1)?;
        } else if driver.is_visible(markers::CONFIRM)? {
            driver.touch(CONFIRM.0, CONFIRM.1)?;
        } else if driver.is_visible(markers::COMPLETE)? {
            return Ok(());
        } else {
            idle += 1;
            if idle > CONFIRM_IDLE_LIMIT {
                log::warn!("Sweep did not finish after {} captures", CONFIRM_IDLE_LIMIT);
                return Err(AutomationError::GameStuck);
            }
            continue;
        }
        idle = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;

    const DIALOG: Region = Region::new(500, 200, 300, 300);

    fn taps(driver: &FakeDriver, point: (i32, i32)) -> usize {
        driver.touches.iter().filter(|&&p| p == point).count()
    }

    #[test]
    fn test_counter_converges_up() {
        let mut driver = FakeDriver::new();
        driver.sweep_dialog(2, 99);

        assert_eq!(sweep(&mut driver, 5).unwrap(), SweepOutcome::Success);
        assert_eq!(taps(&driver, PLUS), 3);
        assert_eq!(taps(&driver, MINUS), 0);
        assert_eq!(taps(&driver, START), 1);
        assert_eq!(taps(&driver, CONFIRM), 1);
    }

    #[test]
    fn test_counter_converges_down() {
        let mut driver = FakeDriver::new();
        driver.sweep_dialog(9, 99);

        assert_eq!(sweep(&mut driver, 4).unwrap(), SweepOutcome::Success);
        assert_eq!(taps(&driver, MINUS), 5);
        assert_eq!(taps(&driver, PLUS), 0);
    }

    #[test]
    fn test_stalled_counter_sweeps_what_is_available() {
        let mut driver = FakeDriver::new();
        driver.sweep_dialog(3, 3);

        assert_eq!(sweep(&mut driver, 5).unwrap(), SweepOutcome::Incomplete(3));
        assert_eq!(taps(&driver, PLUS), 2);
        assert_eq!(taps(&driver, CONFIRM), 1);
    }

    #[test]
    fn test_partial_progress_then_stall() {
        let mut driver = FakeDriver::new();
        driver.sweep_dialog(1, 4);

        assert_eq!(sweep(&mut driver, 6).unwrap(), SweepOutcome::Incomplete(4));
    }

    #[test]
    fn test_empty_counter_is_incomplete() {
        let mut driver = FakeDriver::new();
        driver.sweep_dialog(0, 0);

        assert_eq!(sweep(&mut driver, 5).unwrap(), SweepOutcome::Incomplete(0));
        assert!(driver.touches.is_empty());
    }

    #[test]
    fn test_zero_target_is_skipped() {
        let mut driver = FakeDriver::new();
        driver.sweep_dialog(1, 9);

        assert_eq!(sweep(&mut driver, 0).unwrap(), SweepOutcome::Failed);
        assert!(driver.touches.is_empty());
    }

    #[test]
    fn test_counter_stuck_above_target_fails() {
        let mut driver = FakeDriver::new();
        driver.show(markers::SWEEP, DIALOG);
        driver.set_text(COUNTER, &["4"]);

        assert_eq!(sweep(&mut driver, 2).unwrap(), SweepOutcome::Failed);
        assert_eq!(taps(&driver, MINUS), 2);
        assert_eq!(taps(&driver, START), 0);
    }

    #[test]
    fn test_stars_required_fails() {
        let mut driver = FakeDriver::new();
        driver.sweep_dialog(1, 9);
        driver.show(markers::STARS_REQUIRED, DIALOG);

        assert_eq!(sweep(&mut driver, 5).unwrap(), SweepOutcome::Failed);
        assert!(driver.touches.is_empty());
    }

    #[test]
    fn test_unreadable_counter_is_ocr_error() {
        let mut driver = FakeDriver::new();
        driver.set_text(COUNTER, &["x3"]);

        assert!(matches!(sweep(&mut driver, 5), Err(AutomationError::OcrEmpty)));
    }

    #[test]
    fn test_confirm_gives_up_when_nothing_shows() {
        let mut driver = FakeDriver::new();
        driver.set_text(COUNTER, &["5"]);

        assert!(matches!(sweep(&mut driver, 5), Err(AutomationError::GameStuck)));
    }
}
