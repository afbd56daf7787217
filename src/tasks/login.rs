//! Login
//!
//! Gets through the title screen and the daily popups to the home screen.

use crate::driver::Driver;
use crate::error::Result;
use crate::game::router;

use super::Task;

#[derive(Debug, Default)]
pub struct LoginTask;

impl Task for LoginTask {
    fn name(&self) -> &'static str {
        "Login"
    }

    fn run(&mut self, driver: &mut dyn Driver) -> Result<()> {
        router::home(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{buttons, markers};
    use crate::testing::FakeDriver;
    use crate::vision::Region;

    #[test]
    fn test_login_reaches_home() {
        let mut driver = FakeDriver::new();
        driver.show(markers::SKIP, Region::new(700, 480, 100, 40));
        driver.on_touch(|ui, point| {
            if point == buttons::SKIP_CONFIRM {
                ui.hide(markers::SKIP);
            } else if point == buttons::HOME {
                ui.show(markers::HOME, Region::new(0, 0, 50, 50));
            }
        });

        LoginTask.run(&mut driver).unwrap();
        assert_eq!(driver.touches, vec![buttons::SKIP_CONFIRM, buttons::HOME]);
    }
}
