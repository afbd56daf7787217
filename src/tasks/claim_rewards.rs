//! Claim Rewards
//!
//! Visits the club for its daily AP, then claims task and mailbox rewards
//! until no claim button is lit.

use crate::config::settings::ClaimRewardsSettings;
use crate::driver::Driver;
use crate::error::Result;
use crate::game::{router, HomeSection};

use super::Task;

const CLAIM_ALL: (i32, i32) = (1150, 670);
const CLAIM_ONE: (i32, i32) = (970, 675);

pub mod markers {
    pub const TASKS_CLAIM_ALL: &str = "claim_rewards/tasks_claim_all";
    pub const TASK_CLAIM: &str = "claim_rewards/claim";
    pub const MAILBOX_CLAIM_ALL: &str = "claim_rewards/mailbox_claim_all";
}

pub struct ClaimRewardsTask {
    settings: ClaimRewardsSettings,
}

impl ClaimRewardsTask {
    pub fn new(settings: ClaimRewardsSettings) -> Self {
        Self { settings }
    }

    fn claim_tasks(&self, driver: &mut dyn Driver) -> Result<()> {
        router::sub_home(driver, HomeSection::Tasks)?;
        loop {
            driver.tick()?;
            let (x, y) = if driver.is_visible_color(markers::TASKS_CLAIM_ALL)? {
                CLAIM_ALL
            } else if driver.is_visible_color(markers::TASK_CLAIM)? {
                CLAIM_ONE
            } else {
                return Ok(());
            };
            driver.touch(x, y)?;
            // The reward popup covers the list until the section is reopened
            router::sub_home(driver, HomeSection::Tasks)?;
        }
    }

    fn claim_mailbox(&self, driver: &mut dyn Driver) -> Result<()> {
        router::sub_home(driver, HomeSection::Mailbox)?;
        loop {
            driver.tick()?;
            if !driver.is_visible_color(markers::MAILBOX_CLAIM_ALL)? {
                return Ok(());
            }
            driver.touch(CLAIM_ALL.0, CLAIM_ALL.1)?;
            router::sub_home(driver, HomeSection::Mailbox)?;
        }
    }
}

impl Task for ClaimRewardsTask {
    fn name(&self) -> &'static str {
        "Claim Rewards"
    }

    fn run(&mut self, driver: &mut dyn Driver) -> Result<()> {
        if self.settings.club {
            router::sub_home(driver, HomeSection::Club)?;
        }
        if self.settings.tasks {
            self.claim_tasks(driver)?;
        }
        if self.settings.mailbox {
            self.claim_mailbox(driver)?;
        }
        router::home(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{buttons, markers as nav};
    use crate::testing::FakeDriver;
    use crate::vision::Region;

    const SPOT: Region = Region::new(10, 10, 20, 20);

    #[test]
    fn test_claims_until_nothing_is_lit() {
        let mut driver = FakeDriver::new();
        driver.show(nav::HOME, SPOT);
        driver.show(markers::TASKS_CLAIM_ALL, SPOT);
        driver.show(markers::MAILBOX_CLAIM_ALL, SPOT);
        let mut singles = 2;
        driver.on_touch(move |ui, point| match point {
            (61, 235) => ui.show("goto/tasks", SPOT),
            (1142, 38) => {
                ui.hide("goto/tasks");
                ui.show("goto/mailbox", SPOT);
            }
            (560, 650) => ui.show("goto/club", SPOT),
            CLAIM_ALL if ui.is_showing("goto/mailbox") => ui.hide(markers::MAILBOX_CLAIM_ALL),
            CLAIM_ALL => {
                ui.hide(markers::TASKS_CLAIM_ALL);
                ui.show(markers::TASK_CLAIM, SPOT);
            }
            CLAIM_ONE => {
                singles -= 1;
                if singles == 0 {
                    ui.hide(markers::TASK_CLAIM);
                }
            }
            _ => {}
        });

        let mut task = ClaimRewardsTask::new(ClaimRewardsSettings {
            enabled: true,
            club: false,
            tasks: true,
            mailbox: true,
        });
        task.run(&mut driver).unwrap();

        assert_eq!(
            driver.touches,
            vec![(61, 235), CLAIM_ALL, CLAIM_ONE, CLAIM_ONE, (1142, 38), CLAIM_ALL]
        );
    }

    #[test]
    fn test_club_visit_only() {
        let mut driver = FakeDriver::new();
        driver.show(nav::HOME, SPOT);
        driver.on_touch(|ui, point| {
            if point == (560, 650) {
                ui.show("goto/club", SPOT);
                ui.hide(nav::HOME);
            } else if point == buttons::HOME {
                ui.show(nav::HOME, SPOT);
            }
        });

        let mut task = ClaimRewardsTask::new(ClaimRewardsSettings {
            enabled: true,
            club: true,
            ..ClaimRewardsSettings::default()
        });
        task.run(&mut driver).unwrap();
        assert_eq!(driver.touches, vec![(560, 650), buttons::HOME]);
    }
}
