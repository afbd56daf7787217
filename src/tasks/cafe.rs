//! Cafe
//!
//! Invites a student through MomoTalk, taps the students on the floor for
//! affection and collects the cafe's AP and credit earnings.

use crate::config::settings::CafeSettings;
use crate::driver::Driver;
use crate::error::Result;
use crate::game::{router, HomeSection};
use crate::vision::{Region, WordMatch};

use super::Task;

const INVITE: Region = Region::new(800, 620, 55, 70);
/// Student list of the invite dialog
const MOMOTALK: Region = Region::new(410, 187, 290, 413);

const EARNINGS_BUTTON: (i32, i32) = (1158, 647);
const EARNINGS_CLAIM: (i32, i32) = (640, 520);
const LIST_SCROLL: ((i32, i32), (i32, i32)) = ((600, 500), (600, 200));

pub mod markers {
    /// An invitation ticket is available
    pub const AVAILABLE: &str = "cafe/available";
    pub const MOMOTALK: &str = "cafe/momotalk";
    pub const INVITE: &str = "cafe/invite";
    pub const CONFIRM: &str = "cafe/confirm";
    /// The earnings dialog is open
    pub const EARNINGS: &str = "cafe/earnings";
}

pub struct CafeTask {
    settings: CafeSettings,
}

impl CafeTask {
    pub fn new(settings: CafeSettings) -> Self {
        Self { settings }
    }

    fn invite_student(&self, driver: &mut dyn Driver) -> Result<()> {
        let name = self.settings.student_name.as_str();
        if name.trim().is_empty() {
            log::warn!("Inviting student is turned on but student name is empty. Unable to proceed.");
            return Ok(());
        }
        log::info!("Inviting student: {}", name);

        while !driver.is_visible(markers::MOMOTALK)? {
            driver.touch_random(&INVITE)?;
            driver.tick()?;
        }

        let mut last_seen: Option<String> = None;
        loop {
            driver.tick()?;
            match driver.find_word(name, MOMOTALK)? {
                WordMatch::Found(text) => {
                    log::info!("Student found!");
                    match driver.find_button(markers::INVITE, text, MOMOTALK)? {
                        Some(button) => loop {
                            driver.tick()?;
                            if driver.find_and_touch(markers::CONFIRM)? {
                                break;
                            }
                            driver.touch_random(&button)?;
                        },
                        None => log::error!("Could not find the invite button for {}", name),
                    }
                    return Ok(());
                }
                WordMatch::Missing(seen) => {
                    if seen.is_some() && seen == last_seen {
                        log::error!("Student {} not found. Please check spelling.", name);
                        return Ok(());
                    }
                    // Affection levels are read as bare numbers and say nothing about the scroll position
                    if seen
                        .as_deref()
                        .is_some_and(|s| !s.chars().all(|c| c.is_ascii_digit()))
                    {
                        last_seen = seen;
                    }
                    let (from, to) = LIST_SCROLL;
                    driver.swipe(from, to, 0)?;
                }
            }
        }
    }

    fn tap_students(&self, driver: &mut dyn Driver) -> Result<()> {
        log::info!("Tapping students");
        for y in (140..543).step_by(50) {
            for x in (0..1365).step_by(50) {
                driver.touch(x, y)?;
            }
        }
        Ok(())
    }
}

/// Open the earnings dialog from the cafe screen and claim it
pub(crate) fn claim_earnings(driver: &mut dyn Driver) -> Result<()> {
    loop {
        driver.tick()?;
        if driver.is_visible(markers::EARNINGS)? {
            driver.touch(EARNINGS_CLAIM.0, EARNINGS_CLAIM.1)?;
            log::info!("Cafe earnings claimed");
            return Ok(());
        }
        driver.touch(EARNINGS_BUTTON.0, EARNINGS_BUTTON.1)?;
    }
}

impl Task for CafeTask {
    fn name(&self) -> &'static str {
        "Cafe"
    }

    fn run(&mut self, driver: &mut dyn Driver) -> Result<()> {
        router::sub_home(driver, HomeSection::Cafe)?;

        if self.settings.invite_student && driver.is_visible(markers::AVAILABLE)? {
            self.invite_student(driver)?;
        }
        if self.settings.tap_students {
            self.tap_students(driver)?;
        }
        if self.settings.claim_earnings {
            claim_earnings(driver)?;
        }

        router::home(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{buttons, markers as nav};
    use crate::testing::FakeDriver;

    const SPOT: Region = Region::new(10, 10, 20, 20);

    fn cafe_screen() -> FakeDriver {
        let mut driver = FakeDriver::new();
        driver.show("goto/cafe", SPOT);
        driver.on_touch(|ui, point| {
            if point == buttons::HOME {
                ui.show(nav::HOME, SPOT);
            }
        });
        driver
    }

    fn settings() -> CafeSettings {
        CafeSettings {
            enabled: true,
            ..CafeSettings::default()
        }
    }

    #[test]
    fn test_invites_named_student() {
        let mut driver = cafe_screen();
        let invite_icon = Region::new(640, 190, 40, 30);
        driver.show(markers::AVAILABLE, SPOT);
        driver.set_text(MOMOTALK, &["Aru", "Haruka"]);
        driver.on_swipe(|ui, _, _| ui.set_text(MOMOTALK, &["Mutsuki", "Shiroko"]));
        driver.on_touch(move |ui, point| {
            if INVITE.contains(point.into()) {
                ui.show(markers::MOMOTALK, MOMOTALK);
            } else if invite_icon.contains(point.into()) {
                ui.show(markers::CONFIRM, Region::new(700, 480, 120, 40));
            }
        });
        driver.show(markers::INVITE, invite_icon);

        let mut task = CafeTask::new(CafeSettings {
            invite_student: true,
            student_name: "Shiroko".to_string(),
            ..settings()
        });
        task.run(&mut driver).unwrap();

        assert_eq!(driver.swipes.len(), 1);
        assert_eq!(driver.taps_at(invite_icon.center().into()), 1);
        assert_eq!(driver.taps_at(Region::new(700, 480, 120, 40).center().into()), 1);
    }

    #[test]
    fn test_gives_up_on_unknown_student() {
        let mut driver = cafe_screen();
        driver.show(markers::AVAILABLE, SPOT);
        driver.show(markers::MOMOTALK, MOMOTALK);
        driver.set_text(MOMOTALK, &["Aru", "Haruka"]);

        let mut task = CafeTask::new(CafeSettings {
            invite_student: true,
            student_name: "Hoshino".to_string(),
            ..settings()
        });
        task.run(&mut driver).unwrap();
        assert_eq!(driver.swipes.len(), 1);
    }

    #[test]
    fn test_empty_name_is_skipped() {
        let mut driver = cafe_screen();
        driver.show(markers::AVAILABLE, SPOT);

        let mut task = CafeTask::new(CafeSettings {
            invite_student: true,
            student_name: "  ".to_string(),
            ..settings()
        });
        task.run(&mut driver).unwrap();
        assert_eq!(driver.touches, vec![buttons::HOME]);
    }

    #[test]
    fn test_taps_floor_grid_and_claims_earnings() {
        let mut driver = cafe_screen();
        driver.on_touch(|ui, point| {
            if point == EARNINGS_BUTTON {
                ui.show(markers::EARNINGS, Region::new(400, 200, 400, 300));
            }
        });

        let mut task = CafeTask::new(CafeSettings {
            tap_students: true,
            claim_earnings: true,
            ..settings()
        });
        task.run(&mut driver).unwrap();

        assert_eq!(driver.taps_at((0, 140)), 1);
        assert_eq!(driver.taps_at((1350, 540)), 1);
        assert_eq!(driver.taps_at(EARNINGS_CLAIM), 1);
        assert_eq!(driver.touches.last(), Some(&buttons::HOME));
    }
}
