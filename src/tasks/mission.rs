//! Mission and Commissions
//!
//! Works through the persisted queue of `[mode, stage, runs]` entries,
//! sweeping each stage while AP lasts. The queue is saved after every
//! change so an interrupted run picks up where it stopped, and is reloaded
//! from the preferred template once per day when daily reset is on.

use chrono::{Local, NaiveDateTime};

use crate::config::settings::{daily_reset_due, ClaimRewardsSettings, MissionSettings};
use crate::config::{SettingsStore, StageMode, WorkEntry};
use crate::driver::Driver;
use crate::error::{AutomationError, Result};
use crate::game::state::markers as nav;
use crate::game::{router, CampaignSection, Destination, HomeSection, SweepOutcome};
use crate::vision::Region;

use super::claim_rewards::ClaimRewardsTask;
use super::{cafe, enter, enter_and_sweep, Task};

const AP: Region = Region::new(555, 0, 105, 45);
/// Area number shown above the mission stage list
const AREA: Region = Region::new(108, 178, 62, 37);

const AREA_PREVIOUS: (i32, i32) = (45, 360);
const AREA_NEXT: (i32, i32) = (1240, 360);
const NORMAL_TAB: (i32, i32) = (915, 160);
const HARD_TAB: (i32, i32) = (1065, 160);
const BASE_DEFENSE: (i32, i32) = (800, 200);
const ITEM_RETRIEVAL: (i32, i32) = (800, 310);

/// Least AP worth starting the queue with
const MIN_AP: u32 = 10;
/// Below this, an incomplete sweep is blamed on AP and a recharge is tried
const RECHARGE_BELOW: u32 = 20;
/// Task notifications can hide the AP counter for a few seconds
const AP_READ_ATTEMPTS: u32 = 6;
/// Hard stages can only be cleared three times a day
const HARD_RUN_LIMIT: u32 = 3;

pub mod markers {
    /// Visible while the normal difficulty tab is selected
    pub const NORMAL: &str = "farming/normal";
    /// Entry button of the event's quest list
    pub const QUEST: &str = "farming/quest";
}

/// Where AP can be refilled from before giving up
#[derive(Debug, Clone, Default)]
pub struct Recharge {
    pub cafe_earnings: bool,
    pub claim_rewards: Option<ClaimRewardsSettings>,
}

/// Screen a queue entry is swept from
#[derive(Debug, Clone, Copy)]
enum Venue {
    Mission,
    Commissions,
    Event,
}

impl From<StageMode> for Venue {
    fn from(mode: StageMode) -> Self {
        match mode {
            StageMode::Normal | StageMode::Hard => Venue::Mission,
            StageMode::BaseDefense | StageMode::ItemRetrieval => Venue::Commissions,
            StageMode::Event => Venue::Event,
        }
    }
}

fn parse_ap(text: &str) -> Option<(u32, u32)> {
    let (current, max) = text.split_once('/')?;
    Some((current.trim().parse().ok()?, max.trim().parse().ok()?))
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct MissionTask {
    settings: MissionSettings,
    recharge: Recharge,
    store: Box<dyn SettingsStore>,
    clock: fn() -> NaiveDateTime,
}

impl MissionTask {
    pub fn new(settings: MissionSettings, recharge: Recharge, store: Box<dyn SettingsStore>) -> Self {
        Self {
            settings,
            recharge,
            store,
            clock: local_now,
        }
    }

    /// Use `clock` instead of local time for the daily reset
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn queue(&self) -> &[WorkEntry] {
        &self.settings.queue
    }

    fn save_queue(&mut self) -> Result<()> {
        self.store.save_queue(&self.settings.queue)?;
        Ok(())
    }

    /// Read `current/max` AP from the screen of `venue`, or from the
    /// campaign screen
    fn read_ap(&self, driver: &mut dyn Driver, venue: Option<Venue>) -> Result<(u32, u32)> {
        match venue {
            None => router::sub_home(driver, HomeSection::Campaign)?,
            Some(Venue::Mission) => router::sub_campaign(driver, CampaignSection::Mission)?,
            Some(Venue::Commissions) => router::sub_campaign(driver, CampaignSection::Commissions)?,
            Some(Venue::Event) => router::goto(driver, Destination::Event)?,
        }

        for _ in 0..AP_READ_ATTEMPTS {
            driver.tick()?;
            let text = match driver.read_text(AP, false) {
                Ok(text) => text,
                Err(AutomationError::OcrEmpty) => continue,
                Err(err) => return Err(err),
            };
            if let Some(ap) = parse_ap(&text) {
                return Ok(ap);
            }
            log::debug!("AP unreadable: {:?}", text);
        }

        log::error!("Error reading AP");
        Err(AutomationError::OcrEmpty)
    }

    fn recharge_ap(&self, driver: &mut dyn Driver) -> Result<()> {
        log::info!("Attempting to recharge AP...");
        if self.recharge.cafe_earnings {
            router::sub_home(driver, HomeSection::Cafe)?;
            cafe::claim_earnings(driver)?;
        }
        if let Some(settings) = &self.recharge.claim_rewards {
            ClaimRewardsTask::new(settings.clone()).run(driver)?;
        }
        Ok(())
    }

    /// Replace the queue with the preferred template when the daily reset
    /// is due or nothing is queued
    fn refill_queue(&mut self) -> Result<()> {
        let mut reset = false;
        if self.settings.reset_daily {
            let now = (self.clock)();
            if daily_reset_due(now, self.settings.last_run, self.settings.reset_time) {
                log::info!("Reset Daily activated. Resetting queue...");
                self.settings.last_run = Some(now);
                self.store.save_last_run(now)?;
                reset = true;
            }
        }

        if reset || self.settings.queue.is_empty() {
            let name = &self.settings.preferred_template;
            let template = self.settings.templates.get(name).ok_or_else(|| {
                AutomationError::Task(format!("mission template {:?} is not defined", name))
            })?;
            self.settings.queue = template.clone();
            self.save_queue()?;
        }
        Ok(())
    }

    fn sweep_entry(&self, driver: &mut dyn Driver, entry: &WorkEntry) -> Result<SweepOutcome> {
        log::info!(
            "Current stage: {} {}, run {} times",
            entry.mode.label(),
            entry.stage,
            entry.runs
        );
        match entry.mode {
            StageMode::Normal | StageMode::Hard => self.mission(driver, entry),
            StageMode::BaseDefense | StageMode::ItemRetrieval => self.commissions(driver, entry),
            StageMode::Event => self.event(driver, entry),
        }
    }

    fn mission(&self, driver: &mut dyn Driver, entry: &WorkEntry) -> Result<SweepOutcome> {
        router::sub_campaign(driver, CampaignSection::Mission)?;

        let area = entry
            .stage
            .split('-')
            .next()
            .and_then(|a| a.trim().parse::<u32>().ok());
        let found = match area {
            Some(area) => find_area(driver, area)?,
            None => false,
        };
        if !found {
            log::error!("Area not found, please check spelling. Skipping stage...");
            return Ok(SweepOutcome::Failed);
        }

        let mut runs = entry.runs;
        if entry.mode == StageMode::Hard {
            if runs > HARD_RUN_LIMIT {
                log::warn!(
                    "Hard {} was set to be swept {} times. Reset to {} as it surpasses the limit.",
                    entry.stage,
                    runs,
                    HARD_RUN_LIMIT
                );
                runs = HARD_RUN_LIMIT;
            }
            while driver.is_visible(markers::NORMAL)? {
                driver.touch(HARD_TAB.0, HARD_TAB.1)?;
                driver.tick()?;
            }
        } else {
            while !driver.is_visible(markers::NORMAL)? {
                driver.touch(NORMAL_TAB.0, NORMAL_TAB.1)?;
                driver.tick()?;
            }
        }

        attempt_stage(driver, entry.mode, &entry.stage, runs)
    }

    fn commissions(&self, driver: &mut dyn Driver, entry: &WorkEntry) -> Result<SweepOutcome> {
        router::sub_campaign(driver, CampaignSection::Commissions)?;
        let (x, y) = if entry.mode == StageMode::BaseDefense {
            BASE_DEFENSE
        } else {
            ITEM_RETRIEVAL
        };
        while driver.is_visible("goto/commissions")? {
            driver.touch(x, y)?;
            driver.tick()?;
        }
        attempt_stage(driver, entry.mode, &entry.stage, entry.runs)
    }

    fn event(&self, driver: &mut dyn Driver, entry: &WorkEntry) -> Result<SweepOutcome> {
        if !self.settings.event {
            log::warn!("Event farming is disabled. Skipping {}...", entry.stage);
            return Ok(SweepOutcome::Failed);
        }
        if !driver.asset_exists(nav::EVENT_BANNER) {
            log::warn!("Event Banner not found. Unable to run event stages.");
            return Ok(SweepOutcome::Failed);
        }

        router::goto(driver, Destination::Event)?;
        while driver.find_and_touch(markers::QUEST)? {
            driver.tick()?;
        }
        attempt_stage(driver, entry.mode, &entry.stage, entry.runs)
    }
}

/// Page through the mission areas with the arrow buttons until `desired`
/// shows. Fails when a page turn does not change the area.
fn find_area(driver: &mut dyn Driver, desired: u32) -> Result<bool> {
    let mut last: Option<u32> = None;
    loop {
        driver.tick()?;
        let text = driver.read_text(AREA, true)?;
        let detected: u32 = text.parse().map_err(|_| {
            log::warn!("Area number unreadable: {:?}", text);
            AutomationError::OcrEmpty
        })?;

        if last == Some(detected) {
            return Ok(false);
        }
        let (x, y) = match detected.cmp(&desired) {
            std::cmp::Ordering::Equal => return Ok(true),
            std::cmp::Ordering::Less => AREA_NEXT,
            std::cmp::Ordering::Greater => AREA_PREVIOUS,
        };
        driver.touch(x, y)?;
        last = Some(detected);
    }
}

fn attempt_stage(driver: &mut dyn Driver, mode: StageMode, stage: &str, runs: u32) -> Result<SweepOutcome> {
    let icon = match mode {
        StageMode::Hard | StageMode::Event => enter::BIG,
        _ => enter::SMALL,
    };
    let outcome = enter_and_sweep(driver, mode.label(), stage, icon, runs)?;
    if let SweepOutcome::Incomplete(done) = outcome {
        if done > 0 {
            log::warn!(
                "Ran out of AP but enough to complete stage {} times instead of {}",
                done,
                runs
            );
        }
    }
    Ok(outcome)
}

impl Task for MissionTask {
    fn name(&self) -> &'static str {
        "Mission/Commissions"
    }

    fn run(&mut self, driver: &mut dyn Driver) -> Result<()> {
        let mut recharged = false;

        let (current, max) = self.read_ap(driver, None)?;
        log::info!("AP detected: {}/{}", current, max);
        if current < MIN_AP {
            log::warn!("Not enough AP to complete stages.");
            if !self.settings.recharge_ap {
                log::info!("Recharge AP disabled. Unable to complete stages.");
                return Ok(());
            }
            self.recharge_ap(driver)?;
            recharged = true;
            let (current, max) = self.read_ap(driver, None)?;
            log::info!("AP detected: {}/{}", current, max);
            if current < MIN_AP {
                log::warn!("Still not enough AP to complete stages. Unable to proceed.");
                return Ok(());
            }
        }

        self.refill_queue()?;

        while let Some(entry) = self.settings.queue.first().cloned() {
            if entry.runs == 0 {
                log::warn!("{} {} has no runs left. Skipping stage...", entry.mode.label(), entry.stage);
                self.settings.queue.remove(0);
                self.save_queue()?;
                continue;
            }

            let outcome = self.sweep_entry(driver, &entry)?;

            if let SweepOutcome::Incomplete(done) = outcome {
                let (current, max) = self.read_ap(driver, Some(entry.mode.into()))?;
                if !recharged && self.settings.recharge_ap {
                    if current < RECHARGE_BELOW {
                        self.settings.queue[0].runs = entry.runs.saturating_sub(done);
                        self.save_queue()?;
                        self.recharge_ap(driver)?;
                        recharged = true;
                        continue;
                    }
                } else {
                    self.settings.queue[0].runs = entry.runs.saturating_sub(done);
                    self.save_queue()?;
                    log::info!("AP left: {} / {}. Unable to complete stages.", current, max);
                    return Ok(());
                }
            }

            self.settings.queue.remove(0);
            self.save_queue()?;
        }

        log::info!("Mission queue cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::config::{ConfigError, MemoryStore};
    use crate::driver::STAGE_LIST;
    use crate::game::sweep::{self, markers as sweep_markers};
    use crate::testing::FakeDriver;

    const SPOT: Region = Region::new(10, 10, 20, 20);
    const ENTER: Region = Region::new(1100, 200, 60, 30);

    /// Store the test can still read after handing it to the task
    #[derive(Clone, Default)]
    struct SharedStore(Rc<RefCell<MemoryStore>>);

    impl SettingsStore for SharedStore {
        fn save_queue(&mut self, queue: &[WorkEntry]) -> std::result::Result<(), ConfigError> {
            self.0.borrow_mut().save_queue(queue)
        }

        fn save_last_run(&mut self, at: NaiveDateTime) -> std::result::Result<(), ConfigError> {
            self.0.borrow_mut().save_last_run(at)
        }
    }

    fn settings(queue: Vec<WorkEntry>) -> MissionSettings {
        MissionSettings {
            enabled: true,
            queue,
            ..MissionSettings::default()
        }
    }

    /// Mission screen at area 1 in normal mode with a sweepable stage list
    fn mission_screen(ap: &str, counter: u32, max: u32) -> FakeDriver {
        let mut driver = FakeDriver::new();
        driver.show("goto/campaign", SPOT);
        driver.show("goto/mission", SPOT);
        driver.show(markers::NORMAL, SPOT);
        driver.set_text(AP, &[ap]);
        driver.set_text(AREA, &["1"]);
        driver.set_text(STAGE_LIST, &["1-1", "1-2", "1-3"]);
        driver.show(enter::SMALL, ENTER);
        driver.show(enter::BIG, ENTER);
        driver.sweep_dialog(counter, max);
        driver.hide(sweep_markers::SWEEP);
        driver.on_touch(|ui, point| {
            if ENTER.contains(point.into()) {
                ui.show(sweep_markers::SWEEP, Region::new(500, 200, 300, 300));
            }
        });
        driver
    }

    #[test]
    fn test_parse_ap() {
        assert_eq!(parse_ap("120/150"), Some((120, 150)));
        assert_eq!(parse_ap(" 9 / 150"), Some((9, 150)));
        assert_eq!(parse_ap("Tasks"), None);
    }

    #[test]
    fn test_sweeps_queued_stage_and_pops_it() {
        let mut driver = mission_screen("120/150", 2, 99);
        let store = SharedStore::default();
        let mut task = MissionTask::new(
            settings(vec![WorkEntry::new(StageMode::Normal, "1-1", 5)]),
            Recharge::default(),
            Box::new(store.clone()),
        );

        task.run(&mut driver).unwrap();

        assert_eq!(driver.taps_at(sweep::PLUS), 3);
        assert_eq!(driver.taps_at(sweep::CONFIRM), 1);
        assert!(task.queue().is_empty());
        let saved = store.0.borrow();
        assert!(saved.queue.is_empty());
        assert_eq!(saved.saves, 1);
    }

    #[test]
    fn test_zero_run_entry_is_dropped_without_entering() {
        let mut driver = mission_screen("120/150", 2, 99);
        let store = SharedStore::default();
        let mut task = MissionTask::new(
            settings(vec![
                WorkEntry::new(StageMode::Normal, "1-2", 0),
                WorkEntry::new(StageMode::Normal, "1-1", 5),
            ]),
            Recharge::default(),
            Box::new(store.clone()),
        );

        task.run(&mut driver).unwrap();

        assert_eq!(driver.taps_at(sweep::PLUS), 3);
        assert_eq!(driver.taps_at(sweep::START), 1);
        assert!(task.queue().is_empty());
        assert_eq!(store.0.borrow().saves, 2);
    }

    #[test]
    fn test_low_ap_without_recharge_does_nothing() {
        let mut driver = mission_screen("4/150", 2, 99);
        let store = SharedStore::default();
        let queue = vec![WorkEntry::new(StageMode::Normal, "1-1", 5)];
        let mut task = MissionTask::new(settings(queue.clone()), Recharge::default(), Box::new(store.clone()));

        task.run(&mut driver).unwrap();
        assert_eq!(task.queue(), queue.as_slice());
        assert!(driver.touches.is_empty());
        assert_eq!(store.0.borrow().saves, 0);
    }

    #[test]
    fn test_incomplete_sweep_keeps_remainder() {
        let mut driver = mission_screen("30/150", 1, 3);
        let store = SharedStore::default();
        let mut task = MissionTask::new(
            settings(vec![
                WorkEntry::new(StageMode::Normal, "1-2", 5),
                WorkEntry::new(StageMode::Normal, "1-3", 1),
            ]),
            Recharge::default(),
            Box::new(store.clone()),
        );

        task.run(&mut driver).unwrap();
        let remaining = vec![
            WorkEntry::new(StageMode::Normal, "1-2", 2),
            WorkEntry::new(StageMode::Normal, "1-3", 1),
        ];
        assert_eq!(task.queue(), remaining.as_slice());
        assert_eq!(store.0.borrow().queue, remaining);
    }

    #[test]
    fn test_recharges_once_then_finishes_entry() {
        let mut driver = mission_screen("40/150", 1, 3);
        driver.on_touch(|ui, point| {
            if point == sweep::CONFIRM {
                ui.set_text(AP, &["5/150"]);
            }
        });
        let store = SharedStore::default();
        let mut mission = settings(vec![WorkEntry::new(StageMode::Normal, "1-1", 5)]);
        mission.recharge_ap = true;
        let mut task = MissionTask::new(mission, Recharge::default(), Box::new(store.clone()));

        task.run(&mut driver).unwrap();
        assert!(task.queue().is_empty());
        // Three runs done before the recharge, two after
        assert_eq!(driver.taps_at(sweep::MINUS), 1);
        assert_eq!(driver.taps_at(sweep::CONFIRM), 2);
        assert_eq!(store.0.borrow().saves, 2);
    }

    #[test]
    fn test_hard_stage_is_capped_and_paged_to() {
        let mut driver = mission_screen("100/150", 1, 9);
        driver.on_touch(|ui, point| match point {
            AREA_NEXT => ui.set_text(AREA, &["2"]),
            HARD_TAB => ui.hide(markers::NORMAL),
            _ => {}
        });
        driver.set_text(STAGE_LIST, &["2-1", "2-2", "2-3"]);
        let mut task = MissionTask::new(
            settings(vec![WorkEntry::new(StageMode::Hard, "2-3", 5)]),
            Recharge::default(),
            Box::new(MemoryStore::default()),
        );

        task.run(&mut driver).unwrap();
        assert_eq!(driver.taps_at(AREA_NEXT), 1);
        assert_eq!(driver.taps_at(HARD_TAB), 1);
        assert_eq!(driver.taps_at(sweep::PLUS), 2);
    }

    #[test]
    fn test_missing_area_fails_entry() {
        let mut driver = mission_screen("100/150", 1, 9);
        let mut task = MissionTask::new(
            settings(vec![WorkEntry::new(StageMode::Normal, "7-1", 2)]),
            Recharge::default(),
            Box::new(MemoryStore::default()),
        );

        task.run(&mut driver).unwrap();
        assert!(task.queue().is_empty());
        assert_eq!(driver.taps_at(AREA_NEXT), 1);
        assert_eq!(driver.taps_at(sweep::CONFIRM), 0);
    }

    #[test]
    fn test_commission_opens_its_tab() {
        let mut driver = mission_screen("100/150", 1, 9);
        driver.show("goto/commissions", SPOT);
        driver.on_touch(|ui, point| {
            if point == ITEM_RETRIEVAL {
                ui.hide("goto/commissions");
                ui.set_text(STAGE_LIST, &["01", "02"]);
            }
        });
        let mut task = MissionTask::new(
            settings(vec![WorkEntry::new(StageMode::ItemRetrieval, "02", 2)]),
            Recharge::default(),
            Box::new(MemoryStore::default()),
        );

        task.run(&mut driver).unwrap();
        assert_eq!(driver.taps_at(ITEM_RETRIEVAL), 1);
        assert_eq!(driver.taps_at(sweep::CONFIRM), 1);
    }

    #[test]
    fn test_daily_reset_reloads_template() {
        fn morning() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 3, 2)
                .and_then(|d| d.and_hms_opt(5, 0, 0))
                .unwrap()
        }

        let mut driver = mission_screen("100/150", 1, 9);
        let store = SharedStore::default();
        let mut mission = settings(vec![WorkEntry::new(StageMode::Normal, "1-1", 4)]);
        mission.reset_daily = true;
        mission.reset_time = NaiveTime::from_hms_opt(4, 0, 0).unwrap();
        mission.last_run = NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(22, 0, 0));
        mission.preferred_template = "daily".to_string();
        mission.templates = BTreeMap::from([(
            "daily".to_string(),
            vec![WorkEntry::new(StageMode::Event, "08", 3)],
        )]);

        let mut task =
            MissionTask::new(mission, Recharge::default(), Box::new(store.clone())).with_clock(morning);
        task.run(&mut driver).unwrap();

        // The stale entry was dropped and the disabled event stage skipped
        assert_eq!(driver.taps_at(sweep::CONFIRM), 0);
        assert!(task.queue().is_empty());
        assert_eq!(store.0.borrow().last_run, Some(morning()));
    }

    #[test]
    fn test_undefined_template_is_an_error() {
        let mut driver = mission_screen("100/150", 1, 9);
        let mut task = MissionTask::new(
            settings(Vec::new()),
            Recharge::default(),
            Box::new(MemoryStore::default()),
        );

        assert!(matches!(task.run(&mut driver), Err(AutomationError::Task(_))));
    }
}
