//! In-game activities
//!
//! Each task drives one activity from whatever screen the game is on and
//! leaves it on a screen the router can recover from. Tasks are built once
//! from the settings, in the order they run.

pub mod bounty;
pub mod cafe;
pub mod claim_rewards;
pub mod login;
pub mod mission;
pub mod scrimmage;
pub mod tactical_challenge;

use crate::config::{Settings, SettingsStore, StageRun};
use crate::driver::{Driver, STAGE_LIST};
use crate::error::{AutomationError, Result};
use crate::game::state::{buttons, CAMPAIGN_ROUTES};
use crate::game::sweep::{self, markers};
use crate::game::{router, CampaignSection, SweepOutcome};
use crate::vision::Region;

pub use bounty::BountyTask;
pub use cafe::CafeTask;
pub use claim_rewards::ClaimRewardsTask;
pub use login::LoginTask;
pub use mission::{MissionTask, Recharge};
pub use scrimmage::ScrimmageTask;
pub use tactical_challenge::TacticalChallengeTask;

/// A runnable activity
pub trait Task {
    /// Name used in logs and the traceback file
    fn name(&self) -> &'static str;

    fn run(&mut self, driver: &mut dyn Driver) -> Result<()>;
}

/// One enabled task
pub enum TaskKind {
    Login(LoginTask),
    Cafe(CafeTask),
    Bounty(BountyTask),
    Scrimmage(ScrimmageTask),
    Mission(MissionTask),
    TacticalChallenge(TacticalChallengeTask),
    ClaimRewards(ClaimRewardsTask),
}

impl TaskKind {
    fn task(&mut self) -> &mut dyn Task {
        match self {
            TaskKind::Login(task) => task,
            TaskKind::Cafe(task) => task,
            TaskKind::Bounty(task) => task,
            TaskKind::Scrimmage(task) => task,
            TaskKind::Mission(task) => task,
            TaskKind::TacticalChallenge(task) => task,
            TaskKind::ClaimRewards(task) => task,
        }
    }
}

impl Task for TaskKind {
    fn name(&self) -> &'static str {
        match self {
            TaskKind::Login(task) => task.name(),
            TaskKind::Cafe(task) => task.name(),
            TaskKind::Bounty(task) => task.name(),
            TaskKind::Scrimmage(task) => task.name(),
            TaskKind::Mission(task) => task.name(),
            TaskKind::TacticalChallenge(task) => task.name(),
            TaskKind::ClaimRewards(task) => task.name(),
        }
    }

    fn run(&mut self, driver: &mut dyn Driver) -> Result<()> {
        self.task().run(driver)
    }
}

/// Build the enabled tasks in run order.
///
/// Farming tasks need both the farming switch and their own. The mission
/// task takes `store` to persist its queue.
pub fn build_enabled(settings: &Settings, store: Box<dyn SettingsStore>) -> Vec<TaskKind> {
    let mut tasks = Vec::new();
    let farming = &settings.farming;

    if settings.login.enabled {
        tasks.push(TaskKind::Login(LoginTask));
    }
    if settings.cafe.enabled {
        tasks.push(TaskKind::Cafe(CafeTask::new(settings.cafe.clone())));
    }
    if farming.enabled && farming.bounty.enabled {
        tasks.push(TaskKind::Bounty(BountyTask::new(farming.bounty.clone())));
    }
    if farming.enabled && farming.scrimmage.enabled {
        tasks.push(TaskKind::Scrimmage(ScrimmageTask::new(farming.scrimmage.clone())));
    }
    if farming.enabled && farming.mission.enabled {
        let recharge = Recharge {
            cafe_earnings: settings.cafe.enabled && settings.cafe.claim_earnings,
            claim_rewards: settings
                .claim_rewards
                .enabled
                .then(|| settings.claim_rewards.clone()),
        };
        tasks.push(TaskKind::Mission(MissionTask::new(
            farming.mission.clone(),
            recharge,
            store,
        )));
    }
    if farming.enabled && farming.tactical_challenge.enabled {
        tasks.push(TaskKind::TacticalChallenge(TacticalChallengeTask::new(
            farming.tactical_challenge.rank,
        )));
    }
    if settings.claim_rewards.enabled {
        tasks.push(TaskKind::ClaimRewards(ClaimRewardsTask::new(
            settings.claim_rewards.clone(),
        )));
    }

    tasks
}

/// Enter icons next to the stages of a stage list
pub mod enter {
    pub const SMALL: &str = "farming/small_enter";
    pub const BIG: &str = "farming/big_enter";
}

/// Touches of the enter button allowed before the sweep dialog must show
const ENTER_ATTEMPTS: u32 = 20;

/// Open `stage` from the stage list and sweep it `runs` times.
///
/// A stage that cannot be found, or has no enter button because it is
/// still locked, is reported as failed.
pub(crate) fn enter_and_sweep(
    driver: &mut dyn Driver,
    label: &str,
    stage: &str,
    icon: &str,
    runs: u32,
) -> Result<SweepOutcome> {
    let Some(stage_region) = driver.find_stage(stage)? else {
        return Ok(SweepOutcome::Failed);
    };

    let Some(button) = driver.find_button(icon, stage_region, STAGE_LIST)? else {
        log::error!("{} {} is not unlocked", label, stage);
        return Ok(SweepOutcome::Failed);
    };

    for _ in 0..ENTER_ATTEMPTS {
        driver.tick()?;
        if driver.is_visible(markers::SWEEP)? {
            return sweep::sweep(driver, runs);
        }
        driver.touch_random(&button)?;
    }

    log::warn!("Sweep dialog for {} {} never opened", label, stage);
    Err(AutomationError::GameStuck)
}

/// A tab of a location board such as bounty or scrimmage
pub(crate) struct Location<'a> {
    pub name: &'static str,
    pub open: (i32, i32),
    pub run: &'a StageRun,
}

/// Ticket counter value meaning no tickets are left
const NO_TICKETS: &str = "0/6";

/// Sweep one stage per location of a campaign section.
///
/// Locations with no runs are skipped, and nothing is done when the ticket
/// counter reads empty. With `stop_on_incomplete` an incomplete sweep ends
/// the whole board since the tickets are shared.
pub(crate) fn sweep_locations(
    driver: &mut dyn Driver,
    label: &str,
    section: CampaignSection,
    tickets: Region,
    locations: &[Location<'_>],
    stop_on_incomplete: bool,
) -> Result<()> {
    let marker = CAMPAIGN_ROUTES
        .get(&section)
        .map(|route| route.template)
        .ok_or_else(|| AutomationError::Task(format!("no route to {:?}", section)))?;

    router::sub_campaign(driver, section)?;

    let queue: Vec<&Location<'_>> = locations.iter().filter(|l| l.run.run_times != 0).collect();
    if queue.is_empty() {
        log::warn!(
            "{} was enabled but all locations run times were set to 0. Unable to proceed.",
            label
        );
        return Ok(());
    }

    let owned = driver.read_text(tickets, true)?;
    log::info!("Tickets owned: {}", owned);
    if owned == NO_TICKETS {
        log::warn!("Not enough tickets to run {}.", label);
        return Ok(());
    }

    for location in queue {
        log::info!(
            "Sweeping {} {} {} times",
            location.name,
            location.run.stage,
            location.run.run_times
        );
        while driver.is_visible(marker)? {
            driver.touch(location.open.0, location.open.1)?;
            driver.tick()?;
        }

        let outcome = enter_and_sweep(
            driver,
            location.name,
            &location.run.stage,
            enter::SMALL,
            location.run.run_times,
        )?;

        if let SweepOutcome::Incomplete(done) = outcome {
            if done == 0 {
                log::warn!("Not enough tickets to complete sweep");
            } else {
                log::warn!(
                    "Ran out of tickets but enough to complete stage {} times instead of {}",
                    done,
                    location.run.run_times
                );
            }
            if stop_on_incomplete {
                return Ok(());
            }
        }

        while !driver.is_visible_color(marker)? {
            driver.touch(buttons::BACK.0, buttons::BACK.1)?;
            driver.tick()?;
        }
    }

    Ok(())
}
