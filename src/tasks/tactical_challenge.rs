//! Tactical Challenge
//!
//! Claims the two reward boxes, then fights one of the three offered
//! opponents per ticket, picked by the configured rank preference. A win
//! or loss is read off the result screen; the arena's cooldown is waited out
//! between fights.

use crate::config::RankPreference;
use crate::driver::Driver;
use crate::error::{AutomationError, Result};
use crate::game::{router, CampaignSection};
use crate::vision::{Region, WordMatch};

use super::Task;

const TICKETS: Region = Region::new(208, 472, 44, 33);
const OPTIONS: [Region; 3] = [
    Region::new(702, 198, 64, 42),
    Region::new(702, 364, 57, 33),
    Region::new(702, 511, 63, 44),
];
const FORMATION: Region = Region::new(560, 550, 165, 25);
const MOBILISE: Region = Region::new(1100, 640, 130, 55);
const OUTCOME: Region = Region::new(405, 240, 465, 210);

/// Refreshes the list of opponents
const REFRESH: (i32, i32) = (1160, 145);
/// Dismisses the "skip battle" prompt
const NO_TICK_CONFIRM: (i32, i32) = (1106, 600);

const NO_TICKETS: &str = "0/5";

pub mod markers {
    pub const FORMATION: &str = "tactical_challenge/formation";
    pub const NO_TICK: &str = "tactical_challenge/no tick";
    pub const MOBILISE: &str = "tactical_challenge/mobilise";
    pub const BATTLE_RESULT: &str = "tactical_challenge/battle result";
    pub const NO_TICKETS: &str = "tactical_challenge/no tickets";
    pub const BEST: &str = "tactical_challenge/best";

    pub fn claim(index: usize) -> String {
        format!("tactical_challenge/claim/{}", index)
    }
}

pub struct TacticalChallengeTask {
    rank: RankPreference,
    wins: u32,
    losses: u32,
}

impl TacticalChallengeTask {
    pub fn new(rank: RankPreference) -> Self {
        Self {
            rank,
            wins: 0,
            losses: 0,
        }
    }

    pub fn wins(&self) -> u32 {
        self.wins
    }

    pub fn losses(&self) -> u32 {
        self.losses
    }

    fn claim(&self, driver: &mut dyn Driver) -> Result<()> {
        for index in 0..2 {
            let name = markers::claim(index);
            loop {
                driver.tick()?;
                match driver.find_color(&name)? {
                    Some(region) => driver.touch_random(&region)?,
                    None => {
                        router::sub_campaign(driver, CampaignSection::TacticalChallenge)?;
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether any ticket is left
    fn read_tickets(&self, driver: &mut dyn Driver) -> Result<bool> {
        driver.refresh()?;
        let owned = driver.read_text(TICKETS, false)?;
        log::info!("Tickets owned: {}", owned);
        if owned == NO_TICKETS {
            log::warn!("Run out of tickets");
            log::info!("Total Wins: {}", self.wins);
            log::info!("Total Loses: {}", self.losses);
            return Ok(false);
        }
        Ok(true)
    }

    /// Refresh the opponents and open the one matching the preference
    fn pick_opponent(&self, driver: &mut dyn Driver) -> Result<()> {
        driver.touch(REFRESH.0, REFRESH.1)?;
        let settle = driver.timings().settle;
        driver.wait_refresh(settle)?;

        let mut options = Vec::with_capacity(OPTIONS.len());
        for region in OPTIONS {
            let text = driver.read_text(region, false)?;
            let rank: u32 = text.parse().map_err(|_| {
                log::warn!("Unreadable rank {:?}", text);
                AutomationError::OcrEmpty
            })?;
            options.push((region, rank));
        }
        log::info!(
            "Ranks detected: {}, {}, {}",
            options[0].1,
            options[1].1,
            options[2].1
        );

        let (region, rank) = choose(&mut options, self.rank);
        log::info!("Ranks set to {:?} -> {}", self.rank, rank);
        driver.touch_random(&region)?;
        driver.wait_refresh(settle)
    }

    /// Start the battle and record its result
    fn fight(&mut self, driver: &mut dyn Driver) -> Result<()> {
        loop {
            driver.tick()?;
            if driver.is_visible(markers::MOBILISE)? {
                driver.touch_random(&MOBILISE)?;
            }
            if driver.is_visible(markers::BATTLE_RESULT)? {
                match driver.find_word("lose", OUTCOME)? {
                    WordMatch::Found(_) => {
                        log::info!("Result Battle: Lose");
                        self.losses += 1;
                    }
                    WordMatch::Missing(_) => {
                        log::info!("Result Battle: Win");
                        self.wins += 1;
                    }
                }
                break;
            }
        }

        router::sub_campaign(driver, CampaignSection::TacticalChallenge)?;
        if driver.is_visible(markers::BEST)? {
            log::info!("New Best Season Scored!");
            router::sub_campaign(driver, CampaignSection::TacticalChallenge)?;
        }
        Ok(())
    }
}

/// Rank numbers are sorted high to low, so the best placed opponent is last
fn choose(options: &mut [(Region, u32)], preference: RankPreference) -> (Region, u32) {
    options.sort_by(|a, b| b.1.cmp(&a.1));
    let index = match preference {
        RankPreference::Highest => options.len() - 1,
        RankPreference::Middle => options.len() / 2,
        RankPreference::Lowest => 0,
    };
    options[index]
}

impl Task for TacticalChallengeTask {
    fn name(&self) -> &'static str {
        "Tactical Challenge"
    }

    fn run(&mut self, driver: &mut dyn Driver) -> Result<()> {
        router::sub_campaign(driver, CampaignSection::TacticalChallenge)?;
        self.claim(driver)?;
        if !self.read_tickets(driver)? {
            return Ok(());
        }

        loop {
            self.pick_opponent(driver)?;
            loop {
                driver.tick()?;
                if driver.is_visible(markers::FORMATION)? {
                    driver.touch_random(&FORMATION)?;
                    continue;
                }
                if driver.is_visible(markers::NO_TICK)? {
                    driver.touch(NO_TICK_CONFIRM.0, NO_TICK_CONFIRM.1)?;
                    continue;
                }
                if driver.is_visible(markers::MOBILISE)? {
                    self.fight(driver)?;
                    if !self.read_tickets(driver)? {
                        return Ok(());
                    }
                    let standby = driver.timings().standby;
                    log::info!("Waiting {:.0}s standby time", standby);
                    driver.sleep(standby);
                    break;
                }
                if driver.is_visible(markers::NO_TICKETS)? {
                    log::warn!("Run out of tickets");
                    return Ok(());
                }
            }
        }
    }
}
