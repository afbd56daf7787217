//! Navigation state machine
//!
//! Each tick captures the screen and takes the single most useful step
//! toward the destination: stop if it shows, open it from its parent,
//! dismiss a popup, or touch an empty spot to wake the UI. After five wake
//! touches in a row the router backs out to the home screen and starts
//! over, so it cannot wander forever on an unknown screen.

use crate::driver::Driver;
use crate::error::{AutomationError, Result};

use super::state::{
    buttons, markers, CampaignSection, Destination, HomeSection, Route, CAMPAIGN_ROUTES,
    HOME_ROUTES,
};

/// Wake touches allowed before falling back to a home reset
pub const IDLE_LIMIT: u32 = 5;

/// Swipe that scrolls the campaign banners to the event entry
const EVENT_SCROLL: ((i32, i32), (i32, i32)) = ((40, 160), (260, 40));

/// Bring up `dest`, returning once its marker is on screen
pub fn goto(driver: &mut dyn Driver, dest: Destination) -> Result<()> {
    log::debug!("Navigating to {}", dest);
    match dest {
        Destination::Home => home(driver),
        _ => route(driver, dest),
    }
}

pub fn sub_home(driver: &mut dyn Driver, section: HomeSection) -> Result<()> {
    goto(driver, Destination::SubHome(section))
}

pub fn sub_campaign(driver: &mut dyn Driver, section: CampaignSection) -> Result<()> {
    goto(driver, Destination::SubCampaign(section))
}

/// Press the home button until the home screen shows
pub fn home(driver: &mut dyn Driver) -> Result<()> {
    return_home(driver, buttons::HOME)
}

/// Press back until the home screen shows
pub fn home_reset(driver: &mut dyn Driver) -> Result<()> {
    log::warn!("Unknown screen, backing out to home");
    return_home(driver, buttons::BACK)
}

fn return_home(driver: &mut dyn Driver, (x, y): (i32, i32)) -> Result<()> {
    loop {
        driver.tick()?;
        if driver.is_visible_color(markers::HOME)? {
            return Ok(());
        }
        if driver.is_visible(markers::SKIP)? {
            driver.touch(buttons::SKIP_CONFIRM.0, buttons::SKIP_CONFIRM.1)?;
        } else {
            driver.touch(x, y)?;
        }
    }
}

fn home_route(section: HomeSection) -> Result<Route> {
    HOME_ROUTES
        .get(&section)
        .copied()
        .ok_or_else(|| AutomationError::Task(format!("no route to {:?}", section)))
}

fn campaign_route(section: CampaignSection) -> Result<Route> {
    CAMPAIGN_ROUTES
        .get(&section)
        .copied()
        .ok_or_else(|| AutomationError::Task(format!("no route to {:?}", section)))
}

fn marker(dest: Destination) -> Result<&'static str> {
    Ok(match dest {
        Destination::Home => markers::HOME,
        Destination::SubHome(section) => home_route(section)?.template,
        Destination::SubCampaign(section) => campaign_route(section)?.template,
        Destination::Event => markers::EVENT,
    })
}

/// What a tick did
enum Step {
    /// Moved toward the destination through a known screen
    Advanced,
    /// Touched something that may change the screen; no idle reset
    Retry,
    /// No known screen is showing
    Lost,
}

/// Take a step from a recognized ancestor screen, if one is showing
fn advance(driver: &mut dyn Driver, dest: Destination) -> Result<Step> {
    match dest {
        Destination::Home => Ok(Step::Lost),
        Destination::SubHome(section) => {
            if driver.is_visible_color(markers::HOME)? {
                let (x, y) = home_route(section)?.click;
                driver.touch(x, y)?;
                return Ok(Step::Advanced);
            }
            Ok(Step::Lost)
        }
        Destination::SubCampaign(section) => {
            if driver.is_visible_color(markers::CAMPAIGN)? {
                let (x, y) = campaign_route(section)?.click;
                driver.touch(x, y)?;
                return Ok(Step::Advanced);
            }
            if driver.is_visible_color(markers::HOME)? {
                route(driver, Destination::SubHome(HomeSection::Campaign))?;
                return Ok(Step::Advanced);
            }
            Ok(Step::Lost)
        }
        Destination::Event => {
            if driver.find_and_touch(markers::EVENT_BANNER)? {
                return Ok(Step::Retry);
            }
            if driver.is_visible_color(markers::CAMPAIGN)? {
                let (from, to) = EVENT_SCROLL;
                driver.swipe(from, to, 0)?;
                return Ok(Step::Advanced);
            }
            if driver.is_visible_color(markers::HOME)? {
                route(driver, Destination::SubHome(HomeSection::Campaign))?;
                return Ok(Step::Advanced);
            }
            Ok(Step::Lost)
        }
    }
}

fn route(driver: &mut dyn Driver, dest: Destination) -> Result<()> {
    let target = marker(dest)?;
    let mut idle = 0;

    loop {
        driver.tick()?;
        if driver.is_visible_color(target)? {
            log::debug!("Reached {}", dest);
            return Ok(());
        }

        match advance(driver, dest)? {
            Step::Advanced => {}
            Step::Retry => continue,
            Step::Lost => {
                if driver.is_visible(markers::SKIP)? {
                    driver.touch(buttons::SKIP_CONFIRM.0, buttons::SKIP_CONFIRM.1)?;
                } else if idle < IDLE_LIMIT && !driver.is_visible(markers::SETTINGS)? {
                    driver.touch(buttons::WAKE.0, buttons::WAKE.1)?;
                    idle += 1;
                    continue;
                } else if idle == IDLE_LIMIT {
                    home_reset(driver)?;
                } else {
                    driver.touch(buttons::BACK.0, buttons::BACK.1)?;
                }
            }
        }
        idle = 0;
    }
}
