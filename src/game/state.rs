//! Navigation destinations
//!
//! Named screens the router can reach, and the static tables that say how
//! to recognize each one and where to tap to open it from its parent.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

/// Sections opened from the home screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HomeSection {
    Cafe,
    Club,
    Tasks,
    Mailbox,
    Campaign,
}

/// Sections opened from the campaign screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignSection {
    Mission,
    Bounty,
    Scrimmage,
    Commissions,
    TacticalChallenge,
}

/// A screen the router can bring up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Home,
    SubHome(HomeSection),
    SubCampaign(CampaignSection),
    Event,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Home => f.write_str("home"),
            Destination::SubHome(section) => write!(f, "home/{:?}", section),
            Destination::SubCampaign(section) => write!(f, "campaign/{:?}", section),
            Destination::Event => f.write_str("event"),
        }
    }
}

/// How to open a section and how to tell it is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub click: (i32, i32),
    pub template: &'static str,
}

impl Route {
    const fn new(click: (i32, i32), template: &'static str) -> Self {
        Self { click, template }
    }
}

pub static HOME_ROUTES: Lazy<HashMap<HomeSection, Route>> = Lazy::new(|| {
    HashMap::from([
        (HomeSection::Cafe, Route::new((90, 660), "goto/cafe")),
        (HomeSection::Club, Route::new((560, 650), "goto/club")),
        (HomeSection::Tasks, Route::new((61, 235), "goto/tasks")),
        (HomeSection::Mailbox, Route::new((1142, 38), "goto/mailbox")),
        (HomeSection::Campaign, Route::new((1220, 580), "goto/campaign")),
    ])
});

pub static CAMPAIGN_ROUTES: Lazy<HashMap<CampaignSection, Route>> = Lazy::new(|| {
    HashMap::from([
        (CampaignSection::Mission, Route::new((785, 155), "goto/mission")),
        (CampaignSection::Bounty, Route::new((735, 430), "goto/bounty")),
        (CampaignSection::Scrimmage, Route::new((720, 600), "goto/scrimmage")),
        (CampaignSection::Commissions, Route::new((700, 505), "goto/commissions")),
        (
            CampaignSection::TacticalChallenge,
            Route::new((1100, 500), "goto/tactical_challenge"),
        ),
    ])
});

/// Marker templates shared by every route
pub mod markers {
    pub const HOME: &str = "goto/home";
    pub const CAMPAIGN: &str = "goto/campaign";
    pub const EVENT: &str = "goto/event";
    pub const EVENT_BANNER: &str = "goto/event_banner";
    pub const SKIP: &str = "goto/skip";
    /// Visible once the home screen widgets are showing
    pub const SETTINGS: &str = "goto/settings";
}

/// Fixed buttons of the navigation chrome
pub mod buttons {
    pub const HOME: (i32, i32) = (1235, 21);
    pub const BACK: (i32, i32) = (55, 40);
    pub const SKIP_CONFIRM: (i32, i32) = (765, 500);
    /// Empty spot that reveals the home widgets when touched
    pub const WAKE: (i32, i32) = (475, 20);
}
