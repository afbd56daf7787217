//! Bounty
//!
//! Sweeps one stage at each of the three bounty locations.

use crate::config::settings::BountySettings;
use crate::driver::Driver;
use crate::error::Result;
use crate::game::CampaignSection;
use crate::vision::Region;

use super::{sweep_locations, Location, Task};

const TICKETS: Region = Region::new(225, 75, 45, 45);

pub struct BountyTask {
    settings: BountySettings,
}

impl BountyTask {
    pub fn new(settings: BountySettings) -> Self {
        Self { settings }
    }
}

impl Task for BountyTask {
    fn name(&self) -> &'static str {
        "Bounty"
    }

    fn run(&mut self, driver: &mut dyn Driver) -> Result<()> {
        let locations = [
            Location {
                name: "Overpass",
                open: (800, 200),
                run: &self.settings.overpass,
            },
            Location {
                name: "Desert Railroad",
                open: (800, 310),
                run: &self.settings.desert_railroad,
            },
            Location {
                name: "Classroom",
                open: (800, 410),
                run: &self.settings.classroom,
            },
        ];
        sweep_locations(
            driver,
            "Bounty",
            CampaignSection::Bounty,
            TICKETS,
            &locations,
            false,
        )
    }
}
