//! Scrimmage
//!
//! Same board as the bounty, with one stage per academy. The ticket counter
//! sits elsewhere on the CN client.

use crate::config::settings::ScrimmageSettings;
use crate::driver::Driver;
use crate::error::Result;
use crate::game::CampaignSection;
use crate::vision::{Region, Server};

use super::{sweep_locations, Location, Task};

fn tickets_region(server: Server) -> Region {
    match server {
        Server::CN => Region::new(155, 80, 50, 40),
        _ => Region::new(225, 75, 45, 45),
    }
}

pub struct ScrimmageTask {
    settings: ScrimmageSettings,
}

impl ScrimmageTask {
    pub fn new(settings: ScrimmageSettings) -> Self {
        Self { settings }
    }
}

impl Task for ScrimmageTask {
    fn name(&self) -> &'static str {
        "Scrimmage"
    }

    fn run(&mut self, driver: &mut dyn Driver) -> Result<()> {
        let locations = [
            Location {
                name: "Trinity",
                open: (800, 200),
                run: &self.settings.trinity,
            },
            Location {
                name: "Gehenna",
                open: (800, 310),
                run: &self.settings.gehenna,
            },
            Location {
                name: "Millennium",
                open: (800, 410),
                run: &self.settings.millennium,
            },
        ];
        let tickets = tickets_region(driver.server());
        sweep_locations(
            driver,
            "Scrimmage",
            CampaignSection::Scrimmage,
            tickets,
            &locations,
            true,
        )
    }
}
