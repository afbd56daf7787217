//! Game navigation and stage sweeping
//!
//! The router gets the game to a named screen from wherever it is; the
//! sweep controller repeats a cleared stage a given number of times.

pub mod router;
pub mod state;
pub mod sweep;

pub use router::goto;
pub use state::{CampaignSection, Destination, HomeSection};
pub use sweep::{sweep, SweepOutcome};
