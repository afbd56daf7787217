//! Randomized pacing and touch placement
//!
//! Every tap lands on a uniformly chosen pixel of its target region and
//! every pause is stretched by a random amount, so the input stream never
//! repeats exactly.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::vision::region::{Point, Region};

/// Default pause range in seconds when the caller gives no base
const DEFAULT_SLEEP_MIN_SECS: f64 = 0.4;
const DEFAULT_SLEEP_MAX_SECS: f64 = 0.7;

/// Source of randomness for pacing and touch positions
pub struct Humanizer {
    rng: StdRng,
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Humanizer {
    /// Create a humanizer seeded from the OS
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a reproducible humanizer (for testing)
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pause length drawn uniformly from `[base, base + flex]` seconds.
    ///
    /// `flex` defaults to `base`. Without a base the pause falls between
    /// 0.4 and 0.7 seconds.
    pub fn sleep_duration(&mut self, base: Option<f64>, flex: Option<f64>) -> Duration {
        let (low, high) = match base {
            None => (DEFAULT_SLEEP_MIN_SECS, DEFAULT_SLEEP_MAX_SECS),
            Some(base) => {
                let base = base.max(0.0);
                (base, base + flex.unwrap_or(base).max(0.0))
            }
        };

        if high <= low {
            return Duration::from_secs_f64(low);
        }
        Duration::from_secs_f64(self.rng.gen_range(low..=high))
    }

    /// Uniform integer in `[min, max]`, both ends included
    pub fn random_coord(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// A random point inside the region, edges included
    pub fn random_point(&mut self, region: &Region) -> Point {
        Point::new(
            self.random_coord(region.x, region.right()),
            self.random_coord(region.y, region.bottom()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_point_stays_in_region() {
        let mut humanizer = Humanizer::seeded(7);
        let region = Region::new(800, 620, 55, 70);

        for _ in 0..500 {
            let point = humanizer.random_point(&region);
            assert!(region.contains(point));
        }
    }

    #[test]
    fn test_random_point_degenerate_region() {
        let mut humanizer = Humanizer::seeded(1);
        let point = humanizer.random_point(&Region::new(10, 20, 0, 0));
        assert_eq!(point, Point::new(10, 20));
    }

    #[test]
    fn test_sleep_duration_ranges() {
        let mut humanizer = Humanizer::seeded(3);

        for _ in 0..200 {
            let d = humanizer.sleep_duration(None, None).as_secs_f64();
            assert!((DEFAULT_SLEEP_MIN_SECS..=DEFAULT_SLEEP_MAX_SECS).contains(&d));

            let d = humanizer.sleep_duration(Some(1.0), None).as_secs_f64();
            assert!((1.0..=2.0).contains(&d));

            let d = humanizer.sleep_duration(Some(2.0), Some(0.5)).as_secs_f64();
            assert!((2.0..=2.5).contains(&d));
        }
    }

    #[test]
    fn test_zero_base_returns_zero() {
        let mut humanizer = Humanizer::seeded(5);
        assert_eq!(humanizer.sleep_duration(Some(0.0), None), Duration::ZERO);
    }
}
