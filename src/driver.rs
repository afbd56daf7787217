//! The perceive/act seam
//!
//! Navigation, sweeping and every task talk to the game only through
//! [`Driver`]. The live [`Session`](crate::Session) implements it over ADB;
//! tests implement it over a scripted screen.

use crate::config::TimingSettings;
use crate::error::Result;
use crate::vision::{match_word, Point, Region, ScanResult, Server, WordMatch, DEFAULT_SIMILARITY};

/// The stage list shown by missions, bounties, scrimmages and commissions
pub const STAGE_LIST: Region = Region::new(677, 132, 747, 678);

/// Swipe that scrolls the stage list toward later stages
const STAGE_SCROLL_DOWN: ((i32, i32), (i32, i32)) = ((900, 600), (900, 350));
/// Swipe that scrolls the stage list toward earlier stages
const STAGE_SCROLL_UP: ((i32, i32), (i32, i32)) = ((900, 350), (900, 600));

pub trait Driver {
    /// Capture a new frame; every find/scan afterwards reads that frame
    fn refresh(&mut self) -> Result<()>;

    /// Pause for about `secs` seconds
    fn sleep(&mut self, secs: f64);

    fn timings(&self) -> &TimingSettings;

    fn server(&self) -> Server;

    fn asset_exists(&self, name: &str) -> bool;

    fn find_with(&mut self, name: &str, similarity: f32, color: bool) -> Result<Option<Region>>;

    fn find_scaled(&mut self, name: &str, similarity: f32) -> Result<Option<Region>>;

    fn find_all(&mut self, name: &str, similarity: f32, use_mask: bool) -> Result<Vec<Point>>;

    /// Icon `name` in the band below `text`, see [`VisionSystem::find_button`](crate::vision::VisionSystem::find_button)
    fn find_button(&mut self, name: &str, text: Region, search: Region) -> Result<Option<Region>>;

    /// OCR over `region`; fails with `OcrEmpty` when nothing is read
    fn scan(&mut self, region: Region, resize: bool, color: bool) -> Result<Vec<ScanResult>>;

    fn touch(&mut self, x: i32, y: i32) -> Result<()>;

    /// Touch a random pixel of `region`
    fn touch_random(&mut self, region: &Region) -> Result<()>;

    fn swipe(&mut self, from: (i32, i32), to: (i32, i32), duration_ms: u32) -> Result<()>;

    /// Pause, then capture
    fn wait_refresh(&mut self, secs: f64) -> Result<()> {
        self.sleep(secs);
        self.refresh()
    }

    /// One polling step: the standard pause, then capture
    fn tick(&mut self) -> Result<()> {
        let secs = self.timings().tick;
        self.wait_refresh(secs)
    }

    /// Grayscale match at the default similarity
    fn find(&mut self, name: &str) -> Result<Option<Region>> {
        self.find_with(name, DEFAULT_SIMILARITY, false)
    }

    /// Color match at the default similarity
    fn find_color(&mut self, name: &str) -> Result<Option<Region>> {
        self.find_with(name, DEFAULT_SIMILARITY, true)
    }

    fn is_visible(&mut self, name: &str) -> Result<bool> {
        Ok(self.find(name)?.is_some())
    }

    fn is_visible_color(&mut self, name: &str) -> Result<bool> {
        Ok(self.find_color(name)?.is_some())
    }

    /// Touch the template if it is on screen, reporting whether it was
    fn find_and_touch(&mut self, name: &str) -> Result<bool> {
        match self.find(name)? {
            Some(region) => {
                self.touch_random(&region)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// First line of text in `region`, trimmed
    fn read_text(&mut self, region: Region, resize: bool) -> Result<String> {
        let results = self.scan(region, resize, false)?;
        Ok(results
            .first()
            .map(|r| r.text.trim().to_string())
            .unwrap_or_default())
    }

    /// Look for `word` in `region`, ignoring case and spaces
    fn find_word(&mut self, word: &str, region: Region) -> Result<WordMatch> {
        let results = self.scan(region, false, false)?;
        Ok(match_word(&results, word, region))
    }

    /// Scroll the stage list until `name` shows.
    ///
    /// The list is sorted, so the last visible entry tells which way to
    /// scroll. Gives up when a scroll no longer changes the last entry.
    fn find_stage(&mut self, name: &str) -> Result<Option<Region>> {
        let mut previous: Option<String> = None;
        loop {
            self.tick()?;
            let last = match self.find_word(name, STAGE_LIST)? {
                WordMatch::Found(region) => return Ok(Some(region)),
                WordMatch::Missing(last) => last,
            };

            if previous.is_some() && last == previous {
                log::error!("Stage {} not found. Check spelling.", name);
                return Ok(None);
            }

            let (from, to) = if last.as_deref().unwrap_or_default() < name {
                STAGE_SCROLL_DOWN
            } else {
                STAGE_SCROLL_UP
            };
            self.swipe(from, to, 0)?;
            previous = last;
        }
    }
}

/// Control over the game process, used by the orchestrator for recovery
pub trait AppControl {
    fn start_game(&mut self) -> Result<()>;

    fn stop_game(&mut self) -> Result<()>;

    /// Forget the stuck-detection history
    fn reset_action_records(&mut self);

    /// Whether the game has been seen in the foreground this session
    fn game_started(&self) -> bool;
}
