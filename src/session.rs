//! Live automation session
//!
//! Owns the device link and everything built on it: the capture strategy,
//! the latest frame, the vision system and the input executor. One session
//! drives one device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::android::{ActionExecutor, Device};
use crate::config::TimingSettings;
use crate::driver::{AppControl, Driver};
use crate::error::{AutomationError, Result, StartupError};
use crate::stealth::Humanizer;
use crate::vision::matching::{SCALE_LOWER, SCALE_UPPER};
use crate::vision::{Frame, Point, Region, ScanResult, ScreenCapture, Server, VisionSystem};
use crate::{GAME_PACKAGE, SCREEN_HEIGHT, SCREEN_WIDTH};

pub struct Session {
    device: Box<dyn Device>,
    capture: ScreenCapture,
    vision: VisionSystem,
    executor: ActionExecutor,
    humanizer: Humanizer,
    timings: TimingSettings,
    interrupt: Arc<AtomicBool>,
    frame: Option<Arc<Frame>>,
}

impl Session {
    pub fn new(
        device: Box<dyn Device>,
        capture: ScreenCapture,
        vision: VisionSystem,
        timings: TimingSettings,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        Self {
            device,
            capture,
            vision,
            executor: ActionExecutor::new(GAME_PACKAGE),
            humanizer: Humanizer::new(),
            timings,
            interrupt,
            frame: None,
        }
    }

    /// Fail unless the device runs at 1280x720 with the game installed
    pub fn validate_environment(&mut self) -> std::result::Result<(), StartupError> {
        let (width, height) = self.device.screen_size()?;
        log::info!("Screen resolution: {}x{}", width, height);
        if (width, height) != (SCREEN_WIDTH, SCREEN_HEIGHT) {
            return Err(StartupError::Resolution { width, height });
        }

        let packages = self.device.installed_packages()?;
        if !packages.iter().any(|p| p == GAME_PACKAGE) {
            return Err(StartupError::NotInstalled(GAME_PACKAGE.to_string()));
        }
        Ok(())
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frame.clone()
    }

    /// The current frame, capturing one if none has been taken yet
    fn frame(&mut self) -> Result<Arc<Frame>> {
        match &self.frame {
            Some(frame) => Ok(Arc::clone(frame)),
            None => {
                self.refresh()?;
                self.frame
                    .clone()
                    .ok_or_else(|| AutomationError::Task("no frame captured".to_string()))
            }
        }
    }

    fn check_interrupt(&self) -> Result<()> {
        if self.interrupt.load(Ordering::SeqCst) {
            return Err(AutomationError::Interrupted);
        }
        Ok(())
    }
}

impl Driver for Session {
    fn refresh(&mut self) -> Result<()> {
        self.check_interrupt()?;
        let frame = self.capture.capture(self.device.as_mut())?;
        self.frame = Some(frame);
        Ok(())
    }

    fn sleep(&mut self, secs: f64) {
        let pause = self.humanizer.sleep_duration(Some(secs), None);
        let scaled = pause.as_secs_f64() * self.timings.scale.max(0.0);
        if scaled > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(scaled));
        }
    }

    fn timings(&self) -> &TimingSettings {
        &self.timings
    }

    fn server(&self) -> Server {
        self.vision.server()
    }

    fn asset_exists(&self, name: &str) -> bool {
        self.vision.asset_exists(name)
    }

    fn find_with(&mut self, name: &str, similarity: f32, color: bool) -> Result<Option<Region>> {
        let frame = self.frame()?;
        Ok(self.vision.find(&frame, name, similarity, color)?)
    }

    fn find_scaled(&mut self, name: &str, similarity: f32) -> Result<Option<Region>> {
        let frame = self.frame()?;
        Ok(self
            .vision
            .find_scaled(&frame, name, similarity, SCALE_LOWER, SCALE_UPPER)?)
    }

    fn find_all(&mut self, name: &str, similarity: f32, use_mask: bool) -> Result<Vec<Point>> {
        let frame = self.frame()?;
        Ok(self.vision.find_all(&frame, name, similarity, use_mask)?)
    }

    fn find_button(&mut self, name: &str, text: Region, search: Region) -> Result<Option<Region>> {
        let frame = self.frame()?;
        Ok(self
            .vision
            .find_button(&frame, name, text, search, crate::vision::DEFAULT_SIMILARITY)?)
    }

    fn scan(&mut self, region: Region, resize: bool, color: bool) -> Result<Vec<ScanResult>> {
        let frame = self.frame()?;
        Ok(self.vision.scan(&frame, region, resize, color)?)
    }

    fn touch(&mut self, x: i32, y: i32) -> Result<()> {
        self.executor.touch(self.device.as_mut(), x, y)
    }

    fn touch_random(&mut self, region: &Region) -> Result<()> {
        self.executor
            .touch_random(self.device.as_mut(), &mut self.humanizer, region)
    }

    fn swipe(&mut self, from: (i32, i32), to: (i32, i32), duration_ms: u32) -> Result<()> {
        self.executor.swipe(self.device.as_mut(), from, to, duration_ms)
    }
}

impl AppControl for Session {
    fn start_game(&mut self) -> Result<()> {
        log::info!("Starting {}", GAME_PACKAGE);
        self.device.app_start(GAME_PACKAGE)?;
        Ok(())
    }

    fn stop_game(&mut self) -> Result<()> {
        log::info!("Stopping {}", GAME_PACKAGE);
        self.device.app_stop(GAME_PACKAGE)?;
        Ok(())
    }

    fn reset_action_records(&mut self) {
        self.executor.reset_records();
    }

    fn game_started(&self) -> bool {
        self.executor.game_started()
    }
}
