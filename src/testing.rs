//! Test doubles for the device and the perceive/act seam

use std::collections::{HashMap, HashSet};
use std::path::Path;

use image::{Rgb, RgbImage};

use crate::android::input::{SWIPE_REPEAT_LIMIT, TOUCH_REPEAT_LIMIT};
use crate::android::{ActionRepeat, Device, DeviceResult};
use crate::config::TimingSettings;
use crate::driver::{AppControl, Driver};
use crate::error::{AutomationError, Result};
use crate::game::sweep;
use crate::vision::{Point, Region, ScanResult, Server};
use crate::{Action, GAME_PACKAGE};

/// A phone that records input and answers the queries the crate makes
pub struct FakeDevice {
    pub foreground: Option<String>,
    pub packages: Vec<String>,
    pub size: (u32, u32),
    pub screen: Option<RgbImage>,
    pub taps: Vec<(i32, i32)>,
    pub swipes: Vec<(i32, i32, i32, i32)>,
    pub shell_log: Vec<String>,
}

impl FakeDevice {
    /// 1280x720 device with the game installed and `package` in front
    pub fn running(package: &str) -> Self {
        Self {
            foreground: Some(package.to_string()),
            packages: vec!["com.android.settings".to_string(), GAME_PACKAGE.to_string()],
            size: (1280, 720),
            screen: Some(RgbImage::from_pixel(1280, 720, Rgb([64, 64, 64]))),
            taps: Vec::new(),
            swipes: Vec::new(),
            shell_log: Vec::new(),
        }
    }
}

impl Device for FakeDevice {
    fn shell(&mut self, command: &str) -> DeviceResult<String> {
        self.shell_log.push(command.to_string());
        Ok(String::new())
    }

    fn exec_out(&mut self, command: &str) -> DeviceResult<Vec<u8>> {
        self.shell_log.push(command.to_string());
        let mut png = Vec::new();
        if let Some(screen) = &self.screen {
            screen
                .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| crate::android::DeviceError::CommandFailed(e.to_string()))?;
        }
        Ok(png)
    }

    fn push(&mut self, _local: &Path, remote: &str) -> DeviceResult<()> {
        self.shell_log.push(format!("push {}", remote));
        Ok(())
    }

    fn tap(&mut self, x: i32, y: i32) -> DeviceResult<()> {
        self.taps.push((x, y));
        Ok(())
    }

    fn swipe(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, _duration_ms: u32) -> DeviceResult<()> {
        self.swipes.push((x1, y1, x2, y2));
        Ok(())
    }

    fn current_package(&mut self) -> DeviceResult<Option<String>> {
        Ok(self.foreground.clone())
    }

    fn app_start(&mut self, package: &str) -> DeviceResult<()> {
        self.foreground = Some(package.to_string());
        Ok(())
    }

    fn app_stop(&mut self, _package: &str) -> DeviceResult<()> {
        self.foreground = None;
        Ok(())
    }

    fn installed_packages(&mut self) -> DeviceResult<Vec<String>> {
        Ok(self.packages.clone())
    }

    fn screen_size(&mut self) -> DeviceResult<(u32, u32)> {
        Ok(self.size)
    }
}

/// What the scripted screen currently shows
#[derive(Debug, Default)]
pub struct FakeUi {
    visible: HashMap<String, Region>,
    texts: HashMap<Region, Vec<String>>,
}

impl FakeUi {
    pub fn show(&mut self, template: &str, at: Region) {
        self.visible.insert(template.to_string(), at);
    }

    pub fn hide(&mut self, template: &str) {
        self.visible.remove(template);
    }

    pub fn is_showing(&self, template: &str) -> bool {
        self.visible.contains_key(template)
    }

    /// Lines OCR will read from exactly `region`
    pub fn set_text(&mut self, region: Region, lines: &[&str]) {
        self.texts
            .insert(region, lines.iter().map(|l| l.to_string()).collect());
    }

    pub fn clear_text(&mut self, region: Region) {
        self.texts.remove(&region);
    }
}

type TouchHandler = Box<dyn FnMut(&mut FakeUi, (i32, i32))>;
type SwipeHandler = Box<dyn FnMut(&mut FakeUi, (i32, i32), (i32, i32))>;

/// Scripted game screen behind the [`Driver`] seam.
///
/// Templates are "found" when shown, OCR reads the lines set for the exact
/// region asked, and touch handlers mutate the screen like the game would.
pub struct FakeDriver {
    pub ui: FakeUi,
    pub touches: Vec<(i32, i32)>,
    pub swipes: Vec<((i32, i32), (i32, i32))>,
    pub refreshes: usize,
    pub refresh_limit: usize,
    pub assets: HashSet<String>,
    pub server: Server,
    pub starts: usize,
    pub stops: usize,
    pub record_resets: usize,
    pub started: bool,
    timings: TimingSettings,
    repeats: Option<(ActionRepeat, ActionRepeat)>,
    touch_handlers: Vec<TouchHandler>,
    swipe_handlers: Vec<SwipeHandler>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            ui: FakeUi::default(),
            touches: Vec::new(),
            swipes: Vec::new(),
            refreshes: 0,
            refresh_limit: 1000,
            assets: HashSet::new(),
            server: Server::EN,
            starts: 0,
            stops: 0,
            record_resets: 0,
            started: true,
            timings: TimingSettings::instant(),
            repeats: None,
            touch_handlers: Vec::new(),
            swipe_handlers: Vec::new(),
        }
    }

    /// Count identical inputs the way the live executor does, so a screen
    /// that never reacts ends in [`AutomationError::GameStuck`]
    pub fn with_stuck_detection(mut self) -> Self {
        self.repeats = Some((
            ActionRepeat::new(TOUCH_REPEAT_LIMIT),
            ActionRepeat::new(SWIPE_REPEAT_LIMIT),
        ));
        self
    }

    pub fn show(&mut self, template: &str, at: Region) {
        self.ui.show(template, at);
    }

    pub fn hide(&mut self, template: &str) {
        self.ui.hide(template);
    }

    pub fn set_text(&mut self, region: Region, lines: &[&str]) {
        self.ui.set_text(region, lines);
    }

    /// Run `handler` on every touch, after the handlers added before it
    pub fn on_touch(&mut self, handler: impl FnMut(&mut FakeUi, (i32, i32)) + 'static) {
        self.touch_handlers.push(Box::new(handler));
    }

    pub fn on_swipe(&mut self, handler: impl FnMut(&mut FakeUi, (i32, i32), (i32, i32)) + 'static) {
        self.swipe_handlers.push(Box::new(handler));
    }

    pub fn taps_at(&self, point: (i32, i32)) -> usize {
        self.touches.iter().filter(|&&p| p == point).count()
    }

    /// An open sweep dialog whose counter starts at `start` and can be
    /// raised to `max`
    pub fn sweep_dialog(&mut self, start: u32, max: u32) {
        let dialog = Region::new(500, 200, 300, 300);
        let mut counter = start;
        self.show(sweep::markers::SWEEP, dialog);
        self.set_text(sweep::COUNTER, &[&counter.to_string()]);
        self.on_touch(move |ui, point| match point {
            sweep::PLUS if counter < max => {
                counter += 1;
                ui.set_text(sweep::COUNTER, &[&counter.to_string()]);
            }
            sweep::MINUS if counter > 1 => {
                counter -= 1;
                ui.set_text(sweep::COUNTER, &[&counter.to_string()]);
            }
            sweep::START => {
                ui.hide(sweep::markers::SWEEP);
                ui.show(sweep::markers::CONFIRM, dialog);
            }
            sweep::CONFIRM if ui.is_showing(sweep::markers::CONFIRM) => {
                ui.hide(sweep::markers::CONFIRM);
                ui.show(sweep::markers::COMPLETE, dialog);
            }
            _ => {}
        });
    }
}

impl Driver for FakeDriver {
    fn refresh(&mut self) -> Result<()> {
        self.refreshes += 1;
        if self.refreshes > self.refresh_limit {
            return Err(AutomationError::Task("fake screen refreshed too often".to_string()));
        }
        Ok(())
    }

    fn sleep(&mut self, _secs: f64) {}

    fn timings(&self) -> &TimingSettings {
        &self.timings
    }

    fn server(&self) -> Server {
        self.server
    }

    fn asset_exists(&self, name: &str) -> bool {
        self.assets.contains(name)
    }

    fn find_with(&mut self, name: &str, _similarity: f32, _color: bool) -> Result<Option<Region>> {
        Ok(self.ui.visible.get(name).copied())
    }

    fn find_scaled(&mut self, name: &str, _similarity: f32) -> Result<Option<Region>> {
        Ok(self.ui.visible.get(name).copied())
    }

    fn find_all(&mut self, name: &str, _similarity: f32, _use_mask: bool) -> Result<Vec<Point>> {
        Ok(self
            .ui
            .visible
            .get(name)
            .map(|r| vec![Point::new(r.x, r.y)])
            .unwrap_or_default())
    }

    fn find_button(&mut self, name: &str, _text: Region, _search: Region) -> Result<Option<Region>> {
        Ok(self.ui.visible.get(name).copied())
    }

    fn scan(&mut self, region: Region, _resize: bool, _color: bool) -> Result<Vec<ScanResult>> {
        match self.ui.texts.get(&region) {
            Some(lines) if !lines.is_empty() => Ok(lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let bbox = Region::new(region.x, region.y + i as i32 * 30, region.w.min(120), 30);
                    ScanResult::new(line.as_str(), Some(bbox))
                })
                .collect()),
            _ => Err(AutomationError::OcrEmpty),
        }
    }

    fn touch(&mut self, x: i32, y: i32) -> Result<()> {
        if let Some((touch, _)) = self.repeats.as_mut() {
            touch.record(Action::Touch { x, y })?;
        }
        self.touches.push((x, y));
        for handler in self.touch_handlers.iter_mut() {
            handler(&mut self.ui, (x, y));
        }
        Ok(())
    }

    fn touch_random(&mut self, region: &Region) -> Result<()> {
        let center = region.center();
        self.touch(center.x, center.y)
    }

    fn swipe(&mut self, from: (i32, i32), to: (i32, i32), duration_ms: u32) -> Result<()> {
        if let Some((_, swipe)) = self.repeats.as_mut() {
            swipe.record(Action::Swipe {
                start_x: from.0,
                start_y: from.1,
                end_x: to.0,
                end_y: to.1,
                duration_ms,
            })?;
        }
        self.swipes.push((from, to));
        for handler in self.swipe_handlers.iter_mut() {
            handler(&mut self.ui, from, to);
        }
        Ok(())
    }
}

impl AppControl for FakeDriver {
    fn start_game(&mut self) -> Result<()> {
        self.starts += 1;
        self.started = true;
        Ok(())
    }

    fn stop_game(&mut self) -> Result<()> {
        self.stops += 1;
        Ok(())
    }

    fn reset_action_records(&mut self) {
        self.record_resets += 1;
        if let Some((touch, swipe)) = self.repeats.as_mut() {
            touch.reset();
            swipe.reset();
        }
    }

    fn game_started(&self) -> bool {
        self.started
    }
}
