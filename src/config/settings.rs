//! User settings
//!
//! Mirrors the sections of `config.json`. Every field has a default so a
//! partial file still loads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::vision::{CaptureMode, Server};

/// Format of the persisted last-run timestamp
pub const LAST_RUN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub login: LoginSettings,
    pub cafe: CafeSettings,
    pub farming: FarmingSettings,
    pub claim_rewards: ClaimRewardsSettings,
    pub timings: TimingSettings,
}

impl Settings {
    /// Whether any top-level feature is switched on
    pub fn any_enabled(&self) -> bool {
        self.login.enabled || self.cafe.enabled || self.farming.enabled || self.claim_rewards.enabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSettings {
    pub enabled: bool,
    /// adb service address, `host:port` for TCP or a serial number
    pub network: String,
    pub server: Server,
    /// Game restarts allowed after a crash or freeze
    pub restart_attempts: u32,
    pub screenshot_mode: CaptureMode,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            network: "127.0.0.1:5555".to_string(),
            server: Server::EN,
            restart_attempts: 3,
            screenshot_mode: CaptureMode::ScreencapPng,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CafeSettings {
    pub enabled: bool,
    pub invite_student: bool,
    pub student_name: String,
    /// Tap across the cafe floor to collect affection
    pub tap_students: bool,
    pub claim_earnings: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmingSettings {
    pub enabled: bool,
    pub bounty: BountySettings,
    pub scrimmage: ScrimmageSettings,
    pub mission: MissionSettings,
    pub tactical_challenge: TacticalChallengeSettings,
}

/// A stage to sweep and how often
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageRun {
    pub stage: String,
    pub run_times: u32,
}

impl StageRun {
    pub fn new(stage: &str, run_times: u32) -> Self {
        Self {
            stage: stage.to_string(),
            run_times,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BountySettings {
    pub enabled: bool,
    pub overpass: StageRun,
    pub desert_railroad: StageRun,
    pub classroom: StageRun,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrimmageSettings {
    pub enabled: bool,
    pub trinity: StageRun,
    pub gehenna: StageRun,
    pub millennium: StageRun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionSettings {
    pub enabled: bool,
    pub recharge_ap: bool,
    pub reset_daily: bool,
    pub reset_time: NaiveTime,
    #[serde(with = "last_run_format")]
    pub last_run: Option<NaiveDateTime>,
    pub preferred_template: String,
    pub templates: BTreeMap<String, Vec<WorkEntry>>,
    pub queue: Vec<WorkEntry>,
    /// Allow event stages in the queue
    pub event: bool,
}

impl Default for MissionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            recharge_ap: false,
            reset_daily: false,
            reset_time: NaiveTime::from_hms_opt(4, 0, 0).unwrap_or_default(),
            last_run: None,
            preferred_template: String::new(),
            templates: BTreeMap::new(),
            queue: Vec::new(),
            event: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticalChallengeSettings {
    pub enabled: bool,
    pub rank: RankPreference,
}

/// Which of the three offered opponents to fight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankPreference {
    Highest,
    Middle,
    #[default]
    Lowest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimRewardsSettings {
    pub enabled: bool,
    pub club: bool,
    pub tasks: bool,
    pub mailbox: bool,
}

/// Pacing of the perceive/act loop, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Pause before each screen refresh in a polling loop
    pub tick: f64,
    /// Pause between repeated taps on the same control
    pub tap_interval: f64,
    /// Time for a freshly loaded list to settle
    pub settle: f64,
    /// Cooldown between tactical challenge fights
    pub standby: f64,
    /// Multiplier applied to every pause
    pub scale: f64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            tick: 1.0,
            tap_interval: 0.7,
            settle: 2.0,
            standby: 59.0,
            scale: 1.0,
        }
    }
}

impl TimingSettings {
    /// No pauses at all (for testing)
    pub fn instant() -> Self {
        Self {
            scale: 0.0,
            ..Self::default()
        }
    }
}

/// Kind of farmable stage in the mission queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageMode {
    /// Mission, normal difficulty
    Normal,
    /// Mission, hard difficulty
    Hard,
    /// Commissions, base defense
    BaseDefense,
    /// Commissions, item retrieval
    ItemRetrieval,
    Event,
}

impl StageMode {
    pub fn code(&self) -> &'static str {
        match self {
            StageMode::Normal => "N",
            StageMode::Hard => "H",
            StageMode::BaseDefense => "BD",
            StageMode::ItemRetrieval => "IR",
            StageMode::Event => "E",
        }
    }

    /// Human readable name for logs
    pub fn label(&self) -> &'static str {
        match self {
            StageMode::Normal => "Mission Normal",
            StageMode::Hard => "Mission Hard",
            StageMode::BaseDefense => "Commissions Base Defense",
            StageMode::ItemRetrieval => "Commissions Item Retrieval",
            StageMode::Event => "Event",
        }
    }
}

impl fmt::Display for StageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "N" => Ok(StageMode::Normal),
            "H" => Ok(StageMode::Hard),
            "BD" | "BR" => Ok(StageMode::BaseDefense),
            "IR" => Ok(StageMode::ItemRetrieval),
            "E" => Ok(StageMode::Event),
            other => Err(format!("unknown stage mode {:?}", other)),
        }
    }
}

impl Serialize for StageMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for StageMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One queued stage, stored as `[mode, stage, runs]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(StageMode, String, u32)", into = "(StageMode, String, u32)")]
pub struct WorkEntry {
    pub mode: StageMode,
    pub stage: String,
    pub runs: u32,
}

impl WorkEntry {
    pub fn new(mode: StageMode, stage: &str, runs: u32) -> Self {
        Self {
            mode,
            stage: stage.to_string(),
            runs,
        }
    }
}

impl From<(StageMode, String, u32)> for WorkEntry {
    fn from((mode, stage, runs): (StageMode, String, u32)) -> Self {
        Self { mode, stage, runs }
    }
}

impl From<WorkEntry> for (StageMode, String, u32) {
    fn from(entry: WorkEntry) -> Self {
        (entry.mode, entry.stage, entry.runs)
    }
}

/// Whether the daily queue reset should fire at `now`.
///
/// Fires at most once per calendar day, on the first run at or after
/// `reset_time`.
pub fn daily_reset_due(now: NaiveDateTime, last_run: Option<NaiveDateTime>, reset_time: NaiveTime) -> bool {
    let now_time = now.time().with_nanosecond(0).unwrap_or(now.time());
    let new_day = last_run.map_or(true, |last| last.date() != now.date());
    new_day && now_time >= reset_time
}

mod last_run_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::LAST_RUN_FORMAT;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.format(LAST_RUN_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => NaiveDateTime::parse_from_str(raw.trim(), LAST_RUN_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}
