//! Task orchestrator
//!
//! Runs each enabled task once, in order, and decides what every failure
//! means for the run: a crashed or frozen game is restarted while the
//! restart budget lasts, an OCR miss gets the task one more try, and any
//! other error is written to the traceback log and the task skipped.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::driver::{AppControl, Driver};
use crate::error::AutomationError;
use crate::tasks::{Task, TaskKind};

/// Game restarts left for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartBudget {
    remaining: u32,
}

impl RestartBudget {
    pub fn new(attempts: u32) -> Self {
        Self {
            remaining: attempts,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Take one restart, if any is left
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every task was attempted
    Completed,
    /// The user asked to stop
    Interrupted,
}

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("game is not running but ran out of restart attempts")]
    NotRunning,
    #[error("game is stuck but ran out of restart attempts")]
    Stuck,
    #[error("unable to restart the game: {0}")]
    Restart(#[source] AutomationError),
}

/// Append-only log of unexpected task errors
#[derive(Debug, Clone)]
pub struct TracebackLog {
    path: PathBuf,
}

impl TracebackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empty the file, creating it if needed
    pub fn truncate(&self) -> std::io::Result<()> {
        std::fs::File::create(&self.path).map(|_| ())
    }

    /// Record `err` and its sources under the task's name
    pub fn append(&self, task: &str, err: &(dyn std::error::Error + 'static)) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "[{}]", task)?;
        writeln!(file, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file, "Error: {}", err)?;
        let mut source = err.source();
        while let Some(cause) = source {
            writeln!(file, "Caused by: {}", cause)?;
            source = cause.source();
        }
        writeln!(file)
    }
}

/// Runs the task list against one game session
pub struct Orchestrator<T: Task = TaskKind> {
    tasks: Vec<T>,
    budget: RestartBudget,
    traceback: Option<TracebackLog>,
}

impl<T: Task> Orchestrator<T> {
    pub fn new(tasks: Vec<T>, restart_attempts: u32) -> Self {
        Self {
            tasks,
            budget: RestartBudget::new(restart_attempts),
            traceback: None,
        }
    }

    pub fn with_traceback(mut self, log: TracebackLog) -> Self {
        self.traceback = Some(log);
        self
    }

    pub fn tasks(&self) -> &[T] {
        &self.tasks
    }

    pub fn budget(&self) -> RestartBudget {
        self.budget
    }

    /// Attempt every task once.
    ///
    /// A task interrupted by a restart runs again from its start. Returns an
    /// error only when the game cannot be brought back.
    pub fn run<D: Driver + AppControl>(&mut self, driver: &mut D) -> Result<RunOutcome, FatalError> {
        let mut index = 0;
        let mut announced = false;
        let mut ocr_retried = false;

        while index < self.tasks.len() {
            let name = self.tasks[index].name();
            if !announced {
                log::info!("Start Task: {}", name);
                announced = true;
            }

            let result = self.tasks[index].run(&mut *driver);
            let skip = match result {
                Ok(()) => {
                    log::info!("Task completed: {}", name);
                    true
                }
                Err(AutomationError::Interrupted) => {
                    log::info!("Received keyboard interrupt from user. Closing...");
                    return Ok(RunOutcome::Interrupted);
                }
                Err(AutomationError::GameNotRunning) => {
                    self.recover_not_running(driver)?;
                    false
                }
                Err(AutomationError::GameStuck) => {
                    self.recover_stuck(driver)?;
                    false
                }
                Err(AutomationError::OcrEmpty) => {
                    if ocr_retried {
                        log::error!("Failed to read OCR again. Skipping task...");
                        true
                    } else {
                        log::warn!("Failed to read OCR. Did you change page? Restarting task...");
                        ocr_retried = true;
                        false
                    }
                }
                Err(err) => {
                    log::error!(
                        "Task error: {}: {}. For more info, check the traceback log.",
                        name,
                        err
                    );
                    self.record(name, &err);
                    true
                }
            };

            if skip {
                index += 1;
                announced = false;
                ocr_retried = false;
            }
        }

        Ok(RunOutcome::Completed)
    }

    fn recover_not_running<D: Driver + AppControl>(&mut self, driver: &mut D) -> Result<(), FatalError> {
        if !driver.game_started() {
            log::warn!("Blue Archive is not running. Attempting to start it...");
        } else if self.budget.consume() {
            log::warn!("Blue Archive crashed. Attempting to restart it...");
            log::warn!("Restart attempts left: {}", self.budget.remaining());
        } else {
            log::error!(
                "Blue Archive is not running but ran out of restart attempts. Unable to restart game and run script."
            );
            return Err(FatalError::NotRunning);
        }

        driver.start_game().map_err(FatalError::Restart)?;
        driver.reset_action_records();
        Ok(())
    }

    fn recover_stuck<D: Driver + AppControl>(&mut self, driver: &mut D) -> Result<(), FatalError> {
        if !self.budget.consume() {
            log::error!("Blue Archive is stuck but ran out of restart attempts. Unable to restart game and run script.");
            return Err(FatalError::Stuck);
        }

        log::warn!("Blue Archive is stuck. Attempting to restart it...");
        driver.stop_game().map_err(FatalError::Restart)?;
        driver.start_game().map_err(FatalError::Restart)?;
        log::warn!("Restart attempts left: {}", self.budget.remaining());
        driver.reset_action_records();
        Ok(())
    }

    fn record(&self, task: &str, err: &AutomationError) {
        if let Some(log) = &self.traceback {
            if let Err(io) = log.append(task, err) {
                log::warn!("Could not write {}: {}", log.path().display(), io);
            }
        }
    }
}
