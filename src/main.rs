//! Arona command line entry point
//!
//! Connects to the device, checks the environment and runs the enabled
//! tasks once.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use ba_arona::android::AdbDevice;
use ba_arona::config::{JsonFileStore, Settings};
use ba_arona::orchestrator::{Orchestrator, RunOutcome, TracebackLog};
use ba_arona::tasks;
use ba_arona::vision::{AssetStore, OcrsRecognizer, ScreenCapture, VisionSystem};
use ba_arona::Session;

#[derive(Parser, Debug)]
#[command(name = "arona", version, about = "Blue Archive automation over ADB")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Repair PNG screenshots mangled by old devices
    #[arg(short, long)]
    legacy: bool,

    /// Template image root, one directory per server
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// OCR model root, one directory per server
    #[arg(long, default_value = "models")]
    models: PathBuf,

    /// Directory holding the aScreenCap builds
    #[arg(long, default_value = "bin/ascreencap")]
    helpers: PathBuf,

    /// Where unexpected task errors are recorded
    #[arg(long, default_value = "traceback.log")]
    traceback: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    if cli.debug {
        log::info!("Enabled debugging.");
    }
    if cli.legacy {
        log::info!("Enabled legacy screenshot repair.");
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    if let Err(e) = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(0);
        }
        log::info!("Stopping after the current step, press Ctrl-C again to quit now");
    }) {
        log::warn!("Could not install the Ctrl-C handler: {}", e);
    }

    match run(&cli, interrupt) {
        Ok(RunOutcome::Completed) => {
            log::info!("All tasks finished");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Interrupted) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, interrupt: Arc<AtomicBool>) -> Result<RunOutcome, Box<dyn std::error::Error>> {
    let traceback = TracebackLog::new(&cli.traceback);
    traceback.truncate()?;

    let settings = Settings::load(&cli.config)?;
    settings.validate(&cli.assets)?;
    let server = settings.login.server;

    let mut device = AdbDevice::connect(&settings.login.network)?;
    log::info!(
        "Successfully connected to the service with transport_id({}).",
        device.transport_id()
    );

    let mut capture = ScreenCapture::new(settings.login.screenshot_mode, cli.legacy);
    capture.prepare(&mut device, &cli.helpers)?;
    log::info!("Screenshot mode: {}", capture.mode());

    let ocr = OcrsRecognizer::load(&cli.models.join(server.dir_name()))?;
    let vision = VisionSystem::new(AssetStore::new(&cli.assets, server), Box::new(ocr));

    let mut session = Session::new(
        Box::new(device),
        capture,
        vision,
        settings.timings.clone(),
        interrupt,
    );
    session.validate_environment()?;

    let tasks = tasks::build_enabled(&settings, Box::new(JsonFileStore::new(&cli.config)));
    let mut orchestrator =
        Orchestrator::new(tasks, settings.login.restart_attempts).with_traceback(traceback);
    Ok(orchestrator.run(&mut session)?)
}
