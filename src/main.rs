//! Application entry point: button → camera → description → speech.
//!
//! # Startup sequence (`run`)
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (defaults when the file does not exist).
//! 3. Create the artifact folders.
//! 4. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Register the button through a [`TriggerGuard`].
//! 6. Run the [`Scheduler`] until Ctrl-C or SIGTERM, then release the button.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use sightspeak::config::{latest_file, AppConfig, AppPaths};
use sightspeak::pipeline::{new_shared_state, shutdown_signal, PipelineRunner, Scheduler};
use sightspeak::playback::{list_output_devices, player_from_config};
use sightspeak::trigger::{ButtonTrigger, KeyboardButton, TriggerGuard, TriggerLatch};
use sightspeak::tts::{read_waveform, PiperEngine, Synthesizer};

/// How long abandoned blocking stages may delay process exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Press a button, hear what the camera sees.
#[derive(Parser)]
#[command(name = "sightspeak", version, about)]
struct Cli {
    /// Settings file (default: platform config dir)
    #[arg(short, long, env = "SIGHTSPEAK_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for button presses and run the pipeline (default)
    Run,
    /// Run the pipeline once without the button
    Once,
    /// Speak a text with the configured voice
    TestTts {
        /// Text to speak; defaults to the newest description in outputs/
        text: Option<String>,
    },
    /// Play a WAV file through the configured output
    TestSpeaker {
        /// WAV file; defaults to the newest file in audios/
        wav: Option<PathBuf>,
    },
    /// Delete every file in captures/, outputs/ and audios/
    Clean,
    /// Write the default settings file
    InitConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings_file = cli
        .config
        .unwrap_or_else(|| AppPaths::new().settings_file);

    if let Some(Command::InitConfig) = cli.command {
        AppConfig::default().save_to(&settings_file)?;
        log::info!("wrote default settings to {}", settings_file.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::load_from(&settings_file).unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e:#}); using defaults");
        AppConfig::default()
    });

    let dirs = config.storage.dirs();
    dirs.ensure()
        .with_context(|| format!("creating artifact folders under {}", config.storage.root.display()))?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_device(&config),
        Command::Once => run_once(&config),
        Command::TestTts { text } => test_tts(&config, text),
        Command::TestSpeaker { wav } => test_speaker(&config, wav),
        Command::Clean => {
            let removed = dirs.clean();
            log::info!("clean: removed {removed} file(s)");
            Ok(ExitCode::SUCCESS)
        }
        Command::InitConfig => Ok(ExitCode::SUCCESS),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_device(config: &AppConfig) -> Result<ExitCode> {
    log::info!("sightspeak starting up");
    let rt = runtime()?;

    let latch = Arc::new(TriggerLatch::new());
    let trigger = ButtonTrigger::new(config.button.debounce(), Arc::clone(&latch));
    let guard = match TriggerGuard::register(
        KeyboardButton::new(),
        &config.button.key,
        config.button.edge,
        config.button.debounce(),
        &trigger,
    ) {
        Ok(guard) => guard,
        Err(e) => {
            log::error!("trigger: cannot register button: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let runner = Arc::new(PipelineRunner::from_config(config, new_shared_state()));
    let scheduler = Scheduler::new(latch, runner, config.button.poll_interval());

    let shutdown = {
        let _rt = rt.enter();
        shutdown_signal().context("installing shutdown signal handlers")?
    };
    rt.block_on(scheduler.run(shutdown));

    drop(guard);
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(ExitCode::SUCCESS)
}

fn run_once(config: &AppConfig) -> Result<ExitCode> {
    let rt = runtime()?;
    let runner = PipelineRunner::from_config(config, new_shared_state());

    let result = rt.block_on(runner.run(&mut None));
    rt.shutdown_timeout(SHUTDOWN_GRACE);

    log::info!("once: {result}");
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn test_tts(config: &AppConfig, text: Option<String>) -> Result<ExitCode> {
    let dirs = config.storage.dirs();
    let text = match text {
        Some(text) => text,
        None => {
            let Some(latest) = latest_file(&dirs.outputs, "txt") else {
                bail!("no .txt file in {}", dirs.outputs.display());
            };
            log::info!("test-tts: reading {}", latest.display());
            std::fs::read_to_string(&latest)
                .with_context(|| format!("reading {}", latest.display()))?
        }
    };

    let engine = PiperEngine::new(&config.tts, dirs.audios);
    let voice = engine.load_model(&config.tts.model_path)?;
    log::info!("test-tts: voice ready, sample rate {} Hz", voice.sample_rate);

    let waveform = engine.synthesize(&voice, text.trim())?;
    log::info!(
        "test-tts: wrote {} ({:.1} s)",
        waveform.path.display(),
        waveform.duration_secs()
    );

    player_from_config(&config.playback).play(&waveform)?;
    Ok(ExitCode::SUCCESS)
}

fn test_speaker(config: &AppConfig, wav: Option<PathBuf>) -> Result<ExitCode> {
    let path = match wav {
        Some(path) => path,
        None => {
            let audios = config.storage.dirs().audios;
            match latest_file(&audios, "wav") {
                Some(path) => path,
                None => bail!("no .wav file in {}", audios.display()),
            }
        }
    };

    match list_output_devices() {
        Ok(devices) => log::info!("test-speaker: output devices: {}", devices.join(", ")),
        Err(e) => log::warn!("test-speaker: cannot list output devices: {e}"),
    }

    let waveform = read_waveform(&path)?;
    log::info!(
        "test-speaker: {} ({} Hz, {:.1} s)",
        path.display(),
        waveform.sample_rate,
        waveform.duration_secs()
    );
    player_from_config(&config.playback).play(&waveform)?;
    log::info!("test-speaker: done");
    Ok(ExitCode::SUCCESS)
}
