mod console;
mod mpv;
mod runtime;

use anyhow::Context;
use radio_core::catalog::{self, Catalog};
use radio_core::config::Config;
use radio_core::controller::{ControllerSettings, RadioController};
use radio_core::display::DisplaySurface;
use radio_core::input::InputPanel;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::console::ConsoleDisplay;
use crate::mpv::MpvDriver;

/// Local wall-clock timestamps in log lines.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

fn init_logging(config: &Config) -> anyhow::Result<PathBuf> {
    let log_path = config.paths.log_file.clone();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::sync::Mutex::new(log_file))
        .with_timer(LocalTimer)
        .with_ansi(false);

    let console_layer = config.logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(LocalTimer)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,radio_core=debug,radio_panel=debug")
            }),
        )
        .init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()
        .with_context(|| format!("loading config from {}", Config::config_path().display()))?;

    let log_path = init_logging(&config)?;
    eprintln!("piradio: logging to {}", log_path.display());
    info!("Log file: {:?}", log_path);
    info!("Config loaded from: {:?}", Config::config_path());

    let mut stations = Catalog::load_or_builtin(config.stations.source.as_deref());
    stations.set_cursor(catalog::load_persisted(
        &config.paths.state_file,
        stations.len(),
    ));

    let mut driver = MpvDriver::new(config.mpv.clone());
    let engine = driver
        .spawn_and_connect()
        .await
        .context("starting mpv")?;

    let display = DisplaySurface::new(
        ConsoleDisplay::stdout(config.display.width, config.display.lines),
        &config.display,
    );
    let settings =
        ControllerSettings::from_config(&config.controller, config.paths.state_file.clone());
    let mut controller = RadioController::new(settings, stations, engine, display);

    let (panel, mut events) = InputPanel::channel(&config.panel);
    let _keyboard =
        console::spawn_keyboard(std::io::BufReader::new(std::io::stdin()), panel)
            .context("starting keyboard reader")?;
    let shutdown = runtime::shutdown_signal().context("installing signal handlers")?;

    let started = if config.controller.autostart {
        controller.power_on(tokio::time::Instant::now().into_std())
    } else {
        Ok(())
    };

    info!("piradio initialised, running scheduler");
    let outcome = match started {
        Ok(()) => {
            runtime::run(
                &mut controller,
                &mut events,
                config.controller.tick_interval(),
                shutdown,
            )
            .await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = outcome {
        error!("Stopping after fatal error: {}", e);
    }

    controller.shutdown();
    if driver.process_alive() {
        info!("Stopping mpv");
    }
    driver.kill().await;
    info!("piradio stopped");
    Ok(())
}
