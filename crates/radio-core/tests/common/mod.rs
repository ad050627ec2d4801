#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use radio_core::catalog::{Catalog, Direction, Station};
use radio_core::config::DisplayConfig;
use radio_core::controller::{ControllerSettings, RadioController};
use radio_core::display::{DisplayDriver, DisplayError, DisplaySurface};
use radio_core::engine::{EngineError, PlaybackEngine};
use radio_core::input::InputEvent;

/// Engine double. `play` puts it into buffering until a test flips it.
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub plays: Vec<String>,
    pub stops: usize,
    pub buffering: bool,
    pub title: Option<Arc<str>>,
    pub dead: bool,
}

impl PlaybackEngine for FakeEngine {
    fn play(&mut self, url: &str) -> Result<(), EngineError> {
        self.plays.push(url.to_string());
        self.buffering = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.stops += 1;
        self.buffering = false;
        Ok(())
    }

    fn is_buffering(&self) -> Result<bool, EngineError> {
        Ok(self.buffering)
    }

    fn current_metadata(&self) -> Option<Arc<str>> {
        self.title.clone()
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.dead {
            Err(EngineError::Shutdown("mpv exited".into()))
        } else {
            Ok(())
        }
    }
}

/// Panel double keeping every write in order.
#[derive(Debug, Default)]
pub struct RecordingPanel {
    pub writes: Vec<(usize, String)>,
    pub clears: usize,
    pub backlight: Option<bool>,
    pub released: bool,
}

impl DisplayDriver for RecordingPanel {
    fn write_line(&mut self, line: usize, text: &str) -> Result<(), DisplayError> {
        self.writes.push((line, text.to_string()));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.clears += 1;
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), DisplayError> {
        self.backlight = Some(on);
        Ok(())
    }

    fn release(&mut self) -> Result<(), DisplayError> {
        self.released = true;
        Ok(())
    }
}

pub type Radio = RadioController<FakeEngine, RecordingPanel>;

pub fn stations(names: &[&str]) -> Catalog {
    Catalog::new(
        names
            .iter()
            .map(|n| Station::new(*n, format!("url{n}")))
            .collect(),
    )
    .unwrap()
}

pub fn settings(state_dir: &Path) -> ControllerSettings {
    ControllerSettings {
        select_timeout: Duration::from_secs(3),
        start_timeout: Duration::from_secs(60),
        error_dwell: Duration::from_secs(5),
        toggle_aborts_start: true,
        state_file: state_dir.join("last_station.txt"),
    }
}

pub fn radio(catalog: Catalog, settings: ControllerSettings) -> Radio {
    RadioController::new(
        settings,
        catalog,
        FakeEngine::default(),
        DisplaySurface::new(RecordingPanel::default(), &DisplayConfig::default()),
    )
}

/// Power on and let the stream come up at `now`.
pub fn bring_up(radio: &mut Radio, now: Instant) {
    radio.power_on(now).unwrap();
    radio.engine_mut().buffering = false;
    radio.tick(now).unwrap();
}

/// Simulated encoder: keeps the running step count the panel would report.
#[derive(Debug, Default)]
pub struct Knob {
    steps: i64,
}

impl Knob {
    pub fn turn(&mut self, radio: &mut Radio, direction: Direction, now: Instant) {
        self.steps += match direction {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        };
        radio
            .handle_event(
                InputEvent::RotaryStepped {
                    direction,
                    steps: self.steps,
                },
                now,
            )
            .unwrap();
    }
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
