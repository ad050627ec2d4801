//! RadioController: single owner of the device state.
//!
//! Every mutation happens on the caller's thread through two entry points:
//! [`RadioController::handle_event`] for queued input and
//! [`RadioController::tick`] for everything time-driven (browse window,
//! stream start deadline, metadata pump, scrolling, transient messages).
//! Both take `now` explicitly; nothing in here sleeps or reads the clock.
//!
//! ```text
//!   OFF ──toggle──▶ STARTING_STREAM ──audio──▶ PLAYING
//!    ▲                   │ timeout                │ rotary
//!    │                   ▼                        ▼
//!    └──toggle── MAIN ◀──────── commit ──── SELECTING
//! ```
//!
//! Toggle is live in every state. Only [`EngineError::Shutdown`] is returned
//! to the caller; display and persistence failures end at their component.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::catalog::{self, Catalog, Direction};
use crate::config::ControllerConfig;
use crate::display::{DisplayDriver, DisplaySurface};
use crate::engine::{normalize_title, EngineError, PlaybackEngine};
use crate::input::InputEvent;

pub const TUNING_TEXT: &str = "Tuning...";
pub const START_ERROR_LINES: [&str; 2] = ["ERROR: cannot", "start playing"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Off,
    Main,
    Selecting,
    StartingStream,
    Playing,
}

/// Timing and policy knobs, resolved from [`ControllerConfig`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub select_timeout: Duration,
    pub start_timeout: Duration,
    pub error_dwell: Duration,
    pub toggle_aborts_start: bool,
    pub state_file: PathBuf,
}

impl ControllerSettings {
    pub fn from_config(config: &ControllerConfig, state_file: PathBuf) -> Self {
        Self {
            select_timeout: config.select_timeout(),
            start_timeout: config.start_timeout(),
            error_dwell: config.error_dwell(),
            toggle_aborts_start: config.toggle_aborts_start,
            state_file,
        }
    }
}

/// Live only while selecting.
#[derive(Debug, Clone)]
pub struct SelectionSession {
    pub pending: usize,
    pub deadline: Instant,
    /// Encoder step count before the step that opened the session.
    pub rotary_baseline: i64,
    pub rotary_steps: i64,
    /// State to fall back to when the commit changes nothing.
    pub return_to: DeviceState,
}

#[derive(Debug, Clone)]
struct StreamStart {
    index: usize,
    deadline: Instant,
}

#[derive(Debug, Clone)]
enum Mode {
    Off,
    Main,
    Selecting(SelectionSession),
    Starting(StreamStart),
    Playing,
}

impl Mode {
    fn state(&self) -> DeviceState {
        match self {
            Mode::Off => DeviceState::Off,
            Mode::Main => DeviceState::Main,
            Mode::Selecting(_) => DeviceState::Selecting,
            Mode::Starting(_) => DeviceState::StartingStream,
            Mode::Playing => DeviceState::Playing,
        }
    }
}

pub struct RadioController<E, D> {
    settings: ControllerSettings,
    catalog: Catalog,
    engine: E,
    display: DisplaySurface<D>,
    mode: Mode,
    /// Title currently on screen, for de-duplication.
    last_title: Option<Arc<str>>,
    /// Toggle seen during a start that was not allowed to abort it.
    deferred_toggle: bool,
}

impl<E: PlaybackEngine, D: DisplayDriver> RadioController<E, D> {
    /// Build a controller in `OFF`. The catalog cursor is the station that
    /// plays on power-on.
    pub fn new(
        settings: ControllerSettings,
        catalog: Catalog,
        engine: E,
        display: DisplaySurface<D>,
    ) -> Self {
        Self {
            settings,
            catalog,
            engine,
            display,
            mode: Mode::Off,
            last_title: None,
            deferred_toggle: false,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.mode.state()
    }

    pub fn session(&self) -> Option<&SelectionSession> {
        match &self.mode {
            Mode::Selecting(s) => Some(s),
            _ => None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn display(&self) -> &DisplaySurface<D> {
        &self.display
    }

    /// OFF → on. Tunes the station under the catalog cursor.
    pub fn power_on(&mut self, now: Instant) -> Result<(), EngineError> {
        if self.state() != DeviceState::Off {
            return Ok(());
        }
        info!("Start player");
        self.display.clear();
        self.display.backlight(true);
        self.start_stream(self.catalog.cursor(), now)
    }

    /// Any state → OFF.
    pub fn power_off(&mut self) -> Result<(), EngineError> {
        info!("Stop player");
        self.deferred_toggle = false;
        self.mode = Mode::Off;
        self.last_title = None;
        self.display.clear();
        self.display.backlight(false);
        self.engine.stop()
    }

    pub fn handle_event(&mut self, event: InputEvent, now: Instant) -> Result<(), EngineError> {
        debug!("controller: {:?} in {:?}", event, self.state());
        match event {
            InputEvent::TogglePressed => self.on_toggle(now),
            InputEvent::SelectPressed => self.on_select(now),
            InputEvent::RotaryStepped { direction, steps } => {
                self.on_rotary(direction, steps, now);
                Ok(())
            }
        }
    }

    /// One scheduler step.
    pub fn tick(&mut self, now: Instant) -> Result<(), EngineError> {
        self.engine.ensure_running()?;

        match self.state() {
            DeviceState::Selecting => {
                if self.session().is_some_and(|s| now >= s.deadline) {
                    debug!("controller: browse window elapsed");
                    self.commit_selection(now)?;
                }
            }
            DeviceState::StartingStream => self.poll_stream_start(now)?,
            DeviceState::Playing => self.pump_metadata(now),
            DeviceState::Off | DeviceState::Main => {}
        }

        if self.display.expire(now) && self.state() == DeviceState::Main {
            let name = self.catalog.current().name.clone();
            self.display.show_text(&name);
        }

        self.display.tick_scroll(now);
        Ok(())
    }

    /// Stop playback and hand back the panel. Safe to call in any state.
    pub fn shutdown(&mut self) {
        info!("Shutting down controller");
        self.mode = Mode::Off;
        if let Err(e) = self.engine.stop() {
            debug!("controller: stop during shutdown: {}", e);
        }
        self.display.clear();
        self.display.backlight(false);
        self.display.release();
    }

    // ── event handlers ────────────────────────────────────────────────────────

    fn on_toggle(&mut self, now: Instant) -> Result<(), EngineError> {
        match self.state() {
            DeviceState::Off => self.power_on(now),
            DeviceState::StartingStream if !self.settings.toggle_aborts_start => {
                debug!("controller: toggle deferred until stream start resolves");
                self.deferred_toggle = true;
                Ok(())
            }
            _ => self.power_off(),
        }
    }

    fn on_select(&mut self, now: Instant) -> Result<(), EngineError> {
        match self.state() {
            DeviceState::Main | DeviceState::Playing => {
                let name = self.catalog.current().name.clone();
                self.display.show_text(&name);
                Ok(())
            }
            DeviceState::Selecting => self.commit_selection(now),
            DeviceState::Off | DeviceState::StartingStream => {
                debug!("controller: select ignored in {:?}", self.state());
                Ok(())
            }
        }
    }

    fn on_rotary(&mut self, direction: Direction, steps: i64, now: Instant) {
        let deadline = now + self.settings.select_timeout;

        if let Mode::Selecting(session) = &mut self.mode {
            let (pending, station) = self.catalog.step(session.pending, direction);
            session.pending = pending;
            session.deadline = deadline;
            session.rotary_steps = steps;
            let name = station.name.clone();
            self.display.show_text(&name);
            return;
        }

        match self.state() {
            DeviceState::Main | DeviceState::Playing => {
                let return_to = self.state();
                let (pending, station) = self.catalog.step(self.catalog.cursor(), direction);
                let name = station.name.clone();
                let delta = match direction {
                    Direction::Clockwise => 1,
                    Direction::CounterClockwise => -1,
                };
                self.mode = Mode::Selecting(SelectionSession {
                    pending,
                    deadline,
                    rotary_baseline: steps - delta,
                    rotary_steps: steps,
                    return_to,
                });
                self.display.show_text(&name);
            }
            state => debug!("controller: rotary ignored in {:?}", state),
        }
    }

    // ── transitions ───────────────────────────────────────────────────────────

    fn commit_selection(&mut self, now: Instant) -> Result<(), EngineError> {
        let Mode::Selecting(session) = std::mem::replace(&mut self.mode, Mode::Main) else {
            return Ok(());
        };
        debug!(
            "controller: commit station {} after {} net steps",
            session.pending,
            session.rotary_steps - session.rotary_baseline
        );

        let unchanged = session.pending == self.catalog.cursor()
            && session.return_to == DeviceState::Playing;
        if unchanged {
            info!("Station {} already playing, not restarting", session.pending);
            self.mode = Mode::Playing;
            // Forget the shown title so the next tick puts it back.
            self.last_title = None;
            let name = self.catalog.current().name.clone();
            self.display.show_text(&name);
            return Ok(());
        }

        self.start_stream(session.pending, now)
    }

    fn start_stream(&mut self, index: usize, now: Instant) -> Result<(), EngineError> {
        self.catalog.set_cursor(index);
        self.last_title = None;
        self.display.show_text(TUNING_TEXT);
        let url = self.catalog.current().url.clone();
        debug!("controller: play {}", url);
        self.mode = Mode::Starting(StreamStart {
            index: self.catalog.cursor(),
            deadline: now + self.settings.start_timeout,
        });
        self.engine.play(&url)
    }

    fn poll_stream_start(&mut self, now: Instant) -> Result<(), EngineError> {
        let Mode::Starting(start) = &self.mode else {
            return Ok(());
        };
        let (index, deadline) = (start.index, start.deadline);

        if !self.engine.is_buffering()? {
            let station = self.catalog.current().clone();
            self.mode = Mode::Playing;
            self.display.show_text(&station.name);
            catalog::save_persisted(&self.settings.state_file, index);
            info!("Radio stream started: {} - {}", station.name, station.url);
        } else if now >= deadline {
            let err = EngineError::StartTimeout(self.settings.start_timeout);
            error!("Cannot start radio {}: {}", self.catalog.current().name, err);
            self.mode = Mode::Main;
            if let Err(e) = self.engine.stop() {
                warn!("controller: stop after start timeout failed: {}", e);
            }
            self.display
                .show_transient(&START_ERROR_LINES, now, self.settings.error_dwell);
        } else {
            return Ok(());
        }

        if std::mem::take(&mut self.deferred_toggle) {
            info!("Applying toggle deferred during stream start");
            self.power_off()?;
        }
        Ok(())
    }

    fn pump_metadata(&mut self, now: Instant) {
        if self.display.is_held(now) {
            return;
        }
        let snapshot = self.engine.current_metadata();
        let Some(title) = normalize_title(snapshot.as_deref()) else {
            return;
        };
        if self.last_title.as_deref() == Some(title) {
            return;
        }
        info!("New icy-title: {}", title);
        let title: Arc<str> = Arc::from(title);
        self.display.show_text(&title);
        self.last_title = Some(title);
    }
}
