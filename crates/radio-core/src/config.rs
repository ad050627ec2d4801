use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub mpv: MpvConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Character LCD geometry and scroll timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Characters per line.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Number of lines. The last line is the one that scrolls.
    #[serde(default = "default_lines")]
    pub lines: usize,
    #[serde(default = "default_scroll_delay_ms")]
    pub scroll_delay_ms: u64,
    /// Extra pause at the start and end of a scroll cycle.
    #[serde(default = "default_scroll_dwell_ms")]
    pub scroll_dwell_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Button debounce window.
    #[serde(default = "default_button_bounce_ms")]
    pub button_bounce_ms: u64,
    /// Capacity of the input event queue.
    #[serde(default = "default_event_queue")]
    pub event_queue: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Browse window after the most recent rotary step.
    #[serde(default = "default_select_timeout_ms")]
    pub select_timeout_ms: u64,
    /// How long a stream may stay buffering before the start is abandoned.
    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,
    /// How long the start-failure message holds the screen.
    #[serde(default = "default_error_dwell_ms")]
    pub error_dwell_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// When false, a toggle press during a stream start waits until the
    /// start resolves before switching the radio off.
    #[serde(default = "default_true")]
    pub toggle_aborts_start: bool,
    /// Power on and tune the last station at process start.
    #[serde(default = "default_true")]
    pub autostart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpvConfig {
    /// mpv `--audio-device` value; empty leaves mpv's default.
    #[serde(default = "default_audio_device")]
    pub audio_device: String,
    #[serde(default = "default_mpv_log_level")]
    pub log_level: String,
}

/// Station list source. Empty path means the built-in catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StationsConfig {
    /// TOML (`[[station]]`) or m3u file, picked by extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// File holding the index of the last station that started playing.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Mirror the log to stderr.
    #[serde(default)]
    pub console: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            lines: default_lines(),
            scroll_delay_ms: default_scroll_delay_ms(),
            scroll_dwell_ms: default_scroll_dwell_ms(),
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            button_bounce_ms: default_button_bounce_ms(),
            event_queue: default_event_queue(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            select_timeout_ms: default_select_timeout_ms(),
            start_timeout_secs: default_start_timeout_secs(),
            error_dwell_ms: default_error_dwell_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            toggle_aborts_start: true,
            autostart: true,
        }
    }
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            audio_device: default_audio_device(),
            log_level: default_mpv_log_level(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            log_file: default_log_file(),
        }
    }
}

fn default_width() -> usize {
    16
}

fn default_lines() -> usize {
    2
}

fn default_scroll_delay_ms() -> u64 {
    500
}

fn default_scroll_dwell_ms() -> u64 {
    2000
}

fn default_button_bounce_ms() -> u64 {
    50
}

fn default_event_queue() -> usize {
    64
}

fn default_select_timeout_ms() -> u64 {
    3000
}

fn default_start_timeout_secs() -> u64 {
    60
}

fn default_error_dwell_ms() -> u64 {
    5000
}

fn default_tick_interval_ms() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_audio_device() -> String {
    "alsa/hw:CARD=sndrpihifiberry".to_string()
}

fn default_mpv_log_level() -> String {
    "error".to_string()
}

fn default_state_file() -> PathBuf {
    platform::data_dir().join("last_station.txt")
}

fn default_log_file() -> PathBuf {
    platform::data_dir().join("piradio.log")
}

impl DisplayConfig {
    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn scroll_dwell(&self) -> Duration {
        Duration::from_millis(self.scroll_dwell_ms)
    }
}

impl PanelConfig {
    pub fn button_bounce(&self) -> Duration {
        Duration::from_millis(self.button_bounce_ms)
    }
}

impl ControllerConfig {
    pub fn select_timeout(&self) -> Duration {
        Duration::from_millis(self.select_timeout_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn error_dwell(&self) -> Duration {
        Duration::from_millis(self.error_dwell_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Config {
    /// Load the config file, writing defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        match std::env::var_os(platform::CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => platform::config_dir().join("config.toml"),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.display.width == 0 {
            anyhow::bail!("display.width must be at least 1");
        }
        if self.display.lines < 2 {
            anyhow::bail!("display.lines must be at least 2");
        }
        if self.controller.select_timeout_ms == 0 {
            anyhow::bail!("controller.select_timeout_ms must be non-zero");
        }
        if self.controller.start_timeout_secs == 0 {
            anyhow::bail!("controller.start_timeout_secs must be non-zero");
        }
        if self.panel.event_queue == 0 {
            anyhow::bail!("panel.event_queue must be non-zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display.width, 16);
        assert_eq!(config.display.lines, 2);
        assert_eq!(config.controller.select_timeout(), Duration::from_secs(3));
        assert_eq!(config.controller.start_timeout(), Duration::from_secs(60));
        assert!(config.controller.toggle_aborts_start);
        assert!(config.stations.source.is_none());
        assert!(config.paths.state_file.ends_with("piradio/last_station.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [display]
            width = 20

            [controller]
            toggle_aborts_start = false
            "#,
        )
        .unwrap();
        assert_eq!(config.display.width, 20);
        assert_eq!(config.display.lines, 2);
        assert_eq!(config.display.scroll_delay(), Duration::from_millis(500));
        assert!(!config.controller.toggle_aborts_start);
        assert!(config.controller.autostart);
    }

    #[test]
    fn test_validate_rejects_single_line_display() {
        let mut config = Config::default();
        config.display.lines = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval_never_zero() {
        let mut config = Config::default();
        config.controller.tick_interval_ms = 0;
        assert_eq!(config.controller.tick_interval(), Duration::from_millis(1));
    }
}
