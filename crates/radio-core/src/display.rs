//! Display surface for a character LCD.
//!
//! `DisplaySurface` owns the text buffer and the scroll sub-state and talks to
//! the panel through a [`DisplayDriver`]. Driver failures are logged and
//! swallowed: a frozen panel must never stall the controller.
//!
//! Text that does not fit is word-wrapped to the panel width. The first lines
//! are written directly; whatever is left over is joined with single spaces
//! and scrolled on the last line, one character per step, with a longer
//! pause at both ends of the cycle.

use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DisplayConfig;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display line {line} out of range (panel has {lines} lines)")]
    LineOutOfRange { line: usize, lines: usize },
    #[error("display I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("display hardware: {0}")]
    Hardware(String),
}

/// Wire boundary of the panel. Lines are numbered from 1.
pub trait DisplayDriver {
    fn write_line(&mut self, line: usize, text: &str) -> Result<(), DisplayError>;
    fn clear(&mut self) -> Result<(), DisplayError>;
    fn set_backlight(&mut self, on: bool) -> Result<(), DisplayError>;
    /// Give the hardware back at shutdown.
    fn release(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ScrollState {
    full_text: Vec<char>,
    offset: usize,
    /// `None` means due on the next tick.
    hold_until: Option<Instant>,
}

pub struct DisplaySurface<D> {
    driver: D,
    width: usize,
    lines: usize,
    scroll_delay: Duration,
    scroll_dwell: Duration,
    buffer: Vec<String>,
    scroll: Option<ScrollState>,
    /// Transient message holding the screen until this instant.
    held_until: Option<Instant>,
    backlight: bool,
}

impl<D: DisplayDriver> DisplaySurface<D> {
    pub fn new(driver: D, config: &DisplayConfig) -> Self {
        Self {
            driver,
            width: config.width.max(1),
            lines: config.lines.max(1),
            scroll_delay: config.scroll_delay(),
            scroll_dwell: config.scroll_dwell(),
            buffer: vec![String::new(); config.lines.max(1)],
            scroll: None,
            held_until: None,
            backlight: false,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Current text of every line, as last written.
    pub fn lines(&self) -> &[String] {
        &self.buffer
    }

    pub fn is_scrolling(&self) -> bool {
        self.scroll.is_some()
    }

    pub fn scroll_text(&self) -> Option<String> {
        self.scroll.as_ref().map(|s| s.full_text.iter().collect())
    }

    pub fn scroll_due(&self) -> Option<Instant> {
        self.scroll.as_ref().and_then(|s| s.hold_until)
    }

    pub fn backlight_on(&self) -> bool {
        self.backlight
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Primary entry point: clear, wrap, fill lines, scroll the remainder.
    pub fn show_text(&mut self, text: &str) {
        self.clear();
        let chunks = wrap(text, self.width);
        if chunks.len() <= self.lines {
            for (i, chunk) in chunks.iter().enumerate() {
                self.write(i + 1, chunk);
            }
            return;
        }
        let fixed = self.lines - 1;
        for (i, chunk) in chunks[..fixed].iter().enumerate() {
            self.write(i + 1, chunk);
        }
        self.show_scrolling(&chunks[fixed..]);
    }

    /// Write a single line without touching the others.
    pub fn show_line(&mut self, line: usize, text: &str) {
        if line == self.lines {
            self.scroll = None;
        }
        self.write(line, text);
    }

    /// Arm scrolling of `chunks` (joined with single spaces) on the last line.
    pub fn show_scrolling<S: AsRef<str>>(&mut self, chunks: &[S]) {
        let joined = chunks
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        debug!("display: scrolling {:?}", joined);
        self.scroll = Some(ScrollState {
            full_text: joined.chars().collect(),
            offset: 0,
            hold_until: None,
        });
    }

    /// Show lines that keep the screen until `now + dwell`.
    pub fn show_transient(&mut self, lines: &[&str], now: Instant, dwell: Duration) {
        self.clear();
        for (i, text) in lines.iter().take(self.lines).enumerate() {
            self.write(i + 1, text);
        }
        self.held_until = Some(now + dwell);
    }

    /// True while a transient message owns the screen.
    pub fn is_held(&self, now: Instant) -> bool {
        self.held_until.is_some_and(|until| now < until)
    }

    /// Returns true exactly once, when a transient message lapses.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.held_until {
            Some(until) if now >= until => {
                self.held_until = None;
                true
            }
            _ => false,
        }
    }

    /// Advance the scroll sub-state. Returns the offset that was shown.
    pub fn tick_scroll(&mut self, now: Instant) -> Option<usize> {
        let width = self.width;
        let scroll = self.scroll.as_mut()?;
        if scroll.hold_until.is_some_and(|due| now < due) {
            return None;
        }

        let len = scroll.full_text.len();
        if len <= width {
            let text: String = scroll.full_text.iter().collect();
            self.scroll = None;
            let last = self.lines;
            self.write(last, &text);
            return Some(0);
        }

        let end = len - width;
        let offset = scroll.offset;
        let text: String = scroll.full_text[offset..offset + width].iter().collect();

        let mut delay = self.scroll_delay;
        if offset == 0 || offset == end {
            delay += self.scroll_dwell;
        }
        scroll.hold_until = Some(now + delay);
        scroll.offset = if offset >= end { 0 } else { offset + 1 };

        let last = self.lines;
        self.write(last, &text);
        Some(offset)
    }

    /// Blank every line and drop scroll and transient state.
    pub fn clear(&mut self) {
        self.scroll = None;
        self.held_until = None;
        for line in &mut self.buffer {
            line.clear();
        }
        if let Err(e) = self.driver.clear() {
            warn!("display: clear failed: {}", e);
        }
    }

    pub fn backlight(&mut self, on: bool) {
        self.backlight = on;
        if let Err(e) = self.driver.set_backlight(on) {
            warn!("display: backlight {} failed: {}", on, e);
        }
    }

    pub fn release(&mut self) {
        if let Err(e) = self.driver.release() {
            warn!("display: release failed: {}", e);
        }
    }

    fn write(&mut self, line: usize, text: &str) {
        if line == 0 || line > self.lines {
            warn!(
                "display: {}",
                DisplayError::LineOutOfRange {
                    line,
                    lines: self.lines
                }
            );
            return;
        }
        let fitted: String = text.chars().take(self.width).collect();
        if let Err(e) = self.driver.write_line(line, &fitted) {
            warn!("display: write line {} failed: {}", line, e);
        }
        self.buffer[line - 1] = fitted;
    }
}

/// Greedy word wrap on character counts. Words longer than `width` are
/// broken into `width`-sized pieces.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();

        let needed = if current_len == 0 {
            chars.len()
        } else {
            current_len + 1 + chars.len()
        };
        if needed <= width {
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(chars.iter());
            current_len += chars.len();
            continue;
        }

        if current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        while chars.len() > width {
            let rest = chars.split_off(width);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }
        current_len = chars.len();
        current = chars.into_iter().collect();
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Panel {
        writes: Vec<(usize, String)>,
        clears: usize,
        backlight: Option<bool>,
        fail: bool,
    }

    impl DisplayDriver for Panel {
        fn write_line(&mut self, line: usize, text: &str) -> Result<(), DisplayError> {
            if self.fail {
                return Err(DisplayError::Hardware("bus nack".into()));
            }
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
    }

    fn surface() -> DisplaySurface<Panel> {
        DisplaySurface::new(Panel::default(), &DisplayConfig::default())
    }

    #[test]
    fn test_wrap_words() {
        assert_eq!(wrap("Radio 1 Classics", 16), vec!["Radio 1 Classics"]);
        assert_eq!(
            wrap("Radio 1 De Lage Landenlijst", 16),
            vec!["Radio 1 De Lage", "Landenlijst"]
        );
        assert!(wrap("   ", 16).is_empty());
    }

    #[test]
    fn test_wrap_breaks_long_words() {
        assert_eq!(
            wrap("abcdefghijklmnopqrstu vw", 8),
            vec!["abcdefgh", "ijklmnop", "qrstu vw"]
        );
    }

    #[test]
    fn test_wrap_counts_chars_not_bytes() {
        assert_eq!(wrap("ééééé ü", 7), vec!["ééééé ü"]);
    }

    #[test]
    fn test_show_text_two_lines_no_scroll() {
        let mut d = surface();
        d.show_text("Radio 1 De Lage Landenlijst");
        assert_eq!(d.lines(), ["Radio 1 De Lage", "Landenlijst"]);
        assert!(!d.is_scrolling());
    }

    #[test]
    fn test_show_text_long_title_scrolls_remainder() {
        let mut d = surface();
        d.show_text("The Beatles - While My Guitar Gently Weeps (Remastered)");
        assert_eq!(d.lines()[0], "The Beatles -");
        assert_eq!(
            d.scroll_text().as_deref(),
            Some("While My Guitar Gently Weeps (Remastered)")
        );
        assert_eq!(d.lines()[1], "");
    }

    #[test]
    fn test_scroll_offsets_cycle_with_dwell_at_ends() {
        let mut d = surface();
        d.show_scrolling(&["abcdefghijklmnop", "qrst"]);
        let len = "abcdefghijklmnop qrst".len();
        let end = len - 16;

        let delay = Duration::from_millis(500);
        let dwell = Duration::from_millis(2500);
        let mut now = Instant::now();
        let mut seen = Vec::new();
        for _ in 0..(2 * (end + 1)) {
            let offset = d.tick_scroll(now).expect("scroll step due");
            let due = d.scroll_due().unwrap();
            if offset == 0 || offset == end {
                assert_eq!(due - now, dwell, "dwell at offset {offset}");
            } else {
                assert_eq!(due - now, delay, "no dwell at offset {offset}");
            }
            seen.push(offset);
            now = due;
        }
        let cycle: Vec<usize> = (0..=end).collect();
        assert_eq!(seen[..=end], cycle[..]);
        assert_eq!(seen[end + 1..], cycle[..]);
        assert_eq!(d.lines()[1], "fghijklmnop qrst");
    }

    #[test]
    fn test_scroll_waits_for_due_time() {
        let mut d = surface();
        d.show_scrolling(&["abcdefghijklmnopqrst"]);
        let now = Instant::now();
        assert_eq!(d.tick_scroll(now), Some(0));
        assert_eq!(d.tick_scroll(now + Duration::from_millis(2499)), None);
        assert_eq!(d.tick_scroll(now + Duration::from_millis(2500)), Some(1));
    }

    #[test]
    fn test_short_scroll_text_written_once() {
        let mut d = surface();
        d.show_scrolling(&["short"]);
        assert_eq!(d.tick_scroll(Instant::now()), Some(0));
        assert!(!d.is_scrolling());
        assert_eq!(d.lines()[1], "short");
    }

    #[test]
    fn test_clear_disarms_scroll() {
        let mut d = surface();
        d.show_scrolling(&["abcdefghijklmnopqrst"]);
        d.clear();
        assert!(!d.is_scrolling());
        assert_eq!(d.tick_scroll(Instant::now()), None);
        assert_eq!(d.lines(), ["", ""]);
    }

    #[test]
    fn test_transient_expires_once() {
        let mut d = surface();
        let now = Instant::now();
        d.show_transient(&["ERROR: cannot", "start playing"], now, Duration::from_secs(5));
        assert!(d.is_held(now));
        assert!(!d.expire(now + Duration::from_secs(4)));
        assert!(d.expire(now + Duration::from_secs(5)));
        assert!(!d.expire(now + Duration::from_secs(6)));
        assert!(!d.is_held(now + Duration::from_secs(6)));
    }

    #[test]
    fn test_driver_failures_are_swallowed() {
        let mut d = surface();
        d.driver_mut().fail = true;
        d.show_text("Klara");
        assert_eq!(d.lines()[0], "Klara");
        d.backlight(true);
        assert_eq!(d.driver().backlight, Some(true));
    }

    #[test]
    fn test_width_is_a_parameter() {
        let config = DisplayConfig {
            width: 8,
            lines: 3,
            ..DisplayConfig::default()
        };
        let mut d = DisplaySurface::new(Panel::default(), &config);
        d.show_text("one two three four five six");
        assert_eq!(d.lines()[..2], ["one two", "three"]);
        assert_eq!(d.scroll_text().as_deref(), Some("four five six"));
        d.tick_scroll(Instant::now());
        assert_eq!(d.lines()[2], "four fiv");
        assert!(d.driver().writes.iter().all(|(_, t)| t.chars().count() <= 8));
    }
}
