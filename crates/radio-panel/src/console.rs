//! Console stand-ins for the panel hardware.
//!
//! `ConsoleDisplay` draws the LCD as a framed box on a terminal and the
//! keyboard reader turns stdin lines into panel edges:
//! `t` toggle, `s` or an empty line select, `+`/`-` turn the knob.

use radio_core::catalog::Direction;
use radio_core::display::{DisplayDriver, DisplayError};
use radio_core::input::{InputPanel, Signal};
use std::io::{BufRead, Write};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct ConsoleDisplay<W: Write> {
    out: W,
    lines: Vec<String>,
    width: usize,
    backlight: bool,
}

impl ConsoleDisplay<std::io::Stdout> {
    pub fn stdout(width: usize, lines: usize) -> Self {
        Self::new(std::io::stdout(), width, lines)
    }
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W, width: usize, lines: usize) -> Self {
        Self {
            out,
            lines: vec![String::new(); lines.max(1)],
            width: width.max(1),
            backlight: false,
        }
    }

    fn render(&mut self) -> Result<(), DisplayError> {
        let border = format!("+{}+", "-".repeat(self.width));
        let mut frame = String::new();
        frame.push_str(&border);
        frame.push('\n');
        for line in &self.lines {
            let shown = if self.backlight { line.as_str() } else { "" };
            frame.push_str(&format!("|{:<width$}|\n", shown, width = self.width));
        }
        frame.push_str(&border);
        frame.push('\n');
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> DisplayDriver for ConsoleDisplay<W> {
    fn write_line(&mut self, line: usize, text: &str) -> Result<(), DisplayError> {
        let lines = self.lines.len();
        let slot = line
            .checked_sub(1)
            .and_then(|i| self.lines.get_mut(i))
            .ok_or(DisplayError::LineOutOfRange { line, lines })?;
        *slot = text.chars().take(self.width).collect();
        self.render()
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        for line in &mut self.lines {
            line.clear();
        }
        self.render()
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), DisplayError> {
        self.backlight = on;
        self.render()
    }

    fn release(&mut self) -> Result<(), DisplayError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Panel edges typed on one input line.
pub fn parse_keys(line: &str) -> Vec<Signal> {
    let line = line.trim();
    if line.is_empty() {
        return vec![Signal::SelectEdge];
    }
    line.chars()
        .filter_map(|c| match c {
            't' | 'T' => Some(Signal::ToggleEdge),
            's' | 'S' => Some(Signal::SelectEdge),
            '+' | '>' => Some(Signal::Rotary(Direction::Clockwise)),
            '-' | '<' => Some(Signal::Rotary(Direction::CounterClockwise)),
            other => {
                debug!("keyboard: ignoring {:?}", other);
                None
            }
        })
        .collect()
}

/// Feed `input` into `panel` line by line until it closes.
///
/// Runs on its own OS thread: a pending read on stdin never holds up
/// runtime shutdown.
pub fn spawn_keyboard<R>(input: R, mut panel: InputPanel) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("keyboard".into())
        .spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) => {
                        for signal in parse_keys(&line) {
                            panel.signal(signal, Instant::now());
                        }
                    }
                    Err(e) => {
                        warn!("keyboard: read error: {}", e);
                        return;
                    }
                }
            }
            info!("keyboard: input closed, panel input disabled");
        })
}
