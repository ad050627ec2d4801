//! Input event source.
//!
//! Hardware callbacks (or the keyboard backend standing in for them) report
//! raw edges to an [`InputPanel`]. The panel debounces the two buttons,
//! counts rotary steps and enqueues normalized [`InputEvent`]s on a bounded
//! channel. It never touches controller state; the controller drains the
//! queue in arrival order on its next tick.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::catalog::Direction;
use crate::config::PanelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    TogglePressed,
    SelectPressed,
    RotaryStepped {
        direction: Direction,
        /// Running step count of the encoder after this step.
        steps: i64,
    },
}

/// Raw edge as reported by a hardware callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    ToggleEdge,
    SelectEdge,
    Rotary(Direction),
}

pub struct InputPanel {
    tx: mpsc::Sender<InputEvent>,
    bounce: Duration,
    last_toggle: Option<Instant>,
    last_select: Option<Instant>,
    steps: i64,
}

impl InputPanel {
    /// Build a panel and the receiving end of its event queue.
    pub fn channel(config: &PanelConfig) -> (Self, mpsc::Receiver<InputEvent>) {
        let (tx, rx) = mpsc::channel(config.event_queue.max(1));
        let panel = Self {
            tx,
            bounce: config.button_bounce(),
            last_toggle: None,
            last_select: None,
            steps: 0,
        };
        (panel, rx)
    }

    pub fn steps(&self) -> i64 {
        self.steps
    }

    /// Report a raw edge. Returns true when an event was enqueued.
    pub fn signal(&mut self, signal: Signal, now: Instant) -> bool {
        let event = match signal {
            Signal::ToggleEdge => {
                if !accept_edge(&mut self.last_toggle, now, self.bounce) {
                    debug!("input: toggle bounce suppressed");
                    return false;
                }
                InputEvent::TogglePressed
            }
            Signal::SelectEdge => {
                if !accept_edge(&mut self.last_select, now, self.bounce) {
                    debug!("input: select bounce suppressed");
                    return false;
                }
                InputEvent::SelectPressed
            }
            // The encoder's quadrature decoding already filters contact bounce.
            Signal::Rotary(direction) => {
                self.steps += match direction {
                    Direction::Clockwise => 1,
                    Direction::CounterClockwise => -1,
                };
                InputEvent::RotaryStepped {
                    direction,
                    steps: self.steps,
                }
            }
        };
        self.enqueue(event)
    }

    fn enqueue(&self, event: InputEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                debug!("input: {:?}", event);
                true
            }
            Err(TrySendError::Full(event)) => {
                warn!("input: event queue full, dropping {:?}", event);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("input: controller gone, dropping event");
                false
            }
        }
    }
}

fn accept_edge(last: &mut Option<Instant>, now: Instant, bounce: Duration) -> bool {
    match *last {
        Some(prev) if now.saturating_duration_since(prev) < bounce => false,
        _ => {
            *last = Some(now);
            true
        }
    }
}
