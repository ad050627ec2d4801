//! Scheduler loop: drain queued input, then tick the controller.

use radio_core::controller::RadioController;
use radio_core::display::DisplayDriver;
use radio_core::engine::{EngineError, PlaybackEngine};
use radio_core::input::InputEvent;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::info;
#[cfg(not(unix))]
use tracing::warn;

/// Run until `shutdown` resolves. A fatal engine error ends the loop early.
pub async fn run<E, D, S>(
    controller: &mut RadioController<E, D>,
    events: &mut mpsc::Receiver<InputEvent>,
    tick: Duration,
    shutdown: S,
) -> Result<(), EngineError>
where
    E: PlaybackEngine,
    D: DisplayDriver,
    S: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                return Ok(());
            }
            _ = interval.tick() => {
                let now = tokio::time::Instant::now().into_std();
                while let Ok(event) = events.try_recv() {
                    controller.handle_event(event, now)?;
                }
                controller.tick(now)?;
            }
        }
    }
}

/// Install SIGINT/SIGTERM handlers now; the returned future resolves on
/// the first of either.
#[cfg(unix)]
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = int.recv() => info!("Received SIGINT"),
            _ = term.recv() => info!("Received SIGTERM"),
        }
    })
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
}
