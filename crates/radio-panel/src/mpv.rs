/// mpv playback engine over JSON IPC.
///
/// Architecture:
///
/// ```text
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← receives PendingRequest via mpsc, writes → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → waiting oneshot, if any
///                                └── event / property-change   → PlayerSnapshot (watch)
/// ```
///
/// The controller is synchronous. `MpvEngine` queues commands with
/// `try_send` and answers every probe from the latest snapshot, so no
/// trait call ever waits on mpv.
use radio_core::config::MpvConfig;
use radio_core::engine::{EngineError, PlaybackEngine};
use radio_core::platform;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

pub const OBS_CORE_IDLE: u64 = 1;
pub const OBS_ICY_TITLE: u64 = 2;

// ── internal channel types ────────────────────────────────────────────────────

type Reply = oneshot::Sender<anyhow::Result<Value>>;
type PendingMap = Arc<Mutex<HashMap<u64, Reply>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // JSON line, already has '\n'
    /// `None` for fire-and-forget commands.
    reply: Option<Reply>,
}

fn encode(req_id: u64, command: &Value) -> String {
    let mut raw = json!({ "command": command, "request_id": req_id }).to_string();
    raw.push('\n');
    raw
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

// ── snapshot ──────────────────────────────────────────────────────────────────

/// Player state as last reported by mpv.
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub core_idle: bool,
    /// A `loadfile` went out and mpv has not reported `start-file` yet.
    pub awaiting_start: bool,
    pub title: Option<Arc<str>>,
    pub alive: bool,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            core_idle: true,
            awaiting_start: false,
            title: None,
            alive: true,
        }
    }
}

impl PlayerSnapshot {
    pub fn is_buffering(&self) -> bool {
        self.awaiting_start || self.core_idle
    }

    pub fn apply(&mut self, event: &MpvEvent) {
        if let Some((id, data)) = event.as_property_change() {
            match id {
                OBS_CORE_IDLE => {
                    let idle = data.as_bool().unwrap_or(true);
                    // The previous stream can still report audio after a new loadfile.
                    if self.awaiting_start && !idle {
                        debug!("mpv: ignoring stale core-idle=false");
                        return;
                    }
                    self.core_idle = idle;
                }
                OBS_ICY_TITLE => {
                    self.title = data.as_str().map(Arc::from);
                }
                _ => {}
            }
            return;
        }

        match event.event_name() {
            Some("start-file") => {
                self.awaiting_start = false;
                self.core_idle = true;
                self.title = None;
            }
            Some("shutdown") => {
                info!("mpv: shutdown event");
                self.alive = false;
            }
            _ => {}
        }
    }
}

// ── public handle ─────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    /// Send a command and await mpv's reply.
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: encode(req_id, &command),
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Queue a command without waiting for the reply.
    pub fn fire(&self, command: Value) -> Result<(), EngineError> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let request = PendingRequest {
            req_id,
            payload: encode(req_id, &command),
            reply: None,
        };
        match self.tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("mpv: command queue full, dropping {}", command);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                Err(EngineError::Shutdown("mpv writer task gone".into()))
            }
        }
    }

    /// Register observe_property for everything the snapshot tracks.
    /// Must be called after every fresh connection.
    pub async fn observe_properties(&self) {
        let props = [
            (OBS_CORE_IDLE, "core-idle"),
            (OBS_ICY_TITLE, "metadata/by-key/icy-title"),
        ];
        for (id, name) in &props {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

// ── engine ────────────────────────────────────────────────────────────────────

pub struct MpvEngine {
    handle: MpvHandle,
    state: Arc<watch::Sender<PlayerSnapshot>>,
    snapshot: watch::Receiver<PlayerSnapshot>,
}

impl PlaybackEngine for MpvEngine {
    fn play(&mut self, url: &str) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.state.send_modify(|s| {
            s.awaiting_start = true;
            s.core_idle = true;
            s.title = None;
        });
        info!("mpv: loadfile {}", url);
        self.handle.fire(json!(["loadfile", url]))
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.state.send_modify(|s| {
            s.awaiting_start = false;
            s.title = None;
        });
        self.handle.fire(json!(["stop"]))
    }

    fn is_buffering(&self) -> Result<bool, EngineError> {
        self.ensure_running()?;
        Ok(self.snapshot.borrow().is_buffering())
    }

    fn current_metadata(&self) -> Option<Arc<str>> {
        self.snapshot.borrow().title.clone()
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.snapshot.borrow().alive {
            Ok(())
        } else {
            Err(EngineError::Shutdown("mpv IPC connection closed".into()))
        }
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Command line for the player process.
pub fn mpv_args(config: &MpvConfig) -> Vec<String> {
    let mut args = vec![
        "--idle=yes".to_string(),
        "--no-video".to_string(),
        "--quiet".to_string(),
        "--ytdl=no".to_string(),
        platform::mpv_socket_arg(),
        format!("--msg-level=all={}", config.log_level),
    ];
    if !config.audio_device.is_empty() {
        args.push(format!("--audio-device={}", config.audio_device));
    }
    args
}

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_path: PathBuf,
    config: MpvConfig,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new(config: MpvConfig) -> Self {
        Self {
            socket_path: PathBuf::from(platform::mpv_socket_name()),
            config,
            process: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            child.try_wait().ok().flatten().is_none()
        } else {
            false
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
        let _ = tokio::fs::remove_file(&self.socket_path).await;
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(&mut self) -> anyhow::Result<MpvEngine> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
        let _ = tokio::fs::remove_file(&self.socket_path).await;

        let mpv_binary = platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        info!("mpv: spawning {}", mpv_binary.display());

        let mut child = tokio::process::Command::new(mpv_binary)
            .args(mpv_args(&self.config))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }
        self.process = Some(child);

        // Wait for socket to appear
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if self.socket_path.exists() {
                break;
            }
        }
        if !self.socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&self.socket_path).await?;
        info!("mpv: connected to IPC socket");
        let engine = start_io_tasks(stream);
        engine.handle.observe_properties().await;
        Ok(engine)
    }

    #[cfg(not(unix))]
    pub async fn spawn_and_connect(&mut self) -> anyhow::Result<MpvEngine> {
        anyhow::bail!("mpv IPC needs a Unix domain socket")
    }
}

#[cfg(unix)]
fn start_io_tasks(stream: UnixStream) -> MpvEngine {
    let (read_half, write_half) = stream.into_split();
    let reader = BufReader::new(read_half);

    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    let (state_tx, snapshot) = watch::channel(PlayerSnapshot::default());
    let state = Arc::new(state_tx);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, state.clone()));

    MpvEngine {
        handle: MpvHandle { tx: cmd_tx },
        state,
        snapshot,
    }
}

/// mpv's own log lines end up in ours.
async fn forward_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            warn!("[mpv] {}", line.trim());
        }
    }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    state: Arc<watch::Sender<PlayerSnapshot>>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                warn!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let ok = val["error"].as_str() == Some("success");
                    let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                    let waiting = pending.lock().await.remove(&req_id);
                    match waiting {
                        Some(tx) => {
                            let result = if ok {
                                Ok(val)
                            } else {
                                Err(anyhow::anyhow!("mpv error: {}", err))
                            };
                            let _ = tx.send(result);
                        }
                        None if ok => debug!("mpv reader: req={} ok", req_id),
                        None => warn!("mpv: command req={} failed: {}", req_id, err),
                    }
                } else {
                    debug!("mpv reader: event {}", trimmed);
                    let event = MpvEvent { raw: val };
                    state.send_modify(|s| s.apply(&event));
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
    state.send_modify(|s| s.alive = false);
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register reply channel before writing so reader can match it
        if let Some(reply) = req.reply {
            pending.lock().await.insert(req.req_id, reply);
        }
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}
