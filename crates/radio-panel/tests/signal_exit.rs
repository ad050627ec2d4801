//! Process-level shutdown: SIGTERM with stdin still open must end the
//! process with status 0. Needs a real mpv; skipped when none is installed.

#![cfg(unix)]

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

fn wait_for<F: FnMut() -> bool>(limit: Duration, mut done: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn sigterm_with_open_stdin_exits_cleanly() {
    if radio_core::platform::find_mpv_binary().is_none() {
        eprintln!("mpv not installed, skipping");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("piradio.log");
    let config_file = dir.path().join("config.toml");
    let mut config = std::fs::File::create(&config_file).unwrap();
    writeln!(
        config,
        "[controller]\nautostart = false\n\n[mpv]\naudio_device = \"\"\n\n\
         [paths]\nstate_file = {:?}\nlog_file = {:?}\n",
        dir.path().join("last_station.txt").display().to_string(),
        log_file.display().to_string(),
    )
    .unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_piradio"))
        .env("PIRADIO_CONFIG", &config_file)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    // Held open for the whole test, like an idle terminal.
    let _stdin = child.stdin.take();

    let ready = wait_for(Duration::from_secs(20), || {
        std::fs::read_to_string(&log_file)
            .map(|log| log.contains("running scheduler"))
            .unwrap_or(false)
    });
    if !ready {
        let _ = child.kill();
        panic!("piradio did not reach the scheduler");
    }

    let sent = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());

    let mut status = None;
    wait_for(Duration::from_secs(10), || {
        status = child.try_wait().unwrap();
        status.is_some()
    });
    let Some(status) = status else {
        let _ = child.kill();
        panic!("piradio still running 10s after SIGTERM");
    };
    assert!(status.success(), "exit status {status:?}");
}
