use std::path::PathBuf;

const APP_DIR: &str = "piradio";

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "PIRADIO_CONFIG";

pub fn mpv_socket_name() -> String {
    format!("{}/piradio-mpv.sock", std::env::temp_dir().display())
}

pub fn mpv_socket_arg() -> String {
    format!("--input-ipc-server={}", mpv_socket_name())
}

pub fn data_dir() -> PathBuf {
    // ~/.local/share/piradio/ (XDG standard)
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join(APP_DIR)
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(APP_DIR)
}

pub fn mpv_binary_name() -> &'static str {
    "mpv"
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    path.split(':')
        .map(|dir| PathBuf::from(dir).join(name))
        .find(|p| p.exists())
}

/// Find the mpv binary for playback.
///
/// Checks `MPV_PATH`, then beside the current executable, then `PATH`.
pub fn find_mpv_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("MPV_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let local_mpv = dir.join(mpv_binary_name());
            if local_mpv.exists() {
                return Some(local_mpv);
            }
        }
    }

    find_on_path(mpv_binary_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_are_app_scoped() {
        assert!(data_dir().ends_with(".local/share/piradio"));
        assert!(config_dir().ends_with(".config/piradio"));
    }

    #[test]
    fn test_socket_arg_points_at_socket() {
        let arg = mpv_socket_arg();
        assert!(arg.starts_with("--input-ipc-server="));
        assert!(arg.ends_with(&mpv_socket_name()));
    }
}
