//! Station catalog: the fixed, ordered list of playable streams.
//!
//! Identity is positional. Two entries may share a name or URL and are still
//! distinct stations. Navigation wraps in both directions and the index of
//! the last station that actually started playing is persisted as a single
//! decimal number.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    /// Shown on the display.
    pub name: String,
    pub url: String,
}

impl Station {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("station catalog is empty")]
    Empty,
    #[error("failed to read station source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse station TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Why the persisted selection could not be used. Never fatal.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("no saved station index")]
    Missing,
    #[error("saved station index {0:?} is not a number")]
    Parse(String),
    #[error("saved station index {index} is out of range for {len} stations")]
    OutOfRange { index: usize, len: usize },
    #[error("station index file I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Catalog {
    stations: Vec<Station>,
    cursor: usize,
}

impl Catalog {
    pub fn new(stations: Vec<Station>) -> Result<Self, CatalogError> {
        if stations.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self {
            stations,
            cursor: 0,
        })
    }

    /// The reference device's station list.
    pub fn builtin() -> Self {
        let stations = [
            ("Vrt NWS", "http://progressive-audio.vrtcdn.be/content/fixed/11_11niws-snip_hi.mp3"),
            ("Radio 1", "http://icecast.vrtcdn.be/radio1.aac"),
            ("Radio 1 Classics", "http://icecast.vrtcdn.be/radio1_classics.aac"),
            ("Radio 1 De Lage Landenlijst", "http://icecast.vrtcdn.be/radio1_lagelanden.aac"),
            ("Radio 2 Antwerpen", "http://icecast.vrtcdn.be/ra2ant.aac"),
            ("Radio 2 Bene Bene", "http://icecast.vrtcdn.be/radio2_benebene.aac"),
            ("Radio 2 Unwind", "http://icecast.vrtcdn.be/radio2_unwind.aac"),
            ("Klara", "http://icecast.vrtcdn.be/klara.aac"),
            ("Klara Continuo", "http://icecast.vrtcdn.be/klaracontinuo.aac"),
            ("La premiere", "https://radios.rtbf.be/laprem1ere-128.mp3"),
            ("Musique 3", "https://radios.rtbf.be/musiq3-128.aac"),
            ("Venice Classic radio", "https://uk2.streamingpulse.com/ssl/vcr1"),
        ]
        .into_iter()
        .map(|(name, url)| Station::new(name, url))
        .collect();

        Self {
            stations,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor. Out-of-range values wrap.
    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index % self.stations.len();
    }

    pub fn current(&self) -> &Station {
        &self.stations[self.cursor]
    }

    pub fn get(&self, index: usize) -> Option<&Station> {
        self.stations.get(index)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn next(&self, cursor: usize) -> (usize, &Station) {
        let idx = (cursor + 1) % self.stations.len();
        (idx, &self.stations[idx])
    }

    pub fn previous(&self, cursor: usize) -> (usize, &Station) {
        let len = self.stations.len();
        let idx = (cursor % len + len - 1) % len;
        (idx, &self.stations[idx])
    }

    pub fn step(&self, cursor: usize, direction: Direction) -> (usize, &Station) {
        match direction {
            Direction::Clockwise => self.next(cursor),
            Direction::CounterClockwise => self.previous(cursor),
        }
    }

    /// Load a catalog from a TOML or m3u file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_m3u = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("m3u") || e.eq_ignore_ascii_case("m3u8"));
        let stations = if is_m3u {
            parse_m3u_from_str(&content)
        } else {
            parse_stations_from_toml_str(&content)?
        };
        Self::new(stations)
    }

    /// Configured source if it loads, otherwise the built-in list.
    pub fn load_or_builtin(source: Option<&Path>) -> Self {
        let Some(path) = source else {
            info!("No station source configured, using built-in catalog");
            return Self::builtin();
        };
        match Self::load(path) {
            Ok(catalog) => {
                info!(
                    "Loaded {} stations from {}",
                    catalog.len(),
                    path.display()
                );
                catalog
            }
            Err(e) => {
                warn!("Station source unusable ({}), using built-in catalog", e);
                Self::builtin()
            }
        }
    }
}

// ── station file parsers ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TomlStationFile {
    #[serde(default)]
    station: Vec<Station>,
}

pub fn parse_stations_from_toml_str(content: &str) -> Result<Vec<Station>, CatalogError> {
    let file: TomlStationFile = toml::from_str(content)?;
    Ok(file.station)
}

pub fn parse_m3u_from_str(content: &str) -> Vec<Station> {
    let mut stations = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            if let Some(comma_idx) = rest.find(',') {
                pending_name = Some(rest[comma_idx + 1..].trim().to_string());
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let url = line.to_string();
        let name = pending_name.take().unwrap_or_else(|| url.clone());
        stations.push(Station { name, url });
    }

    stations
}

// ── persisted selection ───────────────────────────────────────────────────────

fn read_persisted(path: &Path, len: usize) -> Result<usize, PersistError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(PersistError::Missing),
        Err(e) => return Err(e.into()),
    };
    let line = content.lines().next().unwrap_or("").trim();
    let index: usize = line
        .parse()
        .map_err(|_| PersistError::Parse(line.to_string()))?;
    if index >= len {
        return Err(PersistError::OutOfRange { index, len });
    }
    Ok(index)
}

/// Read the saved station index. Any problem yields 0 and a warning.
pub fn load_persisted(path: &Path, len: usize) -> usize {
    match read_persisted(path, len) {
        Ok(index) => {
            debug!("Retrieving saved last station index: {}", index);
            index
        }
        Err(e) => {
            warn!(
                "Cannot use saved station index from {} ({}), starting at first station",
                path.display(),
                e
            );
            0
        }
    }
}

/// Overwrite the saved station index. Failures are logged and swallowed.
pub fn save_persisted(path: &Path, index: usize) {
    let result = (|| -> Result<(), PersistError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, index.to_string())?;
        Ok(())
    })();
    match result {
        Ok(()) => debug!("Saved station index {} to {}", index, path.display()),
        Err(e) => warn!("Failed to save station index to {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Catalog {
        Catalog::new(vec![
            Station::new("A", "urlA"),
            Station::new("B", "urlB"),
            Station::new("C", "urlC"),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(matches!(Catalog::new(vec![]), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_next_and_previous_wrap() {
        let c = abc();
        assert_eq!(c.next(2).0, 0);
        assert_eq!(c.previous(0).0, 2);
        assert_eq!(c.next(0).1.name, "B");
        assert_eq!(c.previous(1).1.url, "urlA");
    }

    #[test]
    fn test_navigation_is_invertible() {
        for n in 1..=12 {
            let stations = (0..n)
                .map(|i| Station::new(format!("S{i}"), format!("url{i}")))
                .collect();
            let c = Catalog::new(stations).unwrap();
            for i in 0..n {
                assert_eq!(c.next(c.previous(i).0).0, i, "n={n} i={i}");
                assert_eq!(c.previous(c.next(i).0).0, i, "n={n} i={i}");
            }
        }
    }

    #[test]
    fn test_duplicate_stations_are_distinct_positions() {
        let c = Catalog::new(vec![
            Station::new("Same", "url"),
            Station::new("Same", "url"),
        ])
        .unwrap();
        assert_eq!(c.next(0).0, 1);
        assert_eq!(c.next(1).0, 0);
    }

    #[test]
    fn test_builtin_catalog() {
        let c = Catalog::builtin();
        assert_eq!(c.len(), 12);
        assert_eq!(c.current().name, "Vrt NWS");
    }

    #[test]
    fn test_parse_toml_stations() {
        let stations = parse_stations_from_toml_str(
            r#"
            [[station]]
            name = "Klara"
            url = "http://icecast.vrtcdn.be/klara.aac"

            [[station]]
            name = "Musique 3"
            url = "https://radios.rtbf.be/musiq3-128.aac"
            "#,
        )
        .unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[1].name, "Musique 3");
    }

    #[test]
    fn test_parse_m3u() {
        let stations = parse_m3u_from_str(
            "#EXTM3U\n#EXTINF:-1,Radio 1\nhttp://icecast.vrtcdn.be/radio1.aac\n\nhttp://bare.example/stream\n",
        );
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].name, "Radio 1");
        assert_eq!(stations[1].name, "http://bare.example/stream");
    }

    #[test]
    fn test_load_or_builtin_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.toml");
        std::fs::write(&path, "station = []\n").unwrap();
        assert_eq!(Catalog::load_or_builtin(Some(path.as_path())).len(), 12);

        let m3u = dir.path().join("radios.m3u");
        std::fs::write(&m3u, "#EXTINF:-1,One\nhttp://one\n").unwrap();
        assert_eq!(Catalog::load_or_builtin(Some(m3u.as_path())).current().name, "One");
    }

    #[test]
    fn test_persisted_round_trip_and_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("last_station.txt");

        assert_eq!(load_persisted(&path, 3), 0);

        save_persisted(&path, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2");
        assert_eq!(load_persisted(&path, 3), 2);

        assert_eq!(load_persisted(&path, 2), 0);
        assert!(matches!(
            read_persisted(&path, 2),
            Err(PersistError::OutOfRange { index: 2, len: 2 })
        ));

        std::fs::write(&path, "garbage\n").unwrap();
        assert_eq!(load_persisted(&path, 3), 0);
        assert!(matches!(read_persisted(&path, 3), Err(PersistError::Parse(_))));
    }

    #[test]
    fn test_save_persisted_swallows_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be overwritten as a file.
        save_persisted(dir.path(), 1);
        assert!(dir.path().is_dir());
    }
}
