//! Snapshot persistence for the studio state.
//!
//! One JSON file under `~/.homecanvas/`, wrapped in a schema-versioned
//! envelope with a unix-seconds save stamp. Snapshots older than an hour are
//! ignored on load; unparseable files are deleted so a bad write cannot wedge
//! startup forever.

use crate::studio::{StudioState, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshots older than this are considered stale and skipped.
const FRESHNESS_WINDOW_SECS: i64 = 3600;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    schema_version: u32,
    saved_at: i64,
    studio: StudioState,
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("USERPROFILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn state_dir() -> PathBuf {
    home_dir().join(".homecanvas")
}

fn state_path() -> PathBuf {
    state_dir().join("state.json")
}

fn unix_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs() as i64,
        Err(_) => 0,
    }
}

fn write_snapshot(path: &Path, studio: &StudioState, saved_at: i64) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    let snapshot = Snapshot {
        schema_version: SCHEMA_VERSION,
        saved_at,
        studio: studio.clone(),
    };
    let bytes = serde_json::to_vec(&snapshot)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, bytes)?;
    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if path.exists() {
                fs::remove_file(path)?;
                fs::rename(&tmp_path, path)?;
                Ok(())
            } else {
                Err(rename_err)
            }
        }
    }
}

fn read_snapshot_file(path: &Path, now: i64) -> Result<Option<StudioState>, String> {
    let data = fs::read(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_slice(&data)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()))?;

    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(format!(
            "unknown schema_version in {}: {}",
            path.display(),
            snapshot.schema_version
        ));
    }
    if now - snapshot.saved_at >= FRESHNESS_WINDOW_SECS {
        return Ok(None);
    }
    Ok(Some(snapshot.studio))
}

pub fn save(studio: &StudioState) -> io::Result<()> {
    write_snapshot(&state_path(), studio, unix_now())
}

/// Loads the persisted snapshot if it exists and is fresh. The warning, when
/// present, is diagnostic only; callers continue with an empty studio.
pub fn load() -> (Option<StudioState>, Option<String>) {
    let path = state_path();
    if !path.exists() {
        return (None, None);
    }
    match read_snapshot_file(&path, unix_now()) {
        Ok(studio) => (studio, None),
        Err(err) => {
            // A corrupted snapshot would fail on every launch; drop it.
            if let Err(remove_err) = fs::remove_file(&path) {
                log::warn!("failed to remove corrupted snapshot: {remove_err}");
            }
            (None, Some(err))
        }
    }
}

pub fn clear() {
    let path = state_path();
    if path.exists() {
        if let Err(err) = fs::remove_file(&path) {
            log::warn!("failed to clear persisted state: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::ImageRecord;

    fn sample_state() -> StudioState {
        let mut state = StudioState::default();
        state.load_original(ImageRecord::original(
            "data:image/jpeg;base64,AAAA".to_string(),
            None,
        ));
        state
            .record_design("data:image/png;base64,BBBB".to_string(), None, "sage walls")
            .expect("record");
        state
    }

    #[test]
    fn snapshot_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        let state = sample_state();

        write_snapshot(&path, &state, 1_000).expect("write");
        let restored = read_snapshot_file(&path, 1_010)
            .expect("read")
            .expect("fresh snapshot should load");

        assert_eq!(restored.image_history.len(), 2);
        assert_eq!(restored.edit_history.len(), 1);
        assert_eq!(
            restored.current.map(|c| c.id),
            state.current.map(|c| c.id)
        );
    }

    #[test]
    fn stale_snapshot_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        write_snapshot(&path, &sample_state(), 1_000).expect("write");

        let result = read_snapshot_file(&path, 1_000 + FRESHNESS_WINDOW_SECS).expect("read");
        assert!(result.is_none());
    }

    #[test]
    fn snapshot_just_inside_window_loads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        write_snapshot(&path, &sample_state(), 1_000).expect("write");

        let result =
            read_snapshot_file(&path, 1_000 + FRESHNESS_WINDOW_SECS - 1).expect("read");
        assert!(result.is_some());
    }

    #[test]
    fn unknown_schema_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        let data = r#"{"schema_version":99,"saved_at":1000,"studio":{}}"#;
        fs::write(&path, data).expect("fixture");

        let err = read_snapshot_file(&path, 1_000).expect_err("unknown schema should fail");
        assert!(err.contains("unknown schema_version"));
    }

    #[test]
    fn corrupted_snapshot_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        fs::write(&path, b"{not json").expect("fixture");

        assert!(read_snapshot_file(&path, 1_000).is_err());
    }
}
