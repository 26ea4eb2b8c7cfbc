//! Session state files.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write leaves the previous file intact. Reads go through
//! [`reconcile`], so a file written by an older build or edited by hand still
//! loads as far as its fields make sense.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{DrillError, Result};
use crate::session::SessionState;
use crate::validator::reconcile;

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `state` to `path` as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn save_state(state: &SessionState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(state)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;

    debug!(session_id = %state.id, path = %path.display(), "Session state saved");
    Ok(())
}

/// Reads a session from `path`.
///
/// Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Returns `DrillError::StateFileCorrupted` if the file is not a JSON object.
pub async fn load_state(path: &Path) -> Result<Option<SessionState>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let raw: Value = serde_json::from_str(&contents)
        .map_err(|e| DrillError::state_corrupted(path, e.to_string()))?;
    if !raw.is_object() {
        return Err(DrillError::state_corrupted(path, "expected a JSON object"));
    }

    let state = reconcile(&SessionState::default(), &raw);
    info!(
        session_id = %state.id,
        phase = %state.phase,
        path = %path.display(),
        "Session state loaded"
    );
    Ok(Some(state))
}
