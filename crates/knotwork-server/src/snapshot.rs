//! On-disk snapshot of a graph response
//!
//! The response is written verbatim as JSON to `<data_dir>/snapshot.json`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use knotwork_core::GraphResponse;
use serde::{Deserialize, Serialize};

/// Snapshot file inside the data directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub path: String,
    pub node_count: usize,
    pub link_count: usize,
    pub saved_at: String,
}

pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOT_FILE)
}

pub fn ensure_data_dir(data_dir: &Path) -> std::io::Result<()> {
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir)?;
    }
    Ok(())
}

/// Write `response`, replacing any previous snapshot.
pub fn save_snapshot(data_dir: &Path, response: &GraphResponse) -> anyhow::Result<SnapshotInfo> {
    ensure_data_dir(data_dir)?;
    let path = snapshot_path(data_dir);
    let tmp = path.with_extension("json.tmp");

    let json = serde_json::to_string_pretty(response)?;
    std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;

    tracing::debug!("Snapshot saved: {}", path.display());
    Ok(SnapshotInfo {
        path: path.display().to_string(),
        node_count: response.nodes.len(),
        link_count: response.links.len(),
        saved_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Read the saved snapshot, if any.
pub fn load_snapshot(data_dir: &Path) -> anyhow::Result<Option<GraphResponse>> {
    let path = snapshot_path(data_dir);
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let response = serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
    tracing::debug!("Snapshot loaded from: {}", path.display());
    Ok(Some(response))
}
