//! Flat JSON persistence of the metrics map.

use crate::ModelMetrics;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read a persisted metrics file.
///
/// A missing or malformed file yields an empty map: losing history never
/// blocks recording new data.
pub fn load(path: &Path) -> BTreeMap<String, ModelMetrics> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("no metrics file at {}, starting empty", path.display());
            return BTreeMap::new();
        }
        Err(e) => {
            tracing::warn!("failed to read metrics from {}: {e}", path.display());
            return BTreeMap::new();
        }
    };

    match serde_json::from_str::<Vec<ModelMetrics>>(&text) {
        Ok(models) => {
            tracing::info!("loaded metrics for {} model(s) from {}", models.len(), path.display());
            models.into_iter().map(|m| (m.model.clone(), m)).collect()
        }
        Err(e) => {
            tracing::warn!("ignoring malformed metrics file {}: {e}", path.display());
            BTreeMap::new()
        }
    }
}

/// Replace `path` with `bytes` via a sibling temp file and a rename, so a
/// reader never sees a half-written document.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let tmp = tmp_path(path);
    std::fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", tmp.display()))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
