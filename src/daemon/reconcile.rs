//! Daemon configuration reconciliation.
//!
//! Rewrites the daemon's JSON config so the default bridge comes up on the
//! target addressing. The merge is flat: three managed keys are overwritten,
//! one legacy key is dropped, every other key round-trips untouched. The
//! write itself goes through a temp file and rename so a crash mid-write
//! never leaves a truncated config behind.

use crate::config::BridgeTarget;
use crate::error::SetupError;
use serde_json::{json, Map, Value};
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Key superseded by `default-address-pools`; dropped on sight.
const LEGACY_FIXED_CIDR_KEY: &str = "fixed-cidr";

/// Daemon config must stay world-readable for the CLI tools.
const CONFIG_FILE_MODE: u32 = 0o644;

/// What one reconcile run did, for logging and tests.
#[derive(Debug)]
pub struct Reconciliation {
    pub path: PathBuf,
    /// Backup taken before mutation, when the file already existed.
    pub backup_path: Option<PathBuf>,
    pub created: bool,
}

/// Rewrite the daemon config at `path` to carry the target bridge addressing.
///
/// An existing file is backed up to `<name>.backup.<timestamp>` first and
/// must contain a JSON object; a missing file starts from an empty one.
/// Running twice with the same target produces byte-identical output.
pub fn reconcile(path: &Path, target: &BridgeTarget) -> Result<Reconciliation, SetupError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            SetupError::DaemonConfig(format!("invalid config path {}", path.display()))
        })?;

    let existing = match std::fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let (mut doc, backup_path) = match existing {
        Some(raw) => {
            let backup = backup_path_for(path, file_name);
            std::fs::copy(path, &backup)?;
            tracing::info!(
                "[Reconciler] Backed up {} to {}",
                path.display(),
                backup.display()
            );

            let value: Value = serde_json::from_str(&raw).map_err(|e| {
                SetupError::DaemonConfig(format!("{} is not valid JSON: {}", path.display(), e))
            })?;
            let Value::Object(map) = value else {
                return Err(SetupError::DaemonConfig(format!(
                    "{} must contain a JSON object",
                    path.display()
                )));
            };
            (map, Some(backup))
        }
        None => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!("[Reconciler] Creating {}", path.display());
            (Map::new(), None)
        }
    };
    let created = backup_path.is_none();

    if doc.remove(LEGACY_FIXED_CIDR_KEY).is_some() {
        tracing::info!("[Reconciler] Dropped legacy key '{}'", LEGACY_FIXED_CIDR_KEY);
    }

    doc.insert("log-level".to_string(), json!("error"));
    doc.insert("bip".to_string(), json!(target.bip));
    doc.insert(
        "default-address-pools".to_string(),
        json!([{ "base": target.pool_base, "size": target.pool_size }]),
    );

    let mut rendered = serde_json::to_string_pretty(&Value::Object(doc)).map_err(|e| {
        SetupError::DaemonConfig(format!("cannot render {}: {}", path.display(), e))
    })?;
    rendered.push('\n');

    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp_path, rendered)?;
    // Sync the temp file to disk before the rename makes it visible.
    if let Ok(file) = std::fs::File::open(&tmp_path) {
        let _ = file.sync_all();
    }
    std::fs::rename(&tmp_path, path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(CONFIG_FILE_MODE))?;

    tracing::info!(
        "[Reconciler] Wrote {} (bip {}, pool {}/{})",
        path.display(),
        target.bip,
        target.pool_base,
        target.pool_size
    );

    Ok(Reconciliation {
        path: path.to_path_buf(),
        backup_path,
        created,
    })
}

fn backup_path_for(path: &Path, file_name: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    path.with_file_name(format!("{file_name}.backup.{stamp}"))
}
