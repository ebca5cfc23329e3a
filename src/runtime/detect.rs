//! Host inspection for an existing container runtime.

use crate::error::SetupError;
use crate::exec::{argv, CommandRunner};
use crate::runtime::RuntimeProfile;

/// Outcome of host inspection.
#[derive(Debug, Clone)]
pub enum Detection {
    Installed(RuntimeProfile),
    Absent,
}

/// Inspect the host for an existing runtime installation.
///
/// The sandboxed package wins when both indicators are present, since snapd
/// also puts a `docker` shim on the PATH and the two installations keep their
/// daemon config in different places. Detection only reads host state.
pub async fn detect_runtime(runner: &dyn CommandRunner) -> Result<Detection, SetupError> {
    if binary_on_path(runner, "snap").await? {
        let listed = runner.run(&argv(&["snap", "list", "docker"])).await?;
        if listed.success() {
            tracing::info!("[Detector] Found sandboxed runtime (snap package)");
            return Ok(Detection::Installed(RuntimeProfile::sandboxed()));
        }
    }

    if binary_on_path(runner, "docker").await? {
        tracing::info!("[Detector] Found packaged runtime (docker on PATH)");
        return Ok(Detection::Installed(RuntimeProfile::packaged()));
    }

    tracing::info!("[Detector] No container runtime found");
    Ok(Detection::Absent)
}

async fn binary_on_path(runner: &dyn CommandRunner, name: &str) -> Result<bool, SetupError> {
    let out = runner.run(&argv(&["which", name])).await?;
    Ok(out.success())
}
