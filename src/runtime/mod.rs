//! Container runtime detection, installation, and profiles.

pub mod detect;
pub mod install;

pub use detect::{detect_runtime, Detection};
pub use install::{install_runtime, plan_install, InstallStep};

use crate::exec::argv;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the runtime is packaged and managed on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    /// Distribution packages managed by systemd.
    Packaged,
    /// Snap-confined package managed by snapd.
    Sandboxed,
}

impl RuntimeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeKind::Packaged => "packaged",
            RuntimeKind::Sandboxed => "sandboxed",
        }
    }
}

/// Install path taken when no runtime is present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallChannel {
    /// Vendor apt repository, distribution packages.
    #[default]
    Native,
    /// Snap store package.
    Snap,
}

impl InstallChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            InstallChannel::Native => "native",
            InstallChannel::Snap => "snap",
        }
    }

    /// Packaging style the channel produces once installed.
    pub fn kind(self) -> RuntimeKind {
        match self {
            InstallChannel::Native => RuntimeKind::Packaged,
            InstallChannel::Snap => RuntimeKind::Sandboxed,
        }
    }
}

/// Immutable description of a runtime installation.
///
/// Built once by detection or installation, then threaded through the
/// reconcile, restart, and validation stages unchanged.
#[derive(Debug, Clone)]
pub struct RuntimeProfile {
    pub kind: RuntimeKind,
    /// Daemon JSON config location for this packaging style.
    pub config_path: PathBuf,
    /// Command that restarts the daemon.
    pub restart_command: Vec<String>,
    /// Command whose output reports the daemon's service state.
    pub status_command: Vec<String>,
    /// Network interface backing the default bridge.
    pub bridge_interface: String,
}

impl RuntimeProfile {
    pub fn packaged() -> Self {
        Self {
            kind: RuntimeKind::Packaged,
            config_path: PathBuf::from("/etc/docker/daemon.json"),
            restart_command: argv(&["systemctl", "restart", "docker"]),
            status_command: argv(&["systemctl", "is-active", "docker"]),
            bridge_interface: "docker0".to_string(),
        }
    }

    pub fn sandboxed() -> Self {
        Self {
            kind: RuntimeKind::Sandboxed,
            config_path: PathBuf::from("/var/snap/docker/current/config/daemon.json"),
            restart_command: argv(&["snap", "restart", "docker"]),
            status_command: argv(&["snap", "services", "docker.dockerd"]),
            bridge_interface: "docker0".to_string(),
        }
    }

    pub fn for_kind(kind: RuntimeKind) -> Self {
        match kind {
            RuntimeKind::Packaged => Self::packaged(),
            RuntimeKind::Sandboxed => Self::sandboxed(),
        }
    }
}
