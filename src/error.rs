//! Error types for the bridge setup pipeline.

use thiserror::Error;

/// Error type covering every stage of the setup pipeline.
///
/// Each variant maps to the stage that raised it, so the binary can report
/// where a run stopped without re-deriving it from the message text.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Root privileges required (running as uid {0})")]
    Privilege(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Install error: {0}")]
    Install(String),

    #[error("Daemon config error: {0}")]
    DaemonConfig(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Service did not report active within {0:?}")]
    ServiceTimeout(std::time::Duration),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
