//! bridgectl library.
//!
//! Detects or installs a Docker runtime, rewrites the daemon config so the
//! default bridge comes up on a deterministic subnet, restarts the daemon,
//! and validates the result from inside a throwaway container.

pub mod config;
pub mod daemon;
pub mod error;
pub mod exec;
pub mod pipeline;
pub mod progress;
pub mod runtime;
pub mod validate;

pub use config::{BridgeTarget, SetupConfig, Timeouts};
pub use error::SetupError;
pub use exec::{argv, CommandOutput, CommandRunner, HostRunner};
pub use pipeline::{SetupPipeline, SetupReport, SetupState, Stage, StageOutcome};
pub use progress::{ConsoleReporter, ProgressReporter};
pub use runtime::{
    detect_runtime, install_runtime, plan_install, Detection, InstallChannel, InstallStep,
    RuntimeKind, RuntimeProfile,
};
pub use validate::{validate, TEST_CONTAINER_NAME};
