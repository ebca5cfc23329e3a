//! Daemon service control.
//!
//! Restarting is delegated to the packaging style's service manager.
//! Readiness is a bounded poll of the status command rather than a fixed
//! sleep, so a hung daemon surfaces as a timeout instead of a false pass.

use crate::error::SetupError;
use crate::exec::{CommandOutput, CommandRunner};
use crate::runtime::{RuntimeKind, RuntimeProfile};
use std::time::{Duration, Instant};
use tokio::time::sleep;

const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Daemon state as reported by one status probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    /// Service manager reports a terminal failure.
    Failed,
    /// Still starting, stopped, or not yet reporting.
    Pending,
}

/// Issue the profile's restart command and check it was accepted.
pub async fn restart_daemon(
    runner: &dyn CommandRunner,
    profile: &RuntimeProfile,
) -> Result<(), SetupError> {
    tracing::info!(
        "[ServiceControl] Restarting daemon: {}",
        profile.restart_command.join(" ")
    );

    let out = runner
        .run(&profile.restart_command)
        .await
        .map_err(|e| SetupError::Service(format!("restart command failed to run: {e}")))?;
    if !out.success() {
        return Err(SetupError::Service(format!(
            "restart failed (exit {}): {}",
            out.exit_code,
            out.last_stderr_line()
        )));
    }
    Ok(())
}

/// Poll the status command until the daemon reports active.
///
/// The interval doubles after each probe up to a 5s cap. A `failed` report
/// is terminal; anything else keeps polling until `timeout` is spent.
pub async fn wait_active(
    runner: &dyn CommandRunner,
    profile: &RuntimeProfile,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), SetupError> {
    let start = Instant::now();
    let mut interval = poll_interval;

    loop {
        if start.elapsed() > timeout {
            return Err(SetupError::ServiceTimeout(timeout));
        }

        match probe(runner, profile).await {
            Ok(ServiceState::Active) => {
                tracing::info!("[ServiceControl] Daemon active after {:?}", start.elapsed());
                return Ok(());
            }
            Ok(ServiceState::Failed) => {
                return Err(SetupError::Service(
                    "daemon entered failed state after restart".to_string(),
                ));
            }
            Ok(ServiceState::Pending) => {
                tracing::debug!(
                    "[ServiceControl] Daemon not active yet ({:?} elapsed)",
                    start.elapsed()
                );
            }
            Err(e) => {
                tracing::warn!("[ServiceControl] Status probe failed, retrying: {}", e);
            }
        }

        sleep(interval).await;
        interval = (interval * 2).min(MAX_POLL_INTERVAL);
    }
}

async fn probe(
    runner: &dyn CommandRunner,
    profile: &RuntimeProfile,
) -> std::io::Result<ServiceState> {
    let out = runner.run(&profile.status_command).await?;
    Ok(interpret_status(profile.kind, &out))
}

/// Map a status command's output onto a service state.
///
/// `systemctl is-active` prints a single word. `snap services` prints a
/// header row and then one row per service with the state in the third
/// column.
fn interpret_status(kind: RuntimeKind, out: &CommandOutput) -> ServiceState {
    match kind {
        RuntimeKind::Packaged => match out.stdout.trim() {
            "active" => ServiceState::Active,
            "failed" => ServiceState::Failed,
            _ => ServiceState::Pending,
        },
        RuntimeKind::Sandboxed => {
            for line in out.stdout.lines().skip(1) {
                let columns: Vec<&str> = line.split_whitespace().collect();
                if columns.len() >= 3 && columns[0].ends_with("dockerd") {
                    return match columns[2] {
                        "active" => ServiceState::Active,
                        _ => ServiceState::Pending,
                    };
                }
            }
            ServiceState::Pending
        }
    }
}
