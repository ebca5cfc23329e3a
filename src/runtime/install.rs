//! Runtime installation.
//!
//! Each channel expands to an ordered command sequence that is executed
//! fail-fast. The plan is a plain value so the binary can print it without
//! touching the host.

use crate::error::SetupError;
use crate::exec::{argv, CommandRunner};
use crate::runtime::{InstallChannel, RuntimeProfile};
use std::time::Instant;

/// One step of an install sequence.
#[derive(Debug, Clone)]
pub struct InstallStep {
    pub name: &'static str,
    pub command: Vec<String>,
}

/// Build the ordered install sequence for a channel.
pub fn plan_install(channel: InstallChannel) -> Vec<InstallStep> {
    match channel {
        InstallChannel::Native => vec![
            InstallStep {
                name: "update package index",
                command: argv(&["apt-get", "update"]),
            },
            InstallStep {
                name: "install repository prerequisites",
                command: argv(&[
                    "apt-get",
                    "install",
                    "-y",
                    "ca-certificates",
                    "curl",
                    "gnupg",
                    "lsb-release",
                ]),
            },
            InstallStep {
                name: "create keyring directory",
                command: argv(&["install", "-m", "0755", "-d", "/etc/apt/keyrings"]),
            },
            InstallStep {
                name: "fetch vendor signing key",
                command: argv(&[
                    "sh",
                    "-c",
                    "curl -fsSL https://download.docker.com/linux/ubuntu/gpg \
                     | gpg --dearmor --yes -o /etc/apt/keyrings/docker.gpg",
                ]),
            },
            InstallStep {
                name: "add vendor repository",
                command: argv(&[
                    "sh",
                    "-c",
                    "echo \"deb [arch=$(dpkg --print-architecture) \
                     signed-by=/etc/apt/keyrings/docker.gpg] \
                     https://download.docker.com/linux/ubuntu $(lsb_release -cs) stable\" \
                     > /etc/apt/sources.list.d/docker.list",
                ]),
            },
            InstallStep {
                name: "refresh package index",
                command: argv(&["apt-get", "update"]),
            },
            InstallStep {
                name: "install runtime packages",
                command: argv(&[
                    "apt-get",
                    "install",
                    "-y",
                    "docker-ce",
                    "docker-ce-cli",
                    "containerd.io",
                ]),
            },
        ],
        InstallChannel::Snap => vec![InstallStep {
            name: "install runtime snap",
            command: argv(&["snap", "install", "docker"]),
        }],
    }
}

/// Execute the install sequence for a channel, stopping on the first failure.
///
/// Returns the profile of the freshly installed runtime on success.
pub async fn install_runtime(
    runner: &dyn CommandRunner,
    channel: InstallChannel,
) -> Result<RuntimeProfile, SetupError> {
    let steps = plan_install(channel);
    tracing::info!(
        "[Installer] Installing runtime via {} channel ({} steps)",
        channel.as_str(),
        steps.len()
    );

    for step in &steps {
        tracing::info!("[Installer] {}", step.name);
        let started = Instant::now();

        let out = runner
            .run(&step.command)
            .await
            .map_err(|e| SetupError::Install(format!("{}: {}", step.name, e)))?;
        if !out.success() {
            return Err(SetupError::Install(format!(
                "{} failed (exit {}): {}",
                step.name,
                out.exit_code,
                out.last_stderr_line()
            )));
        }

        tracing::info!(
            "[TIMING] Install step '{}' completed in {}ms",
            step.name,
            started.elapsed().as_millis()
        );
    }

    Ok(RuntimeProfile::for_kind(channel.kind()))
}
