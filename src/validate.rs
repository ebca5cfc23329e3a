//! End-to-end bridge validation with a throwaway container.
//!
//! Proves the reconciled addressing actually reached the runtime. The live
//! bridge network must carry the target gateway, and a container attached to
//! it must route through that gateway. The throwaway container is removed on
//! every exit path.

use crate::config::{BridgeTarget, Timeouts};
use crate::error::SetupError;
use crate::exec::{argv, CommandRunner};
use crate::runtime::RuntimeProfile;
use serde_json::Value;
use std::time::Instant;
use tokio::time::sleep;

/// Reserved name for the throwaway container. At most one exists at a time.
pub const TEST_CONTAINER_NAME: &str = "bridgectl-netcheck";

const TEST_IMAGE: &str = "alpine:3";
/// Keeps the container alive well past the probe budget.
const TEST_COMMAND: &[&str] = &["sleep", "120"];

/// Validate that the default bridge serves the target addressing.
pub async fn validate(
    runner: &dyn CommandRunner,
    profile: &RuntimeProfile,
    target: &BridgeTarget,
    timeouts: &Timeouts,
) -> Result<(), SetupError> {
    let gateway = target.bip_host()?;

    check_live_config(runner, gateway).await?;
    check_bridge_interface(runner, profile, gateway).await;

    // A stale container from an interrupted run would collide on the name.
    remove_test_container(runner).await;
    prune_stale_networks(runner).await;

    let result = probe_container_gateway(runner, gateway, timeouts).await;
    remove_test_container(runner).await;
    result
}

/// The daemon's own view of the bridge network is authoritative. A missing
/// gateway here means the reconciled config never reached the runtime.
async fn check_live_config(runner: &dyn CommandRunner, gateway: &str) -> Result<(), SetupError> {
    let out = runner
        .run(&argv(&["docker", "network", "inspect", "bridge"]))
        .await
        .map_err(|e| SetupError::Validation(format!("network inspect failed to run: {e}")))?;
    if !out.success() {
        return Err(SetupError::Validation(format!(
            "network inspect failed (exit {}): {}",
            out.exit_code,
            out.last_stderr_line()
        )));
    }

    let parsed: Value = serde_json::from_str(&out.stdout).map_err(|e| {
        SetupError::Validation(format!("network inspect returned invalid JSON: {e}"))
    })?;
    let applied = parsed
        .as_array()
        .and_then(|networks| networks.first())
        .map(|network| gateway_configured(network, gateway))
        .unwrap_or(false);
    if !applied {
        return Err(SetupError::Validation(format!(
            "bridge config not applied: gateway {gateway} missing from default bridge"
        )));
    }

    tracing::info!("[Validator] Default bridge carries gateway {}", gateway);
    Ok(())
}

fn gateway_configured(network: &Value, gateway: &str) -> bool {
    network["IPAM"]["Config"]
        .as_array()
        .map(|configs| {
            configs
                .iter()
                .any(|config| config["Gateway"].as_str() == Some(gateway))
        })
        .unwrap_or(false)
}

/// The bridge interface often picks up its address only once a container is
/// attached, so a miss here is a warning rather than a failure.
async fn check_bridge_interface(runner: &dyn CommandRunner, profile: &RuntimeProfile, gateway: &str) {
    let command = argv(&["ip", "-4", "addr", "show", profile.bridge_interface.as_str()]);
    match runner.run(&command).await {
        Ok(out) if out.success() => {
            let wanted = format!("{gateway}/");
            let holds = out
                .stdout
                .split_whitespace()
                .any(|token| token.starts_with(&wanted));
            if holds {
                tracing::info!(
                    "[Validator] Interface {} holds {}",
                    profile.bridge_interface,
                    gateway
                );
            } else {
                tracing::warn!(
                    "[Validator] Interface {} does not hold {} yet",
                    profile.bridge_interface,
                    gateway
                );
            }
        }
        Ok(out) => {
            tracing::warn!(
                "[Validator] Cannot inspect {}: {}",
                profile.bridge_interface,
                out.last_stderr_line()
            );
        }
        Err(e) => {
            tracing::warn!(
                "[Validator] Cannot inspect {}: {}",
                profile.bridge_interface,
                e
            );
        }
    }
}

/// Best-effort removal; a missing container is the normal case.
async fn remove_test_container(runner: &dyn CommandRunner) {
    match runner
        .run(&argv(&["docker", "rm", "-f", TEST_CONTAINER_NAME]))
        .await
    {
        Ok(out) if out.success() => {
            tracing::debug!("[Validator] Removed test container {}", TEST_CONTAINER_NAME);
        }
        Ok(_) => {
            tracing::debug!("[Validator] No test container to remove");
        }
        Err(e) => {
            tracing::warn!("[Validator] Failed to run docker rm: {}", e);
        }
    }
}

/// Stale user-defined networks can hold subnets the new pool overlaps.
async fn prune_stale_networks(runner: &dyn CommandRunner) {
    match runner
        .run(&argv(&["docker", "network", "prune", "-f"]))
        .await
    {
        Ok(out) if out.success() => {
            tracing::debug!("[Validator] Pruned unused networks");
        }
        Ok(out) => {
            tracing::warn!(
                "[Validator] Network prune failed: {}",
                out.last_stderr_line()
            );
        }
        Err(e) => {
            tracing::warn!("[Validator] Failed to run network prune: {}", e);
        }
    }
}

async fn probe_container_gateway(
    runner: &dyn CommandRunner,
    gateway: &str,
    timeouts: &Timeouts,
) -> Result<(), SetupError> {
    let mut run_command = argv(&["docker", "run", "-d", "--name", TEST_CONTAINER_NAME, TEST_IMAGE]);
    run_command.extend(TEST_COMMAND.iter().map(|part| part.to_string()));

    let out = runner
        .run(&run_command)
        .await
        .map_err(|e| SetupError::Validation(format!("test container failed to start: {e}")))?;
    if !out.success() {
        return Err(SetupError::Validation(format!(
            "test container failed to start (exit {}): {}",
            out.exit_code,
            out.last_stderr_line()
        )));
    }

    let ps = runner
        .run(&argv(&[
            "docker",
            "ps",
            "--filter",
            &format!("name={TEST_CONTAINER_NAME}"),
            "--format",
            "{{.Names}}",
        ]))
        .await
        .map_err(|e| SetupError::Validation(format!("docker ps failed to run: {e}")))?;
    let running = ps
        .stdout
        .lines()
        .any(|line| line.trim() == TEST_CONTAINER_NAME);
    if !running {
        return Err(SetupError::Validation(format!(
            "test container {TEST_CONTAINER_NAME} is not running"
        )));
    }

    let observed = wait_for_gateway(runner, timeouts).await?;
    if observed != gateway {
        return Err(SetupError::Validation(format!(
            "gateway mismatch: expected {gateway}, container sees {observed}"
        )));
    }

    tracing::info!("[Validator] Container default gateway is {}", observed);
    Ok(())
}

/// Poll the container's routing table until a default route shows up.
async fn wait_for_gateway(
    runner: &dyn CommandRunner,
    timeouts: &Timeouts,
) -> Result<String, SetupError> {
    let start = Instant::now();

    loop {
        if start.elapsed() > timeouts.probe() {
            return Err(SetupError::Validation(format!(
                "no default route in test container after {:?}",
                timeouts.probe()
            )));
        }

        let probe = runner
            .run(&argv(&[
                "docker",
                "exec",
                TEST_CONTAINER_NAME,
                "ip",
                "route",
                "show",
                "default",
            ]))
            .await;
        if let Ok(out) = probe {
            if out.success() {
                if let Some(found) = parse_default_gateway(&out.stdout) {
                    return Ok(found);
                }
            }
        }

        tracing::debug!(
            "[Validator] Default route not visible yet ({:?} elapsed)",
            start.elapsed()
        );
        sleep(timeouts.probe_poll()).await;
    }
}

/// Parse "default via 10.20.1.1 dev eth0" into the gateway address.
fn parse_default_gateway(stdout: &str) -> Option<String> {
    for line in stdout.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 3 && parts[0] == "default" && parts[1] == "via" {
            return Some(parts[2].to_string());
        }
    }
    None
}
