//! Linear setup pipeline.
//!
//! detect, install, reconcile, restart, verify, validate. Control flow is
//! strictly linear and fail-fast: the first stage error aborts the run, and
//! an abort never rolls back the reconciled config.

use crate::config::SetupConfig;
use crate::daemon::{reconcile, restart_daemon, wait_active};
use crate::error::SetupError;
use crate::exec::CommandRunner;
use crate::progress::ProgressReporter;
use crate::runtime::{detect_runtime, install_runtime, Detection, RuntimeProfile};
use crate::validate::validate;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PCT_DETECT: u32 = 10;
const PCT_INSTALL: u32 = 30;
const PCT_RECONCILE: u32 = 50;
const PCT_RESTART: u32 = 65;
const PCT_VERIFY: u32 = 80;
const PCT_VALIDATE: u32 = 95;
const PCT_DONE: u32 = 100;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detect,
    Install,
    Reconcile,
    Restart,
    Verify,
    Validate,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Detect => "detect runtime",
            Stage::Install => "install runtime",
            Stage::Reconcile => "write daemon config",
            Stage::Restart => "restart daemon",
            Stage::Verify => "verify daemon active",
            Stage::Validate => "validate bridge network",
        }
    }
}

/// Where a run ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    NotStarted,
    Installed,
    ConfigWritten,
    Restarting,
    Verified,
    Validated,
    Done,
    Aborted(Stage),
}

/// One completed stage with its wall time.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: Stage,
    pub duration: Duration,
}

/// Final report of a successful pipeline run.
#[derive(Debug)]
pub struct SetupReport {
    pub state: SetupState,
    pub stages: Vec<StageOutcome>,
    pub profile: RuntimeProfile,
}

impl SetupReport {
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|outcome| outcome.duration).sum()
    }
}

/// Drives the full setup against a command runner and progress sink.
pub struct SetupPipeline {
    runner: Arc<dyn CommandRunner>,
    reporter: Arc<dyn ProgressReporter>,
    config: SetupConfig,
}

impl SetupPipeline {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        reporter: Arc<dyn ProgressReporter>,
        config: SetupConfig,
    ) -> Self {
        Self {
            runner,
            reporter,
            config,
        }
    }

    /// Run every stage in order, stopping at the first failure.
    pub async fn run(&self) -> Result<SetupReport, SetupError> {
        let mut state = SetupState::NotStarted;
        let mut stages = Vec::new();
        tracing::info!("[Pipeline] State: {:?}", state);

        self.config
            .validate()
            .map_err(|e| self.abort(Stage::Detect, e))?;

        // Detect
        let started = Instant::now();
        let detection = detect_runtime(self.runner.as_ref())
            .await
            .map_err(|e| self.abort(Stage::Detect, e))?;
        record(&mut stages, Stage::Detect, started);

        // Install, unless detection already found a runtime
        let profile = match detection {
            Detection::Installed(profile) => {
                self.reporter.emit(
                    PCT_DETECT,
                    format!("Runtime already installed ({})", profile.kind.as_str()),
                );
                profile
            }
            Detection::Absent => {
                let channel = self.config.install.channel;
                self.reporter.emit(
                    PCT_DETECT,
                    format!("No runtime detected, installing via {} channel", channel.as_str()),
                );

                let started = Instant::now();
                let profile = install_runtime(self.runner.as_ref(), channel)
                    .await
                    .map_err(|e| self.abort(Stage::Install, e))?;
                record(&mut stages, Stage::Install, started);
                self.reporter.emit(
                    PCT_INSTALL,
                    format!("Runtime installed via {} channel", channel.as_str()),
                );
                profile
            }
        };
        state = SetupState::Installed;
        tracing::info!("[Pipeline] State: {:?}", state);

        // Reconcile
        let config_path = self
            .config
            .daemon
            .config_path
            .clone()
            .unwrap_or_else(|| profile.config_path.clone());
        let started = Instant::now();
        let outcome = reconcile(&config_path, &self.config.bridge)
            .map_err(|e| self.abort(Stage::Reconcile, e))?;
        record(&mut stages, Stage::Reconcile, started);
        state = SetupState::ConfigWritten;
        tracing::info!("[Pipeline] State: {:?}", state);
        self.reporter.emit(
            PCT_RECONCILE,
            match &outcome.backup_path {
                Some(backup) => format!(
                    "Daemon config updated: {} (backup {})",
                    outcome.path.display(),
                    backup.display()
                ),
                None => format!("Daemon config created: {}", outcome.path.display()),
            },
        );

        // Restart
        let started = Instant::now();
        restart_daemon(self.runner.as_ref(), &profile)
            .await
            .map_err(|e| self.abort(Stage::Restart, e))?;
        record(&mut stages, Stage::Restart, started);
        state = SetupState::Restarting;
        tracing::info!("[Pipeline] State: {:?}", state);
        self.reporter.emit(PCT_RESTART, "Daemon restart issued".to_string());

        // Verify
        let started = Instant::now();
        wait_active(
            self.runner.as_ref(),
            &profile,
            self.config.timeouts.service(),
            self.config.timeouts.service_poll(),
        )
        .await
        .map_err(|e| self.abort(Stage::Verify, e))?;
        record(&mut stages, Stage::Verify, started);
        state = SetupState::Verified;
        tracing::info!("[Pipeline] State: {:?}", state);
        self.reporter
            .emit(PCT_VERIFY, "Daemon is active".to_string());

        // Validate
        let started = Instant::now();
        validate(
            self.runner.as_ref(),
            &profile,
            &self.config.bridge,
            &self.config.timeouts,
        )
        .await
        .map_err(|e| self.abort(Stage::Validate, e))?;
        record(&mut stages, Stage::Validate, started);
        state = SetupState::Validated;
        tracing::info!("[Pipeline] State: {:?}", state);
        self.reporter.emit(
            PCT_VALIDATE,
            format!("Bridge validated (gateway {})", self.config.bridge.bip_host()?),
        );

        state = SetupState::Done;
        tracing::info!("[Pipeline] State: {:?}", state);
        self.reporter
            .emit(PCT_DONE, "Bridge setup complete".to_string());

        Ok(SetupReport {
            state,
            stages,
            profile,
        })
    }

    fn abort(&self, stage: Stage, err: SetupError) -> SetupError {
        self.reporter
            .emit_failure(format!("{}: {}", stage.label(), err));
        tracing::error!("[Pipeline] State: {:?}", SetupState::Aborted(stage));
        err
    }
}

fn record(stages: &mut Vec<StageOutcome>, stage: Stage, started: Instant) {
    let duration = started.elapsed();
    tracing::info!(
        "[TIMING] Stage '{}' completed in {}ms",
        stage.label(),
        duration.as_millis()
    );
    stages.push(StageOutcome { stage, duration });
}
