//! bridgectl binary.
//!
//! One-shot setup tool: detects or installs a Docker runtime, pins the
//! default bridge to the configured subnet, restarts the daemon, and
//! validates the result. Status lines go to stdout, diagnostics to stderr.

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("bridgectl manages a Linux container runtime; this platform is unsupported.");
    std::process::exit(1);
}

#[cfg(target_os = "linux")]
fn main() {
    linux::main();
}

#[cfg(target_os = "linux")]
mod linux {
    use bridgectl::{
        detect_runtime, plan_install, validate, ConsoleReporter, Detection, HostRunner,
        InstallChannel, RuntimeProfile, SetupConfig, SetupError, SetupPipeline,
    };
    use clap::{Parser, Subcommand};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tracing_subscriber::EnvFilter;

    #[derive(Parser)]
    #[command(
        name = "bridgectl",
        version,
        about = "Pin a Docker installation's default bridge to a deterministic subnet"
    )]
    struct Cli {
        /// Path to a TOML config file.
        #[arg(long, global = true)]
        config: Option<PathBuf>,

        /// Bridge IP in CIDR form, e.g. 10.20.1.1/24.
        #[arg(long, global = true)]
        bip: Option<String>,

        /// Address pool base CIDR, e.g. 10.20.0.0/16.
        #[arg(long = "pool-base", global = true)]
        pool_base: Option<String>,

        /// Per-network subnet size carved from the pool.
        #[arg(long = "pool-size", global = true)]
        pool_size: Option<u32>,

        /// Install channel when no runtime is present: native or snap.
        #[arg(long, global = true)]
        channel: Option<String>,

        #[command(subcommand)]
        command: Option<Command>,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Run the full setup pipeline (default).
        Apply,
        /// Print what apply would do without changing the host.
        Plan,
        /// Report which runtime packaging is present on this host.
        Detect,
        /// Re-run bridge validation against the current daemon.
        Validate,
    }

    pub fn main() {
        let cli = Cli::parse();

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();

        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("[Main] Failed to create async runtime: {}", e);
                std::process::exit(1);
            }
        };

        if let Err(e) = rt.block_on(run(cli)) {
            tracing::error!("[Main] {}", e);
            std::process::exit(1);
        }
    }

    async fn run(cli: Cli) -> Result<(), SetupError> {
        let mut config = SetupConfig::load(cli.config.as_deref())?;
        apply_overrides(&mut config, &cli)?;
        config.validate()?;

        match cli.command.unwrap_or(Command::Apply) {
            Command::Apply => apply(config).await,
            Command::Plan => plan(config).await,
            Command::Detect => detect().await,
            Command::Validate => validate_host(config).await,
        }
    }

    async fn apply(config: SetupConfig) -> Result<(), SetupError> {
        require_root()?;
        tracing::info!("[Main] bridgectl {} starting", env!("CARGO_PKG_VERSION"));

        let pipeline =
            SetupPipeline::new(Arc::new(HostRunner), Arc::new(ConsoleReporter), config);
        let report = pipeline.run().await?;

        tracing::info!(
            "[Main] Setup finished in {:?} ({} stages, {} runtime)",
            report.total(),
            report.stages.len(),
            report.profile.kind.as_str()
        );
        Ok(())
    }

    async fn plan(config: SetupConfig) -> Result<(), SetupError> {
        let runner = HostRunner;
        match detect_runtime(&runner).await? {
            Detection::Installed(profile) => {
                println!(
                    "Runtime already installed ({}); no install needed.",
                    profile.kind.as_str()
                );
                print_reconcile_plan(&profile.config_path, &config);
            }
            Detection::Absent => {
                let channel = config.install.channel;
                println!("No runtime detected. Install plan ({} channel):", channel.as_str());
                for (index, step) in plan_install(channel).iter().enumerate() {
                    println!("  {}. {}: {}", index + 1, step.name, step.command.join(" "));
                }
                let default_path = RuntimeProfile::for_kind(channel.kind()).config_path;
                print_reconcile_plan(&default_path, &config);
            }
        }
        Ok(())
    }

    fn print_reconcile_plan(default_path: &Path, config: &SetupConfig) {
        let path = config
            .daemon
            .config_path
            .clone()
            .unwrap_or_else(|| default_path.to_path_buf());
        println!("Daemon config target: {}", path.display());
        println!("  log-level             error");
        println!("  bip                   {}", config.bridge.bip);
        println!(
            "  default-address-pools [{{ base = {}, size = {} }}]",
            config.bridge.pool_base, config.bridge.pool_size
        );
    }

    async fn detect() -> Result<(), SetupError> {
        let runner = HostRunner;
        match detect_runtime(&runner).await? {
            Detection::Installed(profile) => {
                println!("Runtime:         {}", profile.kind.as_str());
                println!("Daemon config:   {}", profile.config_path.display());
                println!("Restart command: {}", profile.restart_command.join(" "));
                println!("Status command:  {}", profile.status_command.join(" "));
            }
            Detection::Absent => {
                println!("No container runtime detected.");
            }
        }
        Ok(())
    }

    async fn validate_host(config: SetupConfig) -> Result<(), SetupError> {
        require_root()?;
        let runner = HostRunner;
        let profile = match detect_runtime(&runner).await? {
            Detection::Installed(profile) => profile,
            Detection::Absent => {
                return Err(SetupError::Validation(
                    "no container runtime installed".to_string(),
                ));
            }
        };

        validate(&runner, &profile, &config.bridge, &config.timeouts).await?;
        println!("Bridge validated (gateway {}).", config.bridge.bip_host()?);
        Ok(())
    }

    fn apply_overrides(config: &mut SetupConfig, cli: &Cli) -> Result<(), SetupError> {
        if let Some(bip) = &cli.bip {
            config.bridge.bip = bip.clone();
        }
        if let Some(base) = &cli.pool_base {
            config.bridge.pool_base = base.clone();
        }
        if let Some(size) = cli.pool_size {
            config.bridge.pool_size = size;
        }
        if let Some(channel) = &cli.channel {
            config.install.channel = match channel.as_str() {
                "native" => InstallChannel::Native,
                "snap" => InstallChannel::Snap,
                other => {
                    return Err(SetupError::Config(format!(
                        "unknown install channel '{other}', expected native or snap"
                    )));
                }
            };
        }
        Ok(())
    }

    fn require_root() -> Result<(), SetupError> {
        let uid = nix::unistd::Uid::current();
        if !uid.is_root() {
            return Err(SetupError::Privilege(uid.as_raw()));
        }
        Ok(())
    }
}
