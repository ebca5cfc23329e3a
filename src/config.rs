//! Tool configuration.
//!
//! Loaded from a TOML file with per-field defaults, so an empty or missing
//! file still yields a runnable setup. CLI flags override loaded values in
//! the binary before the pipeline starts.

use crate::error::SetupError;
use crate::runtime::InstallChannel;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default search locations, in order.
const CONFIG_SEARCH_PATHS: &[&str] = &["bridgectl.toml", "/etc/bridgectl/config.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupConfig {
    #[serde(default)]
    pub bridge: BridgeTarget,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub daemon: DaemonOverrides,
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Target addressing written into the daemon config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeTarget {
    /// Bridge IP in CIDR form. The host portion doubles as the default
    /// gateway containers on the bridge see.
    #[serde(default = "default_bip")]
    pub bip: String,
    /// Base CIDR of the default address pool for user-defined networks.
    #[serde(default = "default_pool_base")]
    pub pool_base: String,
    /// Subnet size carved out of the pool per network.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Install path taken when no runtime is detected on the host.
    #[serde(default)]
    pub channel: InstallChannel,
}

/// Overrides for paths the runtime profile would otherwise fix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonOverrides {
    /// Daemon config file location, for hosts with a nonstandard layout.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    /// Budget for the daemon to report active after a restart.
    #[serde(default = "default_service_secs")]
    pub service_secs: u64,
    /// Initial interval between daemon status probes.
    #[serde(default = "default_service_poll_ms")]
    pub service_poll_ms: u64,
    /// Budget for the test container to publish a default route.
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,
    /// Interval between route probes inside the test container.
    #[serde(default = "default_probe_poll_ms")]
    pub probe_poll_ms: u64,
}

fn default_bip() -> String {
    "10.20.1.1/24".to_string()
}

fn default_pool_base() -> String {
    "10.20.0.0/16".to_string()
}

fn default_pool_size() -> u32 {
    24
}

fn default_service_secs() -> u64 {
    90
}

fn default_service_poll_ms() -> u64 {
    1000
}

fn default_probe_secs() -> u64 {
    15
}

fn default_probe_poll_ms() -> u64 {
    500
}

impl Default for BridgeTarget {
    fn default() -> Self {
        Self {
            bip: default_bip(),
            pool_base: default_pool_base(),
            pool_size: default_pool_size(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            service_secs: default_service_secs(),
            service_poll_ms: default_service_poll_ms(),
            probe_secs: default_probe_secs(),
            probe_poll_ms: default_probe_poll_ms(),
        }
    }
}

impl SetupConfig {
    /// Load configuration from `explicit` when given, otherwise from the
    /// first existing search path. A file that exists but cannot be read or
    /// parsed is an error; defaults apply only when no file is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SetupError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        for candidate in CONFIG_SEARCH_PATHS {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_file(path);
            }
        }

        tracing::info!("[Config] Using default configuration");
        Ok(Self::default())
    }

    fn load_file(path: &Path) -> Result<Self, SetupError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SetupError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SetupError::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        tracing::info!("[Config] Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        self.bridge.validate()
    }
}

impl BridgeTarget {
    /// Host portion of the BIP, e.g. "10.20.1.1" from "10.20.1.1/24".
    pub fn bip_host(&self) -> Result<&str, SetupError> {
        self.bip
            .split('/')
            .next()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| SetupError::Config(format!("bridge.bip '{}' has no host part", self.bip)))
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        parse_ipv4_cidr(&self.bip, "bridge.bip")?;
        let (_, base_prefix) = parse_ipv4_cidr(&self.pool_base, "bridge.pool_base")?;
        if self.pool_size < base_prefix || self.pool_size > 32 {
            return Err(SetupError::Config(format!(
                "bridge.pool_size {} must be between the pool prefix {} and 32",
                self.pool_size, base_prefix
            )));
        }
        Ok(())
    }
}

impl Timeouts {
    pub fn service(&self) -> Duration {
        Duration::from_secs(self.service_secs)
    }

    pub fn service_poll(&self) -> Duration {
        Duration::from_millis(self.service_poll_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn probe_poll(&self) -> Duration {
        Duration::from_millis(self.probe_poll_ms)
    }
}

fn parse_ipv4_cidr(value: &str, field: &str) -> Result<(Ipv4Addr, u32), SetupError> {
    let (host, prefix) = value
        .split_once('/')
        .ok_or_else(|| SetupError::Config(format!("{field} '{value}' is not in CIDR form")))?;
    let addr: Ipv4Addr = host
        .parse()
        .map_err(|_| SetupError::Config(format!("{field} '{value}' has an invalid address")))?;
    let prefix: u32 = prefix
        .parse()
        .map_err(|_| SetupError::Config(format!("{field} '{value}' has an invalid prefix")))?;
    if prefix == 0 || prefix > 32 {
        return Err(SetupError::Config(format!(
            "{field} '{value}' prefix must be between 1 and 32"
        )));
    }
    Ok((addr, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SetupConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bridge.bip, "10.20.1.1/24");
        assert_eq!(config.bridge.pool_base, "10.20.0.0/16");
        assert_eq!(config.bridge.pool_size, 24);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: SetupConfig = toml::from_str("").unwrap();
        assert_eq!(config.bridge.bip, "10.20.1.1/24");
        assert_eq!(config.timeouts.service_secs, 90);
        assert!(config.daemon.config_path.is_none());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: SetupConfig = toml::from_str(
            r#"
            [bridge]
            bip = "172.30.0.1/16"

            [install]
            channel = "snap"
            "#,
        )
        .unwrap();
        assert_eq!(config.bridge.bip, "172.30.0.1/16");
        assert_eq!(config.bridge.pool_base, "10.20.0.0/16");
        assert_eq!(config.install.channel, InstallChannel::Snap);
    }

    #[test]
    fn bip_host_strips_prefix() {
        let target = BridgeTarget::default();
        assert_eq!(target.bip_host().unwrap(), "10.20.1.1");
    }

    #[test]
    fn rejects_bip_without_prefix() {
        let target = BridgeTarget {
            bip: "10.20.1.1".to_string(),
            ..Default::default()
        };
        assert!(matches!(target.validate(), Err(SetupError::Config(_))));
    }

    #[test]
    fn rejects_malformed_address() {
        let target = BridgeTarget {
            bip: "10.20.300.1/24".to_string(),
            ..Default::default()
        };
        assert!(matches!(target.validate(), Err(SetupError::Config(_))));
    }

    #[test]
    fn rejects_pool_size_wider_than_pool() {
        let target = BridgeTarget {
            pool_size: 8,
            ..Default::default()
        };
        let err = target.validate().unwrap_err();
        assert!(err.to_string().contains("pool_size"));
    }

    #[test]
    fn found_file_with_bad_toml_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bridgectl.toml");
        std::fs::write(&path, "[bridge]\nbip = \"unterminated").unwrap();

        let err = SetupConfig::load_file(&path).unwrap_err();
        let SetupError::Config(message) = err else {
            panic!("expected a config error");
        };
        assert!(message.contains("cannot parse"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let err = SetupConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, SetupError::Config(_)));
    }

    #[test]
    fn explicit_valid_file_loads() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bridgectl.toml");
        std::fs::write(&path, "[bridge]\nbip = \"192.168.9.1/24\"\n").unwrap();

        let config = SetupConfig::load(Some(&path)).unwrap();
        assert_eq!(config.bridge.bip, "192.168.9.1/24");
    }
}
