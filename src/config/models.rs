// src/config/models.rs

use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::HashSet;
use tokio::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub listen: ListenConfig,
    #[serde(default)]
    pub algorithm: LoadBalancerAlgorithm,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen_host")]
    pub host: String,
    pub port: u16,
}

/// Selection policy, picked by name in the config file. Unknown names fail
/// deserialization, which fails startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerAlgorithm {
    #[default]
    RoundRobin,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_health_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub id: u32,
    pub host: String,
    pub port: u16,
}

fn default_listen_host() -> String {
    "127.0.0.1".to_string()
}

fn default_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    2
}

fn default_health_path() -> String {
    "/".to_string()
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            path: default_health_path(),
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            bail!("No backends configured");
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.id) {
                bail!("Duplicate backend id: {}", backend.id);
            }
            if backend.host.is_empty() {
                bail!("Backend {} has an empty host", backend.id);
            }
        }

        if self.health_check.interval_secs == 0 {
            bail!("Health check interval must be at least 1 second");
        }

        Ok(())
    }
}
