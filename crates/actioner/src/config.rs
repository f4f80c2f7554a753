//! Service configuration: YAML file plus command-line/environment overrides.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::rules::Rule;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Listener settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Prometheus listener settings
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Remediation rules, evaluated in order
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Listener settings.
///
/// An empty host disables that address family.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    /// IPv4 bind address
    pub ipv4_host: String,
    /// IPv6 bind address
    pub ipv6_host: String,
    /// Port shared by both listeners
    pub port: u16,
    /// How long in-flight requests may run after shutdown starts
    pub shutdown_grace_period_secs: u64,
    /// Largest accepted webhook body
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            ipv4_host: "0.0.0.0".to_string(),
            ipv6_host: "::".to_string(),
            port: 8080,
            shutdown_grace_period_secs: 5,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl HttpConfig {
    /// Grace period as a [`Duration`].
    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period_secs)
    }
}

/// Prometheus listener settings. Both hosts empty disables the listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsConfig {
    /// IPv4 bind address
    pub ipv4_host: String,
    /// IPv6 bind address
    pub ipv6_host: String,
    /// Port shared by both listeners
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            ipv4_host: "0.0.0.0".to_string(),
            ipv6_host: "::".to_string(),
            port: 9000,
        }
    }
}

impl MetricsConfig {
    /// Whether any listener is configured.
    pub fn enabled(&self) -> bool {
        !self.ipv4_host.is_empty() || !self.ipv6_host.is_empty()
    }
}

/// Values from flags or environment that win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--ipv4-host` / `HTTP_IPV4_HOST`
    pub ipv4_host: Option<String>,
    /// `--ipv6-host` / `HTTP_IPV6_HOST`
    pub ipv6_host: Option<String>,
    /// `--port` / `HTTP_PORT`
    pub port: Option<u16>,
    /// `--metrics-ipv4-host` / `METRICS_IPV4_HOST`
    pub metrics_ipv4_host: Option<String>,
    /// `--metrics-ipv6-host` / `METRICS_IPV6_HOST`
    pub metrics_ipv6_host: Option<String>,
    /// `--metrics-port` / `METRICS_PORT`
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Parse a YAML document.
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse config YAML")
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text)
    }

    /// Build the effective configuration: defaults, then the file if any,
    /// then overrides. The result is validated.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply flag and environment overrides.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.ipv4_host {
            self.http.ipv4_host = host;
        }
        if let Some(host) = overrides.ipv6_host {
            self.http.ipv6_host = host;
        }
        if let Some(port) = overrides.port {
            self.http.port = port;
        }
        if let Some(host) = overrides.metrics_ipv4_host {
            self.metrics.ipv4_host = host;
        }
        if let Some(host) = overrides.metrics_ipv6_host {
            self.metrics.ipv6_host = host;
        }
        if let Some(port) = overrides.metrics_port {
            self.metrics.port = port;
        }
    }

    /// Reject configurations the service cannot run with.
    ///
    /// Rule action names are not checked against the registry here.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.http.port == 0 {
            bail!("http.port must be non-zero");
        }
        if self.http.ipv4_host.is_empty() && self.http.ipv6_host.is_empty() {
            bail!("at least one of http.ipv4Host or http.ipv6Host must be set");
        }
        if self.http.max_body_bytes == 0 {
            bail!("http.maxBodyBytes must be non-zero");
        }
        if self.metrics.enabled() {
            if self.metrics.port == 0 {
                bail!("metrics.port must be non-zero");
            }
            if self.metrics.port == self.http.port {
                bail!("metrics.port must differ from http.port");
            }
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.action.trim().is_empty() {
                bail!("rules[{index}] must name an action");
            }
        }
        Ok(())
    }
}
