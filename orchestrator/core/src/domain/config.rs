// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - the analysis backend endpoint and request timeout
// - network scan defaults and progress pacing
// - vulnerability enrichment source and rate limiting
// - code review defaults
// - logging

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::code_review::ReviewType;
use crate::domain::network::PortRange;

pub const API_VERSION: &str = "bastion.dev/v1";
pub const KIND: &str = "OrchestratorConfig";

/// Top-level orchestrator configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// API version (must be "bastion.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "OrchestratorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: OrchestratorConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable name of this orchestrator instance
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfigSpec {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub network: NetworkScanConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub review: ReviewConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the analysis backend (e.g. "http://localhost:5000")
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Per-request timeout. Full port scans are slow; keep this generous.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkScanConfig {
    /// Default port range ("start-end")
    #[serde(default = "default_ports")]
    pub ports: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Share of the progress bar covered by the scan steps; enrichment and
    /// completion fill the rest.
    #[serde(default = "default_progress_cap")]
    pub progress_cap_percent: u8,

    /// When set, steps advance on this tick while the scan call runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_interval_ms: Option<u64>,
}

impl Default for NetworkScanConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            chunk_size: default_chunk_size(),
            progress_cap_percent: default_progress_cap(),
            step_interval_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentSource {
    /// The backend's `/api/cve/lookup` route
    #[default]
    Backend,
    /// The NVD CVE 2.0 API directly
    Nvd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub source: EnrichmentSource,

    /// Minimum time between the starts of two consecutive lookups
    #[serde(default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,

    #[serde(default = "default_nvd_url")]
    pub nvd_url: String,

    /// NVD API key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nvd_api_key: Option<String>,

    /// Wait before the single retry after an NVD 403 throttle response
    #[serde(default = "default_throttle_retry_ms")]
    pub throttle_retry_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: EnrichmentSource::default(),
            min_spacing_ms: default_min_spacing_ms(),
            nvd_url: default_nvd_url(),
            nvd_api_key: None,
            throttle_retry_ms: default_throttle_retry_ms(),
        }
    }
}

impl EnrichmentConfig {
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }

    /// Resolve the API key, reading `env:VAR_NAME` indirections.
    pub fn resolved_nvd_api_key(&self) -> Option<String> {
        let raw = self.nvd_api_key.as_deref()?;
        match raw.strip_prefix("env:") {
            Some(var) => std::env::var(var).ok(),
            None => Some(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default)]
    pub review_type: ReviewType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "bastion".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: OrchestratorConfigSpec::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. BASTION_CONFIG_PATH environment variable
    /// 2. ./bastion-config.yaml (working directory)
    /// 3. ~/.bastion/config.yaml (user home)
    /// 4. /etc/bastion/config.yaml (system, Unix) or C:\ProgramData\Bastion\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("BASTION_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./bastion-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".bastion").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/bastion/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Bastion\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing/invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("BASTION_BACKEND_URL") {
            tracing::info!("Environment override: BASTION_BACKEND_URL={}", url);
            self.spec.backend.url = url;
        }

        if let Some(val) = lookup("BASTION_ENRICHMENT_SPACING_MS") {
            match val.trim().parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: BASTION_ENRICHMENT_SPACING_MS={}", ms);
                    self.spec.enrichment.min_spacing_ms = ms;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for BASTION_ENRICHMENT_SPACING_MS: '{}'. Expected milliseconds. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Some(key) = lookup("BASTION_NVD_API_KEY") {
            tracing::info!("Environment override: BASTION_NVD_API_KEY=<redacted>");
            self.spec.enrichment.nvd_api_key = Some(key);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let backend = &self.spec.backend;
        if !(backend.url.starts_with("http://") || backend.url.starts_with("https://")) {
            anyhow::bail!("spec.backend.url must be an http(s) URL, got '{}'", backend.url);
        }
        if backend.timeout_seconds == 0 {
            anyhow::bail!("spec.backend.timeout_seconds must be greater than zero");
        }

        let network = &self.spec.network;
        PortRange::parse(&network.ports).map_err(|e| anyhow::anyhow!("spec.network.ports: {}", e))?;
        if network.chunk_size == 0 {
            anyhow::bail!("spec.network.chunk_size must be greater than zero");
        }
        if network.progress_cap_percent > 100 {
            anyhow::bail!(
                "spec.network.progress_cap_percent must be at most 100, got {}",
                network.progress_cap_percent
            );
        }
        if network.step_interval_ms == Some(0) {
            anyhow::bail!("spec.network.step_interval_ms must be greater than zero when set");
        }

        if self.spec.enrichment.source == EnrichmentSource::Nvd && self.spec.enrichment.nvd_url.is_empty() {
            anyhow::bail!("spec.enrichment.nvd_url cannot be empty when source is 'nvd'");
        }

        let format = self.spec.observability.logging.format.as_str();
        if format != "json" && format != "text" {
            anyhow::bail!("Invalid log format: '{}'. Must be 'json' or 'text'", format);
        }

        Ok(())
    }
}

fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_seconds() -> u64 {
    600
}

fn default_ports() -> String {
    "1-65535".to_string()
}

fn default_chunk_size() -> u32 {
    2000
}

fn default_progress_cap() -> u8 {
    80
}

fn default_true() -> bool {
    true
}

fn default_min_spacing_ms() -> u64 {
    1000
}

fn default_nvd_url() -> String {
    "https://services.nvd.nist.gov/rest/json/cves/2.0".to_string()
}

fn default_throttle_retry_ms() -> u64 {
    6000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}
