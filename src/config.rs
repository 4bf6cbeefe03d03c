//! Configuration management for herakles-jvm-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use herakles_jvm_exporter::{
    ConsulDiscovery, DiscoveredInstance, Discovery, EurekaDiscovery, SamplerOptions,
    StaticDiscovery, SweepOptions,
};
use herakles_jvm_exporter::sampler::{DEFAULT_AGENT_PATH, DEFAULT_CONNECTOR_PREFIX};
use herakles_jvm_exporter::sweep::DEFAULT_MAX_CONCURRENT_SAMPLES;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_INITIAL_DELAY_SECONDS: u64 = 5;
pub const DEFAULT_PERIOD_SECONDS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_BASELINE_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_BACKEND: &str = "static";

const DEFAULT_LOCATIONS: [&str; 6] = [
    "/etc/herakles/jvm-exporter.yaml",
    "/etc/herakles/jvm-exporter.yml",
    "/etc/herakles/jvm-exporter.json",
    "./herakles-jvm-exporter.yaml",
    "./herakles-jvm-exporter.yml",
    "./herakles-jvm-exporter.json",
];

/// Discovery backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// "static" | "consul" | "eureka"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Consul agent base URL, e.g. `http://127.0.0.1:8500`
    #[serde(alias = "consul-url")]
    pub consul_url: Option<String>,

    /// Eureka base URL including the `/eureka` path
    #[serde(alias = "eureka-url")]
    pub eureka_url: Option<String>,

    /// Consul only: list instances with passing health checks only
    #[serde(alias = "passing-only")]
    pub passing_only: Option<bool>,

    /// Static backend: service name -> instances
    #[serde(default, alias = "static-services")]
    pub static_services: BTreeMap<String, Vec<DiscoveredInstance>>,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            consul_url: None,
            eureka_url: None,
            passing_only: Some(true),
            static_services: BTreeMap::new(),
        }
    }
}

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // Sweep scheduling
    #[serde(alias = "ignore-services")]
    pub ignore_services: Option<Vec<String>>,
    #[serde(alias = "initial-delay-seconds")]
    pub initial_delay_seconds: Option<u64>,
    #[serde(alias = "period-seconds")]
    pub period_seconds: Option<u64>,
    #[serde(alias = "max-concurrent-samples")]
    pub max_concurrent_samples: Option<usize>,
    /// 0 disables eviction
    #[serde(alias = "baseline-ttl-seconds")]
    pub baseline_ttl_seconds: Option<u64>,

    // Remote reads
    #[serde(alias = "request-timeout-seconds")]
    pub request_timeout_seconds: Option<u64>,
    #[serde(alias = "jolokia-path")]
    pub jolokia_path: Option<String>,
    #[serde(alias = "connector-prefix")]
    pub connector_prefix: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    // Discovery (kept last: TOML tables must follow plain values)
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some("info".into()),
            ignore_services: Some(Vec::new()),
            initial_delay_seconds: Some(DEFAULT_INITIAL_DELAY_SECONDS),
            period_seconds: Some(DEFAULT_PERIOD_SECONDS),
            max_concurrent_samples: Some(DEFAULT_MAX_CONCURRENT_SAMPLES),
            baseline_ttl_seconds: Some(DEFAULT_BASELINE_TTL_SECONDS),
            request_timeout_seconds: Some(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            jolokia_path: Some(DEFAULT_AGENT_PATH.to_string()),
            connector_prefix: Some(DEFAULT_CONNECTOR_PREFIX.to_string()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Config {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(
            self.initial_delay_seconds
                .unwrap_or(DEFAULT_INITIAL_DELAY_SECONDS),
        )
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds.unwrap_or(DEFAULT_PERIOD_SECONDS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        )
    }

    /// `None` when eviction is disabled.
    pub fn baseline_ttl(&self) -> Option<Duration> {
        match self
            .baseline_ttl_seconds
            .unwrap_or(DEFAULT_BASELINE_TTL_SECONDS)
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            ignore_services: self.ignore_services.clone().unwrap_or_default(),
            max_concurrent_samples: self
                .max_concurrent_samples
                .unwrap_or(DEFAULT_MAX_CONCURRENT_SAMPLES),
            baseline_ttl: self.baseline_ttl(),
        }
    }

    pub fn sampler_options(&self) -> SamplerOptions {
        SamplerOptions {
            agent_path: self
                .jolokia_path
                .clone()
                .unwrap_or_else(|| DEFAULT_AGENT_PATH.to_string()),
            connector_prefix: self
                .connector_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_CONNECTOR_PREFIX.to_string()),
        }
    }

    /// Builds the configured discovery backend. Call after validation.
    pub fn build_discovery(&self) -> Result<Arc<dyn Discovery>, Box<dyn std::error::Error>> {
        let discovery = &self.discovery;
        let timeout = self.request_timeout();

        let backend: Arc<dyn Discovery> = match discovery.backend.as_str() {
            "static" => Arc::new(StaticDiscovery::new(discovery.static_services.clone())),
            "consul" => {
                let url = discovery
                    .consul_url
                    .as_deref()
                    .ok_or("discovery.consul_url is not set")?;
                Arc::new(ConsulDiscovery::new(
                    url,
                    discovery.passing_only.unwrap_or(true),
                    timeout,
                )?)
            }
            "eureka" => {
                let url = discovery
                    .eureka_url
                    .as_deref()
                    .ok_or("discovery.eureka_url is not set")?;
                Arc::new(EurekaDiscovery::new(url, timeout)?)
            }
            other => return Err(format!("Unknown discovery backend '{}'", other).into()),
        };
        Ok(backend)
    }
}

fn validate_url(field: &str, value: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    match value {
        None => Err(format!("{} is not set", field).into()),
        Some(raw) => match Url::parse(raw) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
            Ok(url) => Err(format!("{} has unsupported scheme '{}'", field, url.scheme()).into()),
            Err(e) => Err(format!("{} is not a valid URL: {} ({})", field, raw, e).into()),
        },
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.period_seconds == Some(0) {
        return Err("period_seconds must be greater than 0".into());
    }
    if cfg.max_concurrent_samples == Some(0) {
        return Err("max_concurrent_samples must be greater than 0".into());
    }
    if cfg.request_timeout_seconds == Some(0) {
        return Err("request_timeout_seconds must be greater than 0".into());
    }
    // Baselines are evicted right after dispatch, before the new samplers record
    if let Some(ttl) = cfg.baseline_ttl() {
        if ttl < cfg.period() * 2 {
            return Err(format!(
                "baseline_ttl_seconds ({}) must be 0 or at least twice period_seconds ({})",
                ttl.as_secs(),
                cfg.period().as_secs()
            )
            .into());
        }
    }

    if let Some(path) = cfg.jolokia_path.as_deref() {
        if !path.starts_with('/') {
            return Err(format!("jolokia_path must start with '/': {}", path).into());
        }
    }
    if cfg.connector_prefix.as_deref().is_some_and(str::is_empty) {
        return Err("connector_prefix must not be empty".into());
    }

    // Discovery validation
    let discovery = &cfg.discovery;
    match discovery.backend.as_str() {
        "static" => {
            if discovery.static_services.is_empty() {
                return Err(
                    "discovery backend is 'static' but discovery.static_services is empty".into(),
                );
            }
            for (service, instances) in &discovery.static_services {
                if let Some(bad) = instances.iter().find(|i| i.host.trim().is_empty()) {
                    return Err(format!(
                        "static service '{}' has an instance without host (port {})",
                        service, bad.port
                    )
                    .into());
                }
            }
        }
        "consul" => validate_url("discovery.consul_url", discovery.consul_url.as_deref())?,
        "eureka" => validate_url("discovery.eureka_url", discovery.eureka_url.as_deref())?,
        other => {
            return Err(format!(
                "Invalid discovery backend '{}', expected 'static', 'consul' or 'eureka'",
                other
            )
            .into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_tls_file("certificate", cert)?;
                check_tls_file("private key", key)?;
            }
        }
    }

    Ok(())
}

fn check_tls_file(kind: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(Path::new(path)) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", kind, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", kind, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", kind, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Server
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    // Discovery
    if let Some(backend) = args.discovery {
        config.discovery.backend = backend.as_str().to_string();
    }
    if let Some(url) = &args.consul_url {
        config.discovery.consul_url = Some(url.clone());
    }
    if let Some(url) = &args.eureka_url {
        config.discovery.eureka_url = Some(url.clone());
    }

    // Parse comma-separated ignore list
    if let Some(ignore_str) = &args.ignore_services {
        config.ignore_services = Some(
            ignore_str
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }

    // Scheduling and remote reads
    if let Some(secs) = args.initial_delay {
        config.initial_delay_seconds = Some(secs);
    }
    if let Some(secs) = args.period {
        config.period_seconds = Some(secs);
    }
    if let Some(n) = args.max_concurrent_samples {
        config.max_concurrent_samples = Some(n);
    }
    if let Some(secs) = args.request_timeout {
        config.request_timeout_seconds = Some(secs);
    }
    if let Some(path) = &args.jolokia_path {
        config.jolokia_path = Some(path.clone());
    }
    if let Some(prefix) = &args.connector_prefix {
        config.connector_prefix = Some(prefix.clone());
    }
    if let Some(secs) = args.baseline_ttl {
        config.baseline_ttl_seconds = Some(secs);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Finds the config file to load: the explicit path, else the first default
/// location that exists.
pub fn locate_config(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(p) => Some(p.to_path_buf()),
        None => DEFAULT_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists()),
    }
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let Some(path) = locate_config(path) else {
        return Ok(Config::default());
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in requested format
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
    source: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = render_config(config, format)?;

    if let Some(path) = source {
        println!("User configuration loaded from: {}", path.display());
    }
    println!("{output}");
    Ok(())
}
