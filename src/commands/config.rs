//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use herakles_jvm_exporter::DiscoveredInstance;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Default configuration with one example static service, so the generated
/// file passes validation as written.
fn example_config() -> Config {
    let mut config = Config::default();
    config.discovery.static_services.insert(
        "example-service".to_string(),
        vec![DiscoveredInstance::new("127.0.0.1", 8080)],
    );
    config
}

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = example_config();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-jvm-exporter.yaml"),
    };

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles JVM Exporter Configuration
# ===================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
# enable_telemetry: true       # Enable herakles_jvm_exporter_* metrics
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# Sweep Scheduling
# ----------------
# ignore_services: []          # Services never sampled (e.g. ["consul"])
# initial_delay_seconds: 5     # Delay before the first sweep
# period_seconds: 30           # Seconds between sweeps
# max_concurrent_samples: 64   # Samplers running at the same time
# baseline_ttl_seconds: 3600   # Forget idle counter baselines (0 = never, else >= 2x period)
#
# Remote Reads
# ------------
# request_timeout_seconds: 10  # Timeout for discovery and Jolokia requests
# jolokia_path: "/jolokia"     # Agent path below each instance URI
# connector_prefix: "http-nio" # Tomcat connector name is <prefix>-<port>
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
#
# Discovery
# ---------
# discovery:
#   backend: static            # static, consul or eureka
#   consul_url: null           # e.g. http://127.0.0.1:8500
#   eureka_url: null           # e.g. http://eureka:8761/eureka
#   passing_only: true         # Consul: only instances with passing checks
#   static_services:           # Static: service name -> instances
#     orders:
#       - host: 10.0.0.1
#         port: 8080
#         uri: ""              # Optional base URL, default http://host:port
"#;

    format!("{comments}\n{yaml}")
}
