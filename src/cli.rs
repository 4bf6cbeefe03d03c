//! CLI arguments and subcommands for herakles-jvm-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Discovery backend selectable on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Backend {
    Static,
    Consul,
    Eureka,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Static => "static",
            Backend::Consul => "consul",
            Backend::Eureka => "eureka",
        }
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-jvm-exporter",
    about = "Prometheus exporter for JVM memory and Tomcat connector metrics",
    long_about = "Prometheus exporter for JVM memory and Tomcat connector metrics.\n\n\
                  Discovers JVM web services through Consul, Eureka or a static list, reads \
                  heap, non-heap and Tomcat thread pool and request statistics from every \
                  instance through Jolokia, and exports them per service and host.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "More info: https://www.herakles.now - Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Print only the loaded user config file + full path and exit
    #[arg(long)]
    pub show_user_config: bool,

    /// Output format for --show-config*
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Disable internal herakles_jvm_exporter_* metrics
    #[arg(long)]
    pub disable_telemetry: bool,

    /// Discovery backend
    #[arg(long, value_enum)]
    pub discovery: Option<Backend>,

    /// Consul agent base URL (e.g. http://127.0.0.1:8500)
    #[arg(long)]
    pub consul_url: Option<String>,

    /// Eureka base URL including the /eureka path
    #[arg(long)]
    pub eureka_url: Option<String>,

    /// Services never sampled (comma-separated)
    #[arg(long)]
    pub ignore_services: Option<String>,

    /// Seconds to wait before the first sweep
    #[arg(long)]
    pub initial_delay: Option<u64>,

    /// Seconds between sweeps
    #[arg(long)]
    pub period: Option<u64>,

    /// Upper bound of concurrently running instance samplers
    #[arg(long)]
    pub max_concurrent_samples: Option<usize>,

    /// Timeout in seconds for every discovery and Jolokia request
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Path of the Jolokia agent below each instance URI
    #[arg(long)]
    pub jolokia_path: Option<String>,

    /// Tomcat connector name prefix (connector name is <prefix>-<port>)
    #[arg(long)]
    pub connector_prefix: Option<String>,

    /// Evict counter baselines idle for N seconds (0 = never, otherwise at least twice --period)
    #[arg(long)]
    pub baseline_ttl: Option<u64>,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and discovery reachability
    Check {
        /// Query the discovery backend once and print the topology
        #[arg(long)]
        discovery: bool,

        /// Run all checks
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run sweeps in the foreground and print the resulting metrics
    Test {
        /// Number of sweeps
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print every sampled series, not only the summary
        #[arg(long)]
        verbose: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides_and_subcommand() {
        let args = Args::try_parse_from([
            "herakles-jvm-exporter",
            "--discovery",
            "consul",
            "--consul-url",
            "http://consul:8500",
            "--period",
            "15",
            "test",
            "-n",
            "3",
        ])
        .unwrap();

        assert!(matches!(args.discovery, Some(Backend::Consul)));
        assert_eq!(args.consul_url.as_deref(), Some("http://consul:8500"));
        assert_eq!(args.period, Some(15));
        assert!(matches!(
            args.command,
            Some(Commands::Test {
                iterations: 3,
                verbose: false
            })
        ));
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["herakles-jvm-exporter"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.port.is_none());
        assert!(!args.enable_tls);
        assert!(matches!(args.config_format, ConfigFormat::Yaml));
    }
}
