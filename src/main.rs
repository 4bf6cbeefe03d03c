//! herakles-jvm-exporter - version 0.1.0
//!
//! Prometheus exporter for JVM memory and Tomcat connector metrics with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod state;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use herakles_jvm_exporter::Scheduler;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::{error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_test};
use config::{
    load_config, locate_config, resolve_config, show_config, validate_effective_config, Config,
    DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use state::AppState;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };

    let Some(log_level) = log_level else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.show_user_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        if args.show_config {
            return show_config(&config, args.config_format, None);
        }

        let source = if args.no_config {
            None
        } else {
            locate_config(args.config.as_deref())
        };
        match source {
            Some(path) => {
                let user_config = load_config(Some(&path))?;
                return show_config(&user_config, args.config_format, Some(&path));
            }
            None => {
                println!("No user configuration file found, built-in defaults are in effect");
                return Ok(());
            }
        }
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            // Generating a config file must work without a valid one
            return command_config(output.clone(), *format, *commented);
        }

        setup_logging(&args);

        return match command {
            Commands::Check { discovery, all } => {
                let config = resolve_config(&args)?;
                command_check(*discovery, *all, &config).await
            }
            Commands::Test {
                iterations,
                verbose,
            } => {
                let config = load_validated_config(&args)?;
                command_test(*iterations, *verbose, &config).await
            }
            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&args);

    info!("Starting herakles-jvm-exporter");

    let bind_ip_str = config
        .bind
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);

    let state = Arc::new(AppState::new(config.clone())?);
    info!(
        backend = %config.discovery.backend,
        period_s = config.period().as_secs(),
        initial_delay_s = config.initial_delay().as_secs(),
        "Sweep pipeline initialized"
    );

    // Start the sweep scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(state.sweep.clone(), config.initial_delay(), config.period())
        .spawn(shutdown_rx);

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;
    let app = handlers::router(state.clone());

    let tls_paths = match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) if config.enable_tls.unwrap_or(false) => Some((cert, key)),
        _ => None,
    };

    let served: Result<(), Box<dyn std::error::Error>> = if let Some((cert_path, key_path)) =
        tls_paths
    {
        // TLS is enabled - use axum_server with rustls
        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "herakles-jvm-exporter listening on https://{}:{}",
            bind_ip_str, port
        );

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => result.map_err(Into::into),
            _ = shutdown_signal() => Ok(()),
        }
    } else {
        // TLS is disabled - use standard TCP listener
        let listener = TcpListener::bind(addr).await?;
        info!(
            "herakles-jvm-exporter listening on http://{}:{}",
            bind_ip_str, port
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(Into::into)
    };

    // Stop scheduling new sweeps; running samplers are abandoned with the runtime
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        error!("Sweep scheduler task failed: {}", e);
    }

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("herakles-jvm-exporter stopped gracefully");
    Ok(())
}
