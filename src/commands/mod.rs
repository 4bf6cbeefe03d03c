//! CLI command implementations for herakles-jvm-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and discovery validation
//! - `config`: Configuration file generation
//! - `test`: Foreground sweeps with metrics output

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
