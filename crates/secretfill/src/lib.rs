//! secretfill renders a configuration file from AWS Secrets Manager secrets.
//!
//! A run selects secrets by tag (or exact name), merges their JSON members
//! into one flat context, and renders a `{{.Key}}` template into the output
//! file:
//!
//! 1. [`config`] layers flags, environment variables and `config.yaml`
//! 2. [`pipeline`] discovers, resolves and renders under one deadline
//! 3. [`cli::render_error`] reports the failing stage

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod tracing;

pub use cli::{Cli, CliError, EXIT_FAILURE, EXIT_OK};
pub use config::{Config, PartialConfig};
