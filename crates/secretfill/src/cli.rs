use crate::tracing::TracingFormat;
use clap::{Parser, ValueEnum};
use miette::{Diagnostic, Report};
use secretfill_aws::AwsClientMode;
use secretfill_template::{EscapeMode, TemplateError};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a successful render
pub const EXIT_OK: i32 = 0;
/// Exit code for any failure
pub const EXIT_FAILURE: i32 = 1;

/// CLI-specific error types, one per pipeline stage
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Missing or invalid configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(code(secretfill::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Listing matching secrets failed
    #[error("Discovery error: {message}")]
    #[diagnostic(code(secretfill::discovery))]
    Discovery {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Fetching a secret value failed
    #[error("Resolution error: {message}")]
    #[diagnostic(code(secretfill::resolution))]
    Resolution {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Reading, parsing or writing the template failed
    #[error("Render error: {message}")]
    #[diagnostic(code(secretfill::render))]
    Render {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new discovery error with help text
    #[must_use]
    pub fn discovery_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new resolution error with help text
    #[must_use]
    pub fn resolution_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new render error
    #[must_use]
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
            help: None,
        }
    }

    /// Add help text to an existing error, returning a new error with the help text set.
    #[must_use]
    pub fn with_help(self, help_text: impl Into<String>) -> Self {
        let help = Some(help_text.into());
        match self {
            Self::Config { message, .. } => Self::Config { message, help },
            Self::Discovery { message, .. } => Self::Discovery { message, help },
            Self::Resolution { message, .. } => Self::Resolution { message, help },
            Self::Render { message, .. } => Self::Render { message, help },
        }
    }

    /// Pipeline stage the error belongs to
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Discovery { .. } => "discovery",
            Self::Resolution { .. } => "resolution",
            Self::Render { .. } => "render",
        }
    }
}

impl From<TemplateError> for CliError {
    fn from(err: TemplateError) -> Self {
        let help = match &err {
            TemplateError::Parse { .. } => {
                "Actions must look like {{.Key}}, {{index . \"key\"}} or {{.Key | html}}"
            }
            TemplateError::Read { .. } => {
                "Check APPLICATION_CONFIG_FILE points at a readable UTF-8 file"
            }
            TemplateError::Write { .. } => {
                "Check the directory of APPLICATION_CONFIG_OUTFILE exists and is writable"
            }
        };
        Self::render(err.to_string()).with_help(help)
    }
}

/// Report a failure: one structured log line, plus a miette report for humans.
///
/// In JSON mode only the log line is emitted so stderr stays machine-readable.
#[allow(clippy::print_stderr)]
pub fn render_error(err: &CliError, json_mode: bool) {
    tracing::error!(stage = err.stage(), error = %err, "secretfill failed");

    if !json_mode {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// How secrets are selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    /// Secrets tagged `<tag-key>=<aws-secret-name>`
    #[default]
    Tag,
    /// Secrets named exactly `<aws-secret-name>`
    Name,
}

/// `--escape` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EscapeArg {
    /// Insert values verbatim
    Plain,
    /// HTML-escape every value
    Html,
    /// HTML-escape only for .html/.htm/.xhtml/.xml outputs
    Auto,
}

impl From<EscapeArg> for EscapeMode {
    fn from(arg: EscapeArg) -> Self {
        match arg {
            EscapeArg::Plain => Self::Plain,
            EscapeArg::Html => Self::Html,
            EscapeArg::Auto => Self::Auto,
        }
    }
}

/// `--client` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClientArg {
    /// AWS SDK with the default credential chain
    Sdk,
    /// The `aws` command-line tool
    Cli,
}

impl From<ClientArg> for AwsClientMode {
    fn from(arg: ClientArg) -> Self {
        match arg {
            ClientArg::Sdk => Self::Sdk,
            ClientArg::Cli => Self::Cli,
        }
    }
}

/// Render a configuration file from AWS Secrets Manager secrets.
///
/// Every option can also come from its environment variable or from a YAML
/// config file; flags win over the environment, which wins over the file.
#[derive(Parser, Debug, Default)]
#[command(name = "secretfill", version, about, long_about = None)]
pub struct Cli {
    /// YAML config file (defaults to ./config.yaml when present)
    #[arg(long, env = "SECRETFILL_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Tag value (or exact secret name) selecting the secrets
    #[arg(long = "aws-secret-name", env = "AWS_SECRET_NAME", value_name = "NAME")]
    pub secret_name: Option<String>,

    /// Template file to render
    #[arg(
        long = "application-config-file",
        env = "APPLICATION_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub template: Option<PathBuf>,

    /// Output file, created or truncated
    #[arg(
        long = "application-config-outfile",
        env = "APPLICATION_CONFIG_OUTFILE",
        value_name = "PATH"
    )]
    pub output: Option<PathBuf>,

    /// AWS region of the secrets
    #[arg(long = "aws-region", env = "AWS_REGION", value_name = "REGION")]
    pub region: Option<String>,

    /// Select secrets by tag or by exact name
    #[arg(long, env = "SECRET_SELECTOR", value_enum)]
    pub selector: Option<SelectorKind>,

    /// Tag key used by the tag selector
    #[arg(long = "tag-key", env = "SECRET_TAG_KEY", value_name = "KEY")]
    pub tag_key: Option<String>,

    /// Seconds allowed for discovery and all fetches together
    #[arg(long = "timeout-secs", env = "SECRET_TIMEOUT_SECS", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Escaping applied to substituted values
    #[arg(long, env = "TEMPLATE_ESCAPE", value_enum)]
    pub escape: Option<EscapeArg>,

    /// How Secrets Manager is reached
    #[arg(long, env = "AWS_CLIENT_MODE", value_enum)]
    pub client: Option<ClientArg>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", short = 'L', env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long = "log-format", env = "LOG_FORMAT", value_enum)]
    pub log_format: Option<TracingFormat>,
}
