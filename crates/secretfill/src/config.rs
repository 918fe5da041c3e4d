//! Layered configuration
//!
//! Flags and environment variables arrive through [`Cli`]; an optional YAML
//! file fills whatever they leave unset. [`Config`] is the validated result and
//! is never modified after [`Config::from_partial`].

use crate::cli::{Cli, CliError, SelectorKind};
use crate::tracing::{LogLevel, TracingConfig, TracingFormat};
use secretfill_aws::AwsClientMode;
use secretfill_secrets::{DEFAULT_TIMEOUT, MAX_TIMEOUT, SelectionCriterion};
use secretfill_template::EscapeMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Tag key used by the tag selector unless overridden
pub const DEFAULT_TAG_KEY: &str = "app-config";

/// One configuration layer; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PartialConfig {
    /// Tag value or exact secret name
    pub aws_secret_name: Option<String>,
    /// Template path
    pub application_config_file: Option<PathBuf>,
    /// Output path
    pub application_config_outfile: Option<PathBuf>,
    /// AWS region
    pub aws_region: Option<String>,
    /// Selection mode
    pub selector: Option<SelectorKind>,
    /// Tag key for the tag selector
    pub tag_key: Option<String>,
    /// Shared deadline in seconds
    pub timeout_secs: Option<u64>,
    /// Value escaping
    pub escape: Option<EscapeMode>,
    /// Secrets Manager client
    pub client: Option<AwsClientMode>,
    /// Log level, kept as text so unknown values can fall back with a warning
    pub log_level: Option<String>,
    /// Log format
    pub log_format: Option<TracingFormat>,
}

impl From<&Cli> for PartialConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            aws_secret_name: cli.secret_name.clone(),
            application_config_file: cli.template.clone(),
            application_config_outfile: cli.output.clone(),
            aws_region: cli.region.clone(),
            selector: cli.selector,
            tag_key: cli.tag_key.clone(),
            timeout_secs: cli.timeout_secs,
            escape: cli.escape.map(Into::into),
            client: cli.client.map(Into::into),
            log_level: cli.log_level.clone(),
            log_format: cli.log_format,
        }
    }
}

impl PartialConfig {
    /// Fill unset fields of `self` from `lower`.
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            aws_secret_name: self.aws_secret_name.or(lower.aws_secret_name),
            application_config_file: self
                .application_config_file
                .or(lower.application_config_file),
            application_config_outfile: self
                .application_config_outfile
                .or(lower.application_config_outfile),
            aws_region: self.aws_region.or(lower.aws_region),
            selector: self.selector.or(lower.selector),
            tag_key: self.tag_key.or(lower.tag_key),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
            escape: self.escape.or(lower.escape),
            client: self.client.or(lower.client),
            log_level: self.log_level.or(lower.log_level),
            log_format: self.log_format.or(lower.log_format),
        }
    }

    /// Parse a YAML layer.
    ///
    /// An empty document is an empty layer.
    ///
    /// # Errors
    /// Returns a configuration error naming `origin` if the YAML is malformed.
    pub fn from_yaml(source: &str, origin: &Path) -> Result<Self, CliError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(source).map_err(|e| {
            CliError::config_with_help(
                format!("Invalid config file '{}': {e}", origin.display()),
                "Keys are kebab-case option names, e.g. aws-region: eu-west-1",
            )
        })
    }

    /// Load the config file layer.
    ///
    /// With an explicit path the file must exist. Otherwise `config.yaml` in
    /// `dir` is used when present. Returns the path that was read, if any.
    ///
    /// # Errors
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load_file(
        explicit: Option<&Path>,
        dir: &Path,
    ) -> Result<Option<(PathBuf, Self)>, CliError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = dir.join(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    return Ok(None);
                }
                candidate
            }
        };

        let source = std::fs::read_to_string(&path).map_err(|e| {
            CliError::config(format!("Cannot read config file '{}': {e}", path.display()))
        })?;
        let layer = Self::from_yaml(&source, &path)?;
        Ok(Some((path, layer)))
    }

    /// Logging settings of this layer, with defaults applied.
    #[must_use]
    pub fn log_settings(&self) -> LogSettings {
        let (level, unrecognized) = match self.log_level.as_deref() {
            None => (LogLevel::default(), None),
            Some(raw) => raw
                .parse::<LogLevel>()
                .map_or_else(|_| (LogLevel::default(), Some(raw.to_string())), |l| (l, None)),
        };
        LogSettings {
            level,
            format: self.log_format.unwrap_or_default(),
            unrecognized_level: unrecognized,
        }
    }
}

/// Logging settings resolved from the layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Effective level
    pub level: LogLevel,
    /// Output format
    pub format: TracingFormat,
    /// Level text that was not recognized and replaced by `info`
    pub unrecognized_level: Option<String>,
}

impl LogSettings {
    /// Tracing configuration for these settings
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            format: self.format,
            level: self.level.into(),
        }
    }
}

/// Validated run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Which secrets to merge
    pub criterion: SelectionCriterion,
    /// Template to render
    pub template_path: PathBuf,
    /// File to write
    pub output_path: PathBuf,
    /// AWS region
    pub region: String,
    /// Budget shared by discovery and every fetch
    pub timeout: Duration,
    /// Value escaping
    pub escape: EscapeMode,
    /// Secrets Manager client
    pub client: AwsClientMode,
}

fn required<T>(value: Option<T>, option: &str, env: &str) -> Result<T, CliError> {
    value.ok_or_else(|| {
        CliError::config_with_help(
            format!("{env} not set"),
            format!("Set --{option}, the {env} environment variable or `{option}` in config.yaml"),
        )
    })
}

fn required_text(value: Option<String>, option: &str, env: &str) -> Result<String, CliError> {
    let value = required(value, option, env)?;
    if value.trim().is_empty() {
        return Err(CliError::config(format!("{env} must not be empty")));
    }
    Ok(value)
}

fn required_path(value: Option<PathBuf>, option: &str, env: &str) -> Result<PathBuf, CliError> {
    let value = required(value, option, env)?;
    if value.as_os_str().is_empty() {
        return Err(CliError::config(format!("{env} must not be empty")));
    }
    Ok(value)
}

impl Config {
    /// Validate merged layers into a run configuration.
    ///
    /// # Errors
    /// Returns a configuration error for a missing or empty required option,
    /// an empty tag key, or a zero timeout.
    pub fn from_partial(partial: PartialConfig) -> Result<Self, CliError> {
        let secret_name = required_text(
            partial.aws_secret_name,
            "aws-secret-name",
            "AWS_SECRET_NAME",
        )?;
        let template_path = required_path(
            partial.application_config_file,
            "application-config-file",
            "APPLICATION_CONFIG_FILE",
        )?;
        let output_path = required_path(
            partial.application_config_outfile,
            "application-config-outfile",
            "APPLICATION_CONFIG_OUTFILE",
        )?;
        let region = required_text(partial.aws_region, "aws-region", "AWS_REGION")?;

        let criterion = match partial.selector.unwrap_or_default() {
            SelectorKind::Tag => SelectionCriterion::tag(
                partial
                    .tag_key
                    .unwrap_or_else(|| DEFAULT_TAG_KEY.to_string()),
                secret_name,
            ),
            SelectorKind::Name => SelectionCriterion::name(secret_name),
        };
        criterion
            .validate()
            .map_err(|e| CliError::config_with_help(e.to_string(), "Set a non-empty SECRET_TAG_KEY"))?;

        let timeout = match partial.timeout_secs {
            None => DEFAULT_TIMEOUT,
            Some(0) => {
                return Err(CliError::config_with_help(
                    "SECRET_TIMEOUT_SECS must be greater than zero",
                    "Omit it to use the 30 second default",
                ));
            }
            Some(secs) if secs > MAX_TIMEOUT.as_secs() => {
                return Err(CliError::config_with_help(
                    format!(
                        "SECRET_TIMEOUT_SECS must be at most {} seconds, got {secs}",
                        MAX_TIMEOUT.as_secs()
                    ),
                    "Omit it to use the 30 second default",
                ));
            }
            Some(secs) => Duration::from_secs(secs),
        };

        Ok(Self {
            criterion,
            template_path,
            output_path,
            region,
            timeout,
            escape: partial.escape.unwrap_or_default(),
            client: partial.client.unwrap_or_default(),
        })
    }
}
