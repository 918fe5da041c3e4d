//! AWS Secrets Manager secret store with SDK and CLI modes

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::types::{Filter, FilterNameStringType};
use secretfill_secrets::{
    SecretError, SecretListing, SecretLocator, SecretStore, SelectionCriterion,
};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

const PROVIDER: &str = "aws";

/// Page size requested from `ListSecrets` (the service maximum)
const LIST_PAGE_SIZE: i32 = 100;

/// How requests reach Secrets Manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AwsClientMode {
    /// AWS SDK over HTTPS using the default credential chain
    #[default]
    Sdk,
    /// Shell out to the `aws` CLI on `PATH`
    Cli,
}

impl std::fmt::Display for AwsClientMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sdk => f.write_str("sdk"),
            Self::Cli => f.write_str("cli"),
        }
    }
}

/// Lists and fetches secrets from AWS Secrets Manager in one region.
///
/// - [`AwsClientMode::Sdk`] uses `ListSecrets`/`GetSecretValue` through the SDK,
///   with credentials from the standard provider chain (environment, profile,
///   web identity, container or instance metadata).
/// - [`AwsClientMode::Cli`] runs `aws secretsmanager ...` and parses its JSON.
pub struct AwsSecretStore {
    region: String,
    sdk_client: Option<Client>,
}

impl std::fmt::Debug for AwsSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretStore")
            .field("region", &self.region)
            .field("mode", &self.mode())
            .finish()
    }
}

impl AwsSecretStore {
    /// Create a store for `region` in the given mode.
    ///
    /// In SDK mode this loads the shared AWS configuration; no request is sent.
    ///
    /// # Errors
    /// Returns an error if the region is empty.
    pub async fn new(region: impl Into<String>, mode: AwsClientMode) -> Result<Self, SecretError> {
        let region = region.into();
        if region.trim().is_empty() {
            return Err(SecretError::store(PROVIDER, "region must not be empty"));
        }

        let sdk_client = match mode {
            AwsClientMode::Sdk => {
                let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(aws_config::Region::new(region.clone()))
                    .load()
                    .await;
                Some(Client::new(&config))
            }
            AwsClientMode::Cli => None,
        };

        tracing::debug!(region = %region, mode = %mode, "AWS secret store created");
        Ok(Self { region, sdk_client })
    }

    /// Region this store talks to.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Active client mode.
    #[must_use]
    pub const fn mode(&self) -> AwsClientMode {
        if self.sdk_client.is_some() {
            AwsClientMode::Sdk
        } else {
            AwsClientMode::Cli
        }
    }

    /// Store-side filters that narrow a listing to candidates for `criterion`.
    ///
    /// Secrets Manager filters are prefix matches and tag-key/tag-value
    /// filters are not correlated, so callers must still check exact matches.
    fn filters_for(criterion: &SelectionCriterion) -> Vec<(FilterNameStringType, String)> {
        match criterion {
            SelectionCriterion::Tag { key, value } => vec![
                (FilterNameStringType::TagKey, key.clone()),
                (FilterNameStringType::TagValue, value.clone()),
            ],
            SelectionCriterion::Name { name } => vec![(FilterNameStringType::Name, name.clone())],
        }
    }

    /// List secrets using the SDK, following `NextToken` to the last page
    async fn list_sdk(
        client: &Client,
        criterion: &SelectionCriterion,
    ) -> Result<Vec<SecretListing>, SecretError> {
        let filters: Vec<Filter> = Self::filters_for(criterion)
            .into_iter()
            .map(|(key, value)| Filter::builder().key(key).values(value).build())
            .collect();

        let mut listings = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = client
                .list_secrets()
                .set_filters(Some(filters.clone()))
                .max_results(LIST_PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    SecretError::store(
                        PROVIDER,
                        format!("ListSecrets failed: {}", DisplayErrorContext(&e)),
                    )
                })?;

            for entry in response.secret_list() {
                let (Some(name), Some(arn)) = (entry.name(), entry.arn()) else {
                    tracing::warn!(name = ?entry.name(), "Skipping listed secret without name or ARN");
                    continue;
                };
                listings.push(SecretListing {
                    name: name.to_string(),
                    id: arn.to_string(),
                    tags: entry
                        .tags()
                        .iter()
                        .filter_map(|tag| {
                            Some((tag.key()?.to_string(), tag.value().unwrap_or("").to_string()))
                        })
                        .collect(),
                });
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(listings)
    }

    /// Fetch a secret value using the SDK
    async fn get_sdk(client: &Client, locator: &SecretLocator) -> Result<String, SecretError> {
        let response = client
            .get_secret_value()
            .secret_id(&locator.id)
            .send()
            .await
            .map_err(|e| {
                SecretError::store(
                    PROVIDER,
                    format!("GetSecretValue failed: {}", DisplayErrorContext(&e)),
                )
            })?;

        response
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| SecretError::NoStringValue {
                name: locator.name.clone(),
            })
    }

    /// Arguments for `aws secretsmanager list-secrets`
    fn list_cli_args(&self, criterion: &SelectionCriterion) -> Result<Vec<String>, SecretError> {
        let filters: Vec<CliFilter> = Self::filters_for(criterion)
            .into_iter()
            .map(|(key, value)| CliFilter {
                key: key.as_str().to_string(),
                values: vec![value],
            })
            .collect();
        let filters = serde_json::to_string(&filters).map_err(|e| {
            SecretError::store(PROVIDER, format!("Failed to encode CLI filters: {e}"))
        })?;

        Ok(vec![
            "secretsmanager".to_string(),
            "list-secrets".to_string(),
            "--region".to_string(),
            self.region.clone(),
            "--output".to_string(),
            "json".to_string(),
            "--filters".to_string(),
            filters,
        ])
    }

    /// Arguments for `aws secretsmanager get-secret-value`
    fn get_cli_args(&self, locator: &SecretLocator) -> Vec<String> {
        vec![
            "secretsmanager".to_string(),
            "get-secret-value".to_string(),
            "--region".to_string(),
            self.region.clone(),
            "--output".to_string(),
            "json".to_string(),
            "--secret-id".to_string(),
            locator.id.clone(),
        ]
    }

    /// Run the `aws` CLI and return its stdout
    async fn run_cli(args: &[String]) -> Result<Vec<u8>, SecretError> {
        let output = Command::new("aws")
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SecretError::store(PROVIDER, format!("Failed to execute aws CLI: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SecretError::store(
                PROVIDER,
                format!("aws CLI failed: {}", stderr.trim()),
            ));
        }

        Ok(output.stdout)
    }

    /// Parse `list-secrets` JSON output (the CLI paginates on its own)
    fn parse_cli_listing(stdout: &[u8]) -> Result<Vec<SecretListing>, SecretError> {
        let parsed: CliListSecretsOutput = serde_json::from_slice(stdout).map_err(|e| {
            SecretError::store(PROVIDER, format!("Unexpected list-secrets output: {e}"))
        })?;

        Ok(parsed
            .secret_list
            .into_iter()
            .map(|entry| SecretListing {
                name: entry.name,
                id: entry.arn,
                tags: entry
                    .tags
                    .into_iter()
                    .map(|tag| (tag.key, tag.value))
                    .collect(),
            })
            .collect())
    }

    /// Parse `get-secret-value` JSON output
    fn parse_cli_value(locator: &SecretLocator, stdout: &[u8]) -> Result<String, SecretError> {
        let parsed: CliSecretValueOutput = serde_json::from_slice(stdout).map_err(|e| {
            SecretError::store(PROVIDER, format!("Unexpected get-secret-value output: {e}"))
        })?;

        parsed.secret_string.ok_or_else(|| SecretError::NoStringValue {
            name: locator.name.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CliFilter {
    key: String,
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliListSecretsOutput {
    #[serde(default)]
    secret_list: Vec<CliSecretEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliSecretEntry {
    name: String,
    #[serde(rename = "ARN")]
    arn: String,
    #[serde(default)]
    tags: Vec<CliTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliTag {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CliSecretValueOutput {
    secret_string: Option<String>,
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn list_secrets(
        &self,
        criterion: &SelectionCriterion,
    ) -> Result<Vec<SecretListing>, SecretError> {
        let listings = if let Some(client) = &self.sdk_client {
            Self::list_sdk(client, criterion).await?
        } else {
            let stdout = Self::run_cli(&self.list_cli_args(criterion)?).await?;
            Self::parse_cli_listing(&stdout)?
        };

        tracing::debug!(
            region = %self.region,
            count = listings.len(),
            "Secrets Manager listing returned"
        );
        Ok(listings)
    }

    async fn get_secret_value(&self, locator: &SecretLocator) -> Result<String, SecretError> {
        if let Some(client) = &self.sdk_client {
            return Self::get_sdk(client, locator).await;
        }

        let stdout = Self::run_cli(&self.get_cli_args(locator)).await?;
        Self::parse_cli_value(locator, &stdout)
    }
}
