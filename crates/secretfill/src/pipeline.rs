//! Discovery, resolution and rendering for one run

use crate::cli::CliError;
use crate::config::Config;
use secretfill_aws::AwsSecretStore;
use secretfill_secrets::{Deadline, SecretError, SecretStore, discover, resolve_context};
use secretfill_template::{RenderReport, render_to_file};

fn discovery_error(err: SecretError) -> CliError {
    match err {
        SecretError::InvalidCriterion { .. } => CliError::config(err.to_string()),
        SecretError::DiscoveryFailed { ref cause, .. }
            if matches!(**cause, SecretError::DeadlineExceeded { .. }) =>
        {
            CliError::discovery_with_help(err.to_string(), "Raise SECRET_TIMEOUT_SECS")
        }
        other => CliError::discovery_with_help(
            other.to_string(),
            "Check AWS credentials, region and secretsmanager:ListSecrets permission",
        ),
    }
}

fn resolution_error(err: SecretError) -> CliError {
    let help = match &err {
        SecretError::ResolutionFailed { cause, .. } => match **cause {
            SecretError::DeadlineExceeded { .. } => "Raise SECRET_TIMEOUT_SECS",
            SecretError::NoStringValue { .. } => "Store the secret as a string (JSON or plain text)",
            _ => "Check the secretsmanager:GetSecretValue permission and KMS key access",
        },
        _ => "Check the secretsmanager:GetSecretValue permission and KMS key access",
    };
    CliError::resolution_with_help(err.to_string(), help)
}

/// Run the pipeline against `store`.
///
/// The output file is untouched unless every secret resolved and the template
/// rendered.
///
/// # Errors
/// Returns the [`CliError`] of the first stage that failed.
pub async fn run<S: SecretStore + ?Sized>(
    config: &Config,
    store: &S,
) -> Result<RenderReport, CliError> {
    let deadline = Deadline::after(config.timeout);

    let locators = discover(store, &config.criterion, &deadline)
        .await
        .map_err(discovery_error)?;
    let context = resolve_context(store, &locators, &deadline)
        .await
        .map_err(resolution_error)?;

    let report = render_to_file(
        &config.template_path,
        &config.output_path,
        &context,
        config.escape,
    )?;

    if !report.missing.is_empty() {
        tracing::warn!(
            missing = ?report.missing,
            "Template references keys absent from the secrets; rendered as empty"
        );
    }
    tracing::info!(
        output = %config.output_path.display(),
        secrets = locators.len(),
        keys = context.len(),
        bytes = report.bytes,
        escape = %report.escape,
        "Configuration rendered"
    );
    Ok(report)
}

/// Build the AWS store for `config` and run the pipeline against it.
///
/// # Errors
/// Returns the [`CliError`] of the first stage that failed.
pub async fn run_aws(config: &Config) -> Result<RenderReport, CliError> {
    let store = AwsSecretStore::new(config.region.clone(), config.client)
        .await
        .map_err(|e| CliError::config(e.to_string()))?;
    run(config, &store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretfill_secrets::{MemorySecretStore, SelectionCriterion};
    use secretfill_template::EscapeMode;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &Path, template: &str) -> Config {
        let template_path = dir.join("appsettings.tmpl");
        std::fs::write(&template_path, template).unwrap();
        Config {
            criterion: SelectionCriterion::tag("app-config", "orders-api"),
            template_path,
            output_path: dir.join("appsettings.json"),
            region: "us-east-1".to_string(),
            timeout: Duration::from_secs(30),
            escape: EscapeMode::Auto,
            client: secretfill_aws::AwsClientMode::Sdk,
        }
    }

    fn store() -> MemorySecretStore {
        MemorySecretStore::new()
            .with_tagged_secret(
                "orders-api/db",
                r#"{"DB_HOST":"db.internal","DB_PORT":5432}"#,
                [("app-config", "orders-api")],
            )
            .with_tagged_secret(
                "orders-api/token",
                "s3cr3t",
                [("app-config", "orders-api")],
            )
            .with_tagged_secret(
                "billing/db",
                r#"{"DB_HOST":"billing.internal"}"#,
                [("app-config", "billing")],
            )
    }

    #[tokio::test]
    async fn test_renders_merged_context() {
        let dir = TempDir::new().unwrap();
        let config = config(
            dir.path(),
            r#"{"host":"{{.DB_HOST}}","port":{{.DB_PORT}},"token":"{{index . "orders-api/token"}}"}"#,
        );

        let report = run(&config, &store()).await.unwrap();

        let written = std::fs::read_to_string(&config.output_path).unwrap();
        assert_eq!(
            written,
            r#"{"host":"db.internal","port":5432,"token":"s3cr3t"}"#
        );
        assert_eq!(report.bytes, written.len());
        assert_eq!(report.escape, EscapeMode::Plain);
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_renders_empty() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "A={{.DB_HOST}} B={{.NOPE}}");

        let report = run(&config, &store()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&config.output_path).unwrap(),
            "A=db.internal B="
        );
        assert_eq!(report.missing, vec!["NOPE".to_string()]);
    }

    #[tokio::test]
    async fn test_zero_matches_still_renders() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path(), "static {{.X}}");
        config.criterion = SelectionCriterion::tag("app-config", "nobody");

        run(&config, &store()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&config.output_path).unwrap(),
            "static "
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_output() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "{{.DB_HOST}}");
        std::fs::write(&config.output_path, "previous").unwrap();
        let store = store().failing_secret("orders-api/token", "AccessDeniedException");

        let err = run(&config, &store).await.unwrap_err();

        assert_eq!(err.stage(), "resolution");
        assert!(err.to_string().contains("orders-api/token"));
        assert_eq!(
            std::fs::read_to_string(&config.output_path).unwrap(),
            "previous"
        );
    }

    #[tokio::test]
    async fn test_failed_listing_is_discovery_error() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "{{.DB_HOST}}");
        let store = store().failing_list("ExpiredTokenException");

        let err = run(&config, &store).await.unwrap_err();

        assert_eq!(err.stage(), "discovery");
        assert!(err.to_string().contains("ExpiredTokenException"));
        assert!(!config.output_path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_is_resolution_error() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "{{.DB_HOST}}");
        std::fs::write(&config.output_path, "previous").unwrap();
        let store = store().with_latency(Duration::from_secs(20), Duration::from_secs(15));

        let err = run(&config, &store).await.unwrap_err();

        assert_eq!(err.stage(), "resolution");
        assert!(err.to_string().contains("orders-api/db"));
        if let CliError::Resolution { help, .. } = err {
            assert_eq!(help.as_deref(), Some("Raise SECRET_TIMEOUT_SECS"));
        } else {
            panic!("Expected Resolution variant");
        }
        assert_eq!(
            std::fs::read_to_string(&config.output_path).unwrap(),
            "previous"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_listing_is_discovery_error() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "{{.DB_HOST}}");
        let store = store().with_latency(Duration::from_secs(31), Duration::ZERO);

        let err = run(&config, &store).await.unwrap_err();

        assert_eq!(err.stage(), "discovery");
        if let CliError::Discovery { help, .. } = err {
            assert_eq!(help.as_deref(), Some("Raise SECRET_TIMEOUT_SECS"));
        } else {
            panic!("Expected Discovery variant");
        }
    }

    #[tokio::test]
    async fn test_template_error_is_render_error() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "{{.DB_HOST");

        let err = run(&config, &store()).await.unwrap_err();

        assert_eq!(err.stage(), "render");
        assert!(!config.output_path.exists());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "host={{.DB_HOST}}\n");
        let store = store();

        run(&config, &store).await.unwrap();
        let first = std::fs::read(&config.output_path).unwrap();
        run(&config, &store).await.unwrap();

        assert_eq!(std::fs::read(&config.output_path).unwrap(), first);
    }

    #[tokio::test]
    async fn test_html_output_is_escaped() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path(), "<p>{{.motd}}</p>");
        config.output_path = dir.path().join("index.html");
        let store = MemorySecretStore::new().with_tagged_secret(
            "site",
            r#"{"motd":"Tom & Jerry"}"#,
            [("app-config", "orders-api")],
        );

        let report = run(&config, &store).await.unwrap();

        assert_eq!(report.escape, EscapeMode::Html);
        assert_eq!(
            std::fs::read_to_string(&config.output_path).unwrap(),
            "<p>Tom &amp; Jerry</p>"
        );
    }
}
