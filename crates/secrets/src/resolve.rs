//! Secret resolution: locators -> flattened context

use crate::{Deadline, SecretError, SecretLocator, SecretStore, TemplateContext};
use std::collections::BTreeMap;

/// Fetch every located secret and flatten the values into one context.
///
/// Secrets are fetched one at a time in name order, each call bounded by the
/// shared `deadline`. On key collision the later secret wins, so the
/// lexicographically last secret name takes precedence.
///
/// # Errors
/// Returns [`SecretError::ResolutionFailed`] for the first secret that cannot
/// be fetched. No partial context is returned.
pub async fn resolve_context<S>(
    store: &S,
    locators: &BTreeMap<String, SecretLocator>,
    deadline: &Deadline,
) -> Result<TemplateContext, SecretError>
where
    S: SecretStore + ?Sized,
{
    let mut context = TemplateContext::new();

    for (name, locator) in locators {
        let operation = format!("get secret value '{name}'");
        let raw = deadline
            .run(&operation, store.get_secret_value(locator))
            .await
            .map_err(|e| SecretError::ResolutionFailed {
                name: name.clone(),
                locator: locator.id.clone(),
                cause: Box::new(e),
            })?;

        let keys = context.merge_secret(name, &raw);
        tracing::debug!(secret = %name, keys, "Secret merged into context");
    }

    tracing::info!(
        provider = store.provider_name(),
        secrets = locators.len(),
        keys = context.len(),
        "Template context resolved"
    );

    Ok(context)
}
