//! Secret discovery: criterion -> name-ordered locators

use crate::{Deadline, SecretError, SecretLocator, SecretStore, SelectionCriterion};
use std::collections::BTreeMap;

/// List every secret matching `criterion` exactly.
///
/// The result is keyed and ordered by secret name, which fixes the merge order
/// used by [`resolve_context`](crate::resolve_context). Zero matches is not an
/// error.
///
/// # Errors
/// - [`SecretError::InvalidCriterion`] before any store call if the criterion is empty
/// - [`SecretError::DiscoveryFailed`] wrapping the store or deadline failure
pub async fn discover<S>(
    store: &S,
    criterion: &SelectionCriterion,
    deadline: &Deadline,
) -> Result<BTreeMap<String, SecretLocator>, SecretError>
where
    S: SecretStore + ?Sized,
{
    criterion.validate()?;

    tracing::debug!(
        provider = store.provider_name(),
        criterion = %criterion,
        "Listing secrets"
    );

    let listings = deadline
        .run("list secrets", store.list_secrets(criterion))
        .await
        .map_err(|e| SecretError::DiscoveryFailed {
            criterion: criterion.to_string(),
            cause: Box::new(e),
        })?;

    let listed = listings.len();
    let mut locators = BTreeMap::new();
    for listing in listings {
        if !listing.matches(criterion) {
            tracing::debug!(secret = %listing.name, "Skipping inexact store match");
            continue;
        }
        locators.insert(listing.name.clone(), listing.into_locator());
    }

    if locators.is_empty() {
        tracing::warn!(
            provider = store.provider_name(),
            criterion = %criterion,
            "No secrets matched; template placeholders will render empty"
        );
    } else {
        tracing::info!(
            provider = store.provider_name(),
            criterion = %criterion,
            listed,
            matched = locators.len(),
            secrets = ?locators.keys().collect::<Vec<_>>(),
            "Secrets discovered"
        );
    }

    Ok(locators)
}
