//! In-process secret store

use crate::{SecretError, SecretListing, SecretLocator, SecretStore, SelectionCriterion};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry {
    value: Option<String>,
    tags: Vec<(String, String)>,
}

/// Secret store backed by an in-memory map.
///
/// Lists every secret it holds regardless of criterion, leaving exact
/// matching to [`discover`](crate::discover) as a real store would. Failures
/// can be injected per secret for exercising the abort paths.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: BTreeMap<String, Entry>,
    list_failure: Option<String>,
    fetch_failures: HashMap<String, String>,
    list_latency: Duration,
    fetch_latency: Duration,
    lists: AtomicUsize,
    fetches: AtomicUsize,
}

impl MemorySecretStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an untagged secret.
    #[must_use]
    pub fn with_secret(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_tagged_secret(name, value, std::iter::empty::<(String, String)>())
    }

    /// Add a secret with tags.
    #[must_use]
    pub fn with_tagged_secret<K, V>(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        tags: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.entries.insert(
            name.into(),
            Entry {
                value: Some(value.into()),
                tags: tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            },
        );
        self
    }

    /// Add a tagged secret that has no string payload.
    #[must_use]
    pub fn with_binary_secret<K, V>(
        mut self,
        name: impl Into<String>,
        tags: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.entries.insert(
            name.into(),
            Entry {
                value: None,
                tags: tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            },
        );
        self
    }

    /// Make every listing fail with `message`.
    #[must_use]
    pub fn failing_list(mut self, message: impl Into<String>) -> Self {
        self.list_failure = Some(message.into());
        self
    }

    /// Make fetching `name` fail with `message`.
    #[must_use]
    pub fn failing_secret(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.fetch_failures.insert(name.into(), message.into());
        self
    }

    /// Delay every listing by `list` and every fetch by `fetch`.
    #[must_use]
    pub fn with_latency(mut self, list: Duration, fetch: Duration) -> Self {
        self.list_latency = list;
        self.fetch_latency = fetch;
        self
    }

    /// Number of `list_secrets` calls made so far.
    #[must_use]
    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::Relaxed)
    }

    /// Number of `get_secret_value` calls made so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn locator_id(name: &str) -> String {
        format!("memory:{name}")
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn list_secrets(
        &self,
        _criterion: &SelectionCriterion,
    ) -> Result<Vec<SecretListing>, SecretError> {
        self.lists.fetch_add(1, Ordering::Relaxed);
        if !self.list_latency.is_zero() {
            tokio::time::sleep(self.list_latency).await;
        }

        if let Some(message) = &self.list_failure {
            return Err(SecretError::store(self.provider_name(), message.clone()));
        }

        Ok(self
            .entries
            .iter()
            .map(|(name, entry)| SecretListing {
                name: name.clone(),
                id: Self::locator_id(name),
                tags: entry.tags.clone(),
            })
            .collect())
    }

    async fn get_secret_value(&self, locator: &SecretLocator) -> Result<String, SecretError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if !self.fetch_latency.is_zero() {
            tokio::time::sleep(self.fetch_latency).await;
        }

        if let Some(message) = self.fetch_failures.get(&locator.name) {
            return Err(SecretError::store(self.provider_name(), message.clone()));
        }

        let entry = self
            .entries
            .get(&locator.name)
            .filter(|_| locator.id == Self::locator_id(&locator.name))
            .ok_or_else(|| {
                SecretError::store(
                    self.provider_name(),
                    format!("secret '{}' does not exist", locator.id),
                )
            })?;

        entry.value.clone().ok_or_else(|| SecretError::NoStringValue {
            name: locator.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_all_entries_with_tags() {
        let store = MemorySecretStore::new()
            .with_tagged_secret("a", "1", [("env", "prod")])
            .with_secret("b", "2");

        let listings = store
            .list_secrets(&SelectionCriterion::name("a"))
            .await
            .unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0], SecretListing::new("a", "memory:a").with_tag("env", "prod"));
        assert_eq!(store.list_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_by_locator() {
        let store = MemorySecretStore::new().with_secret("db", "pw");
        let value = store
            .get_secret_value(&SecretLocator::new("db", "memory:db"))
            .await
            .unwrap();
        assert_eq!(value, "pw");
        assert_eq!(store.fetch_count(), 1);
    }

    #[test]
    fn test_fetch_unknown_locator_fails() {
        let store = MemorySecretStore::new().with_secret("db", "pw");
        tokio_test::assert_ok!(tokio_test::block_on(
            store.get_secret_value(&SecretLocator::new("db", "memory:db"))
        ));
        let result =
            tokio_test::block_on(store.get_secret_value(&SecretLocator::new("db", "arn:other")));
        assert!(matches!(result, Err(SecretError::Store { .. })));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemorySecretStore::new()
            .with_secret("db", "pw")
            .with_binary_secret("cert", [("env", "prod")])
            .failing_secret("db", "access denied");

        let err = store
            .get_secret_value(&SecretLocator::new("db", "memory:db"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("access denied"));

        let err = store
            .get_secret_value(&SecretLocator::new("cert", "memory:cert"))
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::NoStringValue { .. }));
    }
}
