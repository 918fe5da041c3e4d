//! Secret discovery and resolution for secretfill
//!
//! Provides the store-agnostic half of the pipeline:
//!
//! 1. [`discover`] lists every secret matching a [`SelectionCriterion`] and
//!    reduces the listing to name-ordered [`SecretLocator`]s.
//! 2. [`resolve_context`] fetches each located secret and flattens the values
//!    into a single [`TemplateContext`].
//!
//! Both stages share one [`Deadline`], so the whole network phase of a run is
//! bounded by a single budget.
//!
//! ```ignore
//! use secretfill_secrets::{Deadline, SelectionCriterion, discover, resolve_context};
//!
//! let deadline = Deadline::after(Duration::from_secs(30));
//! let criterion = SelectionCriterion::tag("app-config", "prod");
//! let locators = discover(&store, &criterion, &deadline).await?;
//! let context = resolve_context(&store, &locators, &deadline).await?;
//! ```

mod context;
mod deadline;
mod discovery;
mod resolve;
pub mod stores;
mod types;

pub use context::TemplateContext;
pub use deadline::{DEFAULT_TIMEOUT, Deadline, MAX_TIMEOUT};
pub use discovery::discover;
pub use resolve::resolve_context;
pub use stores::MemorySecretStore;
pub use types::SecureSecret;

// Provider implementations are in separate crates:
// - secretfill-aws: AwsSecretStore

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error types for secret discovery and resolution
#[derive(Debug, Error)]
pub enum SecretError {
    /// The selection criterion cannot be used to query a store
    #[error("Invalid selection criterion: {message}")]
    InvalidCriterion {
        /// What is wrong with the criterion
        message: String,
    },

    /// The backing store rejected or failed a request
    #[error("{provider} request failed: {message}")]
    Store {
        /// Store provider name (e.g. `"aws"`)
        provider: &'static str,
        /// Error message from the provider
        message: String,
    },

    /// The secret exists but carries no string payload
    #[error("Secret '{name}' has no string value (may be binary)")]
    NoStringValue {
        /// Secret name
        name: String,
    },

    /// The shared deadline elapsed before the operation finished
    #[error("Deadline of {budget:?} exceeded during {operation}")]
    DeadlineExceeded {
        /// Operation that was in flight
        operation: String,
        /// Total budget the deadline was created with
        budget: Duration,
    },

    /// Listing secrets for a criterion failed
    #[error("Failed to discover secrets matching {criterion}: {cause}")]
    DiscoveryFailed {
        /// Rendered selection criterion
        criterion: String,
        /// Underlying failure
        cause: Box<SecretError>,
    },

    /// Fetching a located secret failed
    #[error("Failed to resolve secret '{name}' ({locator}): {cause}")]
    ResolutionFailed {
        /// Secret name
        name: String,
        /// Opaque store identifier of the secret
        locator: String,
        /// Underlying failure
        cause: Box<SecretError>,
    },
}

impl SecretError {
    /// Create a store error for the given provider
    #[must_use]
    pub fn store(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Store {
            provider,
            message: message.into(),
        }
    }
}

/// How secrets are selected from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SelectionCriterion {
    /// Secrets carrying the tag `key=value`
    Tag {
        /// Tag key
        key: String,
        /// Tag value
        value: String,
    },
    /// The secret whose name equals the given string
    Name {
        /// Secret name
        name: String,
    },
}

impl SelectionCriterion {
    /// Select secrets by tag
    #[must_use]
    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Tag {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Select a secret by its exact name
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name { name: name.into() }
    }

    /// Reject criteria that would match nothing meaningful.
    ///
    /// # Errors
    /// Returns [`SecretError::InvalidCriterion`] when any component is empty.
    pub fn validate(&self) -> Result<(), SecretError> {
        match self {
            Self::Tag { key, .. } if key.trim().is_empty() => Err(SecretError::InvalidCriterion {
                message: "tag key must not be empty".to_string(),
            }),
            Self::Tag { value, .. } if value.trim().is_empty() => {
                Err(SecretError::InvalidCriterion {
                    message: "tag value must not be empty".to_string(),
                })
            }
            Self::Name { name } if name.trim().is_empty() => Err(SecretError::InvalidCriterion {
                message: "secret name must not be empty".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SelectionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag { key, value } => write!(f, "tag {key}={value}"),
            Self::Name { name } => write!(f, "name {name}"),
        }
    }
}

/// A secret as returned by a store listing, before exact-match filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretListing {
    /// Display name of the secret
    pub name: String,
    /// Opaque store identifier (ARN for AWS)
    pub id: String,
    /// Tags attached to the secret, as `(key, value)` pairs
    pub tags: Vec<(String, String)>,
}

impl SecretListing {
    /// Create a listing without tags
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            tags: Vec::new(),
        }
    }

    /// Attach a tag to the listing
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Whether this listing satisfies the criterion exactly.
    ///
    /// Store-side filters are prefix or token matches; this is the
    /// authoritative check.
    #[must_use]
    pub fn matches(&self, criterion: &SelectionCriterion) -> bool {
        match criterion {
            SelectionCriterion::Tag { key, value } => {
                self.tags.iter().any(|(k, v)| k == key && v == value)
            }
            SelectionCriterion::Name { name } => &self.name == name,
        }
    }

    /// Drop the tags, keeping what resolution needs
    #[must_use]
    pub fn into_locator(self) -> SecretLocator {
        SecretLocator {
            name: self.name,
            id: self.id,
        }
    }
}

/// Where to fetch a discovered secret from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretLocator {
    /// Display name of the secret
    pub name: String,
    /// Opaque store identifier (ARN for AWS)
    pub id: String,
}

impl SecretLocator {
    /// Create a new locator
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// A secret store that can list secrets by criterion and fetch their values.
///
/// Implementations only talk to the backend; exact matching, ordering,
/// deadlines and flattening are applied by [`discover`] and
/// [`resolve_context`].
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Provider identifier used in logs and errors (e.g. `"aws"`).
    fn provider_name(&self) -> &'static str;

    /// List secrets that may match the criterion.
    ///
    /// Returning a superset is allowed; returning fewer than all matches is not.
    async fn list_secrets(
        &self,
        criterion: &SelectionCriterion,
    ) -> Result<Vec<SecretListing>, SecretError>;

    /// Fetch the current string value of a secret.
    async fn get_secret_value(&self, locator: &SecretLocator) -> Result<String, SecretError>;
}
