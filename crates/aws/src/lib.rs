//! AWS integration for secretfill
//!
//! Provides [`AwsSecretStore`], a [`SecretStore`](secretfill_secrets::SecretStore)
//! backed by AWS Secrets Manager, via the SDK or the `aws` CLI.

pub mod secrets;

// Re-export main types for convenience
pub use secrets::{AwsClientMode, AwsSecretStore};
