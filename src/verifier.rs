//! Verifier - Trait for per-provider identity checks.

use async_trait::async_trait;

use crate::provider::CloudProvider;

/// A yes/no check that the process runs on one particular provider.
///
/// Implementations fetch fresh evidence on every call; nothing is cached
/// between invocations.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// The provider this verifier attests.
    fn provider(&self) -> CloudProvider;

    /// Fetch and validate the provider's signed identity document.
    ///
    /// Every failure, whatever its cause, yields `false`.
    async fn verify(&self) -> bool;
}

/// Collapse a fallible attestation into the yes/no answer, logging the cause.
pub(crate) fn outcome<T>(provider: CloudProvider, result: Result<T, crate::VerifyError>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(%provider, error = %e, "identity verification failed");
            false
        }
    }
}
