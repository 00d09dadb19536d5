//! Provider-specific identity verifiers.

use std::sync::Arc;

use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::provider::CloudProvider;
use crate::trust::TrustAnchors;
use crate::verifier::Verifier;

pub mod aws;
pub mod azure;
pub mod gcp;

pub use aws::AwsVerifier;
pub use azure::AzureVerifier;
pub use gcp::GcpVerifier;

/// Build the verifier for `provider`.
pub fn verifier_for(
    provider: CloudProvider,
    config: &VerifierConfig,
    anchors: Arc<TrustAnchors>,
) -> Result<Arc<dyn Verifier>, VerifyError> {
    let verifier: Arc<dyn Verifier> = match provider {
        CloudProvider::Aws => Arc::new(AwsVerifier::new(config, anchors)?),
        CloudProvider::Gcp => Arc::new(GcpVerifier::new(config)?),
        CloudProvider::Azure => Arc::new(AzureVerifier::new(config, anchors)?),
    };
    Ok(verifier)
}
