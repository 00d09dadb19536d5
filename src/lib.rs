//! Detect which public cloud a VM runs on by verifying signed identity documents.
//!
//! Plain metadata endpoints are easy to spoof from inside a network. Instead of
//! trusting them, each provider is asked for a cryptographically signed
//! attestation, and the signature is checked against a provider-specific
//! trust anchor:
//!
//! | Provider | Evidence | Check |
//! |----------|----------|-------|
//! | AWS | PKCS7 instance identity document | Signature against the region certificate |
//! | GCP | Identity token for a random audience | RS256 signature against Google's keys, audience, issuer, expiry |
//! | Azure | PKCS7 attested document | Signature, then signer chain through a known issuing CA to the bundled root |
//!
//! All three checks race concurrently; the first that succeeds wins.
//!
//! # Example
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() {
//!     let (detected, name) = cloud_verify::running_on_cloud().await;
//!     if detected {
//!         println!("Running on Cloud ({})", name);
//!     }
//! }
//! ```

mod client;
mod config;
mod detect;
mod error;
mod provider;
pub mod providers;
mod trust;
mod verifier;

pub use config::VerifierConfig;
pub use detect::CloudDetector;
pub use error::VerifyError;
pub use provider::{CloudProvider, Detection, VerificationOutcome};
pub use trust::TrustAnchors;
pub use verifier::Verifier;

/// Race all providers with the bundled trust anchors and environment config.
///
/// Returns `(true, "AWS" | "GCP" | "Azure")` on success, otherwise
/// `(false, "Not Detected")` or `(false, "Timeout")`.
pub async fn running_on_cloud() -> (bool, String) {
    detect(&VerifierConfig::from_env()).await.into()
}

/// Race all providers with the bundled trust anchors.
pub async fn detect(config: &VerifierConfig) -> Detection {
    match CloudDetector::new(config, TrustAnchors::bundled()) {
        Ok(detector) => detector.detect().await,
        Err(e) => {
            tracing::warn!(error = %e, "failed to build verifiers");
            Detection::NotDetected
        }
    }
}
