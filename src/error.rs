//! Error types for identity verification.

use thiserror::Error;

/// Errors that can occur while verifying a provider's identity document.
///
/// These never reach the caller of [`Verifier::verify`](crate::Verifier::verify):
/// every variant collapses to a negative result there. They exist so that
/// each failed step can be logged with its cause.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// HTTP request error (unreachable endpoint, timeout, connection reset).
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// HTTP error with status code.
    #[error("http {0}")]
    Http(u16),

    /// Response exceeds maximum allowed size.
    #[error("response too large: {0} bytes exceeds limit of {1} bytes")]
    TooLarge(usize, usize),

    /// Malformed response body (base64, UTF-8, PEM, DER, PKCS7).
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON deserialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reported by the cryptographic library.
    #[error("crypto: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),

    /// Identity token rejected (bad signature, audience, issuer or expiry).
    #[error("token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// No trust anchor available for the claimed identity.
    #[error("no trust anchor for {0}")]
    TrustAnchorMissing(String),

    /// Signature over the signed content did not verify.
    #[error("signature invalid")]
    SignatureInvalid,

    /// Signed document names a different region than the metadata service.
    #[error("signed document is for region {signed}, instance reports {reported}")]
    RegionMismatch { signed: String, reported: String },

    /// No candidate chain led from the signer to the trusted root.
    #[error("no valid certificate chain")]
    ChainInvalid,

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
