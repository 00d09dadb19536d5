//! GCP instance identity token verification.
//!
//! <https://cloud.google.com/compute/docs/instances/verifying-instance-identity>

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::client::MetadataClient;
use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::provider::CloudProvider;
use crate::verifier::{outcome, Verifier};

/// Identity token endpoint for the default service account.
const IDENTITY_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Required header for GCP metadata requests.
const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

/// Required header value for GCP metadata requests.
const METADATA_FLAVOR_VALUE: &str = "Google";

/// Prefix of the per-attempt audience.
const AUDIENCE_PREFIX: &str = "https://cloud.verify/";

/// Accepted `iss` values for Google-signed identity tokens.
const ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Claims of a Google-signed identity token.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Verifies a freshly requested identity token against Google's signing keys.
#[derive(Debug, Clone)]
pub struct GcpVerifier {
    client: MetadataClient,
    downloads: MetadataClient,
    certs_url: String,
}

impl GcpVerifier {
    pub fn new(config: &VerifierConfig) -> Result<Self, VerifyError> {
        Ok(Self {
            client: MetadataClient::new(
                config.request_timeout,
                &config.gcp_base_url,
                config.max_response_size,
            )?,
            downloads: MetadataClient::for_downloads(
                config.download_timeout,
                config.max_response_size,
            )?,
            certs_url: config.gcp_certs_url.clone(),
        })
    }

    /// Request a token for a new random audience and validate it.
    pub async fn attest(&self) -> Result<IdentityClaims, VerifyError> {
        let audience = new_audience();
        let token = self.fetch_identity_token(&audience).await?;
        let keys = self.fetch_signing_keys().await?;

        let claims = validate_token(&token, &audience, &keys)?;
        tracing::debug!(sub = %claims.sub, "GCP identity token verified");
        Ok(claims)
    }

    async fn fetch_identity_token(&self, audience: &str) -> Result<String, VerifyError> {
        let request = self
            .client
            .inner()
            .get(self.client.url(IDENTITY_PATH))
            .query(&[("audience", audience)])
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE);

        let token = self.client.fetch_text(request).await?;
        Ok(token.trim().to_string())
    }

    async fn fetch_signing_keys(&self) -> Result<JwkSet, VerifyError> {
        let request = self.downloads.inner().get(&self.certs_url);
        let body = self.downloads.fetch(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl Verifier for GcpVerifier {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Gcp
    }

    async fn verify(&self) -> bool {
        outcome(CloudProvider::Gcp, self.attest().await)
    }
}

/// A never-reused audience, binding the token to this one attempt.
pub fn new_audience() -> String {
    format!("{}{}", AUDIENCE_PREFIX, Uuid::new_v4())
}

/// Validate signature, audience, issuer and expiry of `token`.
pub fn validate_token(
    token: &str,
    audience: &str,
    keys: &JwkSet,
) -> Result<IdentityClaims, VerifyError> {
    let header = decode_header(token)?;
    let kid = header
        .kid
        .ok_or_else(|| VerifyError::Parse("token header has no key id".into()))?;
    let jwk = keys
        .find(&kid)
        .ok_or_else(|| VerifyError::TrustAnchorMissing(format!("GCP signing key {}", kid)))?;
    let key = DecodingKey::from_jwk(jwk)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    validation.set_issuer(&ISSUERS);

    Ok(decode::<IdentityClaims>(token, &key, &validation)?.claims)
}
