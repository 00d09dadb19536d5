//! AWS instance identity verification (PKCS7-signed document).
//!
//! <https://docs.aws.amazon.com/AWSEC2/latest/UserGuide/verify-pkcs7.html>

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use serde::Deserialize;

use crate::client::MetadataClient;
use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::provider::CloudProvider;
use crate::trust::TrustAnchors;
use crate::verifier::{outcome, Verifier};

/// AWS IMDSv2 token endpoint path.
const TOKEN_PATH: &str = "/latest/api/token";

/// Signed instance identity document (base64 PKCS7 body, no armor).
const PKCS7_PATH: &str = "/latest/dynamic/instance-identity/pkcs7";

/// Region the instance runs in.
const REGION_PATH: &str = "/latest/meta-data/placement/region";

/// Token TTL header name.
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";

/// Token TTL requested, in seconds.
const TOKEN_TTL_SECONDS: &str = "60";

/// Token header name for requests.
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

/// The subset of the signed instance identity document we check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceIdentity {
    pub region: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Verifies the AWS PKCS7 instance identity signature against the region certificate.
#[derive(Debug, Clone)]
pub struct AwsVerifier {
    client: MetadataClient,
    anchors: Arc<TrustAnchors>,
}

impl AwsVerifier {
    pub fn new(config: &VerifierConfig, anchors: Arc<TrustAnchors>) -> Result<Self, VerifyError> {
        Ok(Self {
            client: MetadataClient::new(
                config.request_timeout,
                &config.aws_base_url,
                config.max_response_size,
            )?,
            anchors,
        })
    }

    /// Fetch the signed document and region, and validate the signature.
    pub async fn attest(&self) -> Result<InstanceIdentity, VerifyError> {
        let token = match self.get_token().await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::debug!(error = %e, "IMDSv2 token unavailable, using IMDSv1");
                None
            }
        };

        let envelope = self.fetch_signed_document(token.as_deref()).await?;
        let region = self.get(REGION_PATH, token.as_deref()).await?;
        let region = region.trim();

        let cert = self
            .anchors
            .aws_region(region)
            .ok_or_else(|| VerifyError::TrustAnchorMissing(format!("AWS region {}", region)))?;

        let document = verify_signed_document(&envelope, cert)?;
        let identity: InstanceIdentity = serde_json::from_slice(&document)?;
        if identity.region != region {
            return Err(VerifyError::RegionMismatch {
                signed: identity.region,
                reported: region.to_string(),
            });
        }

        tracing::debug!(
            region,
            instance_id = identity.instance_id.as_deref().unwrap_or("-"),
            account_id = identity.account_id.as_deref().unwrap_or("-"),
            "AWS identity document verified"
        );
        Ok(identity)
    }

    /// Get an IMDSv2 session token.
    async fn get_token(&self) -> Result<String, VerifyError> {
        let request = self
            .client
            .inner()
            .put(self.client.url(TOKEN_PATH))
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECONDS);

        self.client.fetch_text(request).await
    }

    /// IMDSv2 first when a token is available, then IMDSv1.
    async fn fetch_signed_document(&self, token: Option<&str>) -> Result<String, VerifyError> {
        if token.is_some() {
            match self.get(PKCS7_PATH, token).await {
                Ok(body) => return Ok(body),
                Err(e) => tracing::debug!(error = %e, "IMDSv2 document fetch failed, using IMDSv1"),
            }
        }
        self.get(PKCS7_PATH, None).await
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Result<String, VerifyError> {
        let mut request = self.client.inner().get(self.client.url(path));
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        self.client.fetch_text(request).await
    }
}

#[async_trait]
impl Verifier for AwsVerifier {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Aws
    }

    async fn verify(&self) -> bool {
        outcome(CloudProvider::Aws, self.attest().await)
    }
}

/// Check the PKCS7 signature of `envelope` using `cert` as the signer.
///
/// The region certificate is the trusted signer: certificates carried in the
/// envelope are ignored and no chain to a root is required. Returns the
/// signed content.
pub fn verify_signed_document(envelope: &str, cert: &X509) -> Result<Vec<u8>, VerifyError> {
    let compact: String = envelope.split_whitespace().collect();
    let der = STANDARD
        .decode(compact)
        .map_err(|_| VerifyError::Parse("pkcs7 body is not base64".into()))?;
    let pkcs7 = Pkcs7::from_der(&der).map_err(|e| VerifyError::Parse(format!("pkcs7: {}", e)))?;

    let mut signers: Stack<X509> = Stack::new()?;
    signers.push(cert.clone())?;
    let store = X509StoreBuilder::new()?.build();

    let mut content = Vec::new();
    pkcs7
        .verify(
            &signers,
            &store,
            None,
            Some(&mut content),
            Pkcs7Flags::NOVERIFY | Pkcs7Flags::NOINTERN,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "pkcs7 signature rejected");
            VerifyError::SignatureInvalid
        })?;

    Ok(content)
}
