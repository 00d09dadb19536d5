//! Azure attested document verification.
//!
//! The attested document is a PKCS7 envelope signed by a `metadata.azure.com`
//! certificate. Azure does not say which of its TLS issuing authorities
//! issued that certificate, so the chain is tried through each known
//! intermediate in turn.
//!
//! <https://learn.microsoft.com/en-us/azure/virtual-machines/instance-metadata-service>

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509StoreContext, X509};
use serde::Deserialize;
use tokio::task::JoinSet;

use crate::client::MetadataClient;
use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::provider::CloudProvider;
use crate::trust::TrustAnchors;
use crate::verifier::{outcome, Verifier};

/// Azure attested document endpoint path.
const ATTESTED_PATH: &str = "/metadata/attested/document";

/// API version query parameter.
const API_VERSION: &str = "2020-09-01";

/// Required header for Azure metadata requests.
const METADATA_HEADER: &str = "Metadata";

/// Required header value for Azure metadata requests.
const METADATA_VALUE: &str = "True";

#[derive(Debug, Deserialize)]
struct AttestedDocument {
    signature: String,
}

#[derive(Debug, Deserialize)]
struct AttestedData {
    #[serde(rename = "vmId", default)]
    vm_id: Option<String>,
}

/// Signed content and signer certificate pulled out of the attested document.
#[derive(Debug)]
pub struct SignedAttestation {
    pub content: Vec<u8>,
    pub signer: X509,
}

impl SignedAttestation {
    /// The `vmId` field of the signed content, if it is present.
    pub fn vm_id(&self) -> Option<String> {
        serde_json::from_slice::<AttestedData>(&self.content)
            .ok()
            .and_then(|data| data.vm_id)
    }
}

/// Verifies the Azure attested document and its signer's chain to the bundled root.
#[derive(Debug, Clone)]
pub struct AzureVerifier {
    client: MetadataClient,
    downloads: MetadataClient,
    /// Known issuing authorities, name to download URL.
    intermediates: Vec<(String, String)>,
    anchors: Arc<TrustAnchors>,
}

impl AzureVerifier {
    pub fn new(config: &VerifierConfig, anchors: Arc<TrustAnchors>) -> Result<Self, VerifyError> {
        Ok(Self {
            client: MetadataClient::new(
                config.request_timeout,
                &config.azure_base_url,
                config.max_response_size,
            )?,
            downloads: MetadataClient::for_downloads(
                config.download_timeout,
                config.max_response_size,
            )?,
            intermediates: config
                .azure_intermediates
                .iter()
                .map(|(name, url)| (name.clone(), url.clone()))
                .collect(),
            anchors,
        })
    }

    /// Fetch the attested document, check its signature and the signer's chain.
    ///
    /// Returns the name of the intermediate authority the chain went through.
    pub async fn attest(&self) -> Result<String, VerifyError> {
        let signature = self.fetch_signature().await?;
        let attestation = open_attestation(&signature)?;

        let intermediates = self.download_intermediates().await?;
        let root = self
            .anchors
            .azure_root()
            .ok_or_else(|| VerifyError::TrustAnchorMissing("Azure root".into()))?;

        let authority = find_issuing_authority(&attestation.signer, &intermediates, root)?;
        tracing::debug!(
            authority = %authority,
            vm_id = attestation.vm_id().as_deref().unwrap_or("-"),
            "Azure attested document verified"
        );
        Ok(authority)
    }

    /// Fetch the base64 signature field and decode it.
    async fn fetch_signature(&self) -> Result<Vec<u8>, VerifyError> {
        let request = self
            .client
            .inner()
            .get(self.client.url(ATTESTED_PATH))
            .query(&[("api-version", API_VERSION)])
            .header(METADATA_HEADER, METADATA_VALUE);

        let body = self.client.fetch(request).await?;
        let document: AttestedDocument = serde_json::from_slice(&body)?;

        let compact: String = document.signature.split_whitespace().collect();
        STANDARD
            .decode(compact)
            .map_err(|_| VerifyError::Parse("signature is not base64".into()))
    }

    /// Download every known intermediate; any failure fails the whole set.
    async fn download_intermediates(&self) -> Result<Vec<(String, X509)>, VerifyError> {
        let mut downloads = JoinSet::new();
        for (name, url) in &self.intermediates {
            let client = self.downloads.clone();
            let name = name.clone();
            let url = url.clone();
            downloads.spawn(async move {
                let cert = download_certificate(&client, &url).await;
                (name, cert)
            });
        }

        let mut intermediates = Vec::with_capacity(self.intermediates.len());
        while let Some(joined) = downloads.join_next().await {
            let (name, cert) = joined.map_err(|e| VerifyError::Io(std::io::Error::other(e)))?;
            match cert {
                Ok(cert) => intermediates.push((name, cert)),
                Err(e) => {
                    tracing::debug!(authority = %name, error = %e, "intermediate download failed");
                    return Err(e);
                }
            }
        }
        Ok(intermediates)
    }
}

#[async_trait]
impl Verifier for AzureVerifier {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Azure
    }

    async fn verify(&self) -> bool {
        outcome(CloudProvider::Azure, self.attest().await)
    }
}

/// Fetch a certificate published as DER (`.cer`) or PEM.
async fn download_certificate(client: &MetadataClient, url: &str) -> Result<X509, VerifyError> {
    let body = client.fetch(client.inner().get(url)).await?;
    X509::from_der(&body)
        .or_else(|_| X509::from_pem(&body))
        .map_err(|e| VerifyError::Parse(format!("certificate from {}: {}", url, e)))
}

/// Parse the DER PKCS7 envelope, verify the signature over its content
/// without chain trust, and extract the embedded signer certificate.
pub fn open_attestation(der: &[u8]) -> Result<SignedAttestation, VerifyError> {
    let pkcs7 = Pkcs7::from_der(der).map_err(|e| VerifyError::Parse(format!("pkcs7: {}", e)))?;

    let no_certs: Stack<X509> = Stack::new()?;
    let signer = pkcs7
        .signers(&no_certs, Pkcs7Flags::empty())
        .map_err(|e| VerifyError::Parse(format!("pkcs7 signer: {}", e)))?
        .into_iter()
        .next()
        .ok_or_else(|| VerifyError::Parse("pkcs7 carries no signer certificate".into()))?;

    let store = X509StoreBuilder::new()?.build();
    let mut content = Vec::new();
    pkcs7
        .verify(&no_certs, &store, None, Some(&mut content), Pkcs7Flags::NOVERIFY)
        .map_err(|e| {
            tracing::debug!(error = %e, "attested document signature rejected");
            VerifyError::SignatureInvalid
        })?;

    Ok(SignedAttestation { content, signer })
}

/// Try each intermediate until one links `signer` to `root`.
///
/// Returns the name of the first intermediate that produced a valid chain.
pub fn find_issuing_authority(
    signer: &X509,
    intermediates: &[(String, X509)],
    root: &X509,
) -> Result<String, VerifyError> {
    for (name, intermediate) in intermediates {
        match verify_chain(signer, intermediate, root) {
            Ok(()) => return Ok(name.clone()),
            Err(e) => tracing::debug!(authority = %name, error = %e, "chain rejected"),
        }
    }
    Err(VerifyError::ChainInvalid)
}

/// Full path validation of `signer` through exactly one untrusted intermediate.
fn verify_chain(signer: &X509, intermediate: &X509, root: &X509) -> Result<(), VerifyError> {
    let mut trusted = X509StoreBuilder::new()?;
    trusted.add_cert(root.clone())?;
    let trusted = trusted.build();

    let mut untrusted: Stack<X509> = Stack::new()?;
    untrusted.push(intermediate.clone())?;

    let mut context = X509StoreContext::new()?;
    let verified = context.init(&trusted, signer, &untrusted, |c| {
        let verified = c.verify_cert()?;
        if !verified {
            tracing::debug!(reason = %c.error(), depth = c.error_depth(), "path validation failed");
        }
        Ok(verified)
    })?;

    if verified {
        Ok(())
    } else {
        Err(VerifyError::ChainInvalid)
    }
}
