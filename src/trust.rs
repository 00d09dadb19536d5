//! Trust anchors: AWS region certificates and the Azure root.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use openssl::x509::X509;

use crate::error::VerifyError;

include!(concat!(env!("OUT_DIR"), "/aws_region_certs.rs"));

/// Root that the Azure TLS issuing authorities chain to.
const AZURE_ROOT_PEM: &str = include_str!("../certs/azure/DigiCert_Global_Root_G2.pem");

static BUNDLED: OnceLock<Arc<TrustAnchors>> = OnceLock::new();

/// Read-only set of certificates the verifiers trust.
///
/// Safe to share across concurrently running verifiers.
#[derive(Debug, Clone, Default)]
pub struct TrustAnchors {
    aws: HashMap<String, X509>,
    azure_root: Option<X509>,
}

impl TrustAnchors {
    /// The bundle embedded in the binary, parsed on first use.
    pub fn bundled() -> Arc<TrustAnchors> {
        BUNDLED
            .get_or_init(|| {
                let mut anchors = TrustAnchors::default();
                for (region, pem) in AWS_REGION_CERTS {
                    match X509::from_pem(pem.as_bytes()) {
                        Ok(cert) => {
                            anchors.aws.insert(region.to_string(), cert);
                        }
                        Err(e) => {
                            tracing::warn!(%region, error = %e, "skipping unparseable AWS region certificate")
                        }
                    }
                }
                match X509::from_pem(AZURE_ROOT_PEM.as_bytes()) {
                    Ok(cert) => anchors.azure_root = Some(cert),
                    Err(e) => tracing::warn!(error = %e, "embedded Azure root is unparseable"),
                }
                Arc::new(anchors)
            })
            .clone()
    }

    /// Load a bundle laid out as `<dir>/aws/<region>.pem` and `<dir>/azure/<root>.pem`.
    ///
    /// Either subdirectory may be absent. If `azure/` holds several PEM files
    /// the first one in name order is used.
    pub fn from_dir(dir: &Path) -> Result<Self, VerifyError> {
        let mut anchors = TrustAnchors::default();

        for (stem, pem) in read_pem_files(&dir.join("aws"))? {
            anchors.aws.insert(stem, X509::from_pem(&pem)?);
        }
        if let Some((_, pem)) = read_pem_files(&dir.join("azure"))?.into_iter().next() {
            anchors.azure_root = Some(X509::from_pem(&pem)?);
        }

        Ok(anchors)
    }

    /// Add or replace the certificate for an AWS region.
    pub fn with_aws_region(mut self, region: &str, cert: X509) -> Self {
        self.aws.insert(region.to_string(), cert);
        self
    }

    /// Set the Azure root.
    pub fn with_azure_root(mut self, cert: X509) -> Self {
        self.azure_root = Some(cert);
        self
    }

    /// The signing certificate AWS uses in `region`.
    pub fn aws_region(&self, region: &str) -> Option<&X509> {
        self.aws.get(region)
    }

    /// Regions with a known certificate.
    pub fn aws_regions(&self) -> impl Iterator<Item = &str> {
        self.aws.keys().map(String::as_str)
    }

    pub fn azure_root(&self) -> Option<&X509> {
        self.azure_root.as_ref()
    }
}

/// `(file stem, contents)` of every `*.pem` in `dir`, sorted by name.
fn read_pem_files(dir: &Path) -> Result<Vec<(String, Vec<u8>)>, VerifyError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("pem") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        files.push((stem.to_string(), fs::read(&path)?));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}
