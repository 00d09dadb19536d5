//! Endpoint and timing configuration for the verifiers.

use std::collections::BTreeMap;
use std::time::Duration;

/// Default timeout for a single metadata request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for downloading a certificate from a public PKI host.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for a whole detection race.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Default cap on any response body.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 100 * 1024;

/// AWS and Azure instance metadata service (link-local address).
pub const DEFAULT_LINK_LOCAL_URL: &str = "http://169.254.169.254";

/// GCP metadata server.
pub const DEFAULT_GCP_URL: &str = "http://metadata";

/// Google's published OAuth2 signing keys.
pub const DEFAULT_GCP_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Intermediate authorities Azure may sign the attested document with.
///
/// Source: <https://www.microsoft.com/pkiops/docs/repository.htm>
const AZURE_INTERMEDIATES: &[(&str, &str)] = &[
    (
        "Microsoft Azure TLS Issuing CA 01",
        "https://www.microsoft.com/pki/certs/Microsoft%20Azure%20TLS%20Issuing%20CA%2001.cer",
    ),
    (
        "Microsoft Azure TLS Issuing CA 02",
        "https://www.microsoft.com/pki/certs/Microsoft%20Azure%20TLS%20Issuing%20CA%2002.cer",
    ),
    (
        "Microsoft Azure TLS Issuing CA 03",
        "https://www.microsoft.com/pkiops/certs/Microsoft%20Azure%20TLS%20Issuing%20CA%2005.cer",
    ),
    (
        "Microsoft Azure TLS Issuing CA 04",
        "https://www.microsoft.com/pkiops/certs/Microsoft%20Azure%20TLS%20Issuing%20CA%2006.cer",
    ),
    (
        "Microsoft Azure TLS Issuing CA 05",
        "http://www.microsoft.com/pkiops/certs/Microsoft%20Azure%20TLS%20Issuing%20CA%2005.cer",
    ),
    (
        "Microsoft Azure TLS Issuing CA 06",
        "http://www.microsoft.com/pkiops/certs/Microsoft%20Azure%20TLS%20Issuing%20CA%2006.cer",
    ),
];

/// Environment variable overriding the AWS metadata endpoint.
pub const AWS_ENDPOINT_ENV: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";

/// Environment variable overriding the GCP metadata host (host only, no scheme).
pub const GCP_HOST_ENV: &str = "GCE_METADATA_HOST";

/// Environment variable overriding the Azure metadata endpoint.
pub const AZURE_ENDPOINT_ENV: &str = "CLOUD_VERIFY_AZURE_ENDPOINT";

/// Environment variable overriding the detection deadline, in milliseconds.
pub const DEADLINE_ENV: &str = "CLOUD_VERIFY_TIMEOUT_MS";

/// Configuration shared by all verifiers.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use cloud_verify::VerifierConfig;
///
/// let config = VerifierConfig::default()
///     .with_aws_base_url("http://localhost:8080")
///     .with_deadline(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub aws_base_url: String,
    pub azure_base_url: String,
    pub gcp_base_url: String,
    pub gcp_certs_url: String,
    /// Named intermediate authorities and their download URLs.
    pub azure_intermediates: BTreeMap<String, String>,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
    pub max_response_size: usize,
    pub deadline: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            aws_base_url: DEFAULT_LINK_LOCAL_URL.to_string(),
            azure_base_url: DEFAULT_LINK_LOCAL_URL.to_string(),
            gcp_base_url: DEFAULT_GCP_URL.to_string(),
            gcp_certs_url: DEFAULT_GCP_CERTS_URL.to_string(),
            azure_intermediates: AZURE_INTERMEDIATES
                .iter()
                .map(|(name, url)| (name.to_string(), url.to_string()))
                .collect(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

impl VerifierConfig {
    /// Default configuration with overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Default configuration with overrides from `lookup`.
    ///
    /// Unparseable values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(AWS_ENDPOINT_ENV).filter(|v| !v.is_empty()) {
            config.aws_base_url = url;
        }
        if let Some(host) = lookup(GCP_HOST_ENV).filter(|v| !v.is_empty()) {
            config.gcp_base_url = format!("http://{}", host);
        }
        if let Some(url) = lookup(AZURE_ENDPOINT_ENV).filter(|v| !v.is_empty()) {
            config.azure_base_url = url;
        }
        if let Some(ms) = lookup(DEADLINE_ENV).and_then(|v| v.parse::<u64>().ok()) {
            config.deadline = Duration::from_millis(ms);
        }

        config
    }

    pub fn with_aws_base_url(mut self, url: &str) -> Self {
        self.aws_base_url = url.to_string();
        self
    }

    pub fn with_azure_base_url(mut self, url: &str) -> Self {
        self.azure_base_url = url.to_string();
        self
    }

    pub fn with_gcp_base_url(mut self, url: &str) -> Self {
        self.gcp_base_url = url.to_string();
        self
    }

    pub fn with_gcp_certs_url(mut self, url: &str) -> Self {
        self.gcp_certs_url = url.to_string();
        self
    }

    /// Replace the Azure intermediate authority table.
    pub fn with_azure_intermediates<I, K, V>(mut self, intermediates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.azure_intermediates = intermediates
            .into_iter()
            .map(|(name, url)| (name.into(), url.into()))
            .collect();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_max_response_size(mut self, max_size: usize) -> Self {
        self.max_response_size = max_size;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}
