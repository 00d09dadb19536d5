//! Cloud provider enumeration and detection results.

use std::fmt;

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudProvider {
    /// Amazon Web Services
    Aws,
    /// Google Cloud Platform
    Gcp,
    /// Microsoft Azure
    Azure,
}

impl CloudProvider {
    /// All providers, in no particular priority.
    pub const ALL: [CloudProvider; 3] = [CloudProvider::Aws, CloudProvider::Gcp, CloudProvider::Azure];
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudProvider::Aws => write!(f, "AWS"),
            CloudProvider::Gcp => write!(f, "GCP"),
            CloudProvider::Azure => write!(f, "Azure"),
        }
    }
}

impl std::str::FromStr for CloudProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "gcp" => Ok(CloudProvider::Gcp),
            "azure" => Ok(CloudProvider::Azure),
            _ => Err(format!(
                "unknown provider: {} (expected aws, gcp, or azure)",
                s
            )),
        }
    }
}

/// Result of a single verifier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub provider: CloudProvider,
    pub detected: bool,
}

/// Final answer of a detection race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// A provider's identity document verified.
    Detected(CloudProvider),
    /// Every verifier finished and none succeeded.
    NotDetected,
    /// The deadline elapsed before any verifier succeeded.
    Timeout,
}

impl Detection {
    /// Whether a provider was detected.
    pub fn is_detected(&self) -> bool {
        matches!(self, Detection::Detected(_))
    }

    /// The detected provider, if any.
    pub fn provider(&self) -> Option<CloudProvider> {
        match self {
            Detection::Detected(provider) => Some(*provider),
            _ => None,
        }
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detection::Detected(provider) => provider.fmt(f),
            Detection::NotDetected => write!(f, "Not Detected"),
            Detection::Timeout => write!(f, "Timeout"),
        }
    }
}

impl From<Detection> for (bool, String) {
    fn from(detection: Detection) -> Self {
        (detection.is_detected(), detection.to_string())
    }
}
