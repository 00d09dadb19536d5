//! Race of all provider verifiers under a global deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::provider::{CloudProvider, Detection, VerificationOutcome};
use crate::providers::verifier_for;
use crate::trust::TrustAnchors;
use crate::verifier::Verifier;

/// Runs verifiers concurrently and reports the first one that succeeds.
///
/// # Example
///
/// ```ignore
/// use cloud_verify::{CloudDetector, TrustAnchors, VerifierConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), cloud_verify::VerifyError> {
///     let detector = CloudDetector::new(&VerifierConfig::default(), TrustAnchors::bundled())?;
///     println!("{}", detector.detect().await);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CloudDetector {
    verifiers: Vec<Arc<dyn Verifier>>,
    deadline: Duration,
}

impl CloudDetector {
    /// A detector racing the AWS, GCP, and Azure verifiers.
    pub fn new(config: &VerifierConfig, anchors: Arc<TrustAnchors>) -> Result<Self, VerifyError> {
        let verifiers = CloudProvider::ALL
            .iter()
            .map(|provider| verifier_for(*provider, config, Arc::clone(&anchors)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::with_verifiers(verifiers, config.deadline))
    }

    /// A detector racing an arbitrary set of verifiers.
    pub fn with_verifiers(verifiers: Vec<Arc<dyn Verifier>>, deadline: Duration) -> Self {
        Self {
            verifiers,
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run every verifier and return the first positive outcome.
    ///
    /// There is no priority among providers: whichever verifier succeeds
    /// first wins. Returns [`Detection::NotDetected`] as soon as all
    /// verifiers have finished negatively, and [`Detection::Timeout`] if
    /// the deadline passes first. Verifiers still running when this
    /// returns are aborted.
    pub async fn detect(&self) -> Detection {
        let deadline = Instant::now() + self.deadline;

        let mut tasks = JoinSet::new();
        for verifier in &self.verifiers {
            let verifier = Arc::clone(verifier);
            tasks.spawn(async move {
                VerificationOutcome {
                    provider: verifier.provider(),
                    detected: verifier.verify().await,
                }
            });
        }

        let detection = loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Err(_) => break Detection::Timeout,
                // Set exhausted: every outcome has been consumed
                Ok(None) => break Detection::NotDetected,
                Ok(Some(Ok(outcome))) if outcome.detected => {
                    break Detection::Detected(outcome.provider)
                }
                Ok(Some(Ok(outcome))) => {
                    tracing::debug!(provider = %outcome.provider, "not detected");
                }
                Ok(Some(Err(e))) => {
                    tracing::debug!(error = %e, "verifier task failed");
                }
            }
        };

        tasks.abort_all();

        match detection {
            Detection::Detected(provider) => tracing::info!(%provider, "cloud provider detected"),
            _ => tracing::debug!(result = %detection, "no cloud provider detected"),
        }
        detection
    }
}

impl std::fmt::Debug for CloudDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudDetector")
            .field(
                "providers",
                &self.verifiers.iter().map(|v| v.provider()).collect::<Vec<_>>(),
            )
            .field("deadline", &self.deadline)
            .finish()
    }
}
