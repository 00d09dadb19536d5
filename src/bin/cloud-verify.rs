//! CLI binary for cloud-verify crate.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use cloud_verify::providers::verifier_for;
use cloud_verify::{CloudDetector, CloudProvider, Detection, TrustAnchors, VerifierConfig, VerifyError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloud-verify")]
#[command(
    author,
    version,
    about = "Detect the cloud provider by verifying signed instance identity"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Overall deadline in milliseconds
    #[arg(short, long, global = true)]
    timeout_ms: Option<u64>,

    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log verification steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Race all providers (default)
    Detect,

    /// Verify a single provider
    Verify {
        /// aws, gcp, or azure
        provider: CloudProvider,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(detection) => {
            print_detection(detection, cli.json);
            if detection.is_detected() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("cloud_verify=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<Detection, VerifyError> {
    let mut config = VerifierConfig::from_env();
    if let Some(ms) = cli.timeout_ms {
        config = config.with_deadline(Duration::from_millis(ms));
    }
    let anchors = TrustAnchors::bundled();

    let detector = match cli.command {
        None | Some(Commands::Detect) => CloudDetector::new(&config, anchors)?,
        Some(Commands::Verify { provider }) => CloudDetector::with_verifiers(
            vec![verifier_for(provider, &config, anchors)?],
            config.deadline,
        ),
    };

    Ok(detector.detect().await)
}

fn print_detection(detection: Detection, json: bool) {
    if json {
        let value = serde_json::json!({
            "detected": detection.is_detected(),
            "provider": detection.to_string(),
        });
        println!("{}", value);
    } else if detection.is_detected() {
        println!("Running on Cloud ({})", detection);
    } else {
        println!("Not running on Cloud ({})", detection);
    }
}
