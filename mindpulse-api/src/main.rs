//! mindpulse-api - Main entry point
//!
//! Loads the classifier artifact, wires the Gemini client and serves
//! `/predict`, `/voice_analysis` and `/health`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use mindpulse_api::prediction::{load_classifier, FitnessScorer, PredictionService};
use mindpulse_api::voice::{GeminiClient, RetryPolicy, VoiceAnalysisService};
use mindpulse_api::AppState;
use mindpulse_common::config::{CliOverrides, ServiceConfig};
use mindpulse_common::logging;

/// Command-line arguments for mindpulse-api
#[derive(Parser, Debug)]
#[command(name = "mindpulse-api")]
#[command(about = "Mental fitness scoring and voice analysis service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MINDPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "MINDPULSE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MINDPULSE_PORT")]
    port: Option<u16>,

    /// Classifier artifact (JSON)
    #[arg(short, long, env = "MINDPULSE_MODEL_PATH")]
    model_path: Option<PathBuf>,
}

impl From<Args> for CliOverrides {
    fn from(args: Args) -> Self {
        CliOverrides {
            config_file: args.config,
            host: args.host,
            port: args.port,
            model_path: args.model_path,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let overrides: CliOverrides = Args::parse().into();
    let config = logging::with_bootstrap_logging(|| ServiceConfig::resolve(&overrides))
        .context("Failed to load configuration")?;

    logging::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    info!(
        "Starting mindpulse-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Classifier artifact: {}", config.model_path.display());
    info!(
        model = %config.gemini.model,
        timeout_secs = config.gemini.timeout.as_secs(),
        max_attempts = config.gemini.max_attempts,
        "Voice analysis backend"
    );

    let classifier = match load_classifier(&config.model_path) {
        Ok(classifier) => classifier,
        Err(e) => {
            error!("Cannot start without a classifier: {}", e);
            return Err(anyhow::Error::new(e).context("Failed to load classifier"));
        }
    };
    let prediction = PredictionService::new(FitnessScorer::new(classifier));

    if config.gemini.api_key.is_none() {
        warn!(
            "No Gemini API key configured (GEMINI_API_KEY1, GEMINI_API_KEY or [gemini].api_key); \
             voice analysis will report errors"
        );
    }
    let gemini = GeminiClient::new(&config.gemini).context("Failed to create Gemini client")?;
    let voice = VoiceAnalysisService::new(Arc::new(gemini), RetryPolicy::from_settings(&config.gemini));

    let state = AppState::new(prediction, voice);
    let app = mindpulse_api::build_router(state, config.max_upload_bytes);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;

    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
