//! Signal Fusion runner
//!
//! Loads settings from `SIGNAL_FUSION_*`, scans the market windows in the
//! fixture file once and logs one summary line per symbol.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use signal_fusion::{
    FusionEngine, IndicatorPhaseProvider, MetricsCollector, ScanOutcome, ScanRequest, Scanner,
    Settings,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting Signal Fusion...");

    let settings = Settings::from_env().context("Failed to read SIGNAL_FUSION_* settings")?;
    let config = settings
        .fusion_config()
        .with_context(|| format!("Failed to load fusion config {:?}", settings.config_path))?;
    info!(
        "✓ Fusion tables loaded ({} phases, {} bonus rules)",
        config.phases.entries.len(),
        config.calibration.bonuses.len()
    );

    let mut provider = IndicatorPhaseProvider::new();
    if let Some(seed) = settings.jitter_seed {
        provider = provider.with_jitter(seed, settings.jitter_amplitude);
        info!("✓ Phase jitter enabled (seed {}, ±{})", seed, settings.jitter_amplitude);
    }

    let requests = load_fixture(&settings.fixture_path)?;
    info!("✓ Loaded {} market windows from {}", requests.len(), settings.fixture_path);

    let scanner = Arc::new(
        Scanner::new(
            Arc::new(FusionEngine::new(config)),
            Arc::new(provider),
            MetricsCollector::new(),
        )
        .with_provider_timeout(Duration::from_millis(settings.provider_timeout_ms)),
    );

    for outcome in scanner.scan(&requests).await {
        match outcome {
            ScanOutcome::Call(call) => info!("{}", call.summary_line()),
            ScanOutcome::Skipped { symbol } => warn!("{}: skipped, scan already running", symbol),
            ScanOutcome::Failed { symbol, error } => warn!("{}: no call ({})", symbol, error),
        }
    }

    let snapshot = scanner.metrics().snapshot().await;
    info!("Metrics: {}", serde_json::to_string(&snapshot)?);

    Ok(())
}

fn load_fixture(path: &str) -> anyhow::Result<Vec<ScanRequest>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid fixture {}", path))
}
