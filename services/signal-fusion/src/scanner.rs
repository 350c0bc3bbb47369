//! Scan coordinator
//!
//! Runs one fusion per symbol. Different symbols proceed concurrently; a
//! second request for a symbol already in flight is skipped, not queued.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::engine::FusionEngine;
use crate::observability::{metrics, Logger, MetricsCollector};
use crate::provider::{PhaseScoreProvider, ProviderError};
use crate::types::{Observation, TradingCall};

/// One symbol's market window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub symbol: String,
    pub window: Vec<Observation>,
}

/// Result of scanning one symbol
#[derive(Debug)]
pub enum ScanOutcome {
    Call(Box<TradingCall>),
    /// Another scan of the same symbol was still running
    Skipped { symbol: String },
    Failed { symbol: String, error: String },
}

impl ScanOutcome {
    pub fn call(&self) -> Option<&TradingCall> {
        match self {
            ScanOutcome::Call(call) => Some(call.as_ref()),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            ScanOutcome::Call(call) => &call.symbol,
            ScanOutcome::Skipped { symbol } | ScanOutcome::Failed { symbol, .. } => symbol,
        }
    }
}

/// Marks a symbol busy until dropped
struct InFlight {
    symbols: Arc<Mutex<HashSet<String>>>,
    symbol: String,
}

impl InFlight {
    fn acquire(symbols: &Arc<Mutex<HashSet<String>>>, symbol: &str) -> Option<Self> {
        let mut busy = match symbols.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !busy.insert(symbol.to_string()) {
            return None;
        }
        Some(Self {
            symbols: Arc::clone(symbols),
            symbol: symbol.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut busy = match self.symbols.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        busy.remove(&self.symbol);
    }
}

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordinates provider calls, fusion and metrics
pub struct Scanner {
    engine: Arc<FusionEngine>,
    provider: Arc<dyn PhaseScoreProvider>,
    metrics: MetricsCollector,
    in_flight: Arc<Mutex<HashSet<String>>>,
    provider_timeout: Duration,
}

impl Scanner {
    pub fn new(
        engine: Arc<FusionEngine>,
        provider: Arc<dyn PhaseScoreProvider>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            engine,
            provider,
            metrics,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Bound how long a provider may take before the scan degrades
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &Arc<FusionEngine> {
        &self.engine
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Scan a single symbol
    pub async fn scan_symbol(&self, symbol: &str, window: &[Observation]) -> ScanOutcome {
        let _guard = match InFlight::acquire(&self.in_flight, symbol) {
            Some(guard) => guard,
            None => {
                warn!(symbol = %symbol, "Scan already in flight, skipping");
                self.metrics.increment(metrics::SCANS_SKIPPED, 1).await;
                return ScanOutcome::Skipped {
                    symbol: symbol.to_string(),
                };
            }
        };

        let started = Instant::now();
        self.metrics.increment(metrics::SCANS_STARTED, 1).await;
        Logger::scan_event(symbol, "started", self.provider.name());

        let scored = tokio::time::timeout(self.provider_timeout, self.provider.score(symbol, window))
            .await
            .unwrap_or_else(|_| {
                Err(ProviderError::Timeout(self.provider_timeout.as_millis() as u64))
            });
        let phases = match scored {
            Ok(phases) => {
                self.metrics
                    .increment(metrics::PHASES_RECEIVED, phases.len() as u64)
                    .await;
                phases
            }
            Err(e) => {
                let error = e.to_string();
                Logger::event(
                    tracing::Level::WARN,
                    "scanner",
                    "provider_failed",
                    &[("symbol", symbol), ("provider", self.provider.name()), ("error", error.as_str())],
                );
                self.metrics.increment(metrics::PROVIDER_FAILURES, 1).await;
                Vec::new()
            }
        };

        let outcome = match self.engine.evaluate(symbol, window, &phases) {
            Ok(call) => {
                self.metrics.record_call(&call).await;
                Logger::fusion_event(&call);
                ScanOutcome::Call(Box::new(call))
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Fusion failed");
                self.metrics.increment(metrics::CALLS_FAILED, 1).await;
                ScanOutcome::Failed {
                    symbol: symbol.to_string(),
                    error: e.to_string(),
                }
            }
        };

        self.metrics
            .histogram(metrics::SCAN_DURATION_MS, started.elapsed().as_secs_f64() * 1000.0)
            .await;
        outcome
    }

    /// Scan a batch of symbols, one tokio task per request
    ///
    /// Outcomes come back in request order.
    pub async fn scan(self: &Arc<Self>, requests: &[ScanRequest]) -> Vec<ScanOutcome> {
        info!("Scanning {} symbols", requests.len());

        let handles = requests.iter().cloned().map(|req| {
            let scanner = Arc::clone(self);
            tokio::spawn(async move { scanner.scan_symbol(&req.symbol, &req.window).await })
        });
        let outcomes: Vec<ScanOutcome> = futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(requests.iter())
            .map(|(joined, req)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(symbol = %req.symbol, error = %e, "Scan task failed");
                    ScanOutcome::Failed {
                        symbol: req.symbol.clone(),
                        error: e.to_string(),
                    }
                }
            })
            .collect();

        let calls = outcomes.iter().filter(|o| o.call().is_some()).count();
        info!("Scan complete: {} calls from {} symbols", calls, requests.len());
        outcomes
    }
}
