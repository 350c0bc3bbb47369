//! Signal Fusion - combines per-phase analysis scores into graded trading calls
//!
//! Pipeline per symbol:
//! 1. Phase scores from a [`PhaseScoreProvider`]
//! 2. Market regime from the observation window
//! 3. Weighted ensemble, consensus check and confidence calibration
//! 4. Grade, target ladder and stop-loss on a [`TradingCall`]

pub mod calibration;
pub mod config;
pub mod engine;
pub mod observability;
pub mod provider;
pub mod scanner;
pub mod summary;
pub mod types;


pub use calibration::AccuracyTracker;
pub use config::{ConfigError, FusionConfig, Settings};
pub use engine::FusionEngine;
pub use observability::{Logger, MetricsCollector};
pub use provider::{IndicatorPhaseProvider, PhaseScoreProvider, ProviderError};
pub use scanner::{ScanOutcome, ScanRequest, Scanner};
pub use summary::{format_summary, parse_summary, ParsedSummary, SummaryError};
pub use types::*;
