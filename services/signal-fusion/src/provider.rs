//! Phase score providers
//!
//! The engine only consumes `PhaseScore`s; where they come from is behind
//! [`PhaseScoreProvider`]. [`IndicatorPhaseProvider`] derives the five
//! catalogue phases from the observation window itself.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::indicators::Series;
use crate::types::{Observation, PhaseScore};

/// Error types for phase providers
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("No observations for {0}")]
    EmptyWindow(String),

    #[error("Provider timed out after {0}ms")]
    Timeout(u64),
}

/// Trait for phase score sources
#[async_trait::async_trait]
pub trait PhaseScoreProvider: Send + Sync {
    /// Score every phase this provider knows for one symbol
    async fn score(
        &self,
        symbol: &str,
        window: &[Observation],
    ) -> Result<Vec<PhaseScore>, ProviderError>;

    /// Provider name
    fn name(&self) -> &str;
}

pub const TECHNICAL: &str = "technical";
pub const MOMENTUM: &str = "momentum";
pub const SMART_MONEY: &str = "smart_money";
pub const PORTFOLIO_RISK: &str = "portfolio_risk";
pub const AI_NEURAL: &str = "ai_neural";

/// Deterministic indicator-driven provider
#[derive(Debug, Clone, Default)]
pub struct IndicatorPhaseProvider {
    jitter: Option<Jitter>,
}

#[derive(Debug, Clone, Copy)]
struct Jitter {
    seed: u64,
    amplitude: f64,
}

impl IndicatorPhaseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add reproducible noise of up to `amplitude` points per phase
    ///
    /// The stream is keyed on the seed and the symbol, so concurrent scans
    /// see the same values regardless of ordering.
    pub fn with_jitter(mut self, seed: u64, amplitude: f64) -> Self {
        self.jitter = Some(Jitter {
            seed,
            amplitude: amplitude.abs(),
        });
        self
    }

    /// Compute all five phases synchronously
    pub fn score_window(&self, symbol: &str, window: &[Observation]) -> Vec<PhaseScore> {
        let series = Series::from_observations(window);

        let mut phases = vec![
            technical_phase(&series),
            momentum_phase(&series),
            smart_money_phase(&series),
            portfolio_risk_phase(&series),
            ai_neural_phase(&series),
        ];

        if let Some(jitter) = self.jitter {
            let mut rng = StdRng::seed_from_u64(jitter.seed ^ symbol_key(symbol));
            for phase in &mut phases {
                if jitter.amplitude > 0.0 {
                    let noise: f64 = rng.gen_range(-jitter.amplitude..=jitter.amplitude);
                    phase.score = (phase.score + noise).clamp(0.0, 100.0);
                    phase.direction = crate::types::PhaseDirection::from_score(phase.score);
                }
            }
        }

        phases
    }
}

#[async_trait::async_trait]
impl PhaseScoreProvider for IndicatorPhaseProvider {
    async fn score(
        &self,
        symbol: &str,
        window: &[Observation],
    ) -> Result<Vec<PhaseScore>, ProviderError> {
        if window.is_empty() {
            return Err(ProviderError::EmptyWindow(symbol.to_string()));
        }
        Ok(self.score_window(symbol, window))
    }

    fn name(&self) -> &str {
        "indicators"
    }
}

/// FNV-1a over the symbol bytes
fn symbol_key(symbol: &str) -> u64 {
    symbol.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

/// SMA12/SMA26 spread
fn technical_phase(series: &Series) -> PhaseScore {
    match (series.sma(12), series.sma(26)) {
        (Some(fast), Some(slow)) if slow > 0.0 => {
            let spread = (fast - slow) / slow;
            let score = 50.0 + 40.0 * (spread * 50.0).tanh();
            PhaseScore::from_score(
                TECHNICAL,
                score,
                format!("SMA crossover: fast({:.2}) vs slow({:.2})", fast, slow),
            )
        }
        _ => PhaseScore::from_score(TECHNICAL, 50.0, "Not enough bars for SMA26"),
    }
}

/// RSI read directly as a score
fn momentum_phase(series: &Series) -> PhaseScore {
    match series.rsi(14) {
        Some(rsi) => PhaseScore::from_score(MOMENTUM, rsi, format!("RSI(14) at {:.1}", rsi)),
        None => PhaseScore::from_score(MOMENTUM, 50.0, "Not enough bars for RSI"),
    }
}

/// Volume-weighted direction of the last 20 bars
fn smart_money_phase(series: &Series) -> PhaseScore {
    let n = series.len();
    if n < 2 {
        return PhaseScore::from_score(SMART_MONEY, 50.0, "No price changes to weigh");
    }

    let start = n.saturating_sub(20).max(1);
    let mut signed = 0.0;
    let mut total = 0.0;
    for i in start..n {
        let change = series.closes[i] - series.closes[i - 1];
        let volume = series.volumes[i];
        total += volume;
        if change > 0.0 {
            signed += volume;
        } else if change < 0.0 {
            signed -= volume;
        }
    }

    let pressure = if total > 0.0 { signed / total } else { 0.0 };
    PhaseScore::from_score(
        SMART_MONEY,
        50.0 + 45.0 * pressure,
        format!("Volume pressure {:+.2}", pressure),
    )
}

/// Calmer windows score higher
fn portfolio_risk_phase(series: &Series) -> PhaseScore {
    let volatility = series.volatility();
    let score = (90.0 - volatility * 1000.0).clamp(10.0, 90.0);
    PhaseScore::from_score(
        PORTFOLIO_RISK,
        score,
        format!("Return volatility {:.4}", volatility),
    )
}

/// Three-layer tanh network over trend, volatility and momentum
fn ai_neural_phase(series: &Series) -> PhaseScore {
    let trend = match (series.closes.first(), series.closes.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => (last - first) / first,
        _ => 0.0,
    };
    let volatility = series.volatility();
    let momentum = trend * (1.0 + volatility);

    let layer1 = (trend * 10.0 + volatility * 5.0).tanh();
    let layer2 = (layer1 * 3.0 + momentum * 2.0).tanh();
    let output = (layer2 * 2.0 + 0.5).tanh();
    let score = (output + 1.0) * 50.0;

    // Confidence in the network's read grows with distance from neutral
    let accuracy = 0.60 + (score - 50.0).abs() * 0.008;

    PhaseScore::from_score(
        AI_NEURAL,
        score,
        format!("Neural output {:.3} (trend {:+.4})", output, trend),
    )
    .with_accuracy(accuracy.min(0.95))
}
