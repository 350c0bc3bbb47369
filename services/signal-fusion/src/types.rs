//! Fusion types - market observations, phase scores and the TradingCall

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// One price/volume observation from the market data collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
}

impl Observation {
    /// Observation whose high/low collapse onto the traded price
    pub fn flat(timestamp: DateTime<Utc>, price: Decimal, volume: Decimal) -> Self {
        Self {
            timestamp,
            price,
            high: price,
            low: price,
            volume,
        }
    }
}

/// Directional opinion reported by a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseDirection {
    Up,
    Down,
    Neutral,
}

impl PhaseDirection {
    /// Direction implied by a score relative to the 50 midpoint
    pub fn from_score(score: f64) -> Self {
        if score > 50.0 {
            PhaseDirection::Up
        } else if score < 50.0 {
            PhaseDirection::Down
        } else {
            PhaseDirection::Neutral
        }
    }
}

/// Score produced by one analysis phase for one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseScore {
    pub phase_name: String,
    /// 0 - 100
    pub score: f64,
    pub direction: PhaseDirection,
    pub rationale: String,
    /// Phase's own accuracy proxy (0.0 - 1.0), derived from the score when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl PhaseScore {
    pub fn new(
        phase_name: impl Into<String>,
        score: f64,
        direction: PhaseDirection,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            phase_name: phase_name.into(),
            score,
            direction,
            rationale: rationale.into(),
            accuracy: None,
        }
    }

    /// Phase score whose direction follows the 50 midpoint
    pub fn from_score(
        phase_name: impl Into<String>,
        score: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self::new(phase_name, score, PhaseDirection::from_score(score), rationale)
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Accuracy proxy used by grading: 60% floor plus conviction away from 50
    pub fn accuracy_proxy(&self) -> f64 {
        self.accuracy
            .unwrap_or_else(|| 0.60 + (self.score - 50.0).abs() * 0.008)
    }
}

/// Trade direction of the fused signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Hold => "HOLD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Direction::Buy),
            "SELL" => Some(Direction::Sell),
            "HOLD" => Some(Direction::Hold),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market regime label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Trending,
    TrendingVolatile,
    Sideways,
    SidewaysLowVol,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Trending => "TRENDING",
            Regime::TrendingVolatile => "TRENDING_VOLATILE",
            Regime::Sideways => "SIDEWAYS",
            Regime::SidewaysLowVol => "SIDEWAYS_LOW_VOL",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Regime::Trending => "Clear directional trend",
            Regime::TrendingVolatile => "Strong trend with high volatility",
            Regime::Sideways => "Range-bound market",
            Regime::SidewaysLowVol => "Range-bound with low volatility",
        }
    }

    pub fn is_trending(&self) -> bool {
        matches!(self, Regime::Trending | Regime::TrendingVolatile)
    }
}

/// Regime and volume context derived from the observation window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCondition {
    pub regime: Regime,
    pub volume_ratio: f64,
    pub trend_strength: f64,
    pub volatility: f64,
    /// True when the window was too short and fallback values were used
    pub insufficient_data: bool,
}

impl MarketCondition {
    pub fn description(&self) -> &'static str {
        if self.insufficient_data {
            "Insufficient data"
        } else {
            self.regime.description()
        }
    }
}

/// Weighted ensemble output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsemblePrediction {
    /// 0 - 100
    pub composite_score: f64,
    pub direction: Direction,
    /// Each phase's own vote, keyed by the direction it implies
    pub signal_counts: BTreeMap<Direction, usize>,
    /// Number of phases that took part
    pub phase_count: usize,
}

impl EnsemblePrediction {
    /// Distance of the composite from neutral, scaled to 0.0 - 1.0
    pub fn conviction(&self) -> f64 {
        ((self.composite_score - 50.0).abs() * 2.0 / 100.0).min(1.0)
    }

    pub fn votes(&self, direction: Direction) -> usize {
        self.signal_counts.get(&direction).copied().unwrap_or(0)
    }
}

/// Consensus quality band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusQuality {
    Strong,
    Moderate,
    Weak,
}

impl ConsensusQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusQuality::Strong => "STRONG",
            ConsensusQuality::Moderate => "MODERATE",
            ConsensusQuality::Weak => "WEAK",
        }
    }
}

/// Agreement between phase votes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// 0.0 - 1.0
    pub agreement_ratio: f64,
    pub quality: ConsensusQuality,
    pub passes_filter: bool,
}

impl ConsensusResult {
    pub fn reasoning(&self) -> String {
        format!(
            "Consensus: {} ({:.1}% agreement)",
            self.quality.as_str(),
            self.agreement_ratio * 100.0
        )
    }
}

/// Output quality tier, ordered STANDARD < HIGH_GRADE < AI_GRADE
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    Standard,
    HighGrade,
    AiGrade,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Standard => "STANDARD",
            Grade::HighGrade => "HIGH_GRADE",
            Grade::AiGrade => "AI_GRADE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STANDARD" => Some(Grade::Standard),
            "HIGH_GRADE" => Some(Grade::HighGrade),
            "AI_GRADE" => Some(Grade::AiGrade),
            _ => None,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal strength prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Weak,
    Normal,
    Strong,
}

/// SELL strategy class, each with its own ATR multiplier row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SellStrategy {
    AggressiveSell,
    TrendFollowingSell,
    ResistanceSell,
    DivergenceSell,
    CautiousSell,
}

impl SellStrategy {
    pub const ALL: [SellStrategy; 5] = [
        SellStrategy::AggressiveSell,
        SellStrategy::TrendFollowingSell,
        SellStrategy::ResistanceSell,
        SellStrategy::DivergenceSell,
        SellStrategy::CautiousSell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SellStrategy::AggressiveSell => "AGGRESSIVE_SELL",
            SellStrategy::TrendFollowingSell => "TREND_FOLLOWING_SELL",
            SellStrategy::ResistanceSell => "RESISTANCE_SELL",
            SellStrategy::DivergenceSell => "DIVERGENCE_SELL",
            SellStrategy::CautiousSell => "CAUTIOUS_SELL",
        }
    }

    pub fn reasoning(&self) -> &'static str {
        match self {
            SellStrategy::AggressiveSell => {
                "Multiple strong bearish signals - immediate exit recommended"
            }
            SellStrategy::TrendFollowingSell => {
                "Downtrend confirmed with support break - follow trend"
            }
            SellStrategy::ResistanceSell => {
                "At resistance in sideways market - range trading opportunity"
            }
            SellStrategy::DivergenceSell => "Momentum divergence detected - early reversal signal",
            SellStrategy::CautiousSell => "Moderate bearish signals - partial exit or tight stop",
        }
    }
}

/// Target ladder and stop for a call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetLevels {
    pub target1: f64,
    pub target2: f64,
    pub target3: f64,
    pub stop_loss: f64,
    pub risk_reward: f64,
}

/// Terminal artifact of one engine invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingCall {
    pub call_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub strength: SignalStrength,
    pub final_confidence: f64,
    pub entry_price: f64,
    pub targets: TargetLevels,
    pub grade: Grade,
    pub per_phase_breakdown: Vec<PhaseScore>,
    pub ensemble: EnsemblePrediction,
    pub consensus: ConsensusResult,
    pub market_condition: MarketCondition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_strategy: Option<SellStrategy>,
    pub reasoning_summary: String,
    pub generated_at: DateTime<Utc>,
}

impl TradingCall {
    /// Signal label such as `STRONG_BUY`, `SELL` or `WEAK_HOLD`
    pub fn signal_label(&self) -> String {
        match self.strength {
            SignalStrength::Strong => format!("STRONG_{}", self.direction),
            SignalStrength::Normal => self.direction.to_string(),
            SignalStrength::Weak => format!("WEAK_{}", self.direction),
        }
    }

    /// One-line summary for the transport
    pub fn summary_line(&self) -> String {
        crate::summary::format_summary(self)
    }

    pub fn is_actionable(&self, min_grade: Grade) -> bool {
        self.direction != Direction::Hold && self.grade >= min_grade
    }
}

/// Error types for the fusion engine
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    #[error("Degenerate targets: {0}")]
    DegenerateTargets(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for fusion operations
pub type Result<T> = std::result::Result<T, FusionError>;
