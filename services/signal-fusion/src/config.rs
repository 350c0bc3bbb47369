//! Fusion configuration
//!
//! Every threshold, weight and table the engine reads lives here. Defaults
//! reproduce the production presets; YAML files may override any subset.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::SellStrategy;

/// Tolerance for tables that must sum to one
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Phase weights and historical accuracies
    #[serde(default)]
    pub phases: PhaseCatalogue,
    /// Market regime thresholds
    #[serde(default)]
    pub regime: RegimeThresholds,
    /// Direction band and label rules
    #[serde(default)]
    pub signal: SignalConfig,
    /// Consensus bands
    #[serde(default)]
    pub consensus: ConsensusConfig,
    /// Confidence adjustments
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Grade cut-offs
    #[serde(default)]
    pub grading: GradeConfig,
    /// Target and stop construction
    #[serde(default)]
    pub targets: TargetConfig,
}

impl FusionConfig {
    /// Parse a YAML document; missing sections fall back to defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: FusionConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Check table invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.phases.validate()?;

        if self.signal.buy_threshold <= self.signal.sell_threshold {
            return Err(ConfigError::Invalid(format!(
                "neutral band inverted: buy_threshold {} <= sell_threshold {}",
                self.signal.buy_threshold, self.signal.sell_threshold
            )));
        }

        if self.consensus.pass_ratio > self.consensus.strong_ratio {
            return Err(ConfigError::Invalid(format!(
                "consensus pass_ratio {} above strong_ratio {}",
                self.consensus.pass_ratio, self.consensus.strong_ratio
            )));
        }

        let cal = &self.calibration;
        if cal.confidence_floor >= cal.confidence_ceiling {
            return Err(ConfigError::Invalid(format!(
                "confidence floor {} must be below ceiling {}",
                cal.confidence_floor, cal.confidence_ceiling
            )));
        }
        if cal.confidence_floor < 0.0 || cal.confidence_ceiling > 100.0 {
            return Err(ConfigError::Invalid(
                "confidence bounds must lie within [0, 100]".to_string(),
            ));
        }

        let w = &self.targets.method_weights;
        let sum = w.fibonacci + w.pattern + w.volume + w.atr;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::Invalid(format!(
                "target method weights sum to {}, expected 1.0",
                sum
            )));
        }

        for strategy in SellStrategy::ALL {
            let row = self.targets.sell_strategies.row(strategy);
            if !(row.t1 > 0.0 && row.t1 < row.t2 && row.t2 < row.t3 && row.stop > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} multipliers must be positive and increasing",
                    strategy.as_str()
                )));
            }
        }

        Ok(())
    }
}

/// Weight and historical accuracy for one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEntry {
    pub name: String,
    pub weight: f64,
    /// 0.0 - 1.0
    pub accuracy: f64,
}

impl PhaseEntry {
    pub fn new(name: &str, weight: f64, accuracy: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
            accuracy,
        }
    }
}

/// Catalogue of known phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseCatalogue {
    #[serde(default = "default_phase_entries")]
    pub entries: Vec<PhaseEntry>,
    /// Weight used for phases missing from the catalogue
    #[serde(default = "default_unknown_weight")]
    pub default_weight: f64,
    /// Accuracy used for phases missing from the catalogue
    #[serde(default = "default_unknown_accuracy")]
    pub default_accuracy: f64,
}

impl Default for PhaseCatalogue {
    fn default() -> Self {
        Self {
            entries: default_phase_entries(),
            default_weight: default_unknown_weight(),
            default_accuracy: default_unknown_accuracy(),
        }
    }
}

impl PhaseCatalogue {
    pub fn get(&self, phase: &str) -> Option<&PhaseEntry> {
        self.entries.iter().find(|e| e.name == phase)
    }

    /// Weight × accuracy, falling back to the defaults for unknown phases
    pub fn effective_weight(&self, phase: &str) -> f64 {
        match self.get(phase) {
            Some(entry) => entry.weight * entry.accuracy,
            None => self.default_weight * self.default_accuracy,
        }
    }

    /// Historical accuracy, falling back to the default
    pub fn accuracy(&self, phase: &str) -> f64 {
        self.get(phase)
            .map(|e| e.accuracy)
            .unwrap_or(self.default_accuracy)
    }

    /// Replace one phase's accuracy, returning false if it is not catalogued
    pub fn set_accuracy(&mut self, phase: &str, accuracy: f64) -> bool {
        match self.entries.iter_mut().find(|e| e.name == phase) {
            Some(entry) => {
                entry.accuracy = accuracy;
                true
            }
            None => false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::Invalid("phase catalogue is empty".to_string()));
        }

        let sum: f64 = self.entries.iter().map(|e| e.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::Invalid(format!(
                "phase weights sum to {}, expected 1.0",
                sum
            )));
        }

        for entry in &self.entries {
            if entry.weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "phase {} has negative weight {}",
                    entry.name, entry.weight
                )));
            }
            if !(0.0..=1.0).contains(&entry.accuracy) {
                return Err(ConfigError::Invalid(format!(
                    "phase {} accuracy {} outside [0, 1]",
                    entry.name, entry.accuracy
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.default_accuracy) {
            return Err(ConfigError::Invalid(format!(
                "default accuracy {} outside [0, 1]",
                self.default_accuracy
            )));
        }

        Ok(())
    }
}

fn default_phase_entries() -> Vec<PhaseEntry> {
    vec![
        PhaseEntry::new("technical", 0.10, 0.82),
        PhaseEntry::new("momentum", 0.15, 0.78),
        PhaseEntry::new("smart_money", 0.25, 0.75),
        PhaseEntry::new("portfolio_risk", 0.25, 0.75),
        PhaseEntry::new("ai_neural", 0.25, 0.80),
    ]
}
fn default_unknown_weight() -> f64 { 0.2 }
fn default_unknown_accuracy() -> f64 { 0.7 }

/// Regime classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    /// Observations needed before classifying
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
    /// SMA period for trend strength
    #[serde(default = "default_trend_period")]
    pub trend_period: usize,
    /// Previous volumes averaged for the volume ratio
    #[serde(default = "default_volume_lookback")]
    pub volume_lookback: usize,
    #[serde(default = "default_volatile_trend")]
    pub volatile_trend: f64,
    #[serde(default = "default_volatile_volatility")]
    pub volatile_volatility: f64,
    #[serde(default = "default_trend")]
    pub trend: f64,
    #[serde(default = "default_low_volatility")]
    pub low_volatility: f64,
    /// Volatility reported when the window is too short
    #[serde(default = "default_fallback_volatility")]
    pub fallback_volatility: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            min_observations: default_min_observations(),
            trend_period: default_trend_period(),
            volume_lookback: default_volume_lookback(),
            volatile_trend: default_volatile_trend(),
            volatile_volatility: default_volatile_volatility(),
            trend: default_trend(),
            low_volatility: default_low_volatility(),
            fallback_volatility: default_fallback_volatility(),
        }
    }
}

fn default_min_observations() -> usize { 20 }
fn default_trend_period() -> usize { 20 }
fn default_volume_lookback() -> usize { 20 }
fn default_volatile_trend() -> f64 { 0.03 }
fn default_volatile_volatility() -> f64 { 0.25 }
fn default_trend() -> f64 { 0.02 }
fn default_low_volatility() -> f64 { 0.15 }
fn default_fallback_volatility() -> f64 { 0.02 }

/// Direction band and signal label rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// BUY strictly above this composite
    #[serde(default = "default_buy_threshold")]
    pub buy_threshold: f64,
    /// SELL strictly below this composite
    #[serde(default = "default_sell_threshold")]
    pub sell_threshold: f64,
    /// Conviction above which a passing consensus earns STRONG_
    #[serde(default = "default_strong_conviction")]
    pub strong_conviction: f64,
    /// Conviction below which the label is WEAK_ even with consensus
    #[serde(default = "default_weak_conviction_floor")]
    pub weak_conviction_floor: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            buy_threshold: default_buy_threshold(),
            sell_threshold: default_sell_threshold(),
            strong_conviction: default_strong_conviction(),
            weak_conviction_floor: default_weak_conviction_floor(),
        }
    }
}

fn default_buy_threshold() -> f64 { 65.0 }
fn default_sell_threshold() -> f64 { 35.0 }
fn default_strong_conviction() -> f64 { 0.7 }
fn default_weak_conviction_floor() -> f64 { 0.3 }

/// Consensus quality bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default = "default_strong_ratio")]
    pub strong_ratio: f64,
    /// Inclusive pass mark, also the MODERATE floor
    #[serde(default = "default_pass_ratio")]
    pub pass_ratio: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            strong_ratio: default_strong_ratio(),
            pass_ratio: default_pass_ratio(),
        }
    }
}

fn default_strong_ratio() -> f64 { 0.8 }
fn default_pass_ratio() -> f64 { 0.6 }

/// Additive confidence bonus keyed on one phase's score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusRule {
    pub name: String,
    pub phase: String,
    /// Fires when the phase score is strictly above this
    pub threshold: f64,
    pub points: f64,
}

impl BonusRule {
    pub fn new(name: &str, phase: &str, threshold: f64, points: f64) -> Self {
        Self {
            name: name.to_string(),
            phase: phase.to_string(),
            threshold,
            points,
        }
    }
}

/// Confidence calibration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_trending_multiplier")]
    pub trending_multiplier: f64,
    #[serde(default = "default_trending_volatile_multiplier")]
    pub trending_volatile_multiplier: f64,
    #[serde(default = "default_sideways_multiplier")]
    pub sideways_multiplier: f64,
    #[serde(default = "default_sideways_multiplier")]
    pub sideways_low_vol_multiplier: f64,
    /// Volume ratio above which the high-volume boost applies
    #[serde(default = "default_high_volume_ratio")]
    pub high_volume_ratio: f64,
    #[serde(default = "default_high_volume_multiplier")]
    pub high_volume_multiplier: f64,
    /// Volume ratio below which the thin-volume cut applies
    #[serde(default = "default_low_volume_ratio")]
    pub low_volume_ratio: f64,
    #[serde(default = "default_low_volume_multiplier")]
    pub low_volume_multiplier: f64,
    /// Applied in order
    #[serde(default = "default_bonus_rules")]
    pub bonuses: Vec<BonusRule>,
    #[serde(default = "default_max_bonus")]
    pub max_bonus: f64,
    /// Multiplier applied when consensus fails
    #[serde(default = "default_weak_consensus_penalty")]
    pub weak_consensus_penalty: f64,
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
    #[serde(default = "default_confidence_ceiling")]
    pub confidence_ceiling: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            trending_multiplier: default_trending_multiplier(),
            trending_volatile_multiplier: default_trending_volatile_multiplier(),
            sideways_multiplier: default_sideways_multiplier(),
            sideways_low_vol_multiplier: default_sideways_multiplier(),
            high_volume_ratio: default_high_volume_ratio(),
            high_volume_multiplier: default_high_volume_multiplier(),
            low_volume_ratio: default_low_volume_ratio(),
            low_volume_multiplier: default_low_volume_multiplier(),
            bonuses: default_bonus_rules(),
            max_bonus: default_max_bonus(),
            weak_consensus_penalty: default_weak_consensus_penalty(),
            confidence_floor: default_confidence_floor(),
            confidence_ceiling: default_confidence_ceiling(),
        }
    }
}

fn default_trending_multiplier() -> f64 { 1.15 }
fn default_trending_volatile_multiplier() -> f64 { 1.05 }
fn default_sideways_multiplier() -> f64 { 0.85 }
fn default_high_volume_ratio() -> f64 { 1.5 }
fn default_high_volume_multiplier() -> f64 { 1.10 }
fn default_low_volume_ratio() -> f64 { 0.8 }
fn default_low_volume_multiplier() -> f64 { 0.90 }
fn default_bonus_rules() -> Vec<BonusRule> {
    vec![
        BonusRule::new("neural_conviction", "ai_neural", 90.0, 5.0),
        BonusRule::new("smart_money_flow", "smart_money", 85.0, 4.0),
        BonusRule::new("technical_confluence", "technical", 85.0, 3.0),
        BonusRule::new("momentum_extreme", "momentum", 85.0, 3.0),
        BonusRule::new("risk_clearance", "portfolio_risk", 80.0, 2.0),
    ]
}
fn default_max_bonus() -> f64 { 15.0 }
fn default_weak_consensus_penalty() -> f64 { 0.85 }
fn default_confidence_floor() -> f64 { 10.0 }
fn default_confidence_ceiling() -> f64 { 98.0 }

/// Grade cut-offs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeConfig {
    /// AI_GRADE needs confidence strictly above this
    #[serde(default = "default_ai_confidence")]
    pub ai_confidence: f64,
    /// HIGH_GRADE needs confidence at or above this
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
    /// AI_GRADE needs every phase accuracy strictly above this
    #[serde(default = "default_min_phase_accuracy")]
    pub min_phase_accuracy: f64,
}

impl Default for GradeConfig {
    fn default() -> Self {
        Self {
            ai_confidence: default_ai_confidence(),
            high_confidence: default_high_confidence(),
            min_phase_accuracy: default_min_phase_accuracy(),
        }
    }
}

fn default_ai_confidence() -> f64 { 85.0 }
fn default_high_confidence() -> f64 { 85.0 }
fn default_min_phase_accuracy() -> f64 { 0.8 }

/// Fusion weights of the four BUY target methods
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethodWeights {
    pub fibonacci: f64,
    pub pattern: f64,
    pub volume: f64,
    pub atr: f64,
}

impl Default for MethodWeights {
    fn default() -> Self {
        Self {
            fibonacci: 0.3,
            pattern: 0.3,
            volume: 0.2,
            atr: 0.2,
        }
    }
}

/// ATR multipliers for one SELL strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtrMultipliers {
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub stop: f64,
}

impl AtrMultipliers {
    pub const fn new(t1: f64, t2: f64, t3: f64, stop: f64) -> Self {
        Self { t1, t2, t3, stop }
    }
}

/// SELL strategy multiplier table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellStrategyTable {
    pub aggressive: AtrMultipliers,
    pub trend_following: AtrMultipliers,
    pub resistance: AtrMultipliers,
    pub divergence: AtrMultipliers,
    pub cautious: AtrMultipliers,
}

impl Default for SellStrategyTable {
    fn default() -> Self {
        Self {
            aggressive: AtrMultipliers::new(1.5, 3.0, 4.5, 0.8),
            trend_following: AtrMultipliers::new(2.0, 4.0, 6.0, 1.2),
            resistance: AtrMultipliers::new(1.0, 2.0, 3.0, 1.0),
            divergence: AtrMultipliers::new(1.2, 2.5, 4.0, 1.5),
            cautious: AtrMultipliers::new(0.8, 1.5, 2.5, 1.8),
        }
    }
}

impl SellStrategyTable {
    pub fn row(&self, strategy: SellStrategy) -> AtrMultipliers {
        match strategy {
            SellStrategy::AggressiveSell => self.aggressive,
            SellStrategy::TrendFollowingSell => self.trend_following,
            SellStrategy::ResistanceSell => self.resistance,
            SellStrategy::DivergenceSell => self.divergence,
            SellStrategy::CautiousSell => self.cautious,
        }
    }
}

/// Thresholds for the SELL factor analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellThresholds {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    /// RSI above this counts toward an aggressive exit
    #[serde(default = "default_aggressive_rsi")]
    pub aggressive_rsi: f64,
    /// Volume ratio above this on a down bar is distribution
    #[serde(default = "default_distribution_volume_ratio")]
    pub distribution_volume_ratio: f64,
    /// Price above resistance × this is near resistance
    #[serde(default = "default_near_resistance")]
    pub near_resistance: f64,
    /// Price below support × this is below support
    #[serde(default = "default_below_support")]
    pub below_support: f64,
    /// Recent/previous mean volume below this on a rising price is divergence
    #[serde(default = "default_divergence_volume")]
    pub divergence_volume: f64,
}

impl Default for SellThresholds {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            aggressive_rsi: default_aggressive_rsi(),
            distribution_volume_ratio: default_distribution_volume_ratio(),
            near_resistance: default_near_resistance(),
            below_support: default_below_support(),
            divergence_volume: default_divergence_volume(),
        }
    }
}

fn default_rsi_period() -> usize { 14 }
fn default_aggressive_rsi() -> f64 { 80.0 }
fn default_distribution_volume_ratio() -> f64 { 1.3 }
fn default_near_resistance() -> f64 { 0.98 }
fn default_below_support() -> f64 { 1.02 }
fn default_divergence_volume() -> f64 { 0.8 }

/// Target and stop construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// Bars scanned for swing high/low
    #[serde(default = "default_swing_period")]
    pub swing_period: usize,
    /// ATR as a fraction of entry when it cannot be measured
    #[serde(default = "default_atr_fallback_pct")]
    pub atr_fallback_pct: f64,
    #[serde(default)]
    pub method_weights: MethodWeights,
    /// BUY stop distance in ATRs
    #[serde(default = "default_buy_stop_atr")]
    pub buy_stop_atr: f64,
    #[serde(default = "default_support_buffer")]
    pub support_buffer: f64,
    #[serde(default = "default_resistance_buffer")]
    pub resistance_buffer: f64,
    #[serde(default)]
    pub sell_strategies: SellStrategyTable,
    #[serde(default)]
    pub sell_thresholds: SellThresholds,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            atr_period: default_atr_period(),
            swing_period: default_swing_period(),
            atr_fallback_pct: default_atr_fallback_pct(),
            method_weights: MethodWeights::default(),
            buy_stop_atr: default_buy_stop_atr(),
            support_buffer: default_support_buffer(),
            resistance_buffer: default_resistance_buffer(),
            sell_strategies: SellStrategyTable::default(),
            sell_thresholds: SellThresholds::default(),
        }
    }
}

fn default_atr_period() -> usize { 14 }
fn default_swing_period() -> usize { 20 }
fn default_atr_fallback_pct() -> f64 { 0.02 }
fn default_buy_stop_atr() -> f64 { 2.0 }
fn default_support_buffer() -> f64 { 0.99 }
fn default_resistance_buffer() -> f64 { 1.01 }

/// Runtime settings for the binary, read from `SIGNAL_FUSION_*` variables
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Optional YAML overrides for [`FusionConfig`]
    #[serde(default)]
    pub config_path: Option<String>,
    /// JSON file of market windows to scan
    #[serde(default = "default_fixture_path")]
    pub fixture_path: String,
    /// Seed for reference-provider jitter; no jitter when unset
    #[serde(default)]
    pub jitter_seed: Option<u64>,
    #[serde(default = "default_jitter_amplitude")]
    pub jitter_amplitude: f64,
    /// Per-symbol provider deadline
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
}

impl Settings {
    /// Load `.env` (if present) and the `SIGNAL_FUSION` environment prefix
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("SIGNAL_FUSION")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Engine configuration from `config_path`, or defaults
    pub fn fusion_config(&self) -> Result<FusionConfig, ConfigError> {
        match &self.config_path {
            Some(path) => FusionConfig::load_yaml(path),
            None => Ok(FusionConfig::default()),
        }
    }
}

fn default_fixture_path() -> String { "fixtures/windows.json".to_string() }
fn default_jitter_amplitude() -> f64 { 2.0 }
fn default_provider_timeout_ms() -> u64 { 5000 }

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid environment settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
