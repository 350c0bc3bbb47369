//! Target and stop engine
//!
//! BUY calls fuse four target methods, SELL calls read the strategy table
//! picked by the sell-factor analysis, HOLD calls get a neutral ATR bracket.

use serde::{Deserialize, Serialize};

use crate::config::{SellThresholds, TargetConfig};
use crate::engine::indicators::Series;
use crate::types::{Direction, FusionError, MarketCondition, Regime, Result, SellStrategy, TargetLevels};

const FIBONACCI_LEVELS: [f64; 3] = [0.382, 0.618, 1.618];
const PATTERN_LEVELS: [f64; 3] = [0.5, 1.0, 1.618];
const VOLUME_LEVELS: [f64; 3] = [1.0, 2.0, 3.5];
const ATR_LEVELS: [f64; 3] = [1.5, 3.0, 5.0];
const VOLUME_BASE_MOVE: f64 = 0.02;
const HOLD_LEVELS: [f64; 3] = [0.5, 1.0, 1.5];
const HOLD_STOP_ATR: f64 = 1.0;
/// Deepest SELL target as a fraction of entry
const SELL_MAX_DEPTH: f64 = 0.9;

/// ATR and swing levels around the entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStructure {
    pub atr: f64,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

impl PriceStructure {
    /// Measure ATR and swing levels, falling back to a fixed ATR fraction
    pub fn measure(series: &Series, entry: f64, config: &TargetConfig) -> Self {
        let atr = series
            .atr(config.atr_period)
            .unwrap_or(entry * config.atr_fallback_pct);
        let (support, resistance) = match series.find_levels(config.swing_period) {
            Some((low, high)) => (Some(low), Some(high)),
            None => (None, None),
        };
        Self {
            atr,
            support,
            resistance,
        }
    }

    /// Swing high minus swing low, zero when unknown
    pub fn range(&self) -> f64 {
        match (self.support, self.resistance) {
            (Some(low), Some(high)) if high > low => high - low,
            _ => 0.0,
        }
    }
}

/// Everything a BUY target ladder depends on
#[derive(Debug, Clone, Copy)]
pub struct BuyInputs {
    pub entry: f64,
    pub structure: PriceStructure,
    /// 0 - 100
    pub composite: f64,
    /// Consensus agreement, used as pattern reliability
    pub agreement: f64,
    pub volume_ratio: f64,
}

/// Fuse Fibonacci, pattern, volume and ATR ladders into one BUY ladder
pub fn buy_levels(inputs: &BuyInputs, config: &TargetConfig) -> Result<TargetLevels> {
    let entry = inputs.entry;
    let atr = inputs.structure.atr;
    let range = inputs.structure.range();
    let reliability = inputs.agreement.clamp(0.0, 1.0);
    let volume_strength = inputs.volume_ratio.clamp(0.5, 2.0);
    let composite_strength = inputs.composite / 100.0;
    let w = &config.method_weights;

    let mut targets = [0.0; 3];
    for (i, target) in targets.iter_mut().enumerate() {
        let fib = range * FIBONACCI_LEVELS[i];
        let pattern = range * PATTERN_LEVELS[i] * reliability;
        let volume = entry * VOLUME_BASE_MOVE * volume_strength * VOLUME_LEVELS[i];
        let atr_move = atr * ATR_LEVELS[i] * composite_strength;
        *target = entry + fib * w.fibonacci + pattern * w.pattern + volume * w.volume + atr_move * w.atr;
    }

    // Tighter of the ATR stop and the buffered swing low, below entry only
    let mut stop = entry - atr * config.buy_stop_atr;
    if let Some(support) = inputs.structure.support {
        let pattern_stop = support * config.support_buffer;
        if pattern_stop < entry {
            stop = stop.max(pattern_stop);
        }
    }

    finish(Direction::Buy, entry, targets, stop)
}

/// SELL ladder from the strategy table
pub fn sell_levels(
    entry: f64,
    structure: &PriceStructure,
    strategy: SellStrategy,
    config: &TargetConfig,
) -> Result<TargetLevels> {
    let atr = structure.atr;
    let row = config.sell_strategies.row(strategy);

    // Compress the target multipliers when the full ladder would reach zero
    let reach = atr * row.t3;
    let scale = if reach > entry * SELL_MAX_DEPTH {
        entry * SELL_MAX_DEPTH / reach
    } else {
        1.0
    };
    let targets = [row.t1, row.t2, row.t3].map(|m| entry - atr * m * scale);

    let mut stop = entry + atr * row.stop;
    if let Some(resistance) = structure.resistance {
        let pattern_stop = resistance * config.resistance_buffer;
        if pattern_stop > entry {
            stop = stop.min(pattern_stop);
        }
    }

    finish(Direction::Sell, entry, targets, stop)
}

/// Neutral bracket for HOLD calls
pub fn hold_levels(entry: f64, atr: f64) -> Result<TargetLevels> {
    let targets = HOLD_LEVELS.map(|m| entry + atr * m);
    finish(Direction::Hold, entry, targets, entry - atr * HOLD_STOP_ATR)
}

/// `|t2 - entry| / |entry - stop|`
pub fn risk_reward(entry: f64, target2: f64, stop_loss: f64) -> f64 {
    (target2 - entry).abs() / (entry - stop_loss).abs()
}

fn finish(direction: Direction, entry: f64, targets: [f64; 3], stop_loss: f64) -> Result<TargetLevels> {
    let [target1, target2, target3] = targets;

    if !(entry.is_finite() && stop_loss.is_finite() && targets.iter().all(|t| t.is_finite())) {
        return Err(FusionError::DegenerateTargets(format!(
            "non-finite level for {} at entry {}",
            direction, entry
        )));
    }

    if stop_loss == entry {
        return Err(FusionError::DegenerateTargets(format!(
            "stop equals entry {}",
            entry
        )));
    }

    let ordered = match direction {
        Direction::Buy | Direction::Hold => {
            stop_loss < entry && entry < target1 && target1 < target2 && target2 < target3
        }
        Direction::Sell => {
            stop_loss > entry && entry > target1 && target1 > target2 && target2 > target3
        }
    };
    if !ordered {
        return Err(FusionError::DegenerateTargets(format!(
            "{} ladder out of order: SL={} entry={} targets={}/{}/{}",
            direction, stop_loss, entry, target1, target2, target3
        )));
    }

    let risk_reward = risk_reward(entry, target2, stop_loss);
    if !(risk_reward.is_finite() && risk_reward > 0.0) {
        return Err(FusionError::DegenerateTargets(format!(
            "risk/reward {} not finite and positive",
            risk_reward
        )));
    }

    Ok(TargetLevels {
        target1,
        target2,
        target3,
        stop_loss,
        risk_reward,
    })
}

/// Bearish factors read from the window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellFactors {
    pub rsi: f64,
    pub distribution_volume: bool,
    pub near_resistance: bool,
    pub below_support: bool,
    pub downtrend_confirmed: bool,
    pub momentum_divergence: bool,
}

impl SellFactors {
    pub fn analyze(
        series: &Series,
        condition: &MarketCondition,
        structure: &PriceStructure,
        thresholds: &SellThresholds,
    ) -> Self {
        let closes = &series.closes;
        let n = closes.len();
        let price = series.last_close().unwrap_or(0.0);

        let rsi = series.rsi(thresholds.rsi_period).unwrap_or(50.0);

        let down_bar = n >= 2 && closes[n - 1] < closes[n - 2];
        let distribution_volume =
            condition.volume_ratio > thresholds.distribution_volume_ratio && down_bar;

        let near_resistance = structure
            .resistance
            .map(|r| price > r * thresholds.near_resistance)
            .unwrap_or(false);
        let below_support = structure
            .support
            .map(|s| price < s * thresholds.below_support)
            .unwrap_or(false);

        let downtrend_confirmed = match (series.sma(10), series.sma(20)) {
            (Some(sma10), Some(sma20)) => price < sma10 && sma10 < sma20,
            _ => false,
        };

        let momentum_divergence = if n >= 10 {
            let price_change = closes[n - 1] - closes[n - 5];
            match (series.mean_volume(n - 5, n), series.mean_volume(n - 10, n - 5)) {
                (Some(recent), Some(older)) => {
                    price_change > 0.0 && recent < older * thresholds.divergence_volume
                }
                _ => false,
            }
        } else {
            false
        };

        Self {
            rsi,
            distribution_volume,
            near_resistance,
            below_support,
            downtrend_confirmed,
            momentum_divergence,
        }
    }

    /// First matching strategy wins
    pub fn classify(&self, regime: Regime, thresholds: &SellThresholds) -> SellStrategy {
        if self.rsi > thresholds.aggressive_rsi && self.distribution_volume && self.near_resistance {
            SellStrategy::AggressiveSell
        } else if self.downtrend_confirmed && self.below_support {
            SellStrategy::TrendFollowingSell
        } else if self.near_resistance && regime == Regime::Sideways {
            SellStrategy::ResistanceSell
        } else if self.momentum_divergence {
            SellStrategy::DivergenceSell
        } else {
            SellStrategy::CautiousSell
        }
    }
}
