//! Fusion engine - single evaluation path from phase scores to a TradingCall

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, FusionConfig, SignalConfig};
use crate::engine::calibrator::{self, CalibrationBreakdown};
use crate::engine::indicators::Series;
use crate::engine::targets::{self, BuyInputs, PriceStructure, SellFactors};
use crate::engine::{consensus, ensemble, grade, market};
use crate::types::{
    ConsensusResult, Direction, FusionError, MarketCondition, Observation, PhaseScore, Result,
    SellStrategy, SignalStrength, TargetLevels, TradingCall,
};

/// Fusion engine - combines phase scores and a market window into a call
///
/// Tables are read-only during an evaluation; [`FusionEngine::reload`]
/// swaps them for subsequent calls.
pub struct FusionEngine {
    config: RwLock<Arc<FusionConfig>>,
}

impl FusionEngine {
    /// Create new engine with config
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Validate and install new tables
    pub fn reload(&self, config: FusionConfig) -> std::result::Result<(), ConfigError> {
        config.validate()?;
        let mut guard = match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(config);
        info!("Fusion tables reloaded");
        Ok(())
    }

    /// Current tables
    pub fn config(&self) -> Arc<FusionConfig> {
        match self.config.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Evaluate one symbol
    ///
    /// Zero phases is not an error; it takes the neutral HOLD path. Fails
    /// only on an unpriceable window or a degenerate target ladder.
    pub fn evaluate(
        &self,
        symbol: &str,
        window: &[Observation],
        phases: &[PhaseScore],
    ) -> Result<TradingCall> {
        let config = self.config();

        let last = window
            .last()
            .ok_or_else(|| FusionError::InvalidInput(format!("{}: empty observation window", symbol)))?;
        let entry = last.price.to_f64().unwrap_or(0.0);
        if !(entry.is_finite() && entry > 0.0) {
            return Err(FusionError::InvalidInput(format!(
                "{}: entry price {} must be positive",
                symbol, last.price
            )));
        }

        let phases = sanitize_phases(symbol, phases);
        let series = Series::from_observations(window);

        let condition = market::classify(&series, &config.regime);
        if condition.insufficient_data {
            warn!(
                symbol = %symbol,
                observations = window.len(),
                "Insufficient data for regime classification, using fallback"
            );
        }

        let prediction = ensemble::fuse(&phases, &config.phases, &config.signal);
        let consensus = consensus::validate(&prediction, &config.consensus);
        let calibration = calibrator::calibrate(
            prediction.composite_score,
            &condition,
            &phases,
            &consensus,
            &config.calibration,
        );
        let final_confidence = calibration.final_confidence;
        let grade = grade::assign(final_confidence, &consensus, &phases, &config.grading);

        let structure = PriceStructure::measure(&series, entry, &config.targets);
        let (targets, sell_strategy) = match prediction.direction {
            Direction::Buy => {
                let inputs = BuyInputs {
                    entry,
                    structure,
                    composite: prediction.composite_score,
                    agreement: consensus.agreement_ratio,
                    volume_ratio: condition.volume_ratio,
                };
                (targets::buy_levels(&inputs, &config.targets)?, None)
            }
            Direction::Sell => {
                let thresholds = &config.targets.sell_thresholds;
                let factors = SellFactors::analyze(&series, &condition, &structure, thresholds);
                let strategy = factors.classify(condition.regime, thresholds);
                debug!(symbol = %symbol, strategy = strategy.as_str(), ?factors, "Sell strategy selected");
                (
                    targets::sell_levels(entry, &structure, strategy, &config.targets)?,
                    Some(strategy),
                )
            }
            Direction::Hold => (targets::hold_levels(entry, structure.atr)?, None),
        };

        let strength = signal_strength(&consensus, prediction.conviction(), &config.signal);

        let mut call = TradingCall {
            call_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            direction: prediction.direction,
            strength,
            final_confidence,
            entry_price: entry,
            targets,
            grade,
            per_phase_breakdown: phases,
            ensemble: prediction,
            consensus,
            market_condition: condition,
            sell_strategy,
            reasoning_summary: String::new(),
            generated_at: Utc::now(),
        };
        call.reasoning_summary = reasoning_summary(&call, &calibration, sell_strategy);

        info!(
            symbol = %symbol,
            signal = %call.signal_label(),
            confidence = final_confidence,
            grade = %grade,
            regime = call.market_condition.regime.as_str(),
            "Trading call generated"
        );

        Ok(call)
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

/// Label strength from consensus and composite conviction
pub fn signal_strength(
    consensus: &ConsensusResult,
    conviction: f64,
    signal: &SignalConfig,
) -> SignalStrength {
    if !consensus.passes_filter || conviction < signal.weak_conviction_floor {
        SignalStrength::Weak
    } else if conviction > signal.strong_conviction {
        SignalStrength::Strong
    } else {
        SignalStrength::Normal
    }
}

/// Drop non-finite scores and clamp the rest to 0 - 100
fn sanitize_phases(symbol: &str, phases: &[PhaseScore]) -> Vec<PhaseScore> {
    phases
        .iter()
        .filter(|p| {
            let finite = p.score.is_finite();
            if !finite {
                warn!(symbol = %symbol, phase = %p.phase_name, "Dropping non-finite phase score");
            }
            finite
        })
        .map(|p| {
            let mut phase = p.clone();
            phase.score = phase.score.clamp(0.0, 100.0);
            phase
        })
        .collect()
}

fn reasoning_summary(
    call: &TradingCall,
    calibration: &CalibrationBreakdown,
    sell_strategy: Option<SellStrategy>,
) -> String {
    let mut summary = format!(
        "{}: composite {:.1} from {} phases. {}. Market: {}. Confidence {}",
        call.signal_label(),
        call.ensemble.composite_score,
        call.ensemble.phase_count,
        call.consensus.reasoning(),
        describe_market(&call.market_condition),
        calibration.describe(),
    );
    if let Some(strategy) = sell_strategy {
        summary.push_str(&format!(". {}: {}", strategy.as_str(), strategy.reasoning()));
    }
    summary.push_str(&format!(". {}", describe_targets(&call.targets)));
    summary
}

fn describe_market(condition: &MarketCondition) -> String {
    format!(
        "{} ({}), volume x{:.2}",
        condition.regime.as_str(),
        condition.description(),
        condition.volume_ratio
    )
}

fn describe_targets(targets: &TargetLevels) -> String {
    format!("Risk/reward 1:{:.2}", targets.risk_reward)
}
