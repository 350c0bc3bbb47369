//! Confidence calibrator

use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::types::{ConsensusResult, MarketCondition, PhaseScore, Regime};

/// Itemised record of how the final confidence was reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBreakdown {
    pub base: f64,
    pub regime_multiplier: f64,
    pub volume_multiplier: f64,
    /// Bonus rules that fired, in table order
    pub bonuses: Vec<(String, f64)>,
    /// Sum of fired bonuses after the cap
    pub bonus_total: f64,
    pub consensus_penalty: Option<f64>,
    pub final_confidence: f64,
}

impl CalibrationBreakdown {
    /// Short human description used in the reasoning summary
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("base {:.1}", self.base)];
        if self.regime_multiplier != 1.0 {
            parts.push(format!("regime x{:.2}", self.regime_multiplier));
        }
        if self.volume_multiplier != 1.0 {
            parts.push(format!("volume x{:.2}", self.volume_multiplier));
        }
        if !self.bonuses.is_empty() {
            let names: Vec<&str> = self.bonuses.iter().map(|(n, _)| n.as_str()).collect();
            parts.push(format!("+{:.0} ({})", self.bonus_total, names.join(", ")));
        }
        if let Some(penalty) = self.consensus_penalty {
            parts.push(format!("weak consensus x{:.2}", penalty));
        }
        parts.join(", ")
    }
}

fn regime_multiplier(regime: Regime, config: &CalibrationConfig) -> f64 {
    match regime {
        Regime::Trending => config.trending_multiplier,
        Regime::TrendingVolatile => config.trending_volatile_multiplier,
        Regime::Sideways => config.sideways_multiplier,
        Regime::SidewaysLowVol => config.sideways_low_vol_multiplier,
    }
}

fn volume_multiplier(volume_ratio: f64, config: &CalibrationConfig) -> f64 {
    if volume_ratio > config.high_volume_ratio {
        config.high_volume_multiplier
    } else if volume_ratio < config.low_volume_ratio {
        config.low_volume_multiplier
    } else {
        1.0
    }
}

/// Calibrate a composite score into the final confidence
pub fn calibrate(
    composite: f64,
    condition: &MarketCondition,
    phases: &[PhaseScore],
    consensus: &ConsensusResult,
    config: &CalibrationConfig,
) -> CalibrationBreakdown {
    let regime_multiplier = regime_multiplier(condition.regime, config);
    let volume_multiplier = volume_multiplier(condition.volume_ratio, config);

    let mut confidence = composite * regime_multiplier * volume_multiplier;

    let bonuses: Vec<(String, f64)> = config
        .bonuses
        .iter()
        .filter(|rule| {
            phases
                .iter()
                .any(|p| p.phase_name == rule.phase && p.score > rule.threshold)
        })
        .map(|rule| (rule.name.clone(), rule.points))
        .collect();
    let bonus_total = bonuses
        .iter()
        .map(|(_, points)| points)
        .sum::<f64>()
        .min(config.max_bonus);
    confidence += bonus_total;

    let consensus_penalty = if consensus.passes_filter {
        None
    } else {
        confidence *= config.weak_consensus_penalty;
        Some(config.weak_consensus_penalty)
    };

    let final_confidence = confidence.clamp(config.confidence_floor, config.confidence_ceiling);

    CalibrationBreakdown {
        base: composite,
        regime_multiplier,
        volume_multiplier,
        bonuses,
        bonus_total,
        consensus_penalty,
        final_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BonusRule;
    use crate::types::ConsensusQuality;

    fn condition(regime: Regime, volume_ratio: f64) -> MarketCondition {
        MarketCondition {
            regime,
            volume_ratio,
            trend_strength: 0.0,
            volatility: 0.1,
            insufficient_data: false,
        }
    }

    fn consensus(passes: bool) -> ConsensusResult {
        ConsensusResult {
            agreement_ratio: if passes { 1.0 } else { 0.4 },
            quality: if passes { ConsensusQuality::Strong } else { ConsensusQuality::Weak },
            passes_filter: passes,
        }
    }

    fn all_at(score: f64) -> Vec<PhaseScore> {
        ["technical", "momentum", "smart_money", "portfolio_risk", "ai_neural"]
            .iter()
            .map(|n| PhaseScore::from_score(*n, score, "test"))
            .collect()
    }

    #[test]
    fn test_strong_trending_hits_ceiling() {
        let result = calibrate(
            90.0,
            &condition(Regime::Trending, 2.0),
            &all_at(90.0),
            &consensus(true),
            &CalibrationConfig::default(),
        );
        // ai_neural at exactly 90 does not clear its strict threshold
        let names: Vec<&str> = result.bonuses.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["smart_money_flow", "technical_confluence", "momentum_extreme", "risk_clearance"]
        );
        assert_eq!(result.bonus_total, 12.0);
        assert_eq!(result.final_confidence, 98.0);
    }

    #[test]
    fn test_bonus_cap() {
        let config = CalibrationConfig {
            bonuses: vec![
                BonusRule::new("a", "technical", 50.0, 10.0),
                BonusRule::new("b", "momentum", 50.0, 10.0),
            ],
            ..CalibrationConfig::default()
        };
        let result = calibrate(
            50.0,
            &condition(Regime::Sideways, 1.0),
            &all_at(60.0),
            &consensus(true),
            &config,
        );
        assert_eq!(result.bonus_total, 15.0);
        assert!((result.final_confidence - (50.0 * 0.85 + 15.0)).abs() < 1e-9);
    }

    #[test]
    fn test_weak_consensus_penalty_after_bonus() {
        let result = calibrate(
            60.0,
            &condition(Regime::Sideways, 1.0),
            &all_at(60.0),
            &consensus(false),
            &CalibrationConfig::default(),
        );
        assert_eq!(result.consensus_penalty, Some(0.85));
        assert!((result.final_confidence - 60.0 * 0.85 * 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_volume_bands() {
        let config = CalibrationConfig::default();
        assert_eq!(volume_multiplier(1.5, &config), 1.0);
        assert_eq!(volume_multiplier(1.51, &config), 1.10);
        assert_eq!(volume_multiplier(0.8, &config), 1.0);
        assert_eq!(volume_multiplier(0.79, &config), 0.90);
    }

    #[test]
    fn test_floor_clamp() {
        let result = calibrate(
            5.0,
            &condition(Regime::SidewaysLowVol, 0.5),
            &[],
            &consensus(false),
            &CalibrationConfig::default(),
        );
        assert_eq!(result.final_confidence, 10.0);
        assert!(result.describe().contains("weak consensus"));
    }
}
