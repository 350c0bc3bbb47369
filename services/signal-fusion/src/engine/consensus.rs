//! Consensus validator

use crate::config::ConsensusConfig;
use crate::types::{ConsensusQuality, ConsensusResult, EnsemblePrediction};

/// Agreement of the largest vote bloc with the whole ensemble
pub fn validate(prediction: &EnsemblePrediction, config: &ConsensusConfig) -> ConsensusResult {
    let total: usize = prediction.signal_counts.values().sum();
    if total == 0 {
        return ConsensusResult {
            agreement_ratio: 0.0,
            quality: ConsensusQuality::Weak,
            passes_filter: false,
        };
    }

    let max_count = prediction.signal_counts.values().copied().max().unwrap_or(0);
    let agreement_ratio = max_count as f64 / total as f64;

    let quality = if agreement_ratio >= config.strong_ratio {
        ConsensusQuality::Strong
    } else if agreement_ratio >= config.pass_ratio {
        ConsensusQuality::Moderate
    } else {
        ConsensusQuality::Weak
    };

    ConsensusResult {
        agreement_ratio,
        quality,
        passes_filter: agreement_ratio >= config.pass_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use std::collections::BTreeMap;

    fn prediction(buy: usize, sell: usize, hold: usize) -> EnsemblePrediction {
        let mut signal_counts = BTreeMap::new();
        for (dir, n) in [(Direction::Buy, buy), (Direction::Sell, sell), (Direction::Hold, hold)] {
            if n > 0 {
                signal_counts.insert(dir, n);
            }
        }
        EnsemblePrediction {
            composite_score: 50.0,
            direction: Direction::Hold,
            signal_counts,
            phase_count: buy + sell + hold,
        }
    }

    #[test]
    fn test_three_of_five_passes_inclusive() {
        let result = validate(&prediction(3, 2, 0), &ConsensusConfig::default());
        assert!((result.agreement_ratio - 0.6).abs() < 1e-12);
        assert_eq!(result.quality, ConsensusQuality::Moderate);
        assert!(result.passes_filter);
        assert_eq!(result.reasoning(), "Consensus: MODERATE (60.0% agreement)");
    }

    #[test]
    fn test_unanimous_is_strong() {
        let result = validate(&prediction(5, 0, 0), &ConsensusConfig::default());
        assert_eq!(result.agreement_ratio, 1.0);
        assert_eq!(result.quality, ConsensusQuality::Strong);
    }

    #[test]
    fn test_split_vote_is_weak() {
        let result = validate(&prediction(2, 2, 1), &ConsensusConfig::default());
        assert!((result.agreement_ratio - 0.4).abs() < 1e-12);
        assert_eq!(result.quality, ConsensusQuality::Weak);
        assert!(!result.passes_filter);
    }

    #[test]
    fn test_no_votes_is_weak() {
        let result = validate(&prediction(0, 0, 0), &ConsensusConfig::default());
        assert_eq!(result.agreement_ratio, 0.0);
        assert_eq!(result.quality, ConsensusQuality::Weak);
        assert!(!result.passes_filter);
    }
}
