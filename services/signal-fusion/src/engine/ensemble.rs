//! Weighted ensemble fuser

use std::collections::BTreeMap;

use crate::config::{PhaseCatalogue, SignalConfig};
use crate::types::{Direction, EnsemblePrediction, PhaseScore};

/// Vote implied by a single phase score
pub fn phase_vote(score: f64) -> Direction {
    if score > 50.0 {
        Direction::Buy
    } else if score < 50.0 {
        Direction::Sell
    } else {
        Direction::Hold
    }
}

/// Direction of a composite score under the configured neutral band
pub fn composite_direction(composite: f64, signal: &SignalConfig) -> Direction {
    if composite > signal.buy_threshold {
        Direction::Buy
    } else if composite < signal.sell_threshold {
        Direction::Sell
    } else {
        Direction::Hold
    }
}

/// Fuse phase scores into a composite weighted by weight × accuracy
///
/// Only the phases present take part; absent catalogue entries are not
/// zero-filled.
pub fn fuse(
    phases: &[PhaseScore],
    catalogue: &PhaseCatalogue,
    signal: &SignalConfig,
) -> EnsemblePrediction {
    let mut signal_counts = BTreeMap::new();
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for phase in phases {
        let weight = catalogue.effective_weight(&phase.phase_name);
        weighted_sum += phase.score * weight;
        total_weight += weight;
        *signal_counts.entry(phase_vote(phase.score)).or_insert(0) += 1;
    }

    let composite_score = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        50.0
    };

    let direction = if total_weight > 0.0 {
        composite_direction(composite_score, signal)
    } else {
        Direction::Hold
    };

    EnsemblePrediction {
        composite_score,
        direction,
        signal_counts,
        phase_count: phases.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhaseEntry;

    fn phases(scores: &[(&str, f64)]) -> Vec<PhaseScore> {
        scores
            .iter()
            .map(|(name, score)| PhaseScore::from_score(*name, *score, "test"))
            .collect()
    }

    #[test]
    fn test_empty_is_neutral() {
        let pred = fuse(&[], &PhaseCatalogue::default(), &SignalConfig::default());
        assert_eq!(pred.composite_score, 50.0);
        assert_eq!(pred.direction, Direction::Hold);
        assert_eq!(pred.phase_count, 0);
        assert!(pred.signal_counts.is_empty());
    }

    #[test]
    fn test_uniform_scores_give_that_composite() {
        let input = phases(&[
            ("technical", 90.0),
            ("momentum", 90.0),
            ("smart_money", 90.0),
            ("portfolio_risk", 90.0),
            ("ai_neural", 90.0),
        ]);
        let pred = fuse(&input, &PhaseCatalogue::default(), &SignalConfig::default());
        assert!((pred.composite_score - 90.0).abs() < 1e-9);
        assert_eq!(pred.direction, Direction::Buy);
        assert_eq!(pred.votes(Direction::Buy), 5);
    }

    #[test]
    fn test_default_weights_composite() {
        let input = phases(&[
            ("technical", 80.0),
            ("momentum", 75.0),
            ("smart_money", 70.0),
            ("portfolio_risk", 40.0),
            ("ai_neural", 35.0),
        ]);
        let pred = fuse(&input, &PhaseCatalogue::default(), &SignalConfig::default());
        // (6.56 + 8.775 + 13.125 + 7.5 + 7.0) / 0.774
        assert!((pred.composite_score - 55.5039).abs() < 1e-3);
        assert_eq!(pred.direction, Direction::Hold);
        assert_eq!(pred.votes(Direction::Buy), 3);
        assert_eq!(pred.votes(Direction::Sell), 2);
    }

    #[test]
    fn test_equal_weights_composite() {
        let catalogue = PhaseCatalogue {
            entries: ["technical", "momentum", "smart_money", "portfolio_risk", "ai_neural"]
                .iter()
                .map(|n| PhaseEntry::new(n, 0.2, 1.0))
                .collect(),
            ..PhaseCatalogue::default()
        };
        let input = phases(&[
            ("technical", 80.0),
            ("momentum", 75.0),
            ("smart_money", 70.0),
            ("portfolio_risk", 40.0),
            ("ai_neural", 35.0),
        ]);
        let pred = fuse(&input, &catalogue, &SignalConfig::default());
        assert!((pred.composite_score - 60.0).abs() < 1e-9);
        assert_eq!(pred.direction, Direction::Hold);
    }

    #[test]
    fn test_missing_phases_are_not_zero_filled() {
        let input = phases(&[("smart_money", 20.0)]);
        let pred = fuse(&input, &PhaseCatalogue::default(), &SignalConfig::default());
        assert!((pred.composite_score - 20.0).abs() < 1e-9);
        assert_eq!(pred.direction, Direction::Sell);
    }

    #[test]
    fn test_zero_weight_phase_is_neutral() {
        let catalogue = PhaseCatalogue {
            entries: vec![PhaseEntry::new("technical", 1.0, 0.0)],
            ..PhaseCatalogue::default()
        };
        let pred = fuse(
            &phases(&[("technical", 95.0)]),
            &catalogue,
            &SignalConfig::default(),
        );
        assert_eq!(pred.composite_score, 50.0);
        assert_eq!(pred.direction, Direction::Hold);
        assert_eq!(pred.votes(Direction::Buy), 1);
    }

    #[test]
    fn test_band_edges_are_hold() {
        let signal = SignalConfig::default();
        assert_eq!(composite_direction(65.0, &signal), Direction::Hold);
        assert_eq!(composite_direction(65.01, &signal), Direction::Buy);
        assert_eq!(composite_direction(35.0, &signal), Direction::Hold);
        assert_eq!(composite_direction(34.99, &signal), Direction::Sell);
        assert_eq!(phase_vote(50.0), Direction::Hold);
    }
}
