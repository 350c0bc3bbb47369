//! Grade assigner

use crate::config::GradeConfig;
use crate::types::{ConsensusResult, Grade, PhaseScore};

/// Assign the quality tier of a call
///
/// A failing consensus always yields STANDARD.
pub fn assign(
    confidence: f64,
    consensus: &ConsensusResult,
    phases: &[PhaseScore],
    config: &GradeConfig,
) -> Grade {
    if !consensus.passes_filter {
        return Grade::Standard;
    }

    let all_accurate = !phases.is_empty()
        && phases
            .iter()
            .all(|p| p.accuracy_proxy() > config.min_phase_accuracy);

    if confidence > config.ai_confidence && all_accurate {
        Grade::AiGrade
    } else if confidence >= config.high_confidence {
        Grade::HighGrade
    } else {
        Grade::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConsensusQuality;

    fn passing() -> ConsensusResult {
        ConsensusResult {
            agreement_ratio: 1.0,
            quality: ConsensusQuality::Strong,
            passes_filter: true,
        }
    }

    fn phases(score: f64) -> Vec<PhaseScore> {
        vec![
            PhaseScore::from_score("technical", score, "t"),
            PhaseScore::from_score("ai_neural", score, "n"),
        ]
    }

    #[test]
    fn test_ai_grade_requires_accurate_phases() {
        let config = GradeConfig::default();
        // 90 → proxy 0.92
        assert_eq!(assign(98.0, &passing(), &phases(90.0), &config), Grade::AiGrade);
        // 70 → proxy 0.76
        assert_eq!(assign(98.0, &passing(), &phases(70.0), &config), Grade::HighGrade);
    }

    #[test]
    fn test_exactly_85_is_high_not_ai() {
        let config = GradeConfig::default();
        assert_eq!(assign(85.0, &passing(), &phases(95.0), &config), Grade::HighGrade);
        assert_eq!(assign(84.9, &passing(), &phases(95.0), &config), Grade::Standard);
    }

    #[test]
    fn test_weak_consensus_caps_at_standard() {
        let weak = ConsensusResult {
            agreement_ratio: 0.4,
            quality: ConsensusQuality::Weak,
            passes_filter: false,
        };
        assert_eq!(
            assign(98.0, &weak, &phases(95.0), &GradeConfig::default()),
            Grade::Standard
        );
    }

    #[test]
    fn test_no_phases_never_ai() {
        assert_eq!(
            assign(98.0, &passing(), &[], &GradeConfig::default()),
            Grade::HighGrade
        );
    }

    #[test]
    fn test_grade_monotone_in_confidence() {
        let config = GradeConfig::default();
        let p = phases(92.0);
        let mut last = Grade::Standard;
        for step in 0..=100 {
            let grade = assign(step as f64, &passing(), &p, &config);
            assert!(grade >= last);
            last = grade;
        }
        assert_eq!(last, Grade::AiGrade);
    }
}
