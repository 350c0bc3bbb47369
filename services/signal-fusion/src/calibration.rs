//! Out-of-band accuracy calibration
//!
//! Tracks whether each phase's vote matched the realised move and feeds
//! observed hit-rates back into the phase catalogue.

use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::config::PhaseCatalogue;
use crate::engine::ensemble::phase_vote;
use crate::types::{Direction, TradingCall};

const DEFAULT_WINDOW: usize = 20;
const DEFAULT_MIN_SAMPLES: usize = 10;

/// Rolling per-phase outcome record
#[derive(Debug, Clone)]
pub struct AccuracyTracker {
    window: usize,
    min_samples: usize,
    outcomes: HashMap<String, VecDeque<bool>>,
}

impl Default for AccuracyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MIN_SAMPLES)
    }
}

impl AccuracyTracker {
    pub fn new(window: usize, min_samples: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            min_samples: min_samples.clamp(1, window),
            outcomes: HashMap::new(),
        }
    }

    /// Record one outcome, evicting the oldest beyond the window
    pub fn record(&mut self, phase: &str, correct: bool) {
        let window = self.window;
        let history = self
            .outcomes
            .entry(phase.to_string())
            .or_insert_with(|| VecDeque::with_capacity(window));
        if history.len() == window {
            history.pop_front();
        }
        history.push_back(correct);
    }

    /// Score every phase of a past call against the direction that played out
    pub fn record_call(&mut self, call: &TradingCall, realised: Direction) {
        for phase in &call.per_phase_breakdown {
            self.record(&phase.phase_name, phase_vote(phase.score) == realised);
        }
    }

    pub fn samples(&self, phase: &str) -> usize {
        self.outcomes.get(phase).map(|h| h.len()).unwrap_or(0)
    }

    /// Hit-rate over the current window
    pub fn hit_rate(&self, phase: &str) -> Option<f64> {
        let history = self.outcomes.get(phase)?;
        if history.is_empty() {
            return None;
        }
        let hits = history.iter().filter(|&&c| c).count();
        Some(hits as f64 / history.len() as f64)
    }

    /// Copy of `base` with accuracies replaced by observed hit-rates
    ///
    /// Phases with fewer than `min_samples` outcomes keep their base accuracy.
    pub fn calibrated_catalogue(&self, base: &PhaseCatalogue) -> PhaseCatalogue {
        let mut catalogue = base.clone();
        for entry in &mut catalogue.entries {
            if self.samples(&entry.name) < self.min_samples {
                continue;
            }
            if let Some(rate) = self.hit_rate(&entry.name) {
                debug!(
                    phase = %entry.name,
                    from = entry.accuracy,
                    to = rate,
                    "Calibrated phase accuracy"
                );
                entry.accuracy = rate;
            }
        }
        catalogue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_window_evicts_oldest() {
        let mut tracker = AccuracyTracker::new(4, 2);
        for correct in [false, false, true, true, true, true] {
            tracker.record("momentum", correct);
        }
        assert_eq!(tracker.samples("momentum"), 4);
        assert_eq!(tracker.hit_rate("momentum"), Some(1.0));
        assert_eq!(tracker.hit_rate("technical"), None);
    }

    #[test]
    fn test_min_samples_gate() {
        let mut tracker = AccuracyTracker::default();
        for _ in 0..9 {
            tracker.record("technical", false);
        }
        let base = PhaseCatalogue::default();
        let calibrated = tracker.calibrated_catalogue(&base);
        assert_eq!(calibrated.accuracy("technical"), 0.82);

        tracker.record("technical", true);
        let calibrated = tracker.calibrated_catalogue(&base);
        assert!((calibrated.accuracy("technical") - 0.1).abs() < 1e-12);
        // Untouched phases keep their base values
        assert_eq!(calibrated.accuracy("ai_neural"), 0.80);
    }

    #[test]
    fn test_calibrated_catalogue_stays_valid() {
        let mut tracker = AccuracyTracker::default();
        for i in 0..20 {
            tracker.record("smart_money", i % 4 != 0);
        }
        let calibrated = tracker.calibrated_catalogue(&PhaseCatalogue::default());
        assert!(calibrated.validate().is_ok());
        assert!((calibrated.accuracy("smart_money") - 0.75).abs() < 1e-12);
    }
}
