//! Indicator helpers over an observation window
//!
//! Prices arrive as `Decimal`; everything here works on `f64` columns.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::Observation;

/// Column view of an observation window, oldest first
#[derive(Debug, Clone, Default)]
pub struct Series {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<f64>,
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

impl Series {
    pub fn from_observations(observations: &[Observation]) -> Self {
        let mut series = Series {
            closes: Vec::with_capacity(observations.len()),
            highs: Vec::with_capacity(observations.len()),
            lows: Vec::with_capacity(observations.len()),
            volumes: Vec::with_capacity(observations.len()),
        };
        for obs in observations {
            let close = to_f64(obs.price);
            // Missing high/low collapse onto the close
            let high = to_f64(obs.high).max(close);
            let low = match to_f64(obs.low) {
                l if l > 0.0 => l.min(close),
                _ => close,
            };
            series.closes.push(close);
            series.highs.push(high);
            series.lows.push(low);
            series.volumes.push(to_f64(obs.volume));
        }
        series
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    /// Simple moving average of the last `period` closes
    pub fn sma(&self, period: usize) -> Option<f64> {
        sma(&self.closes, period)
    }

    /// RSI over the last `period` changes (simple gain/loss averages)
    pub fn rsi(&self, period: usize) -> Option<f64> {
        let closes = &self.closes;
        if period == 0 || closes.len() < period + 1 {
            return None;
        }

        let mut gains = 0.0;
        let mut losses = 0.0;
        for i in (closes.len() - period)..closes.len() {
            let change = closes[i] - closes[i - 1];
            if change > 0.0 {
                gains += change;
            } else {
                losses += change.abs();
            }
        }

        if losses == 0.0 {
            return Some(if gains == 0.0 { 50.0 } else { 100.0 });
        }

        let rs = gains / losses;
        Some(100.0 - (100.0 / (1.0 + rs)))
    }

    /// Simple period-over-period returns
    pub fn returns(&self) -> Vec<f64> {
        self.closes
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect()
    }

    /// Population standard deviation of simple returns over the window
    pub fn volatility(&self) -> f64 {
        let returns = self.returns();
        if returns.is_empty() {
            return 0.0;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        variance.sqrt()
    }

    /// Current volume over the mean of the last `lookback` volumes
    ///
    /// The mean includes the current bar. 1.0 when the window is empty or
    /// the volumes average zero.
    pub fn volume_ratio(&self, lookback: usize) -> f64 {
        let volumes = &self.volumes;
        let current = match volumes.last() {
            Some(v) => *v,
            None => return 1.0,
        };

        let count = lookback.clamp(1, volumes.len());
        let sum: f64 = volumes.iter().rev().take(count).sum();
        let avg = sum / count as f64;

        if avg == 0.0 {
            return 1.0;
        }
        current / avg
    }

    /// Mean true range over the last `period` bars
    ///
    /// None with fewer than two bars or a flat range.
    pub fn atr(&self, period: usize) -> Option<f64> {
        if self.len() < 2 || period == 0 {
            return None;
        }

        let count = period.min(self.len() - 1);
        let start = self.len() - count;
        let sum: f64 = (start..self.len())
            .map(|i| {
                let prev_close = self.closes[i - 1];
                let high_low = self.highs[i] - self.lows[i];
                let high_close = (self.highs[i] - prev_close).abs();
                let low_close = (self.lows[i] - prev_close).abs();
                high_low.max(high_close).max(low_close)
            })
            .sum();

        let atr = sum / count as f64;
        if atr > 0.0 && atr.is_finite() {
            Some(atr)
        } else {
            None
        }
    }

    /// Swing low and high over the last `period` bars (support, resistance)
    pub fn find_levels(&self, period: usize) -> Option<(f64, f64)> {
        if self.is_empty() || period == 0 {
            return None;
        }

        let start = self.len().saturating_sub(period);
        let low = self.lows[start..].iter().copied().fold(f64::INFINITY, f64::min);
        let high = self.highs[start..]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        Some((low, high))
    }

    /// Mean of the volumes in `[start, end)`
    pub fn mean_volume(&self, start: usize, end: usize) -> Option<f64> {
        if start >= end || end > self.volumes.len() {
            return None;
        }
        let slice = &self.volumes[start..end];
        Some(slice.iter().sum::<f64>() / slice.len() as f64)
    }
}

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: f64 = values.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64], volumes: &[f64]) -> Series {
        Series {
            closes: closes.to_vec(),
            highs: closes.to_vec(),
            lows: closes.to_vec(),
            volumes: volumes.to_vec(),
        }
    }

    #[test]
    fn test_sma() {
        let s = series(&[1.0, 2.0, 3.0, 4.0], &[0.0; 4]);
        assert_eq!(s.sma(2), Some(3.5));
        assert_eq!(s.sma(4), Some(2.5));
        assert_eq!(s.sma(5), None);
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let s = series(&rising, &[0.0; 20]);
        assert_eq!(s.rsi(14), Some(100.0));

        let flat = series(&[5.0; 20], &[0.0; 20]);
        assert_eq!(flat.rsi(14), Some(50.0));

        let short = series(&[1.0; 10], &[0.0; 10]);
        assert_eq!(short.rsi(14), None);
    }

    #[test]
    fn test_volume_ratio() {
        let mut volumes = vec![100.0; 20];
        volumes.push(200.0);
        let s = series(&[1.0; 21], &volumes);
        // 200 / mean(19 x 100, 200)
        assert!((s.volume_ratio(20) - 200.0 / 105.0).abs() < 1e-12);

        let zero = series(&[1.0; 3], &[0.0, 0.0, 0.0]);
        assert_eq!(zero.volume_ratio(20), 1.0);

        let single = series(&[1.0], &[10.0]);
        assert_eq!(single.volume_ratio(20), 1.0);

        let empty = series(&[], &[]);
        assert_eq!(empty.volume_ratio(20), 1.0);
    }

    #[test]
    fn test_volume_ratio_averages_current_bar() {
        // A 15.2 spike over a flat 10 reads 15.2 / 10.26, below the 1.5 band
        let mut volumes = vec![10.0; 29];
        volumes.push(15.2);
        let s = series(&[1.0; 30], &volumes);
        let ratio = s.volume_ratio(20);
        assert!((ratio - 15.2 / 10.26).abs() < 1e-12);
        assert!(ratio < 1.5);

        // 16 over the same base lands on the other side
        volumes[29] = 16.0;
        let s = series(&[1.0; 30], &volumes);
        assert!(s.volume_ratio(20) > 1.5);
    }

    #[test]
    fn test_volatility_of_constant_returns_is_zero() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let s = series(&closes, &[1.0; 10]);
        assert!(s.volatility() < 1e-12);
    }

    #[test]
    fn test_atr_and_levels() {
        let s = Series {
            closes: vec![100.0, 101.0, 102.0],
            highs: vec![101.0, 102.0, 103.0],
            lows: vec![99.0, 100.0, 101.0],
            volumes: vec![1.0; 3],
        };
        // TR: max(2, 1, 1) = 2 for both bars
        assert_eq!(s.atr(14), Some(2.0));
        assert_eq!(s.find_levels(20), Some((99.0, 103.0)));

        let flat = series(&[100.0; 5], &[1.0; 5]);
        assert_eq!(flat.atr(14), None);
    }

    #[test]
    fn test_from_observations_collapses_missing_range() {
        use chrono::Utc;
        let obs = Observation::flat(Utc::now(), Decimal::new(24500, 0), Decimal::ZERO);
        let s = Series::from_observations(&[obs]);
        assert_eq!(s.highs[0], 24500.0);
        assert_eq!(s.lows[0], 24500.0);
    }
}
