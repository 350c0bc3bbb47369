//! Market condition classifier

use crate::config::RegimeThresholds;
use crate::engine::indicators::Series;
use crate::types::{MarketCondition, Regime};

/// Classify the regime of a window. Never fails.
pub fn classify(series: &Series, thresholds: &RegimeThresholds) -> MarketCondition {
    if series.len() < thresholds.min_observations.max(1) {
        return MarketCondition {
            regime: Regime::SidewaysLowVol,
            volume_ratio: 1.0,
            trend_strength: 0.0,
            volatility: thresholds.fallback_volatility,
            insufficient_data: true,
        };
    }

    let price = series.last_close().unwrap_or(0.0);
    let trend_strength = match series.sma(thresholds.trend_period) {
        Some(sma) if sma > 0.0 => (price - sma).abs() / sma,
        _ => 0.0,
    };
    let volatility = series.volatility();
    let volume_ratio = series.volume_ratio(thresholds.volume_lookback);

    let regime = if trend_strength > thresholds.volatile_trend
        && volatility > thresholds.volatile_volatility
    {
        Regime::TrendingVolatile
    } else if trend_strength > thresholds.trend {
        Regime::Trending
    } else if volatility < thresholds.low_volatility {
        Regime::SidewaysLowVol
    } else {
        Regime::Sideways
    };

    MarketCondition {
        regime,
        volume_ratio,
        trend_strength,
        volatility,
        insufficient_data: false,
    }
}
