// =============================================================================
// Scoring Transforms — Normalization and composite score formulas
// =============================================================================
//
// Maps raw metrics onto bounded scores. Two normalization shapes cover every
// metric class:
//
//   sigmoid — unbounded metrics (depth, counts); the midpoint maps to 50
//   linear  — naturally bounded metrics (spreads, volatility); min→0, max→100
//
// Composites are weighted averages of normalized components, always clamped
// before being returned.

use crate::math::{round_to, round2, weighted_avg};
use crate::types::VolatilityRegime;

/// Sigmoid score in [0, 100] for unbounded metrics.
///
/// `value == midpoint` yields exactly 50 for any positive midpoint and any
/// steepness; larger steepness sharpens the transition around the midpoint.
pub fn sigmoid_score(value: f64, midpoint: f64, steepness: f64) -> f64 {
    let x = steepness * (value - midpoint) / midpoint;
    round2((100.0 / (1.0 + (-x).exp())).clamp(0.0, 100.0))
}

/// Linear score in [0, 100]: `min` maps to 0 and `max` to 100, clamped.
/// With `invert` the mapping flips (min→100, max→0). Returns 50 when the
/// range is degenerate.
pub fn linear_score(value: f64, min: f64, max: f64, invert: bool) -> f64 {
    if max == min {
        return 50.0;
    }
    let mut normalized = (value - min) / (max - min) * 100.0;
    if invert {
        normalized = 100.0 - normalized;
    }
    round2(normalized.clamp(0.0, 100.0))
}

// =============================================================================
// Liquidity
// =============================================================================

/// Composite liquidity score: depth 0.40, spread 0.35, resilience 0.25.
pub fn composite_liquidity_score(depth: f64, spread: f64, resilience: f64) -> f64 {
    round2(weighted_avg(
        &[depth, spread, resilience],
        &[0.4, 0.35, 0.25],
    ))
}

/// Human-readable bucket for a liquidity score.
pub fn liquidity_label(score: f64) -> &'static str {
    if score >= 80.0 {
        "Excellent"
    } else if score >= 60.0 {
        "Good"
    } else if score >= 40.0 {
        "Fair"
    } else if score >= 20.0 {
        "Poor"
    } else {
        "Critical"
    }
}

// =============================================================================
// Volatility
// =============================================================================

/// Regime band edges (annualized volatility %). Bands are half-open with the
/// low band inclusive of 0; the extreme band is treated as [80, 200] for
/// confidence purposes.
const REGIME_BANDS: [(VolatilityRegime, f64, f64); 4] = [
    (VolatilityRegime::Low, 0.0, 20.0),
    (VolatilityRegime::Medium, 20.0, 50.0),
    (VolatilityRegime::High, 50.0, 80.0),
    (VolatilityRegime::Extreme, 80.0, 200.0),
];

/// Classify annualized volatility (%) into a regime bucket.
pub fn volatility_regime(vol: f64) -> VolatilityRegime {
    if vol < 20.0 {
        VolatilityRegime::Low
    } else if vol < 50.0 {
        VolatilityRegime::Medium
    } else if vol < 80.0 {
        VolatilityRegime::High
    } else {
        VolatilityRegime::Extreme
    }
}

/// Confidence in a regime classification, in [0, 1].
///
/// Distance from the nearer band edge normalized by half the band width:
/// 1.0 at the band center, 0 at either edge.
pub fn regime_confidence(vol: f64) -> f64 {
    let regime = volatility_regime(vol);
    let (_, min, max) = REGIME_BANDS
        .iter()
        .find(|(r, _, _)| *r == regime)
        .copied()
        .expect("every regime has a band");
    let range = max - min;
    let dist = (vol - min).min(max - vol);
    round_to((dist / (range / 2.0)).clamp(0.0, 1.0), 3)
}

/// Volatility expressed as a 0–100 score over a 0–150% annualized range.
pub fn volatility_score(vol: f64) -> f64 {
    linear_score(vol, 0.0, 150.0, false)
}

// =============================================================================
// Momentum
// =============================================================================

/// Composite momentum score in [-100, 100].
///
/// Short-horizon changes are amplified (5m ×10, 1h ×5, 24h ×2) so that the
/// slower components do not drown them out; flow bias in [-1, 1] is scaled
/// by 50. Weights 0.3/0.3/0.2/0.2.
pub fn momentum_score(change_5m: f64, change_1h: f64, change_24h: f64, flow_bias: f64) -> f64 {
    let composite = weighted_avg(
        &[
            change_5m * 10.0,
            change_1h * 5.0,
            change_24h * 2.0,
            flow_bias * 50.0,
        ],
        &[0.3, 0.3, 0.2, 0.2],
    );
    round2(composite.clamp(-100.0, 100.0))
}

/// Bucket label for a momentum score.
pub fn momentum_label(score: f64) -> &'static str {
    if score <= -50.0 {
        "strong_bearish"
    } else if score <= -15.0 {
        "bearish"
    } else if score <= 15.0 {
        "neutral"
    } else if score <= 50.0 {
        "bullish"
    } else {
        "strong_bullish"
    }
}

// =============================================================================
// Overall health
// =============================================================================

/// Blend the three analyzer scores into one overall-health figure.
///
/// Volatility is inverted over [0, 100] (calmer is healthier). Momentum is
/// folded symmetrically: both extremes reduce health, neutral momentum sits
/// near 50, and confident directional momentum peaks in between.
pub fn overall_health_score(liquidity: f64, volatility: f64, momentum: f64) -> f64 {
    let vol_health = linear_score(volatility, 0.0, 100.0, true);
    let mom_health = 50.0 + (50.0 - momentum.abs()).abs() * 0.5;
    round2(weighted_avg(
        &[liquidity, vol_health, mom_health],
        &[0.5, 0.3, 0.2],
    ))
}
