use crate::config::trend_thresholds::{CONFIDENCE_SCALE, LOWER_BAND, MAX_CONFIDENCE, UPPER_BAND};
use crate::types::{Candle, TrendDirection, TrendResult};

/// Classify the trend of a candle window by comparing the latest close with
/// the mean close of the whole window.
///
/// - latest > mean * 1.05 → `Up`
/// - latest < mean * 0.95 → `Down`
/// - otherwise → `Neutral` with confidence 0
///
/// Confidence is the relative deviation scaled by 1000, rounded, clamped to 100.
/// Returns None for fewer than two closes or a non-finite mean. An all-zero
/// window falls inside the band and reads as `Neutral`.
pub fn classify_trend(closes: &[f64]) -> Option<TrendResult> {
    if closes.len() < 2 {
        return None;
    }

    let mean = closes.iter().sum::<f64>() / closes.len() as f64;
    if !mean.is_finite() {
        return None;
    }
    let latest = *closes.last()?;

    let result = if latest > mean * UPPER_BAND {
        TrendResult {
            direction: TrendDirection::Up,
            confidence: scaled_confidence(latest - mean, mean),
        }
    } else if latest < mean * LOWER_BAND {
        TrendResult {
            direction: TrendDirection::Down,
            confidence: scaled_confidence(mean - latest, mean),
        }
    } else {
        TrendResult {
            direction: TrendDirection::Neutral,
            confidence: 0,
        }
    };

    Some(result)
}

/// Convenience wrapper over a candle window.
pub fn classify_candles(candles: &[Candle]) -> Option<TrendResult> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    classify_trend(&closes)
}

fn scaled_confidence(deviation: f64, mean: f64) -> u8 {
    (deviation / mean * CONFIDENCE_SCALE).round().min(MAX_CONFIDENCE) as u8
}
