//! Quality scoring
//!
//! Maps (latency, loss rate) to a score in [0, 100] where higher is better.
//! The score ranks candidates within one cycle and is never stored.

use crate::model::{ProbeSample, QualityResult};

/// Weight of the latency sub-score
pub const LATENCY_WEIGHT: f64 = 0.4;

/// Weight of the loss sub-score
pub const LOSS_WEIGHT: f64 = 0.6;

/// Latency sub-score lost per millisecond (one point per 5 ms)
const LATENCY_PENALTY_PER_MS: f64 = 0.2;

/// Loss sub-score lost per unit of loss rate (ten points per percent)
const LOSS_PENALTY: f64 = 1000.0;

/// Latency assigned to samples without a single reply
///
/// Chosen so the latency sub-score of an unreachable address is zero.
pub const UNREACHABLE_LATENCY_MILLIS: u32 = 500;

/// Highest possible score
pub const MAX_SCORE: f64 = 100.0;

/// Latency sub-score in [0, 100]
pub fn latency_score(latency_millis: u32) -> f64 {
    (MAX_SCORE - f64::from(latency_millis) * LATENCY_PENALTY_PER_MS).clamp(0.0, MAX_SCORE)
}

/// Loss sub-score in [0, 100]
pub fn loss_score(loss_rate: f64) -> f64 {
    let loss_rate = if loss_rate.is_nan() {
        1.0
    } else {
        loss_rate.clamp(0.0, 1.0)
    };
    (MAX_SCORE - loss_rate * LOSS_PENALTY).clamp(0.0, MAX_SCORE)
}

/// Combined quality score in [0, 100], higher is better
pub fn score(latency_millis: u32, loss_rate: f64) -> f64 {
    latency_score(latency_millis) * LATENCY_WEIGHT + loss_score(loss_rate) * LOSS_WEIGHT
}

/// Score a probe sample
pub fn evaluate(sample: &ProbeSample) -> QualityResult {
    let loss_rate = sample.loss_rate();
    let latency_millis = if sample.packets_received == 0 {
        UNREACHABLE_LATENCY_MILLIS
    } else {
        rtt_to_millis(sample.average_rtt_millis)
    };

    QualityResult {
        address: sample.address.clone(),
        latency_millis,
        loss_rate,
        quality_score: score(latency_millis, loss_rate),
    }
}

fn rtt_to_millis(rtt: f64) -> u32 {
    if rtt.is_finite() && rtt > 0.0 {
        rtt.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}
