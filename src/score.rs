//! Weighted cost scoring of smoothed endpoint signals.
//!
//! Each endpoint's windowed means collapse into a single scalar cost per
//! round; lower is better, and `+∞` means "unusable" (the endpoint has no
//! reachable probe in its window).  Scores are recomputed fresh every round
//! and never persisted past the round's snapshot.

use crate::Signals;

/// Reciprocal floor for inverse-cost weighting (shared with selection).
pub(crate) const SCORE_FLOOR: f64 = 1e-6;

/// Weights for the scoring terms.
///
/// All weights are non-negative; negative or non-finite values are treated
/// as 0 at scoring time.  The bandwidth weight is a *scoring* knob and is
/// deliberately a different configuration value from the selector's
/// exploration rate, even though both default near each other — see
/// [`SessionConfig`](crate::SessionConfig), which carries them separately.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Weights {
    /// Latency weight (α), applied to the mean RTT in seconds.
    pub latency: f64,
    /// Load weight (β), applied to `load / 100`.
    pub load: f64,
    /// Health weight (γ), applied to `(100 − health) / 100`.
    pub health: f64,
    /// Error-rate weight (δ), applied to the mean error rate.
    pub error: f64,
    /// Bandwidth weight (ε), applied to the bandwidth penalty.
    pub bandwidth: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            latency: 1.0,
            load: 0.5,
            health: 0.3,
            error: 0.2,
            bandwidth: 0.4,
        }
    }
}

fn weight_or0(w: f64) -> f64 {
    if w.is_finite() && w >= 0.0 {
        w
    } else {
        0.0
    }
}

/// Score smoothed signals into a single cost (lower = better).
///
/// Returns `+∞` when `signals.latency_secs` is `None`: an endpoint with no
/// reachable probe in its window must never win the deterministic arm of
/// selection.  Otherwise:
///
/// ```text
/// score = α·latency + β·(load/100) + γ·((100 − health)/100)
///       + δ·error_rate + ε·bandwidth_penalty
/// ```
///
/// where `bandwidth_penalty = (1000 − bandwidth)/1000` for a nonzero
/// bandwidth mean and `1.0` (worst case) otherwise.
pub fn score(signals: &Signals, weights: &Weights) -> f64 {
    let Some(latency) = signals.latency_secs else {
        return f64::INFINITY;
    };

    let health_penalty = (100.0 - signals.health) / 100.0;
    let bandwidth_penalty = if signals.bandwidth_mbps != 0.0 {
        (1000.0 - signals.bandwidth_mbps) / 1000.0
    } else {
        1.0
    };

    weight_or0(weights.latency) * latency
        + weight_or0(weights.load) * (signals.load_pct / 100.0)
        + weight_or0(weights.health) * health_penalty
        + weight_or0(weights.error) * signals.error_rate
        + weight_or0(weights.bandwidth) * bandwidth_penalty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(latency: Option<f64>) -> Signals {
        Signals {
            latency_secs: latency,
            load_pct: 20.0,
            health: 95.0,
            error_rate: 0.0,
            bandwidth_mbps: 800.0,
        }
    }

    #[test]
    fn unreachable_window_scores_infinite() {
        assert_eq!(score(&signals(None), &Weights::default()), f64::INFINITY);
    }

    #[test]
    fn matches_hand_computed_weighted_sum() {
        let s = Signals {
            latency_secs: Some(0.05),
            load_pct: 20.0,
            health: 95.0,
            error_rate: 0.0,
            bandwidth_mbps: 800.0,
        };
        let w = Weights::default();
        // 1.0*0.05 + 0.5*0.2 + 0.3*0.05 + 0.2*0 + 0.4*0.2
        let expected = 0.05 + 0.1 + 0.015 + 0.0 + 0.08;
        assert!((score(&s, &w) - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_bandwidth_takes_worst_case_penalty() {
        let mut s = signals(Some(0.1));
        s.bandwidth_mbps = 0.0;
        let w = Weights {
            latency: 0.0,
            load: 0.0,
            health: 0.0,
            error: 0.0,
            bandwidth: 1.0,
        };
        assert_eq!(score(&s, &w), 1.0);
    }

    #[test]
    fn better_signals_score_lower() {
        let w = Weights::default();
        let good = Signals {
            latency_secs: Some(0.05),
            load_pct: 20.0,
            health: 95.0,
            error_rate: 0.0,
            bandwidth_mbps: 800.0,
        };
        let bad = Signals {
            latency_secs: Some(0.2),
            load_pct: 70.0,
            health: 60.0,
            error_rate: 0.1,
            bandwidth_mbps: 300.0,
        };
        assert!(score(&good, &w) < score(&bad, &w));
    }

    #[test]
    fn invalid_weights_are_treated_as_zero() {
        let s = signals(Some(0.1));
        let w = Weights {
            latency: f64::NAN,
            load: -3.0,
            health: 0.0,
            error: 0.0,
            bandwidth: 0.0,
        };
        assert_eq!(score(&s, &w), 0.0);
    }
}
