//! Epsilon-greedy endpoint selection with an anti-stickiness penalty.
//!
//! Adaptive routing over a cost map tends to flap between near-equal
//! endpoints, or the opposite: stay pinned to one purely by inertia.  The
//! selector here addresses the second failure mode by adding a small fixed
//! penalty to the previously picked endpoint's cost before deciding — close
//! calls tip away from the incumbent, while a genuinely better incumbent
//! still wins.
//!
//! The policy is **seedable** so it can be reproduced in tests; default
//! construction is deterministic.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::score::SCORE_FLOOR;

/// Configuration for epsilon-greedy selection.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectConfig {
    /// Exploration rate in `[0, 1]`: probability of sampling from the
    /// inverse-cost distribution instead of exploiting the minimum.
    ///
    /// This is the *selection* epsilon; it is a distinct configuration
    /// value from the bandwidth scoring weight and must never be wired
    /// from it.
    pub epsilon: f64,
    /// Cost added to the previously selected endpoint before deciding.
    ///
    /// - `0.0` disables the anti-stickiness bias.
    pub anti_stick: f64,
    /// Seed for the internal RNG.
    pub seed: u64,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.2,
            anti_stick: 0.03,
            seed: 0,
        }
    }
}

/// Seedable epsilon-greedy selector over a cost map.
///
/// The previous selection is caller state (it belongs to the monitoring
/// session), passed into every [`select`](EpsilonGreedy::select) call; the
/// selector itself holds only configuration and the RNG.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    cfg: SelectConfig,
    rng: StdRng,
}

impl EpsilonGreedy {
    /// Create a selector with deterministic defaults.
    pub fn new(cfg: SelectConfig) -> Self {
        Self::with_seed(cfg, cfg.seed)
    }

    /// Create with an explicit seed.
    pub fn with_seed(mut cfg: SelectConfig, seed: u64) -> Self {
        cfg.seed = seed;
        Self {
            cfg,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> SelectConfig {
        self.cfg
    }

    /// Pick an endpoint for this round.
    ///
    /// Policy:
    /// 1. Adjust costs: `previous` (if present) gets `+anti_stick`, every
    ///    other arm is unchanged.
    /// 2. With probability `epsilon`, sample from the normalized
    ///    inverse-cost distribution (`1 / max(cost, 1e-6)`), so any
    ///    finite-cost arm keeps a nonzero chance, better arms a larger one.
    ///    If every arm is `+∞` (nothing ever reached), fall back to a
    ///    uniform draw.
    /// 3. Otherwise exploit: the first minimum of the adjusted costs in
    ///    `arms_in_order` order.
    ///
    /// Arms missing from `scores` are treated as `+∞`.  Returns `None` only
    /// for an empty `arms_in_order`.
    pub fn select(
        &mut self,
        arms_in_order: &[String],
        scores: &BTreeMap<String, f64>,
        previous: Option<&str>,
    ) -> Option<String> {
        if arms_in_order.is_empty() {
            return None;
        }

        let adjusted: Vec<f64> = arms_in_order
            .iter()
            .map(|a| {
                let base = scores.get(a).copied().unwrap_or(f64::INFINITY);
                if previous == Some(a.as_str()) {
                    base + self.cfg.anti_stick
                } else {
                    base
                }
            })
            .collect();

        let epsilon = self.cfg.epsilon.clamp(0.0, 1.0);
        if epsilon > 0.0 && self.rng.random::<f64>() < epsilon {
            return Some(self.sample_inverse(arms_in_order, &adjusted));
        }

        // Exploitation: first minimum in arm order.  With every arm at +∞
        // the comparison never improves on the first arm, which is the
        // stable degenerate answer.
        let mut best = 0usize;
        for (i, &s) in adjusted.iter().enumerate().skip(1) {
            if s < adjusted[best] {
                best = i;
            }
        }
        Some(arms_in_order[best].clone())
    }

    /// Sample one arm with probability proportional to inverse cost.
    fn sample_inverse(&mut self, arms: &[String], adjusted: &[f64]) -> String {
        let mut weights: Vec<f64> = adjusted
            .iter()
            .map(|&s| {
                let w = 1.0 / s.max(SCORE_FLOOR);
                if w.is_finite() && w > 0.0 {
                    w
                } else {
                    0.0
                }
            })
            .collect();

        let total: f64 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            // Degenerate distribution (every arm unusable): uniform draw.
            let i = self.rng.random_range(0..arms.len());
            return arms[i].clone();
        }
        for w in &mut weights {
            *w /= total;
        }

        let r: f64 = self.rng.random();
        let mut cdf = 0.0;
        for (i, w) in weights.iter().enumerate() {
            cdf += *w;
            if r < cdf {
                return arms[i].clone();
            }
        }
        // Numerical fallback.
        arms.last().cloned().unwrap()
    }
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self::new(SelectConfig::default())
    }
}
