//! `probemux`: probe-driven endpoint monitoring and selection primitives.
//!
//! Built for the "which endpoint should I be talking to" problem: you have a
//! small set of network endpoints (URLs or `host:port` targets), you probe
//! each one once per round, and you want a single advisory pick per round
//! that balances latency, load, health, error rate, and bandwidth without
//! flapping between near-equal endpoints.
//!
//! The pipeline per round is probe → history → score → select → snapshot:
//!
//! - A [`Prober`] produces one [`Measurement`] per endpoint.  Probing never
//!   fails at this boundary: unreachable targets yield a degraded-but-valid
//!   measurement (`latency = None`, low health, synthetic error counts).
//! - [`History`] keeps a bounded sliding window (default capacity
//!   [`DEFAULT_WINDOW_CAP`]) of derived per-signal samples and exposes their
//!   running means as [`Signals`].
//! - [`score`] collapses the smoothed signals into a single cost (lower is
//!   better; `+∞` marks an endpoint that has never been successfully
//!   probed).
//! - [`EpsilonGreedy`] picks an endpoint: exploit the minimum-cost arm with
//!   probability `1 − ε`, otherwise sample proportionally to inverse cost.
//!   The previously picked endpoint carries a small anti-stickiness penalty
//!   so ties don't degenerate into inertia.
//! - [`Session`] owns all per-run state (histories, selection tally, round
//!   snapshots) and drives the loop, including pacing and cancellation.
//!
//! **Goals:**
//! - **Deterministic by default**: every stochastic piece is seedable.
//! - **Non-stationarity friendly**: windowed means, not lifetime averages.
//! - **Small K**: designed for a handful of endpoints, not hundreds.
//! - **Advisory only**: nothing is proxied anywhere; the pick is a signal
//!   for the caller, and the snapshot sequence is the presentation contract.
//!
//! # Quick start
//!
//! ```rust
//! use probemux::{ScriptedProbe, Session, SessionConfig};
//! use std::time::Duration;
//!
//! let cfg = SessionConfig {
//!     endpoints: vec!["a".into(), "b".into()],
//!     rounds: 3,
//!     interval: Duration::ZERO,
//!     ..SessionConfig::default()
//! };
//! let mut session = Session::new(cfg).unwrap();
//! let mut probe = ScriptedProbe::healthy_defaults();
//! let outcome = session.run(&mut probe);
//! assert_eq!(outcome.rounds_completed, 3);
//! assert_eq!(session.snapshots().len(), 3);
//! ```

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::time::Duration;

mod score;
pub use score::*;

mod select;
pub use select::*;

mod probe;
pub use probe::*;

mod session;
pub use session::*;

/// Default sliding-window capacity for per-endpoint histories.
pub const DEFAULT_WINDOW_CAP: usize = 10;

/// Smoothed latency substituted for display when a window holds no
/// reachable sample, in seconds.
///
/// Scoring does *not* use this: an endpoint with no reachable sample scores
/// `+∞` so it can never win the exploitation branch.  See
/// [`History::latency_or_fallback`].
pub const LATENCY_FALLBACK_SECS: f64 = 10.0;

/// Floor applied to `bandwidth_mbps` when sanitizing a measurement.
pub const MIN_BANDWIDTH_MBPS: f64 = 10.0;

/// One probe result for one endpoint in one round.
///
/// Produced by a [`Prober`]; immutable once built.  `latency = None` means
/// the endpoint was unreachable this round.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    /// Round-trip time of the liveness probe, absent when unreachable.
    pub latency: Option<Duration>,
    /// Load estimate in `[0, 100]`.
    pub load_pct: f64,
    /// Health score in `[0, 100]`.
    pub health: f64,
    /// Requests handled by the endpoint (floored to 1 at rate derivation).
    pub handled: u64,
    /// Errors observed at the endpoint.
    pub errors: u64,
    /// Bandwidth estimate in Mbps.
    pub bandwidth_mbps: f64,
}

impl Measurement {
    /// Build a measurement with out-of-range fields coerced into range:
    /// load and health clamped to `[0, 100]`, bandwidth floored to
    /// [`MIN_BANDWIDTH_MBPS`], non-finite values replaced by the safe end
    /// of their range.
    pub fn sanitized(
        latency: Option<Duration>,
        load_pct: f64,
        health: f64,
        handled: u64,
        errors: u64,
        bandwidth_mbps: f64,
    ) -> Self {
        let clamp_pct = |x: f64| if x.is_finite() { x.clamp(0.0, 100.0) } else { 0.0 };
        Self {
            latency,
            load_pct: clamp_pct(load_pct),
            health: if health.is_finite() {
                health.clamp(0.0, 100.0)
            } else {
                0.0
            },
            handled,
            errors,
            bandwidth_mbps: if bandwidth_mbps.is_finite() {
                bandwidth_mbps.max(MIN_BANDWIDTH_MBPS)
            } else {
                MIN_BANDWIDTH_MBPS
            },
        }
    }

    /// Error rate for this measurement: `errors / max(handled, 1)`.
    ///
    /// The floor keeps the division defined for endpoints that report a
    /// zero (or missing, coerced-to-zero) handled count.
    pub fn error_rate(&self) -> f64 {
        (self.errors as f64) / (self.handled.max(1) as f64)
    }

    /// Whether the probe reached the endpoint this round.
    pub fn reachable(&self) -> bool {
        self.latency.is_some()
    }
}

/// Per-round derived record retained in a [`History`] window.
///
/// The error rate is derived once, here, from the measurement's raw
/// handled/error counts; downstream scoring never re-derives it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// Probe round-trip time in seconds, absent when unreachable.
    pub latency_secs: Option<f64>,
    /// Load estimate in `[0, 100]`.
    pub load_pct: f64,
    /// Health score in `[0, 100]`.
    pub health: f64,
    /// Pre-derived error rate in `[0, ∞)`.
    pub error_rate: f64,
    /// Bandwidth estimate in Mbps.
    pub bandwidth_mbps: f64,
}

impl From<&Measurement> for Sample {
    fn from(m: &Measurement) -> Self {
        Self {
            latency_secs: m.latency.map(|d| d.as_secs_f64()),
            load_pct: m.load_pct,
            health: m.health,
            error_rate: m.error_rate(),
            bandwidth_mbps: m.bandwidth_mbps,
        }
    }
}

/// Smoothed per-endpoint signals: running means over the current window.
///
/// `latency_secs` is `None` when the window retains no reachable sample
/// (including the never-probed case); the scorer maps that to `+∞`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signals {
    /// Mean round-trip time over reachable samples, in seconds.
    pub latency_secs: Option<f64>,
    /// Mean load in `[0, 100]`.
    pub load_pct: f64,
    /// Mean health in `[0, 100]`.
    pub health: f64,
    /// Mean error rate in `[0, ∞)`.
    pub error_rate: f64,
    /// Mean bandwidth in Mbps.
    pub bandwidth_mbps: f64,
}

/// Bounded sliding window of per-round [`Sample`]s for one endpoint.
///
/// FIFO with drop-oldest-on-overflow; mutated only by appending the current
/// round's sample, never out of order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct History {
    cap: usize,
    buf: VecDeque<Sample>,
}

impl History {
    /// Create an empty history with capacity `cap` (minimum 1).
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            buf: VecDeque::new(),
        }
    }

    /// Maximum number of samples retained.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the endpoint has ever been probed this session.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Iterate over retained samples, oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.buf.iter()
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<&Sample> {
        self.buf.back()
    }

    /// Append the current round's measurement, evicting the oldest sample
    /// at capacity.
    pub fn record(&mut self, m: &Measurement) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(Sample::from(m));
    }

    /// Running means over the current window.
    ///
    /// Unreachable samples are excluded from the latency mean; with no
    /// reachable sample retained, `latency_secs` is `None`.  An empty
    /// window also has `latency_secs = None`, which is what keeps a
    /// never-probed endpoint at `+∞` in scoring.
    pub fn signals(&self) -> Signals {
        let n = self.buf.len();
        if n == 0 {
            return Signals {
                latency_secs: None,
                load_pct: 0.0,
                health: 0.0,
                error_rate: 0.0,
                bandwidth_mbps: 0.0,
            };
        }
        let mut lat_sum = 0.0_f64;
        let mut lat_n = 0usize;
        let mut load = 0.0_f64;
        let mut health = 0.0_f64;
        let mut err = 0.0_f64;
        let mut bw = 0.0_f64;
        for s in &self.buf {
            if let Some(l) = s.latency_secs {
                lat_sum += l;
                lat_n += 1;
            }
            load += s.load_pct;
            health += s.health;
            err += s.error_rate;
            bw += s.bandwidth_mbps;
        }
        let nf = n as f64;
        Signals {
            latency_secs: (lat_n > 0).then(|| lat_sum / lat_n as f64),
            load_pct: load / nf,
            health: health / nf,
            error_rate: err / nf,
            bandwidth_mbps: bw / nf,
        }
    }

    /// Smoothed latency with the display fallback applied: the mean over
    /// reachable samples, or [`LATENCY_FALLBACK_SECS`] when there is none.
    pub fn latency_or_fallback(&self) -> f64 {
        self.signals().latency_secs.unwrap_or(LATENCY_FALLBACK_SECS)
    }
}
