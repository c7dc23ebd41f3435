//! Monitoring session: configuration, per-round driver, and the run loop.
//!
//! A [`Session`] owns every piece of per-run state — per-endpoint histories,
//! the previous selection, the selection tally, and the append-only round
//! snapshot sequence — so there are no process-wide singletons and two
//! sessions never share anything.  One round is probe → history → score →
//! select → snapshot; the loop runs rounds strictly sequentially with an
//! inter-round pacing delay and a cancel flag checked at the top of each
//! round (a round is atomic with respect to cancellation).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::score::score;
use crate::{EpsilonGreedy, History, Prober, SelectConfig, Signals, Weights};
use crate::DEFAULT_WINDOW_CAP;

/// Invalid session configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("endpoint list is empty")]
    NoEndpoints,
    #[error("round count must be at least 1")]
    ZeroRounds,
    #[error("exploration rate must be within [0, 1], got {0}")]
    ExplorationOutOfRange(f64),
    #[error("anti-stickiness penalty must be a non-negative finite value, got {0}")]
    InvalidAntiStick(f64),
}

/// A round-level failure.
///
/// Probe failures never surface here (the prober absorbs them); this covers
/// driver-level defects, which halt the loop without touching committed
/// history.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionError {
    #[error("selection produced no endpoint")]
    EmptySelection,
}

/// Session configuration, applied from the presentation layer.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Monitored endpoints, in user order (chart/column order follows it).
    pub endpoints: Vec<String>,
    /// Number of rounds to run.
    pub rounds: u32,
    /// Inter-round pacing delay.  Purely pacing, not correctness.
    pub interval: Duration,
    /// Per-endpoint history window capacity.
    pub window_cap: usize,
    /// Scoring weights.  `weights.bandwidth` is the scoring ε and is a
    /// separate knob from `exploration` below; the driver never wires one
    /// from the other.
    pub weights: Weights,
    /// Selector exploration rate in `[0, 1]`.
    pub exploration: f64,
    /// Anti-stickiness penalty added to the previous pick's score.
    pub anti_stick: f64,
    /// Seed for the selector RNG.
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            rounds: 20,
            interval: Duration::from_secs(1),
            window_cap: DEFAULT_WINDOW_CAP,
            weights: Weights::default(),
            exploration: 0.2,
            anti_stick: 0.03,
            seed: 0,
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<Vec<String>, ConfigError> {
        if self.rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if !(self.exploration.is_finite() && (0.0..=1.0).contains(&self.exploration)) {
            return Err(ConfigError::ExplorationOutOfRange(self.exploration));
        }
        if !(self.anti_stick.is_finite() && self.anti_stick >= 0.0) {
            return Err(ConfigError::InvalidAntiStick(self.anti_stick));
        }
        normalize_endpoints(&self.endpoints)
    }
}

/// Trim, drop empties, and dedupe (first occurrence wins, order preserved).
fn normalize_endpoints(raw: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for e in raw {
        let e = e.trim();
        if e.is_empty() || out.iter().any(|x| x == e) {
            continue;
        }
        out.push(e.to_string());
    }
    if out.is_empty() {
        return Err(ConfigError::NoEndpoints);
    }
    Ok(out)
}

/// One endpoint's instantaneous values in a round snapshot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnapshotEntry {
    pub endpoint: String,
    /// This round's probe RTT in milliseconds, absent when unreachable.
    pub latency_ms: Option<f64>,
    pub load_pct: f64,
    pub health: f64,
    /// This round's error rate as a percentage.
    pub error_rate_pct: f64,
    pub bandwidth_mbps: f64,
    /// Whether this endpoint was the round's selection.
    pub chosen: bool,
}

/// One completed round, recorded for charting/reporting.
///
/// Snapshots are append-only, one per completed round, and are never read
/// back into the decision path.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoundSnapshot {
    /// Zero-based round index.
    pub round: u32,
    /// Per-endpoint values, in endpoint order.
    pub entries: Vec<SnapshotEntry>,
}

/// Why a run loop stopped.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// All configured rounds completed.
    Completed,
    /// The cancel flag was observed at a round boundary.
    Cancelled,
    /// A round-level error halted the loop; committed state is intact.
    Failed(SessionError),
}

/// Result of a [`Session::run`] call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunOutcome {
    /// Total rounds completed this session (across resumed runs).
    pub rounds_completed: u32,
    pub stop: StopReason,
    /// Tally arg-max at stop time, if any round ran.
    pub best_overall: Option<String>,
}

/// Cloneable cancellation handle for a session's run loop.
///
/// [`stop`](CancelFlag::stop) takes effect at the next round boundary: the
/// in-flight round always commits in full.  The flag stays set until
/// [`clear`](CancelFlag::clear) (or a session reset), so a stopped session
/// does not silently resume.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Request the loop to stop after the in-flight round.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Re-arm the flag so a subsequent run proceeds.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Whether a stop has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A monitoring session: validated configuration plus all per-run state.
#[derive(Debug)]
pub struct Session {
    cfg: SessionConfig,
    endpoints: Vec<String>,
    histories: BTreeMap<String, History>,
    selector: EpsilonGreedy,
    previous: Option<String>,
    tally: BTreeMap<String, u64>,
    snapshots: Vec<RoundSnapshot>,
    rounds_completed: u32,
    cancel: CancelFlag,
}

impl Session {
    /// Validate `cfg` and build a fresh session with empty state.
    pub fn new(cfg: SessionConfig) -> Result<Self, ConfigError> {
        let endpoints = cfg.validate()?;
        let mut session = Self {
            cfg,
            endpoints: Vec::new(),
            histories: BTreeMap::new(),
            selector: EpsilonGreedy::default(),
            previous: None,
            tally: BTreeMap::new(),
            snapshots: Vec::new(),
            rounds_completed: 0,
            cancel: CancelFlag::default(),
        };
        session.init_state(endpoints);
        Ok(session)
    }

    fn init_state(&mut self, endpoints: Vec<String>) {
        self.histories = endpoints
            .iter()
            .map(|e| (e.clone(), History::new(self.cfg.window_cap)))
            .collect();
        self.tally = endpoints.iter().map(|e| (e.clone(), 0u64)).collect();
        self.endpoints = endpoints;
        self.selector = EpsilonGreedy::new(SelectConfig {
            epsilon: self.cfg.exploration,
            anti_stick: self.cfg.anti_stick,
            seed: self.cfg.seed,
        });
        self.previous = None;
        self.snapshots.clear();
        self.rounds_completed = 0;
        self.cancel.clear();
    }

    /// Replace the endpoint list and reinitialize every structure from
    /// empty.  Reapplying an identical list still resets everything.
    pub fn apply_endpoints(&mut self, endpoints: Vec<String>) -> Result<(), ConfigError> {
        let normalized = normalize_endpoints(&endpoints)?;
        self.cfg.endpoints = endpoints;
        self.init_state(normalized);
        Ok(())
    }

    /// Discard all collected state, keeping the current endpoint list and
    /// configuration.
    pub fn reset(&mut self) {
        let endpoints = self.endpoints.clone();
        self.init_state(endpoints);
    }

    /// The validated endpoint list, in user order.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.cfg
    }

    /// The endpoint chosen on the most recently completed round.
    pub fn selection(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    /// Latest smoothed signals for `endpoint`.
    pub fn signals(&self, endpoint: &str) -> Option<Signals> {
        self.histories.get(endpoint).map(History::signals)
    }

    /// The sliding-window history for `endpoint`.
    pub fn history(&self, endpoint: &str) -> Option<&History> {
        self.histories.get(endpoint)
    }

    /// Completed-round snapshots, oldest first.
    pub fn snapshots(&self) -> &[RoundSnapshot] {
        &self.snapshots
    }

    /// Per-endpoint selection counts.
    pub fn tally(&self) -> &BTreeMap<String, u64> {
        &self.tally
    }

    /// Rounds completed so far this session.
    pub fn rounds_completed(&self) -> u32 {
        self.rounds_completed
    }

    /// Cancellation handle for the run loop.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Tally arg-max; ties resolve toward the earlier endpoint in user
    /// order.  `None` before the first completed round.
    pub fn best_overall(&self) -> Option<&str> {
        if self.rounds_completed == 0 {
            return None;
        }
        let mut best: Option<(&str, u64)> = None;
        for e in &self.endpoints {
            let count = self.tally.get(e).copied().unwrap_or(0);
            match best {
                Some((_, c)) if c >= count => {}
                _ => best = Some((e, count)),
            }
        }
        best.map(|(e, _)| e)
    }

    /// Run one monitoring round.
    ///
    /// Probes every endpoint once (sequentially, no retry), feeds the
    /// measurements into the histories, scores, selects against the
    /// previous pick, updates the tally, and appends the round snapshot.
    /// Side effects are confined to this session's state.  Returns the
    /// selected endpoint.
    pub fn run_round(&mut self, prober: &mut dyn Prober) -> Result<String, SessionError> {
        let round = self.rounds_completed;

        for endpoint in &self.endpoints {
            let m = prober.probe(endpoint);
            // The prober contract guarantees a well-formed measurement,
            // reachable or not.
            if let Some(h) = self.histories.get_mut(endpoint) {
                h.record(&m);
            }
        }

        let scores: BTreeMap<String, f64> = self
            .endpoints
            .iter()
            .map(|e| {
                let signals = self.histories[e].signals();
                (e.clone(), score(&signals, &self.cfg.weights))
            })
            .collect();

        let chosen = self
            .selector
            .select(&self.endpoints, &scores, self.previous.as_deref())
            .ok_or(SessionError::EmptySelection)?;

        if let Some(prev) = self.previous.as_deref() {
            if prev != chosen {
                tracing::info!(from = %prev, to = %chosen, round, "selection switched");
            }
        }

        *self.tally.entry(chosen.clone()).or_insert(0) += 1;
        self.previous = Some(chosen.clone());

        let entries = self
            .endpoints
            .iter()
            .map(|e| {
                let latest = self.histories[e].latest().copied().unwrap_or(crate::Sample {
                    latency_secs: None,
                    load_pct: 0.0,
                    health: 0.0,
                    error_rate: 0.0,
                    bandwidth_mbps: 0.0,
                });
                SnapshotEntry {
                    endpoint: e.clone(),
                    latency_ms: latest.latency_secs.map(|s| s * 1000.0),
                    load_pct: latest.load_pct,
                    health: latest.health,
                    error_rate_pct: latest.error_rate * 100.0,
                    bandwidth_mbps: latest.bandwidth_mbps,
                    chosen: *e == chosen,
                }
            })
            .collect();
        self.snapshots.push(RoundSnapshot { round, entries });
        self.rounds_completed += 1;

        Ok(chosen)
    }

    /// Run rounds until the configured count, cancellation, or a round
    /// failure.
    ///
    /// The cancel flag is checked at the top of every round; the in-flight
    /// round always commits.  The pacing delay is skipped after the final
    /// round.  Calling `run` again resumes from the current round count.
    pub fn run(&mut self, prober: &mut dyn Prober) -> RunOutcome {
        let planned = self.cfg.rounds;
        let stop = loop {
            if self.rounds_completed >= planned {
                break StopReason::Completed;
            }
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    completed = self.rounds_completed,
                    planned,
                    "monitoring stopped before the configured round count"
                );
                break StopReason::Cancelled;
            }
            match self.run_round(prober) {
                Ok(chosen) => {
                    tracing::debug!(round = self.rounds_completed, chosen = %chosen, "round complete");
                }
                Err(e) => {
                    tracing::error!(round = self.rounds_completed, error = %e, "round failed, halting");
                    break StopReason::Failed(e);
                }
            }
            if self.rounds_completed < planned && !self.cfg.interval.is_zero() {
                std::thread::sleep(self.cfg.interval);
            }
        };

        let best_overall = self.best_overall().map(str::to_string);
        if matches!(stop, StopReason::Completed) {
            tracing::info!(
                rounds = self.rounds_completed,
                best = best_overall.as_deref().unwrap_or("-"),
                "monitoring complete"
            );
        }
        RunOutcome {
            rounds_completed: self.rounds_completed,
            stop,
            best_overall,
        }
    }
}
