use probemux::{
    score, Measurement, ScriptedProbe, Session, SessionConfig, StopReason, Weights,
};
use std::time::Duration;

fn measurement(
    latency_ms: Option<u64>,
    load: f64,
    health: f64,
    handled: u64,
    errors: u64,
    bw: f64,
) -> Measurement {
    Measurement::sanitized(
        latency_ms.map(Duration::from_millis),
        load,
        health,
        handled,
        errors,
        bw,
    )
}

/// Three endpoints with fixed synthetic measurements: a fast healthy one, a
/// slow degraded one, and one that never answers.  Under pure exploitation
/// the fast endpoint must win every round and the dead one must stay
/// unusable throughout.
#[test]
fn fast_healthy_endpoint_wins_every_round() {
    let a = measurement(Some(50), 20.0, 95.0, 100, 0, 800.0);
    let b = measurement(Some(200), 70.0, 60.0, 100, 10, 300.0);
    let c = ScriptedProbe::unreachable();

    let cfg = SessionConfig {
        endpoints: vec!["A".into(), "B".into(), "C".into()],
        rounds: 5,
        interval: Duration::ZERO,
        exploration: 0.0,
        ..SessionConfig::default()
    };
    let mut session = Session::new(cfg).unwrap();
    let mut probe = ScriptedProbe::always(c)
        .with_fixed("A", a)
        .with_fixed("B", b);

    for _ in 0..5 {
        let chosen = session.run_round(&mut probe).unwrap();
        assert_eq!(chosen, "A");

        // C has never been reached: its score must be infinite.
        let c_signals = session.signals("C").unwrap();
        assert_eq!(c_signals.latency_secs, None);
        assert_eq!(
            score(&c_signals, &session.config().weights),
            f64::INFINITY
        );
    }

    assert_eq!(session.tally()["A"], 5);
    assert_eq!(session.tally()["B"], 0);
    assert_eq!(session.tally()["C"], 0);
    assert_eq!(session.best_overall(), Some("A"));
    assert_eq!(session.snapshots().len(), 5);
}

/// A's anti-stick penalty (default 0.03) is far smaller than the scoring
/// gap to B, so the incumbent keeps winning; the penalty only matters when
/// scores are close.
#[test]
fn anti_stick_does_not_flip_a_clear_winner() {
    let a = measurement(Some(50), 20.0, 95.0, 100, 0, 800.0);
    let b = measurement(Some(200), 70.0, 60.0, 100, 10, 300.0);

    let w = Weights::default();
    let mut ha = probemux::History::new(10);
    let mut hb = probemux::History::new(10);
    ha.record(&a);
    hb.record(&b);
    let gap = score(&hb.signals(), &w) - score(&ha.signals(), &w);
    assert!(gap > 0.03, "scenario sanity: gap {gap} must exceed the penalty");
}

/// An endpoint that starts dead and comes back: the window means recover
/// and the pick moves over once its score undercuts the incumbent's.
#[test]
fn recovered_endpoint_gets_picked_up() {
    let healthy = measurement(Some(10), 10.0, 100.0, 100, 0, 850.0);
    let slow = measurement(Some(400), 80.0, 50.0, 100, 20, 200.0);

    let mut fast_seq = vec![ScriptedProbe::unreachable(); 3];
    fast_seq.push(healthy);

    let cfg = SessionConfig {
        endpoints: vec!["slow".into(), "fast".into()],
        rounds: 6,
        interval: Duration::ZERO,
        exploration: 0.0,
        ..SessionConfig::default()
    };
    let mut session = Session::new(cfg).unwrap();
    let mut probe = ScriptedProbe::always(slow).with_sequence("fast", fast_seq);

    let mut picks = Vec::new();
    for _ in 0..6 {
        picks.push(session.run_round(&mut probe).unwrap());
    }

    // While "fast" is dead it scores infinite and can never be exploited.
    assert!(picks[..3].iter().all(|p| p == "slow"));
    // Once reachable, its far better signals dominate "slow" plus any
    // stickiness adjustment.
    assert!(picks[3..].iter().all(|p| p == "fast"), "picks: {picks:?}");
}

#[test]
fn run_reports_completion_and_best_overall() {
    let cfg = SessionConfig {
        endpoints: vec!["only".into()],
        rounds: 4,
        interval: Duration::ZERO,
        exploration: 0.0,
        ..SessionConfig::default()
    };
    let mut session = Session::new(cfg).unwrap();
    let mut probe = ScriptedProbe::healthy_defaults();
    let out = session.run(&mut probe);
    assert_eq!(out.stop, StopReason::Completed);
    assert_eq!(out.rounds_completed, 4);
    assert_eq!(out.best_overall.as_deref(), Some("only"));
}

/// Snapshot entries carry the presentation-facing units: milliseconds for
/// latency and percent for the error rate.
#[test]
fn snapshot_units_and_flags() {
    let a = measurement(Some(50), 20.0, 95.0, 100, 10, 800.0);

    let cfg = SessionConfig {
        endpoints: vec!["A".into()],
        rounds: 1,
        interval: Duration::ZERO,
        exploration: 0.0,
        ..SessionConfig::default()
    };
    let mut session = Session::new(cfg).unwrap();
    let mut probe = ScriptedProbe::always(a);
    session.run_round(&mut probe).unwrap();

    let snap = &session.snapshots()[0];
    assert_eq!(snap.round, 0);
    let entry = &snap.entries[0];
    assert_eq!(entry.latency_ms, Some(50.0));
    assert!((entry.error_rate_pct - 10.0).abs() < 1e-9);
    assert!(entry.chosen);
}

/// Degraded windows mix reachable and unreachable rounds; the latency mean
/// only reflects the reachable ones, and the score stays finite.
#[test]
fn flapping_endpoint_keeps_a_finite_score() {
    let up = measurement(Some(100), 30.0, 90.0, 100, 0, 600.0);

    let cfg = SessionConfig {
        endpoints: vec!["flappy".into()],
        rounds: 6,
        interval: Duration::ZERO,
        exploration: 0.0,
        ..SessionConfig::default()
    };
    let mut session = Session::new(cfg).unwrap();
    let mut probe = ScriptedProbe::always(up).with_sequence(
        "flappy",
        vec![
            up,
            ScriptedProbe::unreachable(),
            up,
            ScriptedProbe::unreachable(),
            up,
            up,
        ],
    );
    for _ in 0..6 {
        session.run_round(&mut probe).unwrap();
    }
    let s = session.signals("flappy").unwrap();
    let lat = s.latency_secs.unwrap();
    assert!((lat - 0.1).abs() < 1e-12, "latency mean {lat}");
    assert!(score(&s, &session.config().weights).is_finite());
}
