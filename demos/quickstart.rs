//! End-to-end demo: three scripted endpoints, five rounds, pure
//! exploitation.  Run with `cargo run --example quickstart`.

use probemux::{Measurement, ScriptedProbe, Session, SessionConfig, Weights};
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = SessionConfig {
        endpoints: vec![
            "https://fast.example".into(),
            "https://busy.example".into(),
            "https://dead.example".into(),
        ],
        rounds: 5,
        interval: Duration::ZERO,
        weights: Weights::default(),
        exploration: 0.0,
        ..SessionConfig::default()
    };
    let mut session = Session::new(cfg).expect("valid config");

    let fast = Measurement::sanitized(
        Some(Duration::from_millis(50)),
        20.0,
        95.0,
        100,
        0,
        800.0,
    );
    let busy = Measurement::sanitized(
        Some(Duration::from_millis(200)),
        70.0,
        60.0,
        100,
        10,
        300.0,
    );
    let mut probe = ScriptedProbe::always(ScriptedProbe::unreachable())
        .with_fixed("https://fast.example", fast)
        .with_fixed("https://busy.example", busy);

    let outcome = session.run(&mut probe);

    println!("rounds completed: {}", outcome.rounds_completed);
    for snap in session.snapshots() {
        let chosen = snap
            .entries
            .iter()
            .find(|e| e.chosen)
            .map(|e| e.endpoint.as_str())
            .unwrap_or("-");
        println!("round {}: chose {}", snap.round, chosen);
    }
    println!(
        "best overall: {}",
        outcome.best_overall.as_deref().unwrap_or("-")
    );
    for (endpoint, count) in session.tally() {
        println!("  {endpoint}: selected {count}x");
    }
}
