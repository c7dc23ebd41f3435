//! Best-effort endpoint probing.
//!
//! A [`Prober`] performs one liveness check per round per endpoint and
//! always returns a well-formed [`Measurement`]: network failures are
//! absorbed at this boundary into a degraded measurement (no latency, low
//! health, a synthetic error/handled pair, reduced bandwidth) so the core's
//! mean and rate computations never see an error type.
//!
//! Targets are accepted in the forms `https://host`, `http://host`,
//! `host:port`, and bare `host`.  HTTP(S) targets are probed with a blocking
//! GET when the `probe-http` feature is enabled, and degrade to a TCP
//! connect otherwise; everything else is a TCP connect with a short timeout.
//!
//! Load and bandwidth are simulated (the probe is a liveness check, not a
//! traffic generator): healthy endpoints draw load in 10–60 % and bandwidth
//! in 300–900 Mbps; unreachable endpoints report health 30, a synthetic
//! error count, and 50–150 Mbps.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::Measurement;

/// Default timeout for the TCP connect probe.
pub const TCP_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default timeout for the HTTP GET probe.
pub const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// One best-effort connectivity check per call.
///
/// Implementations must not fail: a probe that cannot reach its target
/// returns a degraded measurement, never an error.
pub trait Prober {
    /// Probe `target` once and return its measurement for this round.
    fn probe(&mut self, target: &str) -> Measurement;
}

/// How a parsed target should be probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeKind {
    /// HTTP(S) GET against the full target URL.
    Http,
    /// Plain TCP connect.
    Tcp,
}

/// A parsed probe target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: ProbeKind,
    pub host: String,
    pub port: u16,
}

/// Parse a target string.
///
/// - `https://host[:port][/path]` / `http://...` → HTTP probe (port defaults
///   to 443 / 80).
/// - `host:port` → TCP probe.
/// - bare `host` → HTTPS probe on port 443.
///
/// Unparseable input is treated as a bare host; the connect will then fail
/// and be absorbed as a degraded measurement.
pub fn parse_target(target: &str) -> Target {
    if let Some((scheme, rest)) = target.split_once("://") {
        let default_port = if scheme.eq_ignore_ascii_case("http") {
            80
        } else {
            443
        };
        let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
        let (host, port) = split_host_port(authority, default_port);
        return Target {
            kind: ProbeKind::Http,
            host,
            port,
        };
    }
    if target.contains(':') {
        let (host, port) = split_host_port(target, 443);
        return Target {
            kind: ProbeKind::Tcp,
            host,
            port,
        };
    }
    Target {
        kind: ProbeKind::Http,
        host: target.to_string(),
        port: 443,
    }
}

fn split_host_port(authority: &str, default_port: u16) -> (String, u16) {
    match authority.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(p) => (host.to_string(), p),
            Err(_) => (authority.to_string(), default_port),
        },
        None => (authority.to_string(), default_port),
    }
}

/// Real network prober: TCP connect or HTTP GET, simulated load/bandwidth.
///
/// Seedable so the simulated fields are reproducible; the measured latency
/// of course is not.
#[derive(Debug)]
pub struct NetProbe {
    tcp_timeout: Duration,
    http_timeout: Duration,
    rng: StdRng,
    #[cfg(feature = "probe-http")]
    client: Option<reqwest::blocking::Client>,
}

impl NetProbe {
    /// Create a prober with default timeouts and a fixed seed for the
    /// simulated fields.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create with an explicit seed for the simulated fields.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            tcp_timeout: TCP_PROBE_TIMEOUT,
            http_timeout: HTTP_PROBE_TIMEOUT,
            rng: StdRng::seed_from_u64(seed),
            #[cfg(feature = "probe-http")]
            client: None,
        }
    }

    /// Override the TCP connect timeout.
    pub fn tcp_timeout(mut self, timeout: Duration) -> Self {
        self.tcp_timeout = timeout;
        self
    }

    /// Override the HTTP GET timeout.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    fn tcp_rtt(&self, host: &str, port: u16) -> Option<Duration> {
        let start = Instant::now();
        let addr = (host, port).to_socket_addrs().ok()?.next()?;
        TcpStream::connect_timeout(&addr, self.tcp_timeout).ok()?;
        Some(start.elapsed())
    }

    #[cfg(feature = "probe-http")]
    fn http_rtt(&mut self, url: &str) -> Option<Duration> {
        if self.client.is_none() {
            self.client = reqwest::blocking::Client::builder()
                .timeout(self.http_timeout)
                .build()
                .ok();
        }
        let client = self.client.as_ref()?;
        let start = Instant::now();
        let resp = client.get(url).send().ok()?;
        resp.error_for_status().ok()?;
        Some(start.elapsed())
    }

    fn rtt(&mut self, raw: &str, target: &Target) -> Option<Duration> {
        match target.kind {
            #[cfg(feature = "probe-http")]
            ProbeKind::Http => {
                // Bare hosts parse as HTTP but are not URLs yet.
                if raw.contains("://") {
                    self.http_rtt(raw)
                } else {
                    self.http_rtt(&format!("https://{raw}"))
                }
            }
            #[cfg(not(feature = "probe-http"))]
            ProbeKind::Http => {
                let _ = raw;
                self.tcp_rtt(&target.host, target.port)
            }
            ProbeKind::Tcp => self.tcp_rtt(&target.host, target.port),
        }
    }
}

impl Default for NetProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for NetProbe {
    fn probe(&mut self, target: &str) -> Measurement {
        let parsed = parse_target(target);
        let rtt = self.rtt(target, &parsed);

        // Simulated fields: the probe checks liveness, not capacity.
        let load = self.rng.random_range(10.0..60.0);

        match rtt {
            Some(latency) => Measurement::sanitized(
                Some(latency),
                load,
                100.0,
                100,
                0,
                self.rng.random_range(300.0..900.0),
            ),
            None => {
                tracing::debug!(endpoint = %target, "probe failed, degrading measurement");
                let errors = self.rng.random_range(5..=15u64);
                Measurement::sanitized(
                    None,
                    load,
                    30.0,
                    (errors + 1).max(20),
                    errors,
                    self.rng.random_range(50.0..150.0),
                )
            }
        }
    }
}

/// Deterministic prober for tests, demos, and benches.
///
/// Each target can carry a scripted sequence of measurements (replayed in
/// order, repeating the last entry when exhausted).  Targets without a
/// script return the configured default measurement.
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    scripts: BTreeMap<String, Vec<Measurement>>,
    cursors: BTreeMap<String, usize>,
    default: Measurement,
}

impl ScriptedProbe {
    /// A prober whose every target answers with the same measurement.
    pub fn always(default: Measurement) -> Self {
        Self {
            scripts: BTreeMap::new(),
            cursors: BTreeMap::new(),
            default,
        }
    }

    /// A prober answering with a fixed healthy measurement for every
    /// target: 50 ms latency, load 20, health 95, 100/0 handled/errors,
    /// 800 Mbps.
    pub fn healthy_defaults() -> Self {
        Self::always(Measurement::sanitized(
            Some(Duration::from_millis(50)),
            20.0,
            95.0,
            100,
            0,
            800.0,
        ))
    }

    /// Script a fixed measurement for one target (every round).
    pub fn with_fixed(mut self, target: &str, m: Measurement) -> Self {
        self.scripts.insert(target.to_string(), vec![m]);
        self
    }

    /// Script a per-round sequence for one target; the last entry repeats
    /// once the sequence is exhausted.
    pub fn with_sequence(mut self, target: &str, seq: Vec<Measurement>) -> Self {
        self.scripts.insert(target.to_string(), seq);
        self
    }

    /// A canned unreachable measurement matching the degraded probe shape.
    pub fn unreachable() -> Measurement {
        Measurement::sanitized(None, 35.0, 30.0, 20, 10, 100.0)
    }
}

impl Prober for ScriptedProbe {
    fn probe(&mut self, target: &str) -> Measurement {
        let Some(seq) = self.scripts.get(target) else {
            return self.default;
        };
        if seq.is_empty() {
            return self.default;
        }
        let cursor = self.cursors.entry(target.to_string()).or_insert(0);
        let m = seq[(*cursor).min(seq.len() - 1)];
        *cursor += 1;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_url() {
        let t = parse_target("https://www.wikipedia.org/wiki/Main_Page");
        assert_eq!(t.kind, ProbeKind::Http);
        assert_eq!(t.host, "www.wikipedia.org");
        assert_eq!(t.port, 443);
    }

    #[test]
    fn parses_http_url_with_port() {
        let t = parse_target("http://localhost:8080/health");
        assert_eq!(t.kind, ProbeKind::Http);
        assert_eq!(t.host, "localhost");
        assert_eq!(t.port, 8080);
    }

    #[test]
    fn parses_host_port_as_tcp() {
        let t = parse_target("127.0.0.1:8001");
        assert_eq!(t.kind, ProbeKind::Tcp);
        assert_eq!(t.host, "127.0.0.1");
        assert_eq!(t.port, 8001);
    }

    #[test]
    fn parses_bare_host() {
        let t = parse_target("example.com");
        assert_eq!(t.kind, ProbeKind::Http);
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, 443);
    }

    #[test]
    fn unparseable_port_falls_back_to_default() {
        let t = parse_target("example.com:notaport");
        assert_eq!(t.host, "example.com:notaport");
        assert_eq!(t.port, 443);
    }

    #[test]
    fn net_probe_absorbs_connect_failure() {
        // Reserved TEST-NET-1 address; the connect must fail fast.
        let mut p = NetProbe::with_seed(7).tcp_timeout(Duration::from_millis(50));
        let m = p.probe("192.0.2.1:9");
        assert!(!m.reachable());
        assert_eq!(m.health, 30.0);
        assert!(m.errors >= 5 && m.errors <= 15);
        assert!(m.handled >= 20);
        assert!(m.bandwidth_mbps >= 50.0 && m.bandwidth_mbps < 150.0);
    }

    #[test]
    fn scripted_probe_replays_sequence_then_repeats_last() {
        let a = Measurement::sanitized(Some(Duration::from_millis(10)), 10.0, 99.0, 100, 0, 700.0);
        let b = ScriptedProbe::unreachable();
        let mut p = ScriptedProbe::healthy_defaults().with_sequence("x", vec![a, b]);
        assert_eq!(p.probe("x"), a);
        assert_eq!(p.probe("x"), b);
        assert_eq!(p.probe("x"), b);
        // Unscripted target gets the default.
        assert!(p.probe("y").reachable());
    }
}
