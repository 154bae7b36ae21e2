//! Admission gate: the single check every outbound lookup goes through.
//!
//! The rate limit is consulted first. A request that is rate-limited is not
//! validated at all; an admitted request consumes a slot even if its target
//! then turns out to be malformed or restricted.

use std::fmt;
use std::hash::Hash;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::host::{HostChecker, RejectedEntry, Verdict};
use crate::limiter::{now_secs, RequestLimiter};

/// Outcome of [`Gate::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// The lookup may proceed.
    Allowed,
    /// The requester (or everyone) is over budget.
    RateLimited,
    /// The target address is malformed.
    Incorrect,
    /// The target address is restricted by policy.
    Denied,
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        self == Admission::Allowed
    }
}

impl From<Verdict> for Admission {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Ok => Admission::Allowed,
            Verdict::Incorrect => Admission::Incorrect,
            Verdict::Denied => Admission::Denied,
        }
    }
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Admission::Allowed => "allowed",
            Admission::RateLimited => "rate limited",
            Admission::Incorrect => "incorrect",
            Admission::Denied => "denied",
        };
        f.write_str(s)
    }
}

/// Rate limiter and host checker, composed.
///
/// Built once at startup and shared by handle (`Arc<Gate<_>>`) with every
/// request handler.
#[derive(Debug)]
pub struct Gate<K> {
    limiter: RequestLimiter<K>,
    checker: HostChecker,
}

impl<K: Eq + Hash + Clone + fmt::Debug> Gate<K> {
    pub fn new(limiter: RequestLimiter<K>, checker: HostChecker) -> Self {
        Self { limiter, checker }
    }

    /// Build a gate from the `[limits]` and `[hosts]` config sections.
    ///
    /// Restriction entries that failed to parse are returned for reporting;
    /// they never prevent the gate from being built.
    pub fn from_config(config: &Config) -> (Self, Vec<RejectedEntry>) {
        let limits = &config.limits;
        let limiter = RequestLimiter::new(
            limits.max_total_requests,
            limits.max_requests_per_id,
            limits.window_seconds,
        );
        let (checker, rejected) = HostChecker::new(&config.hosts);
        (Self::new(limiter, checker), rejected)
    }

    pub fn limiter(&self) -> &RequestLimiter<K> {
        &self.limiter
    }

    pub fn checker(&self) -> &HostChecker {
        &self.checker
    }

    /// Decide whether `requester` may run a lookup against `address` now.
    pub fn admit(&self, requester: K, address: &str) -> Admission {
        self.admit_at(requester, address, now_secs())
    }

    /// Same as [`Gate::admit`] with an explicit request time (seconds since
    /// the epoch).
    pub fn admit_at(&self, requester: K, address: &str, at: f64) -> Admission {
        if !self.limiter.admit_at(requester.clone(), at) {
            info!(requester = ?requester, "request rate limited");
            return Admission::RateLimited;
        }

        let verdict = self.checker.check(address);
        debug!(requester = ?requester, address = %address.escape_debug(), %verdict, "host checked");
        verdict.into()
    }

    /// Validate `address` without touching the rate limit.
    pub fn check(&self, address: &str) -> Verdict {
        self.checker.check(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostPolicy;
    use std::sync::Arc;

    fn gate(max_total: usize, max_per_id: usize) -> Gate<String> {
        let policy = HostPolicy {
            restricted_hostnames: vec!["localhost".to_string()],
            restricted_ipv4: vec!["127.0.0.0/8".to_string()],
            ..HostPolicy::default()
        };
        let (checker, _) = HostChecker::new(&policy);
        Gate::new(RequestLimiter::new(max_total, max_per_id, 60), checker)
    }

    #[test]
    fn verdicts_map_to_admissions() {
        let g = gate(10, 10);
        let me = || "me".to_string();
        assert_eq!(g.admit_at(me(), "example.com", 0.0), Admission::Allowed);
        assert_eq!(g.admit_at(me(), "exa mple.com", 1.0), Admission::Incorrect);
        assert_eq!(g.admit_at(me(), "localhost", 2.0), Admission::Denied);
        assert_eq!(g.admit_at(me(), "127.0.0.1", 3.0), Admission::Denied);
    }

    #[test]
    fn rate_limit_is_checked_first() {
        let g = gate(10, 1);
        assert!(g.admit_at("a".to_string(), "bad host", 0.0) == Admission::Incorrect);
        // The malformed request still used the only slot.
        assert_eq!(g.admit_at("a".to_string(), "example.com", 1.0), Admission::RateLimited);
        assert_eq!(g.admit_at("b".to_string(), "example.com", 1.0), Admission::Allowed);
        assert_eq!(g.admit_at("a".to_string(), "example.com", 61.0), Admission::Allowed);
    }

    #[test]
    fn check_does_not_consume_budget() {
        let g = gate(1, 1);
        assert_eq!(g.check("example.com"), Verdict::Ok);
        assert_eq!(g.check("localhost"), Verdict::Denied);
        assert!(g.limiter().is_empty());
    }

    #[test]
    fn from_config_reports_rejects() {
        let config = Config::parse(
            "[limits]\nmax_total_requests = 2\n[hosts]\nrestricted_ipv4 = [\"bogus\", \"10.0.0.0/8\"]\n",
        )
        .unwrap();
        let (g, rejected): (Gate<u64>, _) = Gate::from_config(&config);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].entry, "bogus");
        assert_eq!(g.limiter().max_total(), 2);
        assert_eq!(g.admit_at(1, "10.2.3.4", 0.0), Admission::Denied);
    }

    #[test]
    fn shared_between_threads() {
        let g = Arc::new(gate(5, 100));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let g = Arc::clone(&g);
                std::thread::spawn(move || {
                    (0..5)
                        .filter(|_| g.admit_at(format!("t{i}"), "example.com", 0.0).is_allowed())
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 5);
    }
}
