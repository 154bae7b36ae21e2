//! Target host policy: decides whether an address supplied by a user may be
//! handed to an outbound lookup.
//!
//! The policy layer is split into two types:
//!
//! - [`HostPolicy`]: a plain configuration struct (cloneable, deserializable)
//!   that holds length bounds and restriction lists as written in the config.
//! - [`HostChecker`]: the runtime counterpart with parsed networks and a
//!   hostname set. It has no mutable state, so it can be shared freely
//!   between concurrent handlers.
//!
//! # Decision order
//!
//! 1. Length (in characters) outside `[min_len, max_len]` → [`Verdict::Incorrect`].
//! 2. Dotted-quad or hex-and-colon shape → IP path, anything else → hostname path.
//! 3. Hostname path: grammar check, then exact match against the restricted names.
//! 4. IP path: strict parse, then membership in the restricted networks of the
//!    address family.

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::RangeInclusive;

use ipnet::{Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_MIN_HOSTNAME_LEN: usize = 1;
pub const DEFAULT_MAX_HOSTNAME_LEN: usize = 1024;

/// Non-ASCII letters permitted in hostname labels, in addition to ASCII
/// letters. Both cases are listed since matching is case-insensitive.
const EXTRA_LETTERS: &[RangeInclusive<char>] = &[
    // Cyrillic, basic Russian alphabet
    'а'..='я',
    'А'..='Я',
    'ё'..='ё',
    'Ё'..='Ё',
];

/// Result of checking a target address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Well-formed and allowed.
    Ok,
    /// Malformed: wrong length or not a hostname / IP literal.
    Incorrect,
    /// Well-formed but blocked by policy.
    Denied,
}

impl Verdict {
    pub fn is_ok(self) -> bool {
        self == Verdict::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Ok => "ok",
            Verdict::Incorrect => "incorrect",
            Verdict::Denied => "denied",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static host policy, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostPolicy {
    #[serde(default = "default_min_len", rename = "min_hostname_length")]
    pub min_len: usize,
    #[serde(default = "default_max_len", rename = "max_hostname_length")]
    pub max_len: usize,
    /// Hostnames denied by exact match.
    #[serde(default)]
    pub restricted_hostnames: Vec<String>,
    /// IPv4 networks in CIDR notation. A bare address means a single host.
    #[serde(default)]
    pub restricted_ipv4: Vec<String>,
    /// IPv6 networks in CIDR notation. A bare address means a single host.
    #[serde(default)]
    pub restricted_ipv6: Vec<String>,
}

/// Default policy: length 1..=1024, nothing restricted.
impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_HOSTNAME_LEN,
            max_len: DEFAULT_MAX_HOSTNAME_LEN,
            restricted_hostnames: Vec::new(),
            restricted_ipv4: Vec::new(),
            restricted_ipv6: Vec::new(),
        }
    }
}

fn default_min_len() -> usize {
    DEFAULT_MIN_HOSTNAME_LEN
}
fn default_max_len() -> usize {
    DEFAULT_MAX_HOSTNAME_LEN
}

/// A restriction entry that could not be parsed and was left out of the
/// checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// The entry exactly as configured.
    pub entry: String,
    /// Parser message.
    pub reason: String,
}

impl fmt::Display for RejectedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entry, self.reason)
    }
}

/// Runtime host checker built from a [`HostPolicy`].
#[derive(Debug, Clone)]
pub struct HostChecker {
    min_len: usize,
    max_len: usize,
    restricted_hostnames: HashSet<String>,
    restricted_v4: Vec<Ipv4Net>,
    restricted_v6: Vec<Ipv6Net>,
}

impl HostChecker {
    /// Build a checker from the given policy.
    ///
    /// Construction never fails: restriction entries that do not parse as a
    /// network of the expected family are skipped, logged at `warn`, and
    /// returned alongside the checker so the caller can report them.
    pub fn new(policy: &HostPolicy) -> (Self, Vec<RejectedEntry>) {
        let mut rejected = Vec::new();

        let restricted_v4 = policy
            .restricted_ipv4
            .iter()
            .filter_map(|entry| match parse_v4_net(entry) {
                Ok(net) => Some(net),
                Err(reason) => {
                    rejected.push(RejectedEntry { entry: entry.clone(), reason });
                    None
                }
            })
            .collect();

        let restricted_v6 = policy
            .restricted_ipv6
            .iter()
            .filter_map(|entry| match parse_v6_net(entry) {
                Ok(net) => Some(net),
                Err(reason) => {
                    rejected.push(RejectedEntry { entry: entry.clone(), reason });
                    None
                }
            })
            .collect();

        for r in &rejected {
            warn!(entry = %r.entry, reason = %r.reason, "skipping invalid restricted network");
        }

        let checker = Self {
            min_len: policy.min_len,
            max_len: policy.max_len,
            restricted_hostnames: policy.restricted_hostnames.iter().cloned().collect(),
            restricted_v4,
            restricted_v6,
        };
        (checker, rejected)
    }

    /// Check an address (hostname or IP literal) against the policy.
    pub fn check(&self, address: &str) -> Verdict {
        let len = address.chars().count();
        if len < self.min_len || len > self.max_len {
            return Verdict::Incorrect;
        }

        if looks_like_ipv4(address) || looks_like_ipv6(address) {
            self.check_ip(address)
        } else {
            self.check_hostname(address)
        }
    }

    fn check_hostname(&self, name: &str) -> Verdict {
        if !is_valid_hostname(name) {
            return Verdict::Incorrect;
        }
        if self.restricted_hostnames.contains(name) {
            return Verdict::Denied;
        }
        Verdict::Ok
    }

    fn check_ip(&self, literal: &str) -> Verdict {
        let Ok(ip) = literal.parse::<IpAddr>() else {
            return Verdict::Incorrect;
        };
        if self.is_restricted_ip(ip) {
            Verdict::Denied
        } else {
            Verdict::Ok
        }
    }

    /// Whether an IP address falls inside any restricted network.
    pub fn is_restricted_ip(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.restricted_v4.iter().any(|net| net.contains(&v4)),
            IpAddr::V6(v6) => self.restricted_v6.iter().any(|net| net.contains(&v6)),
        }
    }

    pub fn restricted_networks(&self) -> usize {
        self.restricted_v4.len() + self.restricted_v6.len()
    }
}

fn parse_v4_net(entry: &str) -> Result<Ipv4Net, String> {
    let entry = entry.trim();
    if entry.contains('/') {
        entry.parse::<Ipv4Net>().map(|n| n.trunc()).map_err(|e| e.to_string())
    } else {
        entry
            .parse::<Ipv4Addr>()
            .map_err(|e| e.to_string())
            .and_then(|ip| Ipv4Net::new(ip, 32).map_err(|e| e.to_string()))
    }
}

fn parse_v6_net(entry: &str) -> Result<Ipv6Net, String> {
    let entry = entry.trim();
    if entry.contains('/') {
        entry.parse::<Ipv6Net>().map(|n| n.trunc()).map_err(|e| e.to_string())
    } else {
        entry
            .parse::<Ipv6Addr>()
            .map_err(|e| e.to_string())
            .and_then(|ip| Ipv6Net::new(ip, 128).map_err(|e| e.to_string()))
    }
}

/// Four dot-separated groups of ASCII digits. Octet range is left to the
/// strict parser.
fn looks_like_ipv4(s: &str) -> bool {
    let groups: Vec<&str> = s.split('.').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| !g.is_empty() && g.bytes().all(|b| b.is_ascii_digit()))
}

/// Hex digits and colons only, with at least one colon so that all-hex
/// hostnames such as `cafe` stay on the hostname path.
fn looks_like_ipv6(s: &str) -> bool {
    s.contains(':') && s.bytes().all(|b| b == b':' || b.is_ascii_hexdigit())
}

/// One or more non-empty dot-separated labels, with an optional single
/// trailing dot.
fn is_valid_hostname(name: &str) -> bool {
    let body = name.strip_suffix('.').unwrap_or(name);
    !body.is_empty()
        && body
            .split('.')
            .all(|label| !label.is_empty() && label.chars().all(is_label_char))
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || EXTRA_LETTERS.iter().any(|r| r.contains(&c))
}
