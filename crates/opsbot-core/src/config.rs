//! Configuration file structure.
//!
//! ```toml
//! [limits]
//! max_total_requests = 10
//! max_requests_per_id = 2
//! window_seconds = 60
//!
//! [hosts]
//! max_hostname_length = 1024
//! restricted_hostnames = ["localhost"]
//! restricted_ipv4 = ["127.0.0.0/8", "10.0.0.0/8"]
//! restricted_ipv6 = ["::1/128"]
//!
//! [bot]
//! debug = false
//! whois_command = "whois"
//! ```
//!
//! Every key is optional. Loading the file from disk and applying CLI
//! overrides is the binary's job; this module only parses and validates.

use serde::Deserialize;

use crate::error::{OpsError, OpsResult};
use crate::host::HostPolicy;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub hosts: HostPolicy,
    #[serde(default)]
    pub bot: BotSection,
}

/// `[limits]` section of the config TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_max_total")]
    pub max_total_requests: usize,
    #[serde(default = "default_max_per_id")]
    pub max_requests_per_id: usize,
    #[serde(default = "default_window")]
    pub window_seconds: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_total_requests: default_max_total(),
            max_requests_per_id: default_max_per_id(),
            window_seconds: default_window(),
        }
    }
}

/// `[bot]` section of the config TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotSection {
    #[serde(default)]
    pub debug: bool,
    /// Program spawned for WHOIS lookups.
    #[serde(default = "default_whois_command")]
    pub whois_command: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// WHOIS output beyond this many bytes is cut off.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Header blocks longer than this are refused as too big.
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            debug: false,
            whois_command: default_whois_command(),
            http_timeout_secs: default_http_timeout(),
            max_response_bytes: default_max_response_bytes(),
            max_header_bytes: default_max_header_bytes(),
        }
    }
}

fn default_max_total() -> usize {
    10
}
fn default_max_per_id() -> usize {
    2
}
fn default_window() -> u64 {
    60
}
fn default_whois_command() -> String {
    "whois".to_string()
}
fn default_http_timeout() -> u64 {
    10
}
fn default_max_response_bytes() -> usize {
    64 * 1024
}
fn default_max_header_bytes() -> usize {
    2048
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> OpsResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no limiter or checker could work with.
    ///
    /// A zero `max_requests_per_id` is allowed: it disables admission.
    pub fn validate(&self) -> OpsResult<()> {
        if self.limits.window_seconds == 0 {
            return Err(OpsError::InvalidConfig(
                "limits.window_seconds must be positive".to_string(),
            ));
        }
        if self.hosts.min_len > self.hosts.max_len {
            return Err(OpsError::InvalidConfig(format!(
                "hosts.min_hostname_length ({}) exceeds hosts.max_hostname_length ({})",
                self.hosts.min_len, self.hosts.max_len
            )));
        }
        if self.bot.whois_command.trim().is_empty() {
            return Err(OpsError::InvalidConfig("bot.whois_command is empty".to_string()));
        }
        Ok(())
    }
}
