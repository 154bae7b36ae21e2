//! Outbound lookups run on behalf of users once the gate has admitted them.
//!
//! - [`whois`] spawns the system `whois` client.
//! - [`headers`] fetches a site and lists its HTTP response headers.
//!
//! Both are reached through the [`Lookup`] trait so the front end can be
//! exercised without touching the network.

pub mod headers;
pub mod whois;

use async_trait::async_trait;
use thiserror::Error;

pub use headers::{HeaderFetcher, Site};
pub use whois::WhoisRunner;

/// Why a lookup produced no result.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The target was unusable for this lookup.
    #[error("incorrect target")]
    Incorrect,

    /// The remote side answered with nothing useful (empty output, non-200
    /// status, connection failure).
    #[error("no data")]
    NoData,

    /// The answer exceeded the size a reply may carry.
    #[error("data too big")]
    TooBig,

    /// Failure on our side (process spawn, client setup).
    #[error("internal error: {0}")]
    Internal(String),
}

/// The two lookups the assistant can perform.
#[async_trait]
pub trait Lookup: Send + Sync {
    /// WHOIS information for a host.
    async fn whois(&self, host: &str) -> Result<String, LookupError>;

    /// HTTP response headers of a site, one `name: value` per line.
    async fn http_headers(&self, site: &Site) -> Result<String, LookupError>;
}

/// Production lookups: the `whois` subprocess and a `reqwest` client.
pub struct SystemLookup {
    whois: WhoisRunner,
    headers: HeaderFetcher,
}

impl SystemLookup {
    pub fn new(whois: WhoisRunner, headers: HeaderFetcher) -> Self {
        Self { whois, headers }
    }
}

#[async_trait]
impl Lookup for SystemLookup {
    async fn whois(&self, host: &str) -> Result<String, LookupError> {
        self.whois.run(host).await
    }

    async fn http_headers(&self, site: &Site) -> Result<String, LookupError> {
        self.headers.fetch(site).await
    }
}

/// Cut `text` down to at most `max` bytes on a character boundary.
pub fn truncate_output(mut text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("\n[output truncated]");
    text
}
