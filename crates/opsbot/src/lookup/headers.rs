//! HTTP response headers of a site.

use std::fmt;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, warn};

use super::LookupError;

/// A site as users type it: `[http://|https://]host[:port][/]`.
///
/// Paths, queries, credentials and bracketed IPv6 literals are not accepted.
/// The host part is not validated here; it goes through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub secure: bool,
    pub host: String,
    pub port: Option<u16>,
}

impl Site {
    /// Parse a site string. Without a scheme, `https` is assumed.
    pub fn parse(input: &str) -> Option<Self> {
        let (secure, rest) = strip_scheme(input);
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let (host, port) = match rest.split_once(':') {
            Some((host, port)) => {
                if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                (host, Some(port.parse::<u16>().ok()?))
            }
            None => (rest, None),
        };

        if host.is_empty() || host.contains(['/', '?', '#', '@', '[', ']']) {
            return None;
        }

        Some(Self {
            secure,
            host: host.to_string(),
            port,
        })
    }

    /// The URL that gets fetched.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        match self.port {
            Some(port) => format!("{scheme}://{}:{port}/", self.host),
            None => format!("{scheme}://{}/", self.host),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

fn strip_scheme(input: &str) -> (bool, &str) {
    for (prefix, secure) in [("https://", true), ("http://", false)] {
        if input.len() >= prefix.len()
            && input.is_char_boundary(prefix.len())
            && input[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return (secure, &input[prefix.len()..]);
        }
    }
    (true, input)
}

/// Fetches a site with `GET` and renders its response headers.
#[derive(Debug, Clone)]
pub struct HeaderFetcher {
    client: Client,
    max_header_bytes: usize,
}

impl HeaderFetcher {
    /// Redirects are never followed: the target of a redirect has not been
    /// through the gate.
    pub fn new(timeout: Duration, max_header_bytes: usize) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| LookupError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            max_header_bytes,
        })
    }

    /// Fetch `site` and list its headers, one `name: value` per line.
    ///
    /// Only a `200 OK` answer yields headers; any other status (redirects
    /// included) or a connection failure is [`LookupError::NoData`]. A
    /// rendered header block longer than `max_header_bytes` is
    /// [`LookupError::TooBig`].
    pub async fn fetch(&self, site: &Site) -> Result<String, LookupError> {
        let url = site.url();
        debug!(url = %url, "fetching headers");

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) if e.is_builder() => {
                warn!(url = %url, error = %e, "unusable url");
                return Err(LookupError::Incorrect);
            }
            Err(e) => {
                error!(url = %url, error = %e, "request failed");
                return Err(LookupError::NoData);
            }
        };

        if response.status() != StatusCode::OK {
            error!(url = %url, status = %response.status(), "request failed");
            return Err(LookupError::NoData);
        }

        let text: String = response
            .headers()
            .iter()
            .map(|(name, value)| {
                format!("{}: {}\n", name, String::from_utf8_lossy(value.as_bytes()))
            })
            .collect();
        if text.len() > self.max_header_bytes {
            error!(url = %url, len = text.len(), max = self.max_header_bytes, "headers too big");
            return Err(LookupError::TooBig);
        }
        Ok(text)
    }
}
