//! Message front end.
//!
//! Turns incoming text messages into replies, keeping a small conversation
//! state per requester: after `/whois` every following message is a host to
//! look up, after `/http_headers` every following message is a site. Each
//! target is run through the shared [`Gate`] before any lookup happens.

use std::collections::HashMap;
use std::sync::Arc;

use opsbot_core::{Admission, Gate};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::lookup::{Lookup, LookupError, Site};

pub const HELP_TEXT: &str = "\
Operations assistant.

/help - show this help

/cancel - cancel the current command

/http_headers - show the HTTP response headers of sites. After the command, \
send site addresses one per message, e.g. example.com. HTTPS is used by \
default; send http://example.com to check a plain HTTP site. A single site \
can also be given inline: /http_headers example.com

/whois - show WHOIS information. After the command, send domain names one \
per message, without scheme, port or path, e.g. example.com. A single host \
can also be given inline: /whois example.com
";

pub const MSG_WHOIS_PROMPT: &str = "Send host names, one per message:";
pub const MSG_HEADERS_PROMPT: &str = "Send site addresses, one per message (https:// is assumed):";
pub const MSG_UNKNOWN: &str = "Unknown command. Send /help for usage.";
pub const MSG_CANCELLED: &str = "Command cancelled";
pub const MSG_INCORRECT: &str = "Error in host name";
pub const MSG_DENIED: &str = "Access to this host is restricted";
pub const MSG_RATE_LIMITED: &str = "Too many requests, try again later";
pub const MSG_NO_DATA: &str = "No data";
pub const MSG_TOO_BIG: &str = "Data too big";
pub const MSG_INTERNAL: &str = "Internal error";

/// What the next plain message from a requester means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Whois,
    HttpHeaders,
}

/// Per-requester conversation handling on top of a [`Lookup`].
///
/// A requester's mode lives until `/cancel` or an inline command clears it.
pub struct Assistant<L> {
    gate: Arc<Gate<String>>,
    lookup: L,
    modes: Mutex<HashMap<String, Mode>>,
}

impl<L: Lookup> Assistant<L> {
    pub fn new(gate: Arc<Gate<String>>, lookup: L) -> Self {
        Self {
            gate,
            lookup,
            modes: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one message from `requester` and return the reply text.
    ///
    /// `/whois` and `/http_headers` either switch the requester into a mode
    /// or, given an inline argument, answer for it at once and leave any
    /// mode. Unrecognised `/words` are treated as plain text.
    pub async fn handle(&self, requester: &str, text: &str) -> String {
        if let Some((command, args)) = parse_command(text) {
            match (command.as_str(), args) {
                ("/start" | "/help", _) => return HELP_TEXT.to_string(),
                ("/cancel", _) => {
                    self.clear_mode(requester).await;
                    return MSG_CANCELLED.to_string();
                }
                ("/whois", None) => {
                    self.set_mode(requester, Mode::Whois).await;
                    return MSG_WHOIS_PROMPT.to_string();
                }
                ("/whois", Some(host)) => {
                    self.clear_mode(requester).await;
                    return self.whois_reply(requester, host).await;
                }
                ("/http_headers", None) => {
                    self.set_mode(requester, Mode::HttpHeaders).await;
                    return MSG_HEADERS_PROMPT.to_string();
                }
                ("/http_headers", Some(site)) => {
                    self.clear_mode(requester).await;
                    return self.headers_reply(requester, site).await;
                }
                _ => {}
            }
        }

        let mode = self.modes.lock().await.get(requester).copied();
        match mode {
            Some(Mode::Whois) => self.whois_reply(requester, text).await,
            Some(Mode::HttpHeaders) => self.headers_reply(requester, text).await,
            None => MSG_UNKNOWN.to_string(),
        }
    }

    /// WHOIS for `host`, formatted as a reply.
    pub async fn whois_reply(&self, requester: &str, host: &str) -> String {
        let body = match self.gate.admit(requester.to_string(), host) {
            Admission::Allowed => match self.lookup.whois(host).await {
                Ok(text) => text,
                Err(e) => lookup_error_text(&e, "whois", host),
            },
            other => admission_text(other).to_string(),
        };
        format!("whois {host}\n\n{body}")
    }

    /// HTTP headers for `input`, formatted as a reply.
    ///
    /// The gate sees the host part of the site. Input that is not a site at
    /// all is passed to the gate as-is, which rejects it as malformed.
    pub async fn headers_reply(&self, requester: &str, input: &str) -> String {
        let site = Site::parse(input);
        let address = site.as_ref().map_or(input, |s| s.host.as_str());

        let admission = self.gate.admit(requester.to_string(), address);

        let body = match (admission, site) {
            (Admission::Allowed, Some(site)) => match self.lookup.http_headers(&site).await {
                Ok(text) => text,
                Err(e) => lookup_error_text(&e, "http_headers", input),
            },
            (Admission::Allowed, None) => MSG_INCORRECT.to_string(),
            (other, _) => admission_text(other).to_string(),
        };
        format!("headers for site {input}\n\n{body}")
    }

    async fn set_mode(&self, requester: &str, mode: Mode) {
        debug!(requester = %requester, ?mode, "mode changed");
        self.modes.lock().await.insert(requester.to_string(), mode);
    }

    async fn clear_mode(&self, requester: &str) {
        if self.modes.lock().await.remove(requester).is_some() {
            debug!(requester = %requester, "mode cleared");
        }
    }
}

/// Split `/command args` into the lowercased command word and its
/// arguments. The arguments keep everything after the separating
/// whitespace; an empty remainder means no arguments.
fn parse_command(text: &str) -> Option<(String, Option<&str>)> {
    let text = text.trim_start();
    if !text.starts_with('/') {
        return None;
    }
    let (word, rest) = match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim_start()),
        None => (text, ""),
    };
    let args = (!rest.is_empty()).then_some(rest);
    Some((word.to_lowercase(), args))
}

fn admission_text(admission: Admission) -> &'static str {
    match admission {
        Admission::Allowed => "",
        Admission::RateLimited => MSG_RATE_LIMITED,
        Admission::Incorrect => MSG_INCORRECT,
        Admission::Denied => MSG_DENIED,
    }
}

fn lookup_error_text(e: &LookupError, command: &str, target: &str) -> String {
    match e {
        LookupError::Incorrect => MSG_INCORRECT.to_string(),
        LookupError::NoData => MSG_NO_DATA.to_string(),
        LookupError::TooBig => MSG_TOO_BIG.to_string(),
        LookupError::Internal(detail) => {
            error!(command, target = %target, detail = %detail, "internal error");
            MSG_INTERNAL.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opsbot_core::{HostChecker, HostPolicy, RequestLimiter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeLookup {
        calls: AtomicUsize,
        fail_with: Option<fn() -> LookupError>,
    }

    #[async_trait]
    impl Lookup for FakeLookup {
        async fn whois(&self, host: &str) -> Result<String, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(f) => Err(f()),
                None => Ok(format!("domain: {host}\n")),
            }
        }

        async fn http_headers(&self, site: &Site) -> Result<String, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(f) => Err(f()),
                None => Ok(format!("server: fake\nx-url: {}\n", site.url())),
            }
        }
    }

    fn no_data() -> LookupError {
        LookupError::NoData
    }

    fn too_big() -> LookupError {
        LookupError::TooBig
    }

    fn internal() -> LookupError {
        LookupError::Internal("boom".to_string())
    }

    fn assistant(max_per_id: usize, lookup: FakeLookup) -> Assistant<FakeLookup> {
        let policy = HostPolicy {
            restricted_hostnames: vec!["localhost".to_string()],
            restricted_ipv4: vec!["127.0.0.0/8".to_string()],
            ..HostPolicy::default()
        };
        let (checker, _) = HostChecker::new(&policy);
        let gate = Gate::new(RequestLimiter::new(100, max_per_id, 60), checker);
        Assistant::new(Arc::new(gate), lookup)
    }

    #[tokio::test]
    async fn help_and_unknown() {
        let a = assistant(5, FakeLookup::default());
        assert_eq!(a.handle("u", "/help").await, HELP_TEXT);
        assert_eq!(a.handle("u", "/START").await, HELP_TEXT);
        assert_eq!(a.handle("u", "example.com").await, MSG_UNKNOWN);
    }

    #[tokio::test]
    async fn whois_flow() {
        let a = assistant(5, FakeLookup::default());
        assert_eq!(a.handle("u", "/whois").await, MSG_WHOIS_PROMPT);
        assert_eq!(
            a.handle("u", "example.com").await,
            "whois example.com\n\ndomain: example.com\n"
        );
        assert_eq!(a.handle("u", "localhost").await, format!("whois localhost\n\n{MSG_DENIED}"));
        assert_eq!(
            a.handle("u", "exa mple.com").await,
            format!("whois exa mple.com\n\n{MSG_INCORRECT}")
        );
        assert_eq!(a.lookup.calls.load(Ordering::SeqCst), 1);

        // Other requesters have their own state.
        assert_eq!(a.handle("v", "example.com").await, MSG_UNKNOWN);
    }

    #[tokio::test]
    async fn headers_flow() {
        let a = assistant(5, FakeLookup::default());
        assert_eq!(a.handle("u", "/HTTP_HEADERS").await, MSG_HEADERS_PROMPT);
        let reply = a.handle("u", "http://example.com:8080").await;
        assert_eq!(
            reply,
            "headers for site http://example.com:8080\n\nserver: fake\nx-url: http://example.com:8080/\n"
        );
        assert!(a.handle("u", "https://127.0.0.1/").await.ends_with(MSG_DENIED));
        assert!(a.handle("u", "example.com/path").await.ends_with(MSG_INCORRECT));
        assert_eq!(a.lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn switching_commands_changes_mode() {
        let a = assistant(5, FakeLookup::default());
        a.handle("u", "/whois").await;
        a.handle("u", "/http_headers").await;
        assert!(a.handle("u", "example.com").await.starts_with("headers for site"));
    }

    #[tokio::test]
    async fn rate_limited_requests_skip_lookup() {
        let a = assistant(2, FakeLookup::default());
        a.handle("u", "/whois").await;
        a.handle("u", "example.com").await;
        a.handle("u", "example.org").await;
        assert_eq!(
            a.handle("u", "example.net").await,
            format!("whois example.net\n\n{MSG_RATE_LIMITED}")
        );
        assert_eq!(a.lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lookup_errors_are_reported() {
        let a = assistant(
            5,
            FakeLookup {
                fail_with: Some(no_data as fn() -> LookupError),
                ..FakeLookup::default()
            },
        );
        assert!(a.whois_reply("u", "example.com").await.ends_with(MSG_NO_DATA));

        let a = assistant(
            5,
            FakeLookup {
                fail_with: Some(too_big as fn() -> LookupError),
                ..FakeLookup::default()
            },
        );
        assert_eq!(
            a.headers_reply("u", "example.com").await,
            format!("headers for site example.com\n\n{MSG_TOO_BIG}")
        );

        let a = assistant(
            5,
            FakeLookup {
                fail_with: Some(internal as fn() -> LookupError),
                ..FakeLookup::default()
            },
        );
        let reply = a.headers_reply("u", "example.com").await;
        assert!(reply.ends_with(MSG_INTERNAL));
        assert!(!reply.contains("boom"));
    }

    #[tokio::test]
    async fn concurrent_requesters() {
        let a = Arc::new(assistant(1, FakeLookup::default()));
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let a = Arc::clone(&a);
                tokio::spawn(async move { a.whois_reply(&format!("user{i}"), "example.com").await })
            })
            .collect();
        for t in tasks {
            assert!(t.await.unwrap().ends_with("domain: example.com\n"));
        }
        assert_eq!(a.lookup.calls.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn command_parsing() {
        assert_eq!(parse_command("/whois"), Some(("/whois".to_string(), None)));
        assert_eq!(parse_command("  /WHOIS   "), Some(("/whois".to_string(), None)));
        assert_eq!(
            parse_command("/Whois  example.com "),
            Some(("/whois".to_string(), Some("example.com ")))
        );
        assert_eq!(
            parse_command("/http_headers\thttp://example.com"),
            Some(("/http_headers".to_string(), Some("http://example.com")))
        );
        assert_eq!(parse_command("example.com"), None);
    }

    #[tokio::test]
    async fn inline_arguments_answer_at_once() {
        let a = assistant(5, FakeLookup::default());
        assert_eq!(
            a.handle("u", "/whois example.com").await,
            "whois example.com\n\ndomain: example.com\n"
        );
        assert_eq!(
            a.handle("u", "/HTTP_HEADERS http://example.com").await,
            "headers for site http://example.com\n\nserver: fake\nx-url: http://example.com/\n"
        );
        assert_eq!(
            a.handle("u", "/whois localhost").await,
            format!("whois localhost\n\n{MSG_DENIED}")
        );
        assert_eq!(a.lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn inline_argument_leaves_mode() {
        let a = assistant(5, FakeLookup::default());
        a.handle("u", "/whois").await;
        a.handle("u", "/whois example.org").await;
        assert_eq!(a.handle("u", "example.com").await, MSG_UNKNOWN);
        assert_eq!(a.lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_clears_mode_without_spending_budget() {
        let a = assistant(1, FakeLookup::default());
        a.handle("u", "/whois").await;
        assert_eq!(a.handle("u", "/cancel").await, MSG_CANCELLED);
        assert_eq!(a.handle("u", "example.com").await, MSG_UNKNOWN);
        assert_eq!(a.lookup.calls.load(Ordering::SeqCst), 0);
        assert!(a.modes.lock().await.is_empty());

        // The single per-id slot is still free.
        assert_eq!(
            a.handle("u", "/whois example.com").await,
            "whois example.com\n\ndomain: example.com\n"
        );

        // Cancel without an active command is harmless.
        assert_eq!(a.handle("v", "/Cancel").await, MSG_CANCELLED);
    }
}
