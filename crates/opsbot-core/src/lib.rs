//! opsbot-core: admission control for the operations assistant.
//!
//! Every outbound lookup (WHOIS, HTTP headers) requested by a user passes
//! through this crate first: a sliding-window rate limiter decides whether
//! the requester may proceed, and a host checker decides whether the target
//! address is well-formed and not restricted by policy.

pub mod config;
pub mod error;
pub mod gate;
pub mod host;
pub mod limiter;

// Re-export commonly used items at crate root.
pub use config::{BotSection, Config, LimitsSection};
pub use error::{OpsError, OpsResult};
pub use gate::{Admission, Gate};
pub use host::{HostChecker, HostPolicy, RejectedEntry, Verdict};
pub use limiter::RequestLimiter;
