//! `opsbot whois <host>...` and `opsbot headers <site>...`: one-shot lookups
//! through the gate.

use anyhow::Result;

use crate::assistant::Assistant;
use crate::lookup::Lookup;

/// Requester identity used for command-line lookups.
pub const CLI_REQUESTER: &str = "cli";

pub async fn run_whois<L: Lookup>(assistant: &Assistant<L>, hosts: &[String]) -> Result<()> {
    for host in hosts {
        println!("{}\n", assistant.whois_reply(CLI_REQUESTER, host).await);
    }
    Ok(())
}

pub async fn run_headers<L: Lookup>(assistant: &Assistant<L>, sites: &[String]) -> Result<()> {
    for site in sites {
        println!("{}\n", assistant.headers_reply(CLI_REQUESTER, site).await);
    }
    Ok(())
}
