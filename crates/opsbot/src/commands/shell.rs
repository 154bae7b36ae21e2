//! `opsbot shell`: a local stand-in for the chat transport.
//!
//! Every stdin line is one message from the given requester; each reply is
//! printed followed by a blank line.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::assistant::Assistant;
use crate::lookup::Lookup;

pub async fn run<L: Lookup>(assistant: &Assistant<L>, requester: &str) -> Result<()> {
    info!(requester = %requester, "shell started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.is_empty() {
            continue;
        }
        let reply = assistant.handle(requester, &line).await;
        println!("{reply}\n");
    }

    info!(requester = %requester, "shell finished");
    Ok(())
}
