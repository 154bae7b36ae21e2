//! `opsbot check <address>...`: offline verdicts from the host policy.

use std::io::Write;

use anyhow::Result;
use opsbot_core::{Gate, Verdict};
use serde_json::json;

/// Print one verdict per address. Returns `true` when every address is ok.
///
/// The rate limiter is not consulted.
pub fn run(gate: &Gate<String>, addresses: &[String], as_json: bool) -> Result<bool> {
    let mut out = std::io::stdout().lock();
    let mut all_ok = true;

    for address in addresses {
        let verdict = gate.check(address);
        all_ok &= verdict == Verdict::Ok;

        if as_json {
            let line = json!({ "address": address, "verdict": verdict });
            writeln!(out, "{line}")?;
        } else {
            writeln!(out, "{}: {verdict}", address.escape_debug())?;
        }
    }

    Ok(all_ok)
}
