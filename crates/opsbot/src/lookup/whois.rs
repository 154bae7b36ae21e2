//! WHOIS via the system client.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error};

use super::{truncate_output, LookupError};

/// Runs the configured `whois` program for a single host.
#[derive(Debug, Clone)]
pub struct WhoisRunner {
    command: String,
    max_bytes: usize,
}

impl WhoisRunner {
    pub fn new(command: impl Into<String>, max_bytes: usize) -> Self {
        Self {
            command: command.into(),
            max_bytes,
        }
    }

    /// Spawn `<command> -- <host>` and return its stdout.
    ///
    /// The host must already have passed the gate. Empty output yields
    /// [`LookupError::NoData`]; failing to spawn or read yields
    /// [`LookupError::Internal`]. Invalid UTF-8 is replaced.
    pub async fn run(&self, host: &str) -> Result<String, LookupError> {
        debug!(host = %host, command = %self.command, "whois");

        // Labels may legally start with '-'.
        let output = Command::new(&self.command)
            .arg("--")
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                error!(host = %host, error = %e, "failed to run whois");
                LookupError::Internal(e.to_string())
            })?;

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            debug!(host = %host, status = %output.status, "whois returned nothing");
            return Err(LookupError::NoData);
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok(truncate_output(text, self.max_bytes))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let runner = WhoisRunner::new("echo", 1024);
        let out = runner.run("example.com").await.unwrap();
        assert!(out.contains("example.com"), "got: {out:?}");
    }

    #[tokio::test]
    async fn empty_output_is_no_data() {
        let runner = WhoisRunner::new("true", 1024);
        assert!(matches!(runner.run("example.com").await, Err(LookupError::NoData)));
    }

    #[tokio::test]
    async fn missing_program_is_internal() {
        let runner = WhoisRunner::new("/nonexistent/whois-binary", 1024);
        assert!(matches!(
            runner.run("example.com").await,
            Err(LookupError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn output_is_truncated() {
        let runner = WhoisRunner::new("echo", 4);
        let out = runner.run("example.com").await.unwrap();
        assert!(out.ends_with("[output truncated]"));
    }
}
