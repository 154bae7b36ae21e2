//! Configuration loading: TOML file + CLI overrides.
//!
//! The file layout lives in [`opsbot_core::config`]; this module finds the
//! file, applies command-line overrides and validates the result.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use opsbot_core::Config;

pub const DEFAULT_CONFIG_PATH: &str = "~/.opsbot/config.toml";

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub max_total: Option<usize>,
    pub max_per_id: Option<usize>,
    pub window: Option<u64>,
    pub debug: bool,
}

/// Where the configuration came from, for logging once tracing is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Defaults(PathBuf),
}

/// Load the config file at `path` (missing file means defaults), then apply
/// `overrides` and validate.
pub fn load(path: &str, overrides: &Overrides) -> Result<(Config, Source)> {
    let path = expand_tilde(path);

    let (mut config, source) = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config = Config::parse(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        (config, Source::File(path))
    } else {
        (Config::default(), Source::Defaults(path))
    };

    if let Some(max_total) = overrides.max_total {
        config.limits.max_total_requests = max_total;
    }
    if let Some(max_per_id) = overrides.max_per_id {
        config.limits.max_requests_per_id = max_per_id;
    }
    if let Some(window) = overrides.window {
        config.limits.window_seconds = window;
    }
    config.bot.debug |= overrides.debug;

    config.validate().context("invalid configuration")?;
    Ok((config, source))
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(s).to_path_buf()
}
