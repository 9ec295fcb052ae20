// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_ENV: &str = "GHGSCOPE_LOG";

/// Sends tracing output to `file`. The terminal belongs to the TUI, so
/// nothing is ever written to stdout or stderr.
pub fn init(level: &str, file: &Path) -> Result<()> {
    let filter = build_filter(level)?;

    if let Some(parent) = file.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let handle = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .with_context(|| {
            format!(
                "open log file {}; set [log].file to a writable path",
                file.display()
            )
        })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Arc::new(handle))
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    EnvFilter::try_new(level).with_context(|| {
        format!("invalid log.level {level:?}; use error, warn, info, debug, or trace")
    })
}

#[cfg(test)]
mod tests {
    use super::build_filter;

    #[test]
    fn level_strings_become_filters() -> anyhow::Result<()> {
        let filter = build_filter("debug")?;
        assert!(filter.to_string().contains("debug"));
        let filter = build_filter("ghgscope_db=trace,warn")?;
        assert!(filter.to_string().contains("ghgscope_db=trace"));
        Ok(())
    }

    #[test]
    fn garbage_level_is_rejected() {
        let error = build_filter("ghgscope=loudest").expect_err("bad directive should fail");
        assert!(error.to_string().contains("invalid log.level"));
    }
}
