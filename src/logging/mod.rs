//! Logging and output control
//!
//! This module provides the [`Logger`] handed to every component at
//! construction. It gates verbose output, formats sizes and durations, and
//! forwards everything to `tracing`, so a component under test only needs a
//! quiet logger instead of process-wide setup.

use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const TARGET: &str = "registry_fake_pusher";

/// Logger responsible for all operator-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            tracing::info!(target: TARGET, "=== {} ===", title);
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbose && !self.quiet {
            tracing::debug!(target: TARGET, "{}", message);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            tracing::info!(target: TARGET, "{}", message);
        }
    }

    /// Step information, shown in verbose mode only
    pub fn step(&self, message: &str) {
        if self.verbose && !self.quiet {
            tracing::info!(target: TARGET, "▶ {}", message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            tracing::info!(target: TARGET, "✓ {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            tracing::warn!(target: TARGET, "{}", message);
        }
    }

    /// Errors are never suppressed
    pub fn error(&self, message: &str) {
        tracing::error!(target: TARGET, "{}", message);
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            tracing::info!(target: TARGET, "--- {} ---", title);
            for (key, value) in items {
                tracing::info!(target: TARGET, "  {}: {}", key, value);
            }
        }
    }

    /// Time since the logger was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Format a byte count in human-readable units
    pub fn format_size(&self, bytes: u64) -> String {
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else if bytes < 1024 * 1024 * 1024 {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        } else {
            format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 1 {
            format!("{}ms", duration.as_millis())
        } else if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

/// Install the stderr subscriber used by the binary.
///
/// `RUST_LOG` takes precedence over the `debug` switch when set.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", TARGET, default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
