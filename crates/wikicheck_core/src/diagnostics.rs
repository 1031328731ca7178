use std::env;
use std::time::{Duration, Instant};

use tracing::info;

pub const TIMING_ENV: &str = "WIKICHECK_TIMING";
pub const TIMING_THRESHOLD_ENV: &str = "WIKICHECK_TIMING_THRESHOLD_MS";

/// Timing switches handed to an analysis and to a catalog run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub timing: bool,
    /// Runs shorter than this are not reported.
    pub threshold: Duration,
}

impl Diagnostics {
    pub fn timed(threshold: Duration) -> Self {
        Self {
            timing: true,
            threshold,
        }
    }

    /// Read `WIKICHECK_TIMING` and `WIKICHECK_TIMING_THRESHOLD_MS`.
    pub fn from_env() -> Self {
        let timing = env::var(TIMING_ENV)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);
        let threshold = env::var(TIMING_THRESHOLD_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_default();
        Self { timing, threshold }
    }

    pub fn start(&self, label: impl Into<String>) -> Stopwatch {
        Stopwatch {
            label: label.into(),
            started: Instant::now(),
            enabled: self.timing,
            threshold: self.threshold,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[derive(Debug)]
pub struct Stopwatch {
    label: String,
    started: Instant,
    enabled: bool,
    threshold: Duration,
}

impl Stopwatch {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Log the elapsed time when enabled and over the threshold. Returns
    /// whether a line was logged.
    pub fn finish(self, detail: &str) -> bool {
        let elapsed = self.elapsed();
        if !self.enabled || elapsed < self.threshold {
            return false;
        }
        info!(
            target: "wikicheck::timing",
            label = %self.label,
            detail,
            elapsed_us = elapsed.as_micros() as u64,
            "timing"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Diagnostics, parse_flag};

    #[test]
    fn disabled_stopwatch_never_reports() {
        let stopwatch = Diagnostics::default().start("templates");
        assert!(!stopwatch.finish("0 found"));
    }

    #[test]
    fn threshold_filters_fast_runs() {
        let stopwatch = Diagnostics::timed(Duration::from_secs(3600)).start("fast");
        assert!(!stopwatch.finish(""));
        let stopwatch = Diagnostics::timed(Duration::ZERO).start("any");
        assert!(stopwatch.finish(""));
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("off"));
    }
}
