//! Reload progress reporting
//!
//! The reload run reports a fraction in `[0, 1]` after every scanned scene.
//! Reporters never fail.

use std::io::Write;
use std::sync::Mutex;
use tracing::info;

/// Sink for reload progress
pub trait ProgressReporter: Send + Sync {
    fn report(&self, fraction: f64);
}

/// Logs progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, fraction: f64) {
        info!(progress = fraction, "Reload progress");
    }
}

/// Writes progress lines the catalog server's plugin log reader understands
///
/// Each line is `\x01p\x02<fraction>` on stderr; the value is also logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PluginProgress;

impl ProgressReporter for PluginProgress {
    fn report(&self, fraction: f64) {
        {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "\x01p\x02{}", fraction);
        }
        TracingProgress.report(fraction);
    }
}

/// Keeps every reported value (tests)
#[derive(Debug, Default)]
pub struct RecordingProgress {
    values: Mutex<Vec<f64>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, fraction: f64) {
        if let Ok(mut values) = self.values.lock() {
            values.push(fraction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_progress_keeps_order() {
        let progress = RecordingProgress::new();
        progress.report(0.5);
        progress.report(1.0);
        assert_eq!(progress.values(), vec![0.5, 1.0]);
    }
}
