use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::progress::ProgressSnapshot;

/// Displays progress snapshots.
pub trait ProgressRenderer: Send + 'static {
    /// Shows the latest totals. Called at most once per event and once per poll interval.
    fn render(&mut self, snapshot: &ProgressSnapshot);

    /// Called once after the last snapshot.
    fn finish(&mut self, _snapshot: &ProgressSnapshot) {}
}

/// Formats the single progress line shared by every renderer.
///
/// The line holds the totals, the applied row rate and the elapsed seconds, e.g.
/// `produced: 2500 | applied: 2400 | skipped: 100 | 812.3 rows/s | 3s`.
pub fn format_progress_line(snapshot: &ProgressSnapshot) -> String {
    format!(
        "produced: {} | applied: {} | skipped: {} | {:.1} rows/s | {:.0}s",
        snapshot.produced,
        snapshot.applied,
        snapshot.skipped,
        snapshot.rate(),
        snapshot.elapsed.as_secs_f64()
    )
}

/// Rewrites a single line on stderr, separately from the log output on stdout.
#[derive(Debug, Default)]
pub struct TerminalRenderer;

impl ProgressRenderer for TerminalRenderer {
    fn render(&mut self, snapshot: &ProgressSnapshot) {
        let mut stderr = std::io::stderr().lock();
        // Write errors only affect the display.
        let _ = write!(stderr, "\r\x1b[2K{}", format_progress_line(snapshot));
        let _ = stderr.flush();
    }

    fn finish(&mut self, snapshot: &ProgressSnapshot) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "\r\x1b[2K{}", format_progress_line(snapshot));
    }
}

/// Keeps rendered lines in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRenderer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryRenderer {
    /// Creates a renderer with no lines. Clones share the same lines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line rendered so far, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl ProgressRenderer for MemoryRenderer {
    fn render(&mut self, snapshot: &ProgressSnapshot) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format_progress_line(snapshot));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn line_shows_totals_and_rate() {
        let snapshot = ProgressSnapshot {
            produced: 2500,
            applied: 2000,
            skipped: 10,
            elapsed: Duration::from_secs(4),
            ..ProgressSnapshot::default()
        };

        assert_eq!(
            format_progress_line(&snapshot),
            "produced: 2500 | applied: 2000 | skipped: 10 | 500.0 rows/s | 4s"
        );
    }

    #[test]
    fn memory_renderer_collects_lines() {
        let renderer = MemoryRenderer::new();
        let mut writer = renderer.clone();

        writer.render(&ProgressSnapshot::default());
        writer.render(&ProgressSnapshot {
            produced: 1,
            ..ProgressSnapshot::default()
        });

        let lines = renderer.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("produced: 1 |"));
    }
}
