//! Progress reporting for long-running phases.
//!
//! The library core reports progress through the [`ProgressCallback`] trait
//! so it stays free of any terminal dependency; the CLI installs
//! [`ConsoleProgress`], an indicatif-backed implementation.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

/// Callback invoked by the scanner, grouper, and executor as work advances.
///
/// Implementations must be thread-safe; hashing progress arrives from rayon
/// workers.
pub trait ProgressCallback: Send + Sync {
    /// A phase ("scan", "hash", "execute") is starting with a known total.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// One unit of work finished; `detail` is typically the current path.
    fn on_progress(&self, done: usize, detail: &str);

    /// The phase finished (successfully or not).
    fn on_phase_end(&self, phase: &str);
}

/// No-op callback for non-interactive callers and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}
    fn on_progress(&self, _done: usize, _detail: &str) {}
    fn on_phase_end(&self, _phase: &str) {}
}

/// Terminal progress bars via indicatif.
#[derive(Default)]
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    /// Create a console progress reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} {msg:<12} [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(Self::style());
        bar.set_message(phase.to_string());
        *self.bar.lock().expect("progress bar poisoned") = Some(bar);
    }

    fn on_progress(&self, done: usize, _detail: &str) {
        if let Some(bar) = self.bar.lock().expect("progress bar poisoned").as_ref() {
            bar.set_position(done as u64);
        }
    }

    fn on_phase_end(&self, _phase: &str) {
        if let Some(bar) = self.bar.lock().expect("progress bar poisoned").take() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_progress_is_noop() {
        let progress = SilentProgress;
        progress.on_phase_start("hash", 10);
        progress.on_progress(5, "/some/file");
        progress.on_phase_end("hash");
    }

    #[test]
    fn test_console_progress_lifecycle() {
        let progress = ConsoleProgress::new();
        progress.on_phase_start("hash", 3);
        progress.on_progress(1, "/a");
        progress.on_progress(3, "/c");
        progress.on_phase_end("hash");
        assert!(progress.bar.lock().unwrap().is_none());
    }
}
