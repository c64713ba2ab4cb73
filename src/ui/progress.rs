// Batch progress display
use crate::core::network::batch::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Spinner with a completed/total counter and the latest finished profile
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Hidden when stdout is not a terminal or verbose output is on
    pub fn new(total: usize, verbose: bool) -> Self {
        let visible = std::io::stdout().is_terminal() && !verbose;
        let bar = if visible {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };

        if let Ok(style) =
            ProgressStyle::with_template("🔍 Probing {spinner:.cyan} [{pos}/{len}] {msg}")
        {
            bar.set_style(style.tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷ "));
        }
        if visible {
            bar.enable_steady_tick(Duration::from_millis(100));
        }

        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgress {
    fn on_progress(&self, label: &str) {
        self.bar.inc(1);
        self.bar.set_message(format!("latest: {}", label));
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Plain line-per-event reporter used in verbose mode
pub struct LineProgress {
    total: usize,
    done: std::cell::Cell<usize>,
}

impl LineProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: std::cell::Cell::new(0),
        }
    }
}

impl ProgressReporter for LineProgress {
    fn on_progress(&self, label: &str) {
        let done = self.done.get() + 1;
        self.done.set(done);
        println!("[{}/{}] {}", done, self.total, label);
    }
}
