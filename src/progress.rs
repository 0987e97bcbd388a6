//! Terminal progress for sync runs.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rolekit::{Operation, ProgressSink};

/// Progress bar fed by the executors, one tick per role operation
pub struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    pub fn new(total: usize, quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        pb.set_style(bar_style());
        Self { pb }
    }

    /// Clear the bar once the run is over
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=>-"))
}

impl ProgressSink for BarProgress {
    fn on_phase_start(&self, operation: Operation, count: usize) {
        self.pb.set_prefix(phase_label(operation));
        log::debug!("{operation} phase: {count} roles");
    }

    fn on_operation_start(&self, _operation: Operation, role: &str) {
        self.pb.set_message(role.to_string());
    }

    fn on_operation_complete(&self, operation: Operation, role: &str, success: bool) {
        if !success {
            self.pb.suspend(|| {
                println!("  {} {} {}", "✗".red(), operation, role);
            });
        }
        self.pb.inc(1);
    }

    fn message(&self, text: &str) {
        self.pb.suspend(|| {
            println!("  {} {}", "→".cyan(), text);
        });
    }
}

fn phase_label(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => "Creating",
        Operation::Update => "Updating",
        Operation::Delete => "Deleting",
    }
}
