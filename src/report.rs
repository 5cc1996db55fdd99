use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::convert::{FileOutcome, Reporter, Summary};
use crate::AppError;

/// Logs every outcome through `tracing` and optionally draws a progress bar on stderr.
#[derive(Default)]
pub struct ConsoleReporter {
    progress: bool,
    bar: Option<ProgressBar>,
}

impl ConsoleReporter {
    pub fn new(progress: bool) -> Self {
        Self {
            progress,
            bar: None,
        }
    }

    fn bar_for(&mut self, total: usize) -> Option<&ProgressBar> {
        if !self.progress {
            return None;
        }
        let bar = self.bar.get_or_insert_with(|| {
            let b = ProgressBar::new(total as u64);
            // WHY: 進捗の視認性を優先
            if let Ok(style) =
                ProgressStyle::with_template("{prefix} [{wide_bar}] {pos}/{len} ({percent}%) {msg}")
            {
                b.set_style(style.progress_chars("=>-"));
            }
            b.set_prefix("converting");
            b
        });
        Some(bar)
    }

    fn emit(&self, log: impl FnOnce()) {
        match &self.bar {
            Some(bar) => bar.suspend(log),
            None => log(),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl Reporter for ConsoleReporter {
    fn on_file_start(&mut self, _index: usize, total: usize, path: &Path) {
        let name = display_name(path);
        if let Some(bar) = self.bar_for(total) {
            bar.set_message(name);
        }
    }

    fn on_file_result(&mut self, path: &Path, outcome: &FileOutcome) {
        let name = display_name(path);
        self.emit(|| match outcome {
            FileOutcome::Saved { output, records } => {
                info!(records, "Saved: {}", display_name(output))
            }
            FileOutcome::Parsed { records } => info!(records, "Parsed: {name}"),
            FileOutcome::NoData => info!("No data found in {name}"),
            FileOutcome::Failed { message } => error!("Error in {name}: {message}"),
        });
    }

    fn on_progress(&mut self, done: usize, total: usize) {
        if let Some(bar) = self.bar_for(total) {
            bar.set_position(done as u64);
        }
    }

    fn on_complete(&mut self, summary: &Summary) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        match summary {
            Summary::NoFiles { root } => info!("No HTML files found under {}", root.display()),
            Summary::OneToOne {
                files,
                written,
                failed,
            } => info!(files, written, failed, "One-to-one conversion complete."),
            Summary::ManyToOne {
                entries,
                saved_to: Some(path),
                ..
            } => {
                info!("Combined JSON saved to: {}", path.display());
                info!("Combined JSON file created with {entries} entries.");
            }
            Summary::ManyToOne {
                files,
                entries,
                saved_to: None,
                ..
            } if *entries > 0 => {
                info!(files, entries, "No destination chosen, combined JSON not written.")
            }
            Summary::ManyToOne { files, .. } => {
                info!(files, "No data found in any file, nothing to combine.")
            }
        }
    }

    fn on_fatal(&mut self, err: &AppError) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
        error!("Conversion stopped: {err}");
    }
}
