//! Live transfer reporting
//!
//! Prints one line per finished item and keeps a spinner on stderr while a
//! bulk run is in flight.

use std::time::Duration;

use ferry_core::{TransferObserver, TransferOutcome, WorkItem};
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::Formatter;

/// Human-readable line for a finished item
pub fn describe_success(formatter: &Formatter, item: &WorkItem) -> String {
    match item {
        WorkItem::Upload { local_path, .. } => {
            format!("{} uploaded", formatter.style_key(&local_path.display().to_string()))
        }
        WorkItem::Download {
            object_key,
            local_path,
        } => format!(
            "{} downloaded to {}",
            formatter.style_key(object_key),
            local_path.display()
        ),
    }
}

/// `TransferObserver` that reports through the formatter
pub struct TransferProgress {
    formatter: Formatter,
    bar: ProgressBar,
}

impl TransferProgress {
    pub fn new(formatter: &Formatter) -> Self {
        let bar = if formatter.progress_enabled() && console::Term::stderr().is_term() {
            let pb = ProgressBar::new_spinner();
            let template = "{spinner:.green} {pos} done {msg}";
            if let Ok(style) = ProgressStyle::default_spinner().template(template) {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };

        Self {
            formatter: formatter.clone(),
            bar,
        }
    }

    /// Remove the spinner before the summary is printed
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl TransferObserver for TransferProgress {
    fn on_outcome(&self, outcome: &TransferOutcome) {
        self.bar.inc(1);
        if self.formatter.is_json() {
            return;
        }

        match &outcome.result {
            Ok(_) => {
                let line = describe_success(&self.formatter, &outcome.item);
                self.bar.suspend(|| self.formatter.println(&line));
            }
            Err(e) => {
                let line = format!("Failed {}: {e}", outcome.item);
                self.bar.suspend(|| self.formatter.error(&line));
            }
        }
    }

    fn on_wave_complete(&self, wave: usize, size: usize) {
        self.bar.set_message(format!("(wave {wave}, {size} items)"));
    }
}
