use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use kyr::PullProgress;

#[derive(Default)]
struct FetchCounts {
    fetched: usize,
    failed: usize,
}

/// Interactive progress reporter using indicatif.
///
/// A spinner runs while the organization is listed and turns into a bar
/// once the number of repositories is known.
pub struct InteractiveReporter {
    bar: ProgressBar,
    counts: Mutex<FetchCounts>,
}

impl InteractiveReporter {
    pub fn new(org_name: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(Self::spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_prefix(format!("{org_name:12}"));
        bar.set_message("Listing repositories...");
        Self {
            bar,
            counts: Mutex::new(FetchCounts::default()),
        }
    }

    pub fn handle(&self, event: PullProgress) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            PullProgress::ReposDetermined { total } => {
                self.bar.set_style(Self::bar_style());
                self.bar.set_length(total as u64);
                self.bar.set_position(counts.fetched as u64);
                self.bar.set_message("Fetching repositories...");
            }
            PullProgress::RepoFetched { repo, success } => {
                counts.fetched += 1;
                if !success {
                    counts.failed += 1;
                }
                self.bar.inc(1);
                if counts.failed > 0 {
                    self.bar.set_message(format!(
                        "{repo} {}",
                        style(format!("({} failed)", counts.failed)).red()
                    ));
                } else {
                    self.bar.set_message(repo);
                }
            }
            _ => {}
        }
    }

    pub fn finish(&self) {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        if !self.bar.is_finished() {
            self.bar.finish_with_message(format!(
                "{} fetched, {} failed",
                counts.fetched, counts.failed
            ));
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .expect("Invalid template")
            .progress_chars("█▓░")
    }
}
