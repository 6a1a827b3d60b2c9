use std::sync::atomic::{AtomicUsize, Ordering};

use kyr::PullProgress;

/// Fetched repositories between two progress lines.
const LOG_EVERY: usize = 50;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter {
    org_name: String,
    total: AtomicUsize,
    fetched: AtomicUsize,
}

impl LoggingReporter {
    pub fn new(org_name: &str) -> Self {
        Self {
            org_name: org_name.to_string(),
            total: AtomicUsize::new(0),
            fetched: AtomicUsize::new(0),
        }
    }

    pub fn handle(&self, event: PullProgress) {
        match event {
            PullProgress::ReposDetermined { total } => {
                self.total.store(total, Ordering::Relaxed);
                tracing::info!(org = %self.org_name, total, "Fetching repositories");
            }
            PullProgress::RepoFetched { repo, success } => {
                let fetched = self.fetched.fetch_add(1, Ordering::Relaxed) + 1;
                let total = self.total.load(Ordering::Relaxed);
                if success {
                    tracing::debug!(org = %self.org_name, repo = %repo, "Fetched repository");
                } else {
                    tracing::warn!(org = %self.org_name, repo = %repo, "Repository fetch incomplete");
                }
                if fetched % LOG_EVERY == 0 || fetched == total {
                    tracing::info!(org = %self.org_name, fetched, total, "Fetch progress");
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_fetched_repositories() {
        let reporter = LoggingReporter::new("acme");
        reporter.handle(PullProgress::ReposDetermined { total: 2 });
        reporter.handle(PullProgress::RepoFetched {
            repo: "api".to_string(),
            success: true,
        });
        reporter.handle(PullProgress::RepoFetched {
            repo: "web".to_string(),
            success: false,
        });
        assert_eq!(reporter.fetched.load(Ordering::Relaxed), 2);
        assert_eq!(reporter.total.load(Ordering::Relaxed), 2);
    }
}
