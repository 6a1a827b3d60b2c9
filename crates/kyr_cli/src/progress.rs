//! Progress reporting for repository pulls.
//!
//! This module provides two modes of progress reporting:
//! - Interactive mode (TTY): an animated progress bar using indicatif
//! - Logging mode (non-TTY): structured logging using tracing

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use kyr::{ProgressCallback, PullProgress};

pub(crate) use interactive::InteractiveReporter;
pub(crate) use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Interactive progress bar for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter for `org_name`, auto-detecting TTY mode.
    pub fn new(org_name: &str) -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new(org_name))
        } else {
            Self::Logging(LoggingReporter::new(org_name))
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: PullProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| {
            reporter.handle(event);
        })
    }

    /// Finish the progress bar (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}
