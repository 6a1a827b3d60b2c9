//! Progress reporting for repository pulls.
//!
//! Events are purely observational; a pull behaves the same with or without
//! a callback.

/// Progress events emitted while repositories are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PullProgress {
    /// The number of repositories to fetch is known.
    ///
    /// Sent immediately for named pulls and after the last listing page
    /// otherwise.
    ReposDetermined {
        /// Repositories selected by the filter.
        total: usize,
    },

    /// A repository's detail and file results have all arrived.
    RepoFetched {
        /// The repository name.
        repo: String,
        /// Whether every constituent request succeeded.
        success: bool,
    },
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(PullProgress) + Send + Sync>;

/// Helper to emit progress if callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: PullProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn emit_without_callback_is_a_no_op() {
        emit(None, PullProgress::ReposDetermined { total: 3 });
    }

    #[test]
    fn emit_forwards_events_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |event| {
            sink.lock().expect("lock").push(event);
        });

        emit(Some(&callback), PullProgress::ReposDetermined { total: 2 });
        emit(
            Some(&callback),
            PullProgress::RepoFetched {
                repo: "api".to_string(),
                success: true,
            },
        );

        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], PullProgress::ReposDetermined { total: 2 });
    }
}
