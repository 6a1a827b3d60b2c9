use thiserror::Error;

/// Errors that abort a fetch run.
///
/// Per-request failures are not errors; they travel as
/// [`FailReason`](super::FailReason) inside results.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A sub-result arrived that the merger cannot accept.
    #[error("Protocol violation for {repo}: {message}")]
    Protocol { repo: String, message: String },

    /// The scheduler drained while repositories were still missing results.
    #[error("Incomplete results for repositories: {}", repos.join(", "))]
    Incomplete { repos: Vec<String> },

    /// The host could not be set up for fetching.
    #[error("Host error: {message}")]
    Host { message: String },
}

impl FetchError {
    #[inline]
    pub fn protocol(repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            repo: repo.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }
}

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
