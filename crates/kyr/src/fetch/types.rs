//! Result shapes produced by fetch requests.

use std::fmt;

use chrono::{DateTime, Utc};

/// Default number of repositories requested per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Why a request ended without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailReason {
    /// Every token is cooling down.
    NoValidToken,
    /// The host answered 404.
    NotFound,
    /// Any other non-200 status, or a 200 whose body did not decode.
    UnexpectedStatus(u16),
    /// No status was received (connection failure or timeout).
    Transport,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValidToken => f.write_str("NO_VALID_TOKEN"),
            Self::NotFound => f.write_str("NOT_FOUND"),
            Self::UnexpectedStatus(status) => write!(f, "UNEXPECTED_STATUS ({status})"),
            Self::Transport => f.write_str("TRANSPORT"),
        }
    }
}

/// Outcome of one request.
pub type Outcome<T> = std::result::Result<T, FailReason>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationData {
    pub name: String,
    pub private_repos: i64,
    pub public_repos: i64,
}

impl OrganizationData {
    #[must_use]
    pub fn total_repos(&self) -> i64 {
        self.private_repos + self.public_repos
    }
}

/// Repository metadata from a detail fetch.
///
/// `is_new` and `updated` are never both set. Both unset means the remote
/// push time did not move past the last known update, so no files were
/// requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoData {
    pub name: String,
    pub org_name: String,
    pub created_at: DateTime<Utc>,
    pub pushed_at: DateTime<Utc>,
    pub html_url: String,
    pub api_url: String,
    pub is_new: bool,
    pub updated: bool,
}

impl RepoData {
    /// Whether the repository's files were requested.
    #[must_use]
    pub fn needs_files(&self) -> bool {
        self.is_new || self.updated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationResult {
    pub org_name: String,
    pub outcome: Outcome<OrganizationData>,
}

/// Result of one listing page. On success it carries the number of names
/// that passed the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingResult {
    pub org_name: String,
    pub page: u32,
    pub outcome: Outcome<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDetailResult {
    pub org_name: String,
    pub repo_name: String,
    pub outcome: Outcome<RepoData>,
}

/// Decoded content of one repository file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFileResult {
    pub org_name: String,
    pub repo_name: String,
    pub path: String,
    pub outcome: Outcome<String>,
}

/// Terminal result of any request kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Organization(OrganizationResult),
    Listing(ListingResult),
    RepoDetail(RepoDetailResult),
    RepoFile(RepoFileResult),
}

impl FetchResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Organization(r) => r.outcome.is_ok(),
            Self::Listing(r) => r.outcome.is_ok(),
            Self::RepoDetail(r) => r.outcome.is_ok(),
            Self::RepoFile(r) => r.outcome.is_ok(),
        }
    }

    /// The repository a detail or file result belongs to.
    #[must_use]
    pub fn repo_name(&self) -> Option<&str> {
        match self {
            Self::RepoDetail(r) => Some(&r.repo_name),
            Self::RepoFile(r) => Some(&r.repo_name),
            Self::Organization(_) | Self::Listing(_) => None,
        }
    }

    #[must_use]
    pub fn fail_reason(&self) -> Option<FailReason> {
        match self {
            Self::Organization(r) => r.outcome.as_ref().err().copied(),
            Self::Listing(r) => r.outcome.as_ref().err().copied(),
            Self::RepoDetail(r) => r.outcome.as_ref().err().copied(),
            Self::RepoFile(r) => r.outcome.as_ref().err().copied(),
        }
    }
}

/// A repository's detail result together with its file results.
///
/// `files` follows the configured path order and is empty when no files
/// were needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFullResult {
    pub org_name: String,
    pub repo_name: String,
    pub detail: Outcome<RepoData>,
    pub files: Vec<RepoFileResult>,
}

impl RepoFullResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.fail_reason().is_none()
    }

    /// The detail's reason if it failed, else the first failing file's.
    #[must_use]
    pub fn fail_reason(&self) -> Option<FailReason> {
        if let Err(reason) = &self.detail {
            return Some(*reason);
        }
        self.files
            .iter()
            .find_map(|f| f.outcome.as_ref().err().copied())
    }

    #[must_use]
    pub fn repo(&self) -> Option<&RepoData> {
        self.detail.as_ref().ok()
    }

    /// Successfully fetched files as `(path, content)`.
    pub fn fetched_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().filter_map(|f| match &f.outcome {
            Ok(content) => Some((f.path.as_str(), content.as_str())),
            Err(_) => None,
        })
    }

    /// Files that failed, with their reasons.
    pub fn failed_files(&self) -> impl Iterator<Item = (&str, FailReason)> {
        self.files.iter().filter_map(|f| match &f.outcome {
            Ok(_) => None,
            Err(reason) => Some((f.path.as_str(), *reason)),
        })
    }
}
