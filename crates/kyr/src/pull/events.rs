//! Domain events describing what a pull changed or failed to do.

use std::fmt;

use crate::entity::git_host::GitHostKind;
use crate::fetch::FailReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullEvent {
    OrganizationUpdated {
        org_name: String,
        host: GitHostKind,
    },
    OrganizationPullFailed {
        org_name: String,
        host: GitHostKind,
        reason: FailReason,
    },
    ReposListingPullFailed {
        org_name: String,
        host: GitHostKind,
        page: u32,
        reason: FailReason,
    },
    RepoPullFailed {
        org_name: String,
        host: GitHostKind,
        repo_name: String,
        reason: FailReason,
    },
    RepoFilePullFailed {
        org_name: String,
        host: GitHostKind,
        repo_name: String,
        path: String,
        reason: FailReason,
    },
    /// Repositories inserted or updated.
    ReposUpdated {
        org_name: String,
        host: GitHostKind,
        repo_names: Vec<String>,
    },
    /// Repositories whose dependency links were rewritten.
    ReposDependenciesUpdated {
        org_name: String,
        host: GitHostKind,
        repo_names: Vec<String>,
    },
    /// Repositories no longer present in a full listing.
    ReposRemoved {
        org_name: String,
        host: GitHostKind,
        repo_names: Vec<String>,
    },
}

impl PullEvent {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::OrganizationPullFailed { .. }
                | Self::ReposListingPullFailed { .. }
                | Self::RepoPullFailed { .. }
                | Self::RepoFilePullFailed { .. }
        )
    }
}

impl fmt::Display for PullEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrganizationUpdated { org_name, host } => {
                write!(f, "organization {host}/{org_name} updated")
            }
            Self::OrganizationPullFailed {
                org_name,
                host,
                reason,
            } => write!(f, "failed to pull organization {host}/{org_name}: {reason}"),
            Self::ReposListingPullFailed {
                org_name,
                host,
                page,
                reason,
            } => write!(
                f,
                "failed to list repositories of {host}/{org_name} (page {page}): {reason}"
            ),
            Self::RepoPullFailed {
                org_name,
                host,
                repo_name,
                reason,
            } => write!(f, "failed to pull {host}/{org_name}/{repo_name}: {reason}"),
            Self::RepoFilePullFailed {
                org_name,
                host,
                repo_name,
                path,
                reason,
            } => write!(
                f,
                "failed to pull {path} of {host}/{org_name}/{repo_name}: {reason}"
            ),
            Self::ReposUpdated {
                org_name,
                host,
                repo_names,
            } => write!(
                f,
                "{} repositories of {host}/{org_name} updated: {}",
                repo_names.len(),
                repo_names.join(", ")
            ),
            Self::ReposDependenciesUpdated {
                org_name,
                host,
                repo_names,
            } => write!(
                f,
                "dependencies of {} repositories of {host}/{org_name} updated: {}",
                repo_names.len(),
                repo_names.join(", ")
            ),
            Self::ReposRemoved {
                org_name,
                host,
                repo_names,
            } => write!(
                f,
                "{} repositories of {host}/{org_name} removed: {}",
                repo_names.len(),
                repo_names.join(", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_events_are_flagged() {
        let failed = PullEvent::RepoPullFailed {
            org_name: "acme".to_string(),
            host: GitHostKind::GitHub,
            repo_name: "api".to_string(),
            reason: FailReason::NotFound,
        };
        assert!(failed.is_failure());
        assert_eq!(failed.to_string(), "failed to pull github/acme/api: NOT_FOUND");

        let updated = PullEvent::ReposUpdated {
            org_name: "acme".to_string(),
            host: GitHostKind::GitHub,
            repo_names: vec!["api".to_string(), "web".to_string()],
        };
        assert!(!updated.is_failure());
        assert_eq!(
            updated.to_string(),
            "2 repositories of github/acme updated: api, web"
        );
    }
}
