//! Git host abstraction.
//!
//! A [`GitHost`] fetches an organization and streams the organization's
//! repositories, fully merged, to a consumer. GitHub is the only
//! implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::entity::git_host::GitHostKind;
use crate::fetch::{ListingResult, OrganizationResult, RepoFilter, RepoFullResult, Result};
use crate::pull::ProgressCallback;

/// What to fetch in a repository pull.
#[derive(Debug, Clone)]
pub struct RepoQuery {
    pub org_name: String,
    /// Last known push time of every stored repository of the organization.
    pub repos_last_update: HashMap<String, DateTime<Utc>>,
    /// Files to fetch for new or updated repositories, in order.
    pub file_paths: Arc<[String]>,
    pub filter: RepoFilter,
}

/// One item of a repository pull stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullItem {
    /// Only sent when the organization fetch failed; the stream ends after it.
    Organization(OrganizationResult),
    Listing(ListingResult),
    Repo(RepoFullResult),
}

#[async_trait]
pub trait GitHost: Send + Sync {
    fn kind(&self) -> GitHostKind;

    /// Fetch organization metadata, following token rotation until a
    /// terminal result.
    async fn get_organization(&self, org_name: &str) -> OrganizationResult;

    /// Fetch the repositories selected by `query` and send them to `tx` as
    /// they complete.
    ///
    /// Returns once every request has drained or the receiver is gone.
    /// Merger protocol violations and repositories left incomplete at drain
    /// are errors.
    async fn get_repos(
        &self,
        query: RepoQuery,
        tx: mpsc::UnboundedSender<PullItem>,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<()>;
}
