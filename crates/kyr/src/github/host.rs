use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::entity::git_host::GitHostKind;
use crate::fetch::{
    DEFAULT_PAGE_SIZE, FailReason, FetchContext, FetchResult, FetchScheduler, MergerSet,
    OrganizationResult, Resolution, Resolve, Result, worker_count,
};
use crate::host::{GitHost, PullItem, RepoQuery};
use crate::pull::{ProgressCallback, PullProgress, emit};

use super::request::{FetchRequest, RequestScope};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub REST API host.
#[derive(Debug, Clone)]
pub struct GitHub {
    fetch: FetchContext,
    api_base: String,
    page_size: u32,
}

impl GitHub {
    pub fn new(fetch: FetchContext) -> Self {
        Self {
            fetch,
            api_base: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Point at another API root, e.g. a GitHub Enterprise instance.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn scope(&self, org_name: &str) -> RequestScope {
        RequestScope::new(self.fetch.clone(), &self.api_base, org_name)
    }
}

/// Number of listing pages needed for `total` repositories.
#[must_use]
pub fn page_count(total: i64, page_size: u32) -> u32 {
    let total = u64::try_from(total).unwrap_or(0);
    let pages = total.div_ceil(u64::from(page_size.max(1)));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[async_trait]
impl GitHost for GitHub {
    fn kind(&self) -> GitHostKind {
        GitHostKind::GitHub
    }

    #[tracing::instrument(skip(self))]
    async fn get_organization(&self, org_name: &str) -> OrganizationResult {
        let scope = self.scope(org_name);
        let mut request = FetchRequest::organization(&scope.fetch.tokens);

        loop {
            let Resolution { result, follow_ups } = request.resolve(&scope).await;
            match (result, follow_ups.into_iter().next()) {
                (Some(FetchResult::Organization(org)), _) => return org,
                (_, Some(next)) => request = next,
                (other, None) => {
                    tracing::warn!(?other, "organization request ended without a result");
                    return OrganizationResult {
                        org_name: org_name.to_string(),
                        outcome: Err(FailReason::UnexpectedStatus(200)),
                    };
                }
            }
        }
    }

    #[tracing::instrument(skip_all, fields(org = %query.org_name))]
    async fn get_repos(
        &self,
        query: RepoQuery,
        tx: mpsc::UnboundedSender<PullItem>,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        let RepoQuery {
            org_name,
            repos_last_update,
            file_paths,
            filter,
        } = query;
        let tokens = Arc::clone(&self.fetch.tokens);
        let workers = worker_count(file_paths.len(), &filter);

        let mut expected_pages: Option<u32> = None;
        let exact_names: Option<Vec<String>> =
            filter.exact_names().map(|names| names.iter().cloned().collect());
        let seeds: Vec<FetchRequest> = match exact_names {
            Some(names) => {
                emit(
                    on_progress,
                    PullProgress::ReposDetermined { total: names.len() },
                );
                names
                    .into_iter()
                    .map(|name| {
                        let last = repos_last_update.get(&name).copied();
                        FetchRequest::detail(name, last, &tokens)
                    })
                    .collect()
            }
            None => {
                let org = self.get_organization(&org_name).await;
                let data = match &org.outcome {
                    Ok(data) => data.clone(),
                    Err(reason) => {
                        tracing::warn!(%reason, "organization fetch failed, not listing repositories");
                        let _ = tx.send(PullItem::Organization(org));
                        return Ok(());
                    }
                };
                let pages = page_count(data.total_repos(), self.page_size);
                tracing::debug!(total = data.total_repos(), pages, "listing repositories");
                if pages == 0 {
                    emit(on_progress, PullProgress::ReposDetermined { total: 0 });
                }
                expected_pages = Some(pages);

                let filter = Arc::new(filter);
                (1..=pages)
                    .map(|page| {
                        FetchRequest::listing(page, self.page_size, Arc::clone(&filter), &tokens)
                    })
                    .collect()
            }
        };

        let scope = self
            .scope(&org_name)
            .with_file_paths(Arc::clone(&file_paths))
            .with_last_updates(repos_last_update);
        let mut stream = FetchScheduler::new(Arc::new(scope), workers).run(seeds);

        let mut mergers = MergerSet::new(&org_name, Arc::clone(&file_paths));
        let mut pages_seen: u32 = 0;
        let mut listed: usize = 0;

        while let Some(result) = stream.next().await {
            let item = match result {
                FetchResult::Organization(org) => Some(PullItem::Organization(org)),
                FetchResult::Listing(listing) => {
                    pages_seen += 1;
                    if let Ok(count) = listing.outcome {
                        listed += count;
                    }
                    if expected_pages == Some(pages_seen) {
                        emit(on_progress, PullProgress::ReposDetermined { total: listed });
                    }
                    Some(PullItem::Listing(listing))
                }
                other => mergers.add(other)?.map(|full| {
                    emit(
                        on_progress,
                        PullProgress::RepoFetched {
                            repo: full.repo_name.clone(),
                            success: full.succeeded(),
                        },
                    );
                    PullItem::Repo(full)
                }),
            };

            if let Some(item) = item
                && tx.send(item).is_err()
            {
                tracing::debug!("pull consumer gone, stopping fetch");
                return Ok(());
            }
        }

        mergers.finish()
    }
}
