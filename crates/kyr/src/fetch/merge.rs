//! Per-repository reassembly of detail and file results.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::errors::{FetchError, Result};
use super::types::{FetchResult, RepoDetailResult, RepoFileResult, RepoFullResult};

/// Collects one repository's detail result and one file result per
/// configured path.
#[derive(Debug)]
pub struct ResultMerger {
    org_name: String,
    repo_name: String,
    file_paths: Arc<[String]>,
    detail: Option<RepoDetailResult>,
    files: Vec<Option<RepoFileResult>>,
}

impl ResultMerger {
    pub fn new(
        org_name: impl Into<String>,
        repo_name: impl Into<String>,
        file_paths: Arc<[String]>,
    ) -> Self {
        let files = vec![None; file_paths.len()];
        Self {
            org_name: org_name.into(),
            repo_name: repo_name.into(),
            file_paths,
            detail: None,
            files,
        }
    }

    #[must_use]
    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    /// Accept a detail or file result for this repository.
    pub fn add_result(&mut self, result: FetchResult) -> Result<()> {
        match result {
            FetchResult::RepoDetail(detail) => {
                self.check_owner(&detail.org_name, &detail.repo_name)?;
                if self.detail.is_some() {
                    return Err(FetchError::protocol(
                        &self.repo_name,
                        "detail result received twice",
                    ));
                }
                self.detail = Some(detail);
                Ok(())
            }
            FetchResult::RepoFile(file) => {
                self.check_owner(&file.org_name, &file.repo_name)?;
                let Some(idx) = self.file_paths.iter().position(|p| *p == file.path) else {
                    return Err(FetchError::protocol(
                        &self.repo_name,
                        format!("unexpected file path {}", file.path),
                    ));
                };
                if self.files[idx].is_some() {
                    return Err(FetchError::protocol(
                        &self.repo_name,
                        format!("file result for {} received twice", file.path),
                    ));
                }
                self.files[idx] = Some(file);
                Ok(())
            }
            FetchResult::Organization(_) | FetchResult::Listing(_) => Err(FetchError::protocol(
                &self.repo_name,
                "organization-level result routed to a repository merger",
            )),
        }
    }

    fn check_owner(&self, org_name: &str, repo_name: &str) -> Result<()> {
        if org_name != self.org_name || repo_name != self.repo_name {
            return Err(FetchError::protocol(
                &self.repo_name,
                format!("result for {org_name}/{repo_name} does not belong here"),
            ));
        }
        Ok(())
    }

    /// True once the detail is in and, when files were requested, every
    /// path has its result.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let Some(detail) = &self.detail else {
            return false;
        };
        match &detail.outcome {
            Ok(repo) if repo.needs_files() => self.files.iter().all(Option::is_some),
            _ => true,
        }
    }

    /// The aggregate record, or `None` until complete.
    #[must_use]
    pub fn merged(&self) -> Option<RepoFullResult> {
        if !self.is_complete() {
            return None;
        }
        let detail = self.detail.as_ref()?;

        Some(RepoFullResult {
            org_name: detail.org_name.clone(),
            // Keyed by the repository, not the organization it belongs to.
            repo_name: detail.repo_name.clone(),
            detail: detail.outcome.clone(),
            files: self.files.iter().flatten().cloned().collect(),
        })
    }
}

/// The open mergers of one fetch run, keyed by repository name.
#[derive(Debug)]
pub struct MergerSet {
    org_name: String,
    file_paths: Arc<[String]>,
    open: HashMap<String, ResultMerger>,
    merged: HashSet<String>,
}

impl MergerSet {
    pub fn new(org_name: impl Into<String>, file_paths: Arc<[String]>) -> Self {
        Self {
            org_name: org_name.into(),
            file_paths,
            open: HashMap::new(),
            merged: HashSet::new(),
        }
    }

    /// Route a detail or file result to its repository's merger. Returns the
    /// aggregate once that repository is complete.
    ///
    /// Results for a repository that was already merged are dropped.
    pub fn add(&mut self, result: FetchResult) -> Result<Option<RepoFullResult>> {
        let Some(repo_name) = result.repo_name().map(str::to_string) else {
            return Err(FetchError::protocol(
                &self.org_name,
                "organization-level result routed to a repository merger",
            ));
        };
        if self.merged.contains(&repo_name) {
            tracing::debug!(repo = %repo_name, "repository already merged, dropping result");
            return Ok(None);
        }

        let merger = self.open.entry(repo_name.clone()).or_insert_with(|| {
            ResultMerger::new(&self.org_name, &repo_name, Arc::clone(&self.file_paths))
        });
        merger.add_result(result)?;
        let Some(full) = merger.merged() else {
            return Ok(None);
        };

        self.open.remove(&repo_name);
        self.merged.insert(repo_name);
        Ok(Some(full))
    }

    /// Check that no repository is still waiting for results.
    pub fn finish(self) -> Result<()> {
        if self.open.is_empty() {
            return Ok(());
        }
        let mut repos: Vec<String> = self.open.into_keys().collect();
        repos.sort();
        Err(FetchError::Incomplete { repos })
    }
}
