//! Reconciliation of fetched state against the database.
//!
//! A repository pull runs in three phases:
//!
//! 1. A snapshot of the organization's stored repositories, dependency rows
//!    and links is loaded.
//! 2. The host streams merged repositories while a [`PullPlan`] is built in
//!    memory from them.
//! 3. The plan is applied in one transaction.
//!
//! An organization or listing failure aborts the pull before phase 3, so a
//! partial listing never removes anything.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::entity::dependency;
use crate::entity::organization;
use crate::entity::repo;
use crate::fetch::{FailReason, RepoData, RepoFilter, RepoFullResult};
use crate::host::{GitHost, PullItem, RepoQuery};
use crate::lockfile::ParserRegistry;
use crate::store::{self, DependencyKey};

use super::errors::{PullError, Result};
use super::events::PullEvent;
use super::progress::ProgressCallback;

/// Counts of what a repository pull did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PullSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Repositories skipped because a request failed.
    pub failed: usize,
    pub dependencies_created: usize,
}

/// Outcome of a repository pull.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub events: Vec<PullEvent>,
    pub summary: PullSummary,
}

/// Stored state of one organization, loaded before fetching.
struct Snapshot {
    repos: HashMap<String, repo::Model>,
    dependencies: HashMap<DependencyKey, dependency::Model>,
    /// Linked dependencies per repository, keyed by `(language, name)`.
    links: HashMap<Uuid, HashMap<(String, String), dependency::Model>>,
}

/// A fetched repository and the pins parsed from its files.
struct Fetched {
    data: RepoData,
    pins: Vec<DependencyKey>,
}

#[derive(Default)]
struct PullPlan {
    inserts: Vec<Fetched>,
    updates: Vec<(repo::Model, Fetched)>,
    unchanged: Vec<(repo::Model, RepoData)>,
    /// Every repository the host reported, whether or not it succeeded.
    seen: HashSet<String>,
    events: Vec<PullEvent>,
    failed: usize,
    aborted: bool,
}

/// Pulls organizations and their repositories into the database.
pub struct Reconciler<H: GitHost> {
    db: DatabaseConnection,
    host: H,
    file_paths: Arc<[String]>,
    parsers: ParserRegistry,
}

impl<H: GitHost> Reconciler<H> {
    pub fn new(db: DatabaseConnection, host: H) -> Self {
        Self {
            db,
            host,
            file_paths: Arc::from(Vec::new()),
            parsers: ParserRegistry::default(),
        }
    }

    /// Files fetched for new and updated repositories.
    #[must_use]
    pub fn with_file_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// Fetch an organization and upsert it.
    ///
    /// A failed fetch yields a single failure event and writes nothing.
    #[tracing::instrument(skip(self), fields(host = %self.host.kind()))]
    pub async fn pull_organization(&self, org_name: &str) -> Result<Vec<PullEvent>> {
        let host = self.host.kind();
        let result = self.host.get_organization(org_name).await;

        let data = match result.outcome {
            Ok(data) => data,
            Err(reason) => {
                tracing::warn!(org = %org_name, %reason, "organization pull failed");
                return Ok(vec![PullEvent::OrganizationPullFailed {
                    org_name: org_name.to_string(),
                    host,
                    reason,
                }]);
            }
        };

        let (model, created) =
            store::organization::upsert(&self.db, host, &data, Utc::now()).await?;
        tracing::info!(
            org = %model.name,
            created,
            total_repos = model.total_repos(),
            "organization stored"
        );

        Ok(vec![PullEvent::OrganizationUpdated {
            org_name: model.name,
            host,
        }])
    }

    /// Fetch the organization's repositories selected by `filter` and
    /// reconcile them with the stored ones.
    ///
    /// Stored repositories missing from the listing are only removed when
    /// `filter` selects everything.
    #[tracing::instrument(skip(self, filter, on_progress), fields(host = %self.host.kind()))]
    pub async fn pull_repos(
        &self,
        org_name: &str,
        filter: RepoFilter,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<PullReport> {
        let host = self.host.kind();
        let org = store::organization::find_by_name(&self.db, host, org_name)
            .await?
            .ok_or_else(|| PullError::MissingData {
                org_name: org_name.to_string(),
                host,
            })?;

        let snapshot = self.load_snapshot(org.id).await?;
        let prune = filter.is_unfiltered();
        let query = RepoQuery {
            org_name: org.name.clone(),
            repos_last_update: snapshot
                .repos
                .iter()
                .map(|(name, r)| (name.clone(), r.pushed_at.with_timezone(&Utc)))
                .collect(),
            file_paths: Arc::clone(&self.file_paths),
            filter,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let (fetched, plan) = tokio::join!(
            self.host.get_repos(query, tx, on_progress),
            self.build_plan(rx, &snapshot, &org.name),
        );
        fetched?;

        if plan.aborted {
            return Ok(PullReport {
                events: plan.events,
                summary: PullSummary::default(),
            });
        }

        let report = self.apply(&org, &snapshot, plan, prune).await?;
        tracing::info!(
            org = %org.name,
            inserted = report.summary.inserted,
            updated = report.summary.updated,
            unchanged = report.summary.unchanged,
            removed = report.summary.removed,
            failed = report.summary.failed,
            dependencies_created = report.summary.dependencies_created,
            "repositories reconciled"
        );
        Ok(report)
    }

    async fn load_snapshot(&self, organization_id: Uuid) -> Result<Snapshot> {
        let repos = store::repo::find_by_organization(&self.db, organization_id)
            .await?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        let dependencies = store::dependency::all_by_key(&self.db).await?;
        let links = store::dependency::links_for_organization(&self.db, organization_id)
            .await?
            .into_iter()
            .map(|(repo_id, deps)| {
                let by_name = deps
                    .into_iter()
                    .map(|d| ((d.language.clone(), d.name.clone()), d))
                    .collect();
                (repo_id, by_name)
            })
            .collect();

        Ok(Snapshot {
            repos,
            dependencies,
            links,
        })
    }

    async fn build_plan(
        &self,
        mut rx: mpsc::UnboundedReceiver<PullItem>,
        snapshot: &Snapshot,
        org_name: &str,
    ) -> PullPlan {
        let host = self.host.kind();
        let mut plan = PullPlan::default();

        while let Some(item) = rx.recv().await {
            match item {
                PullItem::Organization(result) => {
                    if let Err(reason) = result.outcome {
                        plan.events.push(PullEvent::OrganizationPullFailed {
                            org_name: org_name.to_string(),
                            host,
                            reason,
                        });
                        plan.aborted = true;
                        break;
                    }
                }
                PullItem::Listing(result) => {
                    if let Err(reason) = result.outcome {
                        tracing::warn!(page = result.page, %reason, "listing page failed");
                        plan.events.push(PullEvent::ReposListingPullFailed {
                            org_name: org_name.to_string(),
                            host,
                            page: result.page,
                            reason,
                        });
                        plan.aborted = true;
                        break;
                    }
                }
                PullItem::Repo(full) => self.plan_repo(&mut plan, snapshot, org_name, full),
            }
        }

        plan
    }

    fn plan_repo(
        &self,
        plan: &mut PullPlan,
        snapshot: &Snapshot,
        org_name: &str,
        full: RepoFullResult,
    ) {
        let host = self.host.kind();
        plan.seen.insert(full.repo_name.clone());

        let data = match &full.detail {
            Ok(data) => data.clone(),
            Err(reason) => {
                tracing::warn!(repo = %full.repo_name, %reason, "repository pull failed");
                plan.events.push(PullEvent::RepoPullFailed {
                    org_name: org_name.to_string(),
                    host,
                    repo_name: full.repo_name.clone(),
                    reason: *reason,
                });
                plan.failed += 1;
                return;
            }
        };

        // A missing file is a normal state for a repository; anything else
        // means its dependencies are unknown.
        let mut skip = false;
        for (path, reason) in full.failed_files() {
            plan.events.push(PullEvent::RepoFilePullFailed {
                org_name: org_name.to_string(),
                host,
                repo_name: full.repo_name.clone(),
                path: path.to_string(),
                reason,
            });
            skip |= reason != FailReason::NotFound;
        }
        if skip {
            tracing::warn!(repo = %full.repo_name, "repository skipped after file failure");
            plan.failed += 1;
            return;
        }

        match snapshot.repos.get(&data.name) {
            Some(existing) if !data.needs_files() => {
                plan.unchanged.push((existing.clone(), data));
            }
            Some(existing) => {
                let pins = self.parse_pins(&full);
                plan.updates.push((existing.clone(), Fetched { data, pins }));
            }
            None => {
                let pins = self.parse_pins(&full);
                plan.inserts.push(Fetched { data, pins });
            }
        }
    }

    /// One pin per (language, name). When several files of the repository
    /// pin the same dependency, the file listed last wins.
    fn parse_pins(&self, full: &RepoFullResult) -> Vec<DependencyKey> {
        let mut pins: BTreeMap<(&'static str, String), String> = BTreeMap::new();
        for (path, content) in full.fetched_files() {
            let Some(parser) = self.parsers.for_path(path) else {
                tracing::debug!(%path, "no parser for file");
                continue;
            };
            for (name, version) in parser.parse(content) {
                pins.insert((parser.language(), name), version);
            }
        }
        pins.into_iter()
            .map(|((language, name), version)| DependencyKey::new(language, name, version))
            .collect()
    }

    async fn apply(
        &self,
        org: &organization::Model,
        snapshot: &Snapshot,
        plan: PullPlan,
        prune: bool,
    ) -> Result<PullReport> {
        let host = self.host.kind();
        let now = Utc::now();
        let mut summary = PullSummary {
            inserted: plan.inserts.len(),
            updated: plan.updates.len(),
            unchanged: plan.unchanged.len(),
            failed: plan.failed,
            ..PullSummary::default()
        };
        let mut events = plan.events;

        let txn = self.db.begin().await?;

        // Repositories whose dependency links must be reconciled.
        let mut pinned: Vec<(Uuid, &str, &[DependencyKey])> = Vec::new();
        let mut updated_names: Vec<String> = Vec::new();

        let mut new_repos = Vec::with_capacity(plan.inserts.len());
        for fetched in &plan.inserts {
            let id = Uuid::new_v4();
            pinned.push((id, fetched.data.name.as_str(), fetched.pins.as_slice()));
            updated_names.push(fetched.data.name.clone());
            new_repos.push(store::repo::new_active_model(id, org.id, &fetched.data, now));
        }
        store::repo::insert_many(&txn, new_repos).await?;

        for (existing, fetched) in &plan.updates {
            let model = store::repo::refresh(&txn, existing.clone(), &fetched.data, now).await?;
            pinned.push((model.id, fetched.data.name.as_str(), fetched.pins.as_slice()));
            updated_names.push(fetched.data.name.clone());
        }
        for (existing, data) in &plan.unchanged {
            store::repo::refresh(&txn, existing.clone(), data, now).await?;
        }

        // Dependency rows are shared across repositories: reuse by natural
        // key and create each missing triple once.
        let mut known: HashMap<DependencyKey, Uuid> = snapshot
            .dependencies
            .iter()
            .map(|(key, model)| (key.clone(), model.id))
            .collect();
        let mut new_dependencies = Vec::new();
        for (_, _, pins) in &pinned {
            for pin in pins.iter() {
                if !known.contains_key(pin) {
                    let id = Uuid::new_v4();
                    new_dependencies.push(store::dependency::new_active_model(id, pin));
                    known.insert(pin.clone(), id);
                }
            }
        }
        summary.dependencies_created =
            store::dependency::insert_many(&txn, new_dependencies).await? as usize;

        let mut dependencies_updated: Vec<String> = Vec::new();
        for (repo_id, repo_name, pins) in &pinned {
            let mut current: HashMap<(String, String), (Uuid, String)> = snapshot
                .links
                .get(repo_id)
                .map(|links| {
                    links
                        .iter()
                        .map(|(k, d)| (k.clone(), (d.id, d.version.clone())))
                        .collect()
                })
                .unwrap_or_default();

            let mut changed = false;
            for pin in pins.iter() {
                let Some(&dependency_id) = known.get(pin) else {
                    continue;
                };
                let slot = (pin.language.clone(), pin.name.clone());
                match current.get(&slot) {
                    Some((_, version)) if *version == pin.version => {}
                    Some((linked_id, _)) => {
                        store::dependency::unlink(&txn, *repo_id, *linked_id).await?;
                        store::dependency::link(&txn, *repo_id, dependency_id).await?;
                        current.insert(slot, (dependency_id, pin.version.clone()));
                        changed = true;
                    }
                    None => {
                        store::dependency::link(&txn, *repo_id, dependency_id).await?;
                        current.insert(slot, (dependency_id, pin.version.clone()));
                        changed = true;
                    }
                }
            }
            if changed {
                dependencies_updated.push((*repo_name).to_string());
            }
        }

        let mut removed_names: Vec<String> = Vec::new();
        if prune {
            let removed: Vec<&repo::Model> = snapshot
                .repos
                .values()
                .filter(|r| !plan.seen.contains(&r.name))
                .collect();
            let ids: Vec<Uuid> = removed.iter().map(|r| r.id).collect();
            summary.removed = store::repo::delete_many(&txn, &ids).await? as usize;
            removed_names.extend(removed.iter().map(|r| r.name.clone()));
        }

        txn.commit().await?;

        updated_names.sort();
        dependencies_updated.sort();
        removed_names.sort();
        if !updated_names.is_empty() {
            events.push(PullEvent::ReposUpdated {
                org_name: org.name.clone(),
                host,
                repo_names: updated_names,
            });
        }
        if !dependencies_updated.is_empty() {
            events.push(PullEvent::ReposDependenciesUpdated {
                org_name: org.name.clone(),
                host,
                repo_names: dependencies_updated,
            });
        }
        if !removed_names.is_empty() {
            events.push(PullEvent::ReposRemoved {
                org_name: org.name.clone(),
                host,
                repo_names: removed_names,
            });
        }

        Ok(PullReport { events, summary })
    }
}

impl<H: GitHost> std::fmt::Debug for Reconciler<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("host", &self.host.kind())
            .field("file_paths", &self.file_paths)
            .field("parsers", &self.parsers)
            .finish()
    }
}
