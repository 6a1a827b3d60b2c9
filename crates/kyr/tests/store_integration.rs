//! Integration tests for the storage layer and dependency queries.
//!
//! These tests require the `sqlite` and `migrate` features to be enabled
//! and use an in-memory SQLite database.

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use chrono::{DateTime, TimeZone, Utc};
use kyr::connect_and_migrate;
use kyr::entity::git_host::GitHostKind;
use kyr::fetch::{OrganizationData, RepoData};
use kyr::query::{DependencyQuery, find_repos};
use kyr::store::{self, DependencyKey};
use sea_orm::{DatabaseConnection, TransactionTrait};
use uuid::Uuid;

/// Create an in-memory SQLite database with migrations applied.
async fn setup_test_db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn org_data(name: &str) -> OrganizationData {
    OrganizationData {
        name: name.to_string(),
        private_repos: 1,
        public_repos: 2,
    }
}

fn repo_data(name: &str, pushed: u32) -> RepoData {
    RepoData {
        name: name.to_string(),
        org_name: "acme".to_string(),
        created_at: ts(1),
        pushed_at: ts(pushed),
        html_url: format!("https://github.com/acme/{name}"),
        api_url: format!("https://api.github.com/repos/acme/{name}"),
        is_new: true,
        updated: false,
    }
}

/// Store an organization with the given repositories, each linked to `pins`.
async fn seed(
    db: &DatabaseConnection,
    repos: &[(&str, &[(&str, &str)])],
) -> (kyr::OrganizationModel, Vec<Uuid>) {
    let (org, created) = store::organization::upsert(db, GitHostKind::GitHub, &org_data("acme"), ts(2))
        .await
        .expect("upsert organization");
    assert!(created);

    let mut ids = Vec::new();
    for (name, pins) in repos {
        let id = Uuid::new_v4();
        store::repo::insert_many(
            db,
            vec![store::repo::new_active_model(id, org.id, &repo_data(name, 3), ts(3))],
        )
        .await
        .expect("insert repo");

        for (dep_name, version) in pins.iter() {
            let key = DependencyKey::new("python", *dep_name, *version);
            let known = store::dependency::all_by_key(db).await.expect("dependencies");
            let dep_id = match known.get(&key) {
                Some(existing) => existing.id,
                None => {
                    let dep_id = Uuid::new_v4();
                    store::dependency::insert_many(
                        db,
                        vec![store::dependency::new_active_model(dep_id, &key)],
                    )
                    .await
                    .expect("insert dep");
                    dep_id
                }
            };
            store::dependency::link(db, id, dep_id).await.expect("link");
        }
        ids.push(id);
    }
    (org, ids)
}

#[tokio::test]
async fn organization_upsert_is_keyed_by_host_and_name() {
    let db = setup_test_db().await;

    let (first, created) =
        store::organization::upsert(&db, GitHostKind::GitHub, &org_data("acme"), ts(1))
            .await
            .expect("insert");
    assert!(created);

    let mut data = org_data("acme");
    data.public_repos = 40;
    let (second, created) = store::organization::upsert(&db, GitHostKind::GitHub, &data, ts(2))
        .await
        .expect("update");
    assert!(!created);
    assert_eq!(first.id, second.id);
    assert_eq!(second.total_repos(), 41);

    let err = store::organization::get_by_name(&db, GitHostKind::GitHub, "other")
        .await
        .expect_err("never pulled");
    assert!(err.to_string().contains("github/other"));
}

#[tokio::test]
async fn upsert_rejects_empty_name() {
    let db = setup_test_db().await;
    let err = store::organization::upsert(&db, GitHostKind::GitHub, &org_data(""), ts(1))
        .await
        .expect_err("empty name");
    assert!(matches!(err, kyr::StoreError::InvalidInput { .. }));
}

#[tokio::test]
async fn refresh_only_moves_push_time_for_updated_repos() {
    let db = setup_test_db().await;
    let (org, _) = seed(&db, &[("api", &[])]).await;
    let stored = store::repo::find_by_name(&db, org.id, "api")
        .await
        .expect("query")
        .expect("stored");

    let mut unchanged = repo_data("api", 9);
    unchanged.is_new = false;
    let refreshed = store::repo::refresh(&db, stored, &unchanged, ts(10))
        .await
        .expect("refresh");
    assert_eq!(refreshed.pushed_at.with_timezone(&Utc), ts(3));
    assert_eq!(refreshed.pulled_at.with_timezone(&Utc), ts(10));

    let mut updated = repo_data("api", 9);
    updated.is_new = false;
    updated.updated = true;
    let refreshed = store::repo::refresh(&db, refreshed, &updated, ts(11))
        .await
        .expect("refresh");
    assert_eq!(refreshed.pushed_at.with_timezone(&Utc), ts(9));
}

#[tokio::test]
async fn dependency_rows_are_shared_between_repos() {
    let db = setup_test_db().await;
    let (org, ids) = seed(
        &db,
        &[
            ("api", &[("requests", "2.31.0"), ("idna", "3.4")]),
            ("web", &[("requests", "2.31.0")]),
        ],
    )
    .await;

    let all = store::dependency::all_by_key(&db).await.expect("all");
    assert_eq!(all.len(), 2);

    let links = store::dependency::links_for_organization(&db, org.id)
        .await
        .expect("links");
    assert_eq!(links[&ids[0]].len(), 2);
    assert_eq!(links[&ids[1]].len(), 1);
    assert_eq!(links[&ids[0]].iter().filter(|d| d.name == "requests").count(), 1);
}

#[tokio::test]
async fn unlink_and_delete_inside_a_transaction() {
    let db = setup_test_db().await;
    let (org, ids) = seed(
        &db,
        &[("api", &[("requests", "1.0")]), ("old", &[("requests", "1.0")])],
    )
    .await;
    let key = DependencyKey::new("python", "requests", "1.0");
    let requests = store::dependency::all_by_key(&db)
        .await
        .expect("query")
        .remove(&key)
        .expect("dependency");

    let txn = db.begin().await.expect("begin");
    assert_eq!(
        store::dependency::unlink(&txn, ids[0], requests.id).await.expect("unlink"),
        1
    );
    assert_eq!(store::repo::delete_many(&txn, &ids[1..]).await.expect("delete"), 1);
    txn.commit().await.expect("commit");

    assert!(store::dependency::find_by_repo(&db, ids[0]).await.expect("deps").is_empty());
    let remaining = store::repo::find_by_organization(&db, org.id).await.expect("repos");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "api");
    // Dependency rows outlive the repositories that used them.
    let remaining_deps = store::dependency::all_by_key(&db).await.expect("query");
    assert!(remaining_deps.contains_key(&DependencyKey::from(&requests)));
}

#[tokio::test]
async fn dependency_query_finds_matching_repos() {
    let db = setup_test_db().await;
    seed(
        &db,
        &[
            ("api", &[("requests", "2.31.0"), ("idna", "3.4")]),
            ("legacy", &[("requests", "1.2.3")]),
            ("web", &[("idna", "3.4")]),
        ],
    )
    .await;

    let names = |repos: Vec<kyr::RepoModel>| repos.into_iter().map(|r| r.name).collect::<Vec<_>>();

    let query: DependencyQuery = "requests >= 2".parse().expect("query");
    assert_eq!(names(find_repos(&db, &query).await.expect("find")), vec!["api"]);

    let query: DependencyQuery = "idna == *".parse().expect("query");
    assert_eq!(
        names(find_repos(&db, &query).await.expect("find")),
        vec!["api", "web"]
    );

    let query: DependencyQuery = "requests < 3 & idna == 3.4".parse().expect("query");
    assert_eq!(names(find_repos(&db, &query).await.expect("find")), vec!["api"]);

    let query: DependencyQuery = "requests != 2.31.0".parse().expect("query");
    assert_eq!(names(find_repos(&db, &query).await.expect("find")), vec!["legacy"]);
}
