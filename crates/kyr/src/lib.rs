//! kyr - keeps a local record of a GitHub organization's repositories and
//! the dependencies pinned in their lockfiles.
//!
//! A pull fetches the organization, lists its repositories, fetches every
//! new or updated repository together with its lockfiles, and reconciles the
//! result with the database in one transaction.
//!
//! # Features
//!
//! - `github` - The GitHub host and the reqwest transport.
//! - `migrate` - Enables [`connect_and_migrate`].
//! - `sqlite` / `postgres` - Database backends.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use kyr::fetch::{FetchContext, RepoFilter};
//! use kyr::github::GitHub;
//! use kyr::http::ReqwestTransport;
//! use kyr::{Reconciler, TokenPool, connect_and_migrate};
//!
//! let db = connect_and_migrate("sqlite://kyr.db?mode=rwc").await?;
//! let fetch = FetchContext::new(
//!     Arc::new(ReqwestTransport::with_timeout(std::time::Duration::from_secs(30))?),
//!     Arc::new(TokenPool::new(["ghp_..."])),
//! );
//! let reconciler = Reconciler::new(db, GitHub::new(fetch)).with_file_paths(["poetry.lock"]);
//!
//! reconciler.pull_organization("acme").await?;
//! let report = reconciler.pull_repos("acme", RepoFilter::all(), None).await?;
//! for event in &report.events {
//!     println!("{event}");
//! }
//! ```

pub mod db;
pub mod entity;
pub mod fetch;
pub mod host;
pub mod http;
pub mod lockfile;
pub mod pull;
pub mod query;
pub mod store;
pub mod token;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use fetch::{FailReason, FetchError, NameMatcher, RepoFilter};
pub use host::{GitHost, PullItem, RepoQuery};
pub use pull::{
    ProgressCallback, PullError, PullEvent, PullProgress, PullReport, PullSummary, Reconciler,
};
pub use store::StoreError;
pub use token::{Token, TokenPool};
