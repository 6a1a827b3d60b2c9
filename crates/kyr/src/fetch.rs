//! Host-agnostic fetch machinery.
//!
//! - [`types`] - result shapes and [`FailReason`]
//! - [`filter`] - repository name predicates
//! - [`context`] - token pool, transport, pacing and timeout shared by requests
//! - [`scheduler`] - worker pool draining a request tree
//! - [`merge`] - per-repository reassembly of partial results

pub mod context;
mod errors;
pub mod filter;
pub mod merge;
mod rate_limit;
pub mod scheduler;
pub mod types;

pub use context::{Exchange, FetchContext};
pub use errors::{FetchError, Result};
pub use filter::{NameMatcher, RepoFilter};
pub use merge::{MergerSet, ResultMerger};
pub use rate_limit::{ApiRateLimiter, GITHUB_DEFAULT_RPS};
pub use scheduler::{FetchScheduler, Resolution, Resolve, ResultStream, worker_count};
pub use types::{
    DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS, FailReason, FetchResult, ListingResult,
    OrganizationData, OrganizationResult, Outcome, RepoData, RepoDetailResult, RepoFileResult,
    RepoFullResult,
};
