use sea_orm::DbErr;
use thiserror::Error;

use crate::entity::git_host::GitHostKind;
use crate::fetch::FetchError;
use crate::store::StoreError;

/// Errors that abort a pull. Nothing is committed when one is returned.
#[derive(Debug, Error)]
pub enum PullError {
    /// The organization must be pulled before its repositories.
    #[error("Organization {host}/{org_name} has not been pulled yet")]
    MissingData { org_name: String, host: GitHostKind },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DbErr> for PullError {
    fn from(err: DbErr) -> Self {
        Self::Store(StoreError::Database(err))
    }
}

/// Result type for pull operations.
pub type Result<T> = std::result::Result<T, PullError>;
