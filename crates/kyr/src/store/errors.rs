use sea_orm::DbErr;
use thiserror::Error;

use crate::entity::git_host::GitHostKind;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Record not found.
    #[error("Record not found: {context}")]
    NotFound { context: String },

    /// Invalid input data.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl StoreError {
    /// Create a NotFound error for an organization lookup.
    pub fn organization_not_found(host: GitHostKind, name: &str) -> Self {
        Self::NotFound {
            context: format!("organization {}/{}", host, name),
        }
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
