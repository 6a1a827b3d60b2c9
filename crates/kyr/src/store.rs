//! Storage operations over the sea-orm entities.
//!
//! Every function takes any [`sea_orm::ConnectionTrait`], so the same calls
//! work on a plain connection and inside a transaction.

pub mod dependency;
mod errors;
pub mod organization;
pub mod repo;

pub use dependency::DependencyKey;
pub use errors::{Result, StoreError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::git_host::GitHostKind;

    #[test]
    fn test_store_error_organization_not_found() {
        let err = StoreError::organization_not_found(GitHostKind::GitHub, "acme");
        let msg = err.to_string();
        assert!(msg.contains("github/acme"));
    }

    #[test]
    fn test_store_error_from_db_err() {
        let err: StoreError = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert!(err.to_string().contains("Database error"));
        assert!(err.to_string().contains("boom"));
    }
}
