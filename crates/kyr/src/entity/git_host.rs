//! Git host kind stored with each organization.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Hosting software an organization lives on.
///
/// GitHub Enterprise instances share `GitHub`; the API base differs, not
/// the kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum GitHostKind {
    #[sea_orm(string_value = "github")]
    GitHub,
}

impl std::fmt::Display for GitHostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitHostKind::GitHub => write!(f, "github"),
        }
    }
}

impl std::str::FromStr for GitHostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(GitHostKind::GitHub),
            _ => Err(format!("Unknown git host: {}", s)),
        }
    }
}
