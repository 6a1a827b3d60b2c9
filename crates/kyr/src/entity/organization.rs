//! Organization entity - one row per pulled organization on a git host.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::git_host::GitHostKind;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organizations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Organization login. Unique together with `host`.
    pub name: String,
    pub host: GitHostKind,

    pub private_repos: i64,
    pub public_repos: i64,

    /// When the organization was last fetched successfully.
    pub pulled_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::repo::Entity")]
    Repos,
}

impl Related<super::repo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repos.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[must_use]
    pub fn total_repos(&self) -> i64 {
        self.private_repos + self.public_repos
    }
}
