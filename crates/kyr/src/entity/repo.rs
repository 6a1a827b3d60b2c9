//! Repo entity - a repository of a pulled organization.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning organization. `(organization_id, name)` is unique.
    pub organization_id: Uuid,
    pub name: String,

    pub created_at: DateTimeWithTimeZone,
    /// Last push time seen on the host; drives the "updated" decision.
    pub pushed_at: DateTimeWithTimeZone,

    #[sea_orm(column_type = "Text")]
    pub html_url: String,
    #[sea_orm(column_type = "Text")]
    pub api_url: String,

    pub pulled_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id",
        on_delete = "Cascade"
    )]
    Organization,
    #[sea_orm(has_many = "super::repo_dependency::Entity")]
    RepoDependencies,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::repo_dependency::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RepoDependencies.def()
    }
}

impl Related<super::dependency::Entity> for Entity {
    fn to() -> RelationDef {
        super::repo_dependency::Relation::Dependency.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::repo_dependency::Relation::Repo.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
