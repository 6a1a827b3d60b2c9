//! Dependency entity - a `(language, name, version)` triple shared by every
//! repository that pins it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dependencies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Ecosystem the lockfile belongs to, e.g. `python` or `rust`.
    pub language: String,
    pub name: String,
    pub version: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::repo_dependency::Entity")]
    RepoDependencies,
}

impl Related<super::repo_dependency::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RepoDependencies.def()
    }
}

impl Related<super::repo::Entity> for Entity {
    fn to() -> RelationDef {
        super::repo_dependency::Relation::Repo.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::repo_dependency::Relation::Dependency.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// `name==version`, the way lockfiles pin it.
    #[must_use]
    pub fn pin(&self) -> String {
        format!("{}=={}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin() {
        let model = Model {
            id: Uuid::new_v4(),
            language: "python".to_string(),
            name: "requests".to_string(),
            version: "2.31.0".to_string(),
        };
        assert_eq!(model.pin(), "requests==2.31.0");
    }
}
