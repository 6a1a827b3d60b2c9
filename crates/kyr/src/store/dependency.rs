use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Set, sea_query::JoinType,
};
use uuid::Uuid;

use crate::entity::dependency::{ActiveModel, Column, Entity as Dependency, Model};
use crate::entity::repo;
use crate::entity::repo_dependency::{
    ActiveModel as LinkActiveModel, Column as LinkColumn, Entity as RepoDependency,
    Relation as LinkRelation,
};

use super::errors::{Result, StoreError};

/// Natural key of a dependency row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyKey {
    pub language: String,
    pub name: String,
    pub version: String,
}

impl DependencyKey {
    pub fn new(
        language: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

impl From<&Model> for DependencyKey {
    fn from(model: &Model) -> Self {
        Self::new(&model.language, &model.name, &model.version)
    }
}

/// Every dependency row, keyed by `(language, name, version)`.
pub async fn all_by_key<C: ConnectionTrait>(db: &C) -> Result<HashMap<DependencyKey, Model>> {
    let rows = Dependency::find().all(db).await?;
    Ok(rows
        .into_iter()
        .map(|row| (DependencyKey::from(&row), row))
        .collect())
}

/// Insert multiple dependencies.
pub async fn insert_many<C: ConnectionTrait>(db: &C, models: Vec<ActiveModel>) -> Result<u64> {
    if models.is_empty() {
        return Ok(0);
    }

    let count = models.len() as u64;
    Dependency::insert_many(models).exec(db).await?;
    Ok(count)
}

/// Build a new row for a dependency key.
pub fn new_active_model(id: Uuid, key: &DependencyKey) -> ActiveModel {
    ActiveModel {
        id: Set(id),
        language: Set(key.language.clone()),
        name: Set(key.name.clone()),
        version: Set(key.version.clone()),
    }
}

/// Dependencies currently linked to each repository of an organization.
pub async fn links_for_organization<C: ConnectionTrait>(
    db: &C,
    organization_id: Uuid,
) -> Result<HashMap<Uuid, Vec<Model>>> {
    let rows = RepoDependency::find()
        .join(JoinType::InnerJoin, LinkRelation::Repo.def())
        .filter(repo::Column::OrganizationId.eq(organization_id))
        .find_also_related(Dependency)
        .all(db)
        .await?;

    let mut links: HashMap<Uuid, Vec<Model>> = HashMap::new();
    for (link, dependency) in rows {
        if let Some(dependency) = dependency {
            links.entry(link.repo_id).or_default().push(dependency);
        }
    }
    Ok(links)
}

/// Dependencies linked to one repository, ordered by language and name.
pub async fn find_by_repo<C: ConnectionTrait>(db: &C, repo_id: Uuid) -> Result<Vec<Model>> {
    Dependency::find()
        .inner_join(RepoDependency)
        .filter(LinkColumn::RepoId.eq(repo_id))
        .order_by_asc(Column::Language)
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(StoreError::from)
}

/// Link a repository to a dependency.
pub async fn link<C: ConnectionTrait>(db: &C, repo_id: Uuid, dependency_id: Uuid) -> Result<()> {
    LinkActiveModel {
        repo_id: Set(repo_id),
        dependency_id: Set(dependency_id),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Remove one repository-dependency link.
///
/// Returns the number of rows deleted (0 or 1).
pub async fn unlink<C: ConnectionTrait>(db: &C, repo_id: Uuid, dependency_id: Uuid) -> Result<u64> {
    let result = RepoDependency::delete_many()
        .filter(LinkColumn::RepoId.eq(repo_id))
        .filter(LinkColumn::DependencyId.eq(dependency_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
