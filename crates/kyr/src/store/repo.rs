use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::repo::{ActiveModel, Column, Entity as Repo, Model};
use crate::entity::repo_dependency::{Column as LinkColumn, Entity as RepoDependency};
use crate::fetch::RepoData;

use super::errors::{Result, StoreError};

/// Build a new row for a fetched repository.
pub fn new_active_model(
    id: Uuid,
    organization_id: Uuid,
    repo: &RepoData,
    pulled_at: DateTime<Utc>,
) -> ActiveModel {
    ActiveModel {
        id: Set(id),
        organization_id: Set(organization_id),
        name: Set(repo.name.clone()),
        created_at: Set(repo.created_at.fixed_offset()),
        pushed_at: Set(repo.pushed_at.fixed_offset()),
        html_url: Set(repo.html_url.clone()),
        api_url: Set(repo.api_url.clone()),
        pulled_at: Set(pulled_at.fixed_offset()),
    }
}

/// Find a repository by its natural key (organization + name).
pub async fn find_by_name<C: ConnectionTrait>(
    db: &C,
    organization_id: Uuid,
    name: &str,
) -> Result<Option<Model>> {
    Repo::find()
        .filter(Column::OrganizationId.eq(organization_id))
        .filter(Column::Name.eq(name))
        .one(db)
        .await
        .map_err(StoreError::from)
}

/// All stored repositories of an organization, by name.
pub async fn find_by_organization<C: ConnectionTrait>(
    db: &C,
    organization_id: Uuid,
) -> Result<Vec<Model>> {
    Repo::find()
        .filter(Column::OrganizationId.eq(organization_id))
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(StoreError::from)
}

/// Insert multiple repositories.
pub async fn insert_many<C: ConnectionTrait>(db: &C, models: Vec<ActiveModel>) -> Result<u64> {
    if models.is_empty() {
        return Ok(0);
    }

    let count = models.len() as u64;
    Repo::insert_many(models).exec(db).await?;
    Ok(count)
}

/// Refresh a known repository from a fresh fetch.
///
/// The push time is only moved when `repo.updated` is set, so a later pull
/// still sees an unchanged repository as unchanged.
pub async fn refresh<C: ConnectionTrait>(
    db: &C,
    existing: Model,
    repo: &RepoData,
    pulled_at: DateTime<Utc>,
) -> Result<Model> {
    let mut model: ActiveModel = existing.into();
    if repo.updated {
        model.pushed_at = Set(repo.pushed_at.fixed_offset());
    }
    model.html_url = Set(repo.html_url.clone());
    model.api_url = Set(repo.api_url.clone());
    model.pulled_at = Set(pulled_at.fixed_offset());
    model.update(db).await.map_err(StoreError::from)
}

/// Delete repositories and their dependency links.
///
/// Returns the number of repositories deleted.
pub async fn delete_many<C: ConnectionTrait>(db: &C, ids: &[Uuid]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    RepoDependency::delete_many()
        .filter(LinkColumn::RepoId.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    let result = Repo::delete_many()
        .filter(Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
