use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entity::git_host::GitHostKind;
use crate::entity::organization::{ActiveModel, Column, Entity as Organization, Model};
use crate::fetch::OrganizationData;

use super::errors::{Result, StoreError};

/// Find an organization by its natural key (name + host).
pub async fn find_by_name<C: ConnectionTrait>(
    db: &C,
    host: GitHostKind,
    name: &str,
) -> Result<Option<Model>> {
    Organization::find()
        .filter(Column::Name.eq(name))
        .filter(Column::Host.eq(host))
        .one(db)
        .await
        .map_err(StoreError::from)
}

/// Find an organization by name, failing when it was never pulled.
pub async fn get_by_name<C: ConnectionTrait>(
    db: &C,
    host: GitHostKind,
    name: &str,
) -> Result<Model> {
    find_by_name(db, host, name)
        .await?
        .ok_or_else(|| StoreError::organization_not_found(host, name))
}

/// Insert the organization, or refresh its counts and pull time.
///
/// Returns the stored row and whether it was created.
pub async fn upsert<C: ConnectionTrait>(
    db: &C,
    host: GitHostKind,
    data: &OrganizationData,
    pulled_at: DateTime<Utc>,
) -> Result<(Model, bool)> {
    if data.name.is_empty() {
        return Err(StoreError::InvalidInput {
            message: "Missing required field: name".to_string(),
        });
    }

    match find_by_name(db, host, &data.name).await? {
        Some(existing) => {
            let mut model: ActiveModel = existing.into();
            model.private_repos = Set(data.private_repos);
            model.public_repos = Set(data.public_repos);
            model.pulled_at = Set(pulled_at.fixed_offset());
            let updated = model.update(db).await?;
            Ok((updated, false))
        }
        None => {
            let model = ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(data.name.clone()),
                host: Set(host),
                private_repos: Set(data.private_repos),
                public_repos: Set(data.public_repos),
                pulled_at: Set(pulled_at.fixed_offset()),
            };
            let inserted = model.insert(db).await?;
            Ok((inserted, true))
        }
    }
}
