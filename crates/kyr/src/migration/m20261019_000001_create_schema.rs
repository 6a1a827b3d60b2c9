//! Initial migration: organizations, repos, dependencies and their links.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_organizations(manager).await?;
        self.create_repos(manager).await?;
        self.create_dependencies(manager).await?;
        self.create_repo_dependencies(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RepoDependencies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Dependencies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repos::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Organizations::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_organizations(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Organizations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Organizations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Organizations::Name).string().not_null())
                    .col(ColumnDef::new(Organizations::Host).string().not_null())
                    .col(
                        ColumnDef::new(Organizations::PrivateRepos)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Organizations::PublicRepos)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Organizations::PulledAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_organizations_name_host")
                    .table(Organizations::Table)
                    .col(Organizations::Name)
                    .col(Organizations::Host)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_repos(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Repos::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Repos::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Repos::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Repos::Name).string().not_null())
                    .col(
                        ColumnDef::new(Repos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Repos::PushedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Repos::HtmlUrl).text().not_null())
                    .col(ColumnDef::new(Repos::ApiUrl).text().not_null())
                    .col(
                        ColumnDef::new(Repos::PulledAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repos_organization")
                            .from(Repos::Table, Repos::OrganizationId)
                            .to(Organizations::Table, Organizations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique constraint on (organization_id, name)
        manager
            .create_index(
                Index::create()
                    .name("idx_repos_organization_name")
                    .table(Repos::Table)
                    .col(Repos::OrganizationId)
                    .col(Repos::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_dependencies(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Dependencies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Dependencies::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Dependencies::Language).string().not_null())
                    .col(ColumnDef::new(Dependencies::Name).string().not_null())
                    .col(ColumnDef::new(Dependencies::Version).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dependencies_language_name_version")
                    .table(Dependencies::Table)
                    .col(Dependencies::Language)
                    .col(Dependencies::Name)
                    .col(Dependencies::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_repo_dependencies(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RepoDependencies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RepoDependencies::RepoId).uuid().not_null())
                    .col(
                        ColumnDef::new(RepoDependencies::DependencyId)
                            .uuid()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(RepoDependencies::RepoId)
                            .col(RepoDependencies::DependencyId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repo_dependencies_repo")
                            .from(RepoDependencies::Table, RepoDependencies::RepoId)
                            .to(Repos::Table, Repos::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repo_dependencies_dependency")
                            .from(RepoDependencies::Table, RepoDependencies::DependencyId)
                            .to(Dependencies::Table, Dependencies::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookups of every repo using a dependency
        manager
            .create_index(
                Index::create()
                    .name("idx_repo_dependencies_dependency")
                    .table(RepoDependencies::Table)
                    .col(RepoDependencies::DependencyId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Organizations {
    Table,
    Id,
    Name,
    Host,
    PrivateRepos,
    PublicRepos,
    PulledAt,
}

#[derive(DeriveIden)]
enum Repos {
    Table,
    Id,
    OrganizationId,
    Name,
    CreatedAt,
    PushedAt,
    HtmlUrl,
    ApiUrl,
    PulledAt,
}

#[derive(DeriveIden)]
enum Dependencies {
    Table,
    Id,
    Language,
    Name,
    Version,
}

#[derive(DeriveIden)]
enum RepoDependencies {
    Table,
    RepoId,
    DependencyId,
}
