//! Common re-exports for convenient entity usage.

pub use super::dependency::{
    ActiveModel as DependencyActiveModel, Column as DependencyColumn, Entity as Dependency,
    Model as DependencyModel,
};
pub use super::git_host::GitHostKind;
pub use super::organization::{
    ActiveModel as OrganizationActiveModel, Column as OrganizationColumn,
    Entity as Organization, Model as OrganizationModel,
};
pub use super::repo::{
    ActiveModel as RepoActiveModel, Column as RepoColumn, Entity as Repo, Model as RepoModel,
};
pub use super::repo_dependency::{
    ActiveModel as RepoDependencyActiveModel, Column as RepoDependencyColumn,
    Entity as RepoDependency, Model as RepoDependencyModel,
};
