//! SeaORM entity definitions for the kyr database schema.

pub mod dependency;
pub mod git_host;
pub mod organization;
pub mod prelude;
pub mod repo;
pub mod repo_dependency;
