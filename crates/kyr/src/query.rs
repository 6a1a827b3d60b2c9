//! Dependency requirement queries over stored repositories.
//!
//! A query is a conjunction of clauses such as
//! `requests >= 2.0 & urllib3 < 2`. A repository matches when it is linked
//! to every named dependency at a version satisfying the clause.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use sea_orm::{ConnectionTrait, EntityTrait, QueryOrder};
use thiserror::Error;

use crate::entity::dependency::{self, Entity as Dependency};
use crate::entity::repo::{self, Entity as Repo};
use crate::store;

/// Language assumed when a clause does not name one.
pub const DEFAULT_LANGUAGE: &str = "python";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Expected `name operator version`, got '{clause}'")]
    Malformed { clause: String },

    #[error("Unsupported constraint '{operator}'")]
    UnsupportedOperator { operator: String },

    #[error("Invalid version '{version}'")]
    InvalidVersion { version: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl Comparison {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering.is_eq(),
            Self::Ne => ordering.is_ne(),
            Self::Ge => ordering.is_ge(),
            Self::Gt => ordering.is_gt(),
            Self::Le => ordering.is_le(),
            Self::Lt => ordering.is_lt(),
        }
    }
}

impl FromStr for Comparison {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            ">=" => Ok(Self::Ge),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Le),
            "<" => Ok(Self::Lt),
            other => Err(QueryError::UnsupportedOperator {
                operator: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Lt => "<",
        })
    }
}

/// Dot-separated numeric version, compared segment by segment.
fn parse_version(version: &str) -> Option<Vec<u64>> {
    version.split('.').map(|part| part.parse().ok()).collect()
}

/// One clause of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub language: String,
    pub name: String,
    /// `None` accepts any version (`*`).
    pub constraint: Option<(Comparison, Vec<u64>)>,
}

impl Requirement {
    /// Whether `dep` is this dependency at an acceptable version.
    ///
    /// Versions that are not purely numeric never satisfy a constraint.
    #[must_use]
    pub fn matches(&self, dep: &dependency::Model) -> bool {
        if dep.language != self.language || dep.name != self.name {
            return false;
        }
        let Some((comparison, wanted)) = &self.constraint else {
            return true;
        };
        parse_version(&dep.version).is_some_and(|have| comparison.holds(have.cmp(wanted)))
    }

    fn parse(clause: &str, language: &str) -> Result<Self, QueryError> {
        let parts: Vec<&str> = clause.split_whitespace().collect();
        let [name, operator, version] = parts.as_slice() else {
            return Err(QueryError::Malformed {
                clause: clause.trim().to_string(),
            });
        };
        let comparison: Comparison = operator.parse()?;
        let constraint = if *version == "*" {
            None
        } else {
            let wanted = parse_version(version).ok_or_else(|| QueryError::InvalidVersion {
                version: version.to_string(),
            })?;
            Some((comparison, wanted))
        };

        Ok(Self {
            language: language.to_string(),
            name: name.to_string(),
            constraint,
        })
    }
}

/// A conjunction of [`Requirement`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyQuery {
    requirements: Vec<Requirement>,
}

impl DependencyQuery {
    /// Parse `name op version & ...` with every clause in `language`.
    pub fn parse(query: &str, language: &str) -> Result<Self, QueryError> {
        let requirements = query
            .split('&')
            .map(|clause| Requirement::parse(clause, language))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }

    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Whether a repository linked to `deps` satisfies every clause.
    #[must_use]
    pub fn matches(&self, deps: &[dependency::Model]) -> bool {
        self.requirements
            .iter()
            .all(|req| deps.iter().any(|dep| req.matches(dep)))
    }
}

impl FromStr for DependencyQuery {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_LANGUAGE)
    }
}

/// Stored repositories of any organization matching `query`, by name.
pub async fn find_repos<C: ConnectionTrait>(
    db: &C,
    query: &DependencyQuery,
) -> store::Result<Vec<repo::Model>> {
    let rows = Repo::find()
        .find_with_related(Dependency)
        .order_by_asc(repo::Column::Name)
        .order_by_asc(repo::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter(|(_, deps)| query.matches(deps))
        .map(|(repo, _)| repo)
        .collect())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn dep(name: &str, version: &str) -> dependency::Model {
        dependency::Model {
            id: Uuid::new_v4(),
            language: "python".to_string(),
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn parses_conjunction_of_clauses() {
        let query: DependencyQuery = "requests >= 2.0 & urllib3 == *".parse().expect("query");
        assert_eq!(
            query.requirements(),
            &[
                Requirement {
                    language: "python".to_string(),
                    name: "requests".to_string(),
                    constraint: Some((Comparison::Ge, vec![2, 0])),
                },
                Requirement {
                    language: "python".to_string(),
                    name: "urllib3".to_string(),
                    constraint: None,
                },
            ]
        );
    }

    #[test]
    fn rejects_malformed_clauses() {
        assert_eq!(
            "requests >=".parse::<DependencyQuery>(),
            Err(QueryError::Malformed {
                clause: "requests >=".to_string()
            })
        );
        assert_eq!(
            "requests ~= 2.0".parse::<DependencyQuery>(),
            Err(QueryError::UnsupportedOperator {
                operator: "~=".to_string()
            })
        );
        assert!(matches!(
            "requests == 2.x".parse::<DependencyQuery>(),
            Err(QueryError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn versions_compare_numerically() {
        let query: DependencyQuery = "requests > 2.9".parse().expect("query");
        assert!(query.matches(&[dep("requests", "2.31.0")]));
        assert!(!query.matches(&[dep("requests", "2.9")]));
        assert!(!query.matches(&[dep("requests", "2.31.0rc1")]));
    }

    #[test]
    fn every_clause_must_match() {
        let query: DependencyQuery = "requests >= 2 & idna == *".parse().expect("query");
        assert!(query.matches(&[dep("requests", "2.1"), dep("idna", "3.4")]));
        assert!(!query.matches(&[dep("requests", "2.1")]));
        assert!(!query.matches(&[dep("requests", "1.9"), dep("idna", "3.4")]));
    }

    #[test]
    fn language_must_match() {
        let query = DependencyQuery::parse("serde >= 1", "rust").expect("query");
        assert!(!query.matches(&[dep("serde", "1.0.188")]));
    }
}
