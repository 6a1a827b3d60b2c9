//! GitHub REST payloads, limited to the fields the pipeline reads.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `GET /orgs/{org}`
#[derive(Debug, Clone, Deserialize)]
pub struct OrgPayload {
    pub login: String,
    /// Only visible to members; absent otherwise.
    #[serde(default)]
    pub total_private_repos: Option<i64>,
    #[serde(default)]
    pub public_repos: i64,
}

/// One entry of `GET /orgs/{org}/repos`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoSummary {
    pub name: String,
}

/// `GET /repos/{org}/{repo}`
#[derive(Debug, Clone, Deserialize)]
pub struct RepoPayload {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Null for repositories that never received a push.
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
    pub url: String,
}

impl RepoPayload {
    /// Last push time, falling back to the last update.
    #[must_use]
    pub fn last_push(&self) -> DateTime<Utc> {
        self.pushed_at.unwrap_or(self.updated_at)
    }
}

/// `GET /repos/{org}/{repo}/contents/{path}`
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPayload {
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl ContentPayload {
    /// Decode the base64 body into text. Line breaks in the encoded form are
    /// ignored; invalid UTF-8 is replaced.
    pub fn decode(&self) -> Option<String> {
        if let Some(encoding) = &self.encoding
            && encoding != "base64"
        {
            return None;
        }
        let compact: String = self
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = STANDARD.decode(compact).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}
