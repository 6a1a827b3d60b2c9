//! The GitHub request state machine.
//!
//! A [`FetchRequest`] binds a token when it is built. Resolving it performs
//! one HTTP exchange and yields either a terminal [`FetchResult`] or
//! follow-up requests:
//!
//! - organization: terminal
//! - listing page: one detail request per name that passes the filter and
//!   was not listed by an earlier page
//! - detail: one file request per configured path, when the repository is
//!   new or was pushed since the last pull
//! - file: terminal
//!
//! A 403 expires the bound token and re-queues the same request with a
//! freshly selected token.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::fetch::{
    Exchange, FailReason, FetchContext, FetchResult, ListingResult, OrganizationData,
    OrganizationResult, RepoData, RepoDetailResult, RepoFileResult, RepoFilter, Resolution,
    Resolve,
};
use crate::http::{HttpRequest, HttpResponse};
use crate::token::{Token, TokenPool};

use super::types::{ContentPayload, OrgPayload, RepoPayload, RepoSummary};

pub const USER_AGENT: &str = concat!("kyr/", env!("CARGO_PKG_VERSION"));
pub const API_VERSION: &str = "2022-11-28";

/// State shared by every request of one fetch run.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub fetch: FetchContext,
    pub api_base: String,
    pub org_name: String,
    pub file_paths: Arc<[String]>,
    /// Last known push time per stored repository.
    pub last_updates: HashMap<String, DateTime<Utc>>,
    /// Names already turned into detail requests by a listing page.
    listed: Arc<Mutex<HashSet<String>>>,
}

impl RequestScope {
    pub fn new(fetch: FetchContext, api_base: impl Into<String>, org_name: impl Into<String>) -> Self {
        Self {
            fetch,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            org_name: org_name.into(),
            file_paths: Arc::from(Vec::new()),
            last_updates: HashMap::new(),
            listed: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_file_paths(mut self, file_paths: Arc<[String]>) -> Self {
        self.file_paths = file_paths;
        self
    }

    #[must_use]
    pub fn with_last_updates(mut self, last_updates: HashMap<String, DateTime<Utc>>) -> Self {
        self.last_updates = last_updates;
        self
    }

    fn tokens(&self) -> &TokenPool {
        &self.fetch.tokens
    }

    /// Record `name` as listed. False if an earlier page already listed it,
    /// which happens when repositories are created while pages are fetched.
    fn claim_listed(&self, name: &str) -> bool {
        self.listed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string())
    }
}

/// Parameters of a request, independent of the token bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Organization,
    RepoListing {
        page: u32,
        page_size: u32,
        filter: Arc<RepoFilter>,
    },
    RepoDetail {
        repo: String,
        last_known_update: Option<DateTime<Utc>>,
    },
    RepoFile {
        repo: String,
        path: String,
    },
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Organization => f.write_str("organization"),
            Self::RepoListing { page, .. } => write!(f, "listing:{page}"),
            Self::RepoDetail { repo, .. } => write!(f, "detail:{repo}"),
            Self::RepoFile { repo, path } => write!(f, "file:{repo}:{path}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    kind: RequestKind,
    token: Option<Token>,
}

impl FetchRequest {
    /// Build a request, binding the first valid token from `tokens`.
    pub fn new(kind: RequestKind, tokens: &TokenPool) -> Self {
        Self {
            kind,
            token: tokens.get_valid(),
        }
    }

    pub fn organization(tokens: &TokenPool) -> Self {
        Self::new(RequestKind::Organization, tokens)
    }

    pub fn listing(page: u32, page_size: u32, filter: Arc<RepoFilter>, tokens: &TokenPool) -> Self {
        Self::new(
            RequestKind::RepoListing {
                page,
                page_size,
                filter,
            },
            tokens,
        )
    }

    pub fn detail(
        repo: impl Into<String>,
        last_known_update: Option<DateTime<Utc>>,
        tokens: &TokenPool,
    ) -> Self {
        Self::new(
            RequestKind::RepoDetail {
                repo: repo.into(),
                last_known_update,
            },
            tokens,
        )
    }

    pub fn file(repo: impl Into<String>, path: impl Into<String>, tokens: &TokenPool) -> Self {
        Self::new(
            RequestKind::RepoFile {
                repo: repo.into(),
                path: path.into(),
            },
            tokens,
        )
    }

    #[must_use]
    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn url(&self, scope: &RequestScope) -> String {
        let base = &scope.api_base;
        let org = &scope.org_name;
        match &self.kind {
            RequestKind::Organization => format!("{base}/orgs/{org}"),
            RequestKind::RepoListing {
                page, page_size, ..
            } => format!("{base}/orgs/{org}/repos?page={page}&per_page={page_size}"),
            RequestKind::RepoDetail { repo, .. } => format!("{base}/repos/{org}/{repo}"),
            RequestKind::RepoFile { repo, path } => {
                format!("{base}/repos/{org}/{repo}/contents/{path}")
            }
        }
    }

    fn http_request(&self, scope: &RequestScope, token: &Token) -> HttpRequest {
        HttpRequest::get(self.url(scope))
            .header("Authorization", format!("Bearer {}", token.secret()))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    /// The terminal failure result for this request's kind.
    fn failure(&self, scope: &RequestScope, reason: FailReason) -> FetchResult {
        let org_name = scope.org_name.clone();
        match &self.kind {
            RequestKind::Organization => FetchResult::Organization(OrganizationResult {
                org_name,
                outcome: Err(reason),
            }),
            RequestKind::RepoListing { page, .. } => FetchResult::Listing(ListingResult {
                org_name,
                page: *page,
                outcome: Err(reason),
            }),
            RequestKind::RepoDetail { repo, .. } => FetchResult::RepoDetail(RepoDetailResult {
                org_name,
                repo_name: repo.clone(),
                outcome: Err(reason),
            }),
            RequestKind::RepoFile { repo, path } => FetchResult::RepoFile(RepoFileResult {
                org_name,
                repo_name: repo.clone(),
                path: path.clone(),
                outcome: Err(reason),
            }),
        }
    }

    fn on_success(self, scope: &RequestScope, response: HttpResponse) -> Resolution<Self> {
        match &self.kind {
            RequestKind::Organization => {
                let Some(org) = self.decode::<OrgPayload>(&response) else {
                    return self.undecodable(scope);
                };
                Resolution::done(FetchResult::Organization(OrganizationResult {
                    org_name: scope.org_name.clone(),
                    outcome: Ok(OrganizationData {
                        name: org.login,
                        private_repos: org.total_private_repos.unwrap_or(0),
                        public_repos: org.public_repos,
                    }),
                }))
            }
            RequestKind::RepoListing { page, filter, .. } => {
                let Some(repos) = self.decode::<Vec<RepoSummary>>(&response) else {
                    return self.undecodable(scope);
                };
                let follow_ups: Vec<Self> = repos
                    .into_iter()
                    .filter(|r| filter.matches(&r.name))
                    .filter(|r| {
                        let first = scope.claim_listed(&r.name);
                        if !first {
                            tracing::debug!(page, repo = %r.name, "repository listed twice, skipping");
                        }
                        first
                    })
                    .map(|r| {
                        let last = scope.last_updates.get(&r.name).copied();
                        Self::detail(r.name, last, scope.tokens())
                    })
                    .collect();
                tracing::debug!(page, matched = follow_ups.len(), "listing page fetched");
                Resolution {
                    result: Some(FetchResult::Listing(ListingResult {
                        org_name: scope.org_name.clone(),
                        page: *page,
                        outcome: Ok(follow_ups.len()),
                    })),
                    follow_ups,
                }
            }
            RequestKind::RepoDetail {
                repo,
                last_known_update,
            } => {
                let Some(payload) = self.decode::<RepoPayload>(&response) else {
                    return self.undecodable(scope);
                };
                let pushed_at = payload.last_push();
                let is_new = last_known_update.is_none();
                let updated = last_known_update.is_some_and(|known| pushed_at > known);

                let follow_ups: Vec<Self> = if is_new || updated {
                    scope
                        .file_paths
                        .iter()
                        .map(|path| Self::file(repo.clone(), path.clone(), scope.tokens()))
                        .collect()
                } else {
                    Vec::new()
                };

                Resolution {
                    result: Some(FetchResult::RepoDetail(RepoDetailResult {
                        org_name: scope.org_name.clone(),
                        repo_name: repo.clone(),
                        outcome: Ok(RepoData {
                            name: payload.name,
                            org_name: scope.org_name.clone(),
                            created_at: payload.created_at,
                            pushed_at,
                            html_url: payload.html_url,
                            api_url: payload.url,
                            is_new,
                            updated,
                        }),
                    })),
                    follow_ups,
                }
            }
            RequestKind::RepoFile { repo, path } => {
                let Some(content) = self
                    .decode::<ContentPayload>(&response)
                    .and_then(|c| c.decode())
                else {
                    return self.undecodable(scope);
                };
                Resolution::done(FetchResult::RepoFile(RepoFileResult {
                    org_name: scope.org_name.clone(),
                    repo_name: repo.clone(),
                    path: path.clone(),
                    outcome: Ok(content),
                }))
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, response: &HttpResponse) -> Option<T> {
        match serde_json::from_slice(&response.body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(request = %self.kind, error = %e, "undecodable response body");
                None
            }
        }
    }

    fn undecodable(&self, scope: &RequestScope) -> Resolution<Self> {
        Resolution::done(self.failure(scope, FailReason::UnexpectedStatus(200)))
    }
}

#[async_trait]
impl Resolve for FetchRequest {
    type Context = RequestScope;
    type Output = FetchResult;

    fn id(&self) -> String {
        self.kind.to_string()
    }

    async fn resolve(self, scope: &RequestScope) -> Resolution<Self> {
        let Some(token) = self.token.clone() else {
            tracing::warn!(request = %self.kind, "no valid token available");
            return Resolution::done(self.failure(scope, FailReason::NoValidToken));
        };

        match scope.fetch.send(self.http_request(scope, &token)).await {
            Exchange::Ok(response) => self.on_success(scope, response),
            Exchange::Forbidden => {
                scope.tokens().expire(&token);
                tracing::warn!(request = %self.kind, "403 received, retrying with another token");
                Resolution::retry(Self::new(self.kind, scope.tokens()))
            }
            Exchange::Failed(reason) => {
                tracing::debug!(request = %self.kind, %reason, "request failed");
                Resolution::done(self.failure(scope, reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;

    use super::*;
    use crate::fetch::NameMatcher;
    use crate::http::{MockTransport, header_get};

    const API: &str = "https://api.github.test";

    fn scope(transport: &MockTransport, tokens: Arc<TokenPool>) -> RequestScope {
        RequestScope::new(
            FetchContext::new(Arc::new(transport.clone()), tokens),
            format!("{API}/"),
            "acme",
        )
        .with_file_paths(Arc::from(vec![
            "poetry.lock".to_string(),
            "Cargo.lock".to_string(),
        ]))
    }

    fn repo_json(name: &str, pushed_at: &str) -> serde_json::Value {
        json!({
            "name": name,
            "created_at": "2023-01-01T00:00:00Z",
            "pushed_at": pushed_at,
            "updated_at": "2023-01-02T00:00:00Z",
            "html_url": format!("https://github.com/acme/{name}"),
            "url": format!("{API}/repos/acme/{name}"),
        })
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn urls_follow_the_rest_layout() {
        let transport = MockTransport::new();
        let tokens = Arc::new(TokenPool::new(["t"]));
        let scope = scope(&transport, Arc::clone(&tokens));

        assert_eq!(
            FetchRequest::organization(&tokens).url(&scope),
            format!("{API}/orgs/acme")
        );
        assert_eq!(
            FetchRequest::listing(2, 100, Arc::new(RepoFilter::all()), &tokens).url(&scope),
            format!("{API}/orgs/acme/repos?page=2&per_page=100")
        );
        assert_eq!(
            FetchRequest::detail("api", None, &tokens).url(&scope),
            format!("{API}/repos/acme/api")
        );
        assert_eq!(
            FetchRequest::file("api", "poetry.lock", &tokens).url(&scope),
            format!("{API}/repos/acme/api/contents/poetry.lock")
        );
    }

    #[tokio::test]
    async fn sends_bearer_token_and_github_headers() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/orgs/acme"),
            200,
            json!({"login": "acme", "total_private_repos": 3, "public_repos": 7}),
        );
        let tokens = Arc::new(TokenPool::new(["secret-1"]));
        let scope = scope(&transport, Arc::clone(&tokens));

        let resolution = FetchRequest::organization(&tokens).resolve(&scope).await;
        let Some(FetchResult::Organization(org)) = resolution.result else {
            panic!("expected organization result");
        };
        assert_eq!(
            org.outcome,
            Ok(OrganizationData {
                name: "acme".to_string(),
                private_repos: 3,
                public_repos: 7,
            })
        );

        let sent = &transport.requests()[0];
        assert_eq!(
            header_get(&sent.headers, "authorization"),
            Some("Bearer secret-1")
        );
        assert_eq!(
            header_get(&sent.headers, "accept"),
            Some("application/vnd.github+json")
        );
        assert_eq!(
            header_get(&sent.headers, "x-github-api-version"),
            Some(API_VERSION)
        );
    }

    #[tokio::test]
    async fn no_token_fails_without_http_call() {
        let transport = MockTransport::new();
        let tokens = Arc::new(TokenPool::new(["t"]));
        tokens.expire(&Token::new("t"));
        let scope = scope(&transport, Arc::clone(&tokens));

        let request = FetchRequest::organization(&tokens);
        assert!(request.token().is_none());
        let resolution = request.resolve(&scope).await;

        let result = resolution.result.expect("result");
        assert_eq!(result.fail_reason(), Some(FailReason::NoValidToken));
        assert!(resolution.follow_ups.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn forbidden_expires_token_and_retries_with_same_parameters() {
        let transport = MockTransport::new();
        transport.push_status(format!("{API}/repos/acme/api"), 403);
        let tokens = Arc::new(TokenPool::new(["first", "second"]));
        let scope = scope(&transport, Arc::clone(&tokens));
        let last = Some(ts("2024-01-01T00:00:00Z"));

        let request = FetchRequest::detail("api", last, &tokens);
        assert_eq!(request.token(), Some(&Token::new("first")));
        let resolution = request.resolve(&scope).await;

        assert!(resolution.result.is_none());
        assert_eq!(resolution.follow_ups.len(), 1);
        let retry = &resolution.follow_ups[0];
        assert_eq!(
            retry.kind(),
            &RequestKind::RepoDetail {
                repo: "api".to_string(),
                last_known_update: last,
            }
        );
        assert_eq!(retry.token(), Some(&Token::new("second")));
        assert_eq!(tokens.get_valid(), Some(Token::new("second")));
    }

    #[tokio::test]
    async fn forbidden_on_last_token_retries_into_no_valid_token() {
        let transport = MockTransport::new();
        transport.push_status(format!("{API}/orgs/acme"), 403);
        let tokens = Arc::new(TokenPool::new(["only"]));
        let scope = scope(&transport, Arc::clone(&tokens));

        let resolution = FetchRequest::organization(&tokens).resolve(&scope).await;
        let retry = resolution.follow_ups.into_iter().next().expect("retry");
        assert!(retry.token().is_none());

        let terminal = retry.resolve(&scope).await;
        assert_eq!(
            terminal.result.and_then(|r| r.fail_reason()),
            Some(FailReason::NoValidToken)
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn other_statuses_are_terminal() {
        let transport = MockTransport::new();
        transport.push_status(format!("{API}/repos/acme/gone"), 404);
        transport.push_status(format!("{API}/repos/acme/broken"), 502);
        let tokens = Arc::new(TokenPool::new(["t"]));
        let scope = scope(&transport, Arc::clone(&tokens));

        let gone = FetchRequest::detail("gone", None, &tokens).resolve(&scope).await;
        assert_eq!(
            gone.result.and_then(|r| r.fail_reason()),
            Some(FailReason::NotFound)
        );
        assert!(gone.follow_ups.is_empty());

        let broken = FetchRequest::detail("broken", None, &tokens)
            .resolve(&scope)
            .await;
        assert_eq!(
            broken.result.and_then(|r| r.fail_reason()),
            Some(FailReason::UnexpectedStatus(502))
        );
    }

    #[tokio::test]
    async fn undecodable_body_is_unexpected_status() {
        let transport = MockTransport::new();
        transport.push_json(format!("{API}/orgs/acme"), 200, json!({"unexpected": true}));
        let tokens = Arc::new(TokenPool::new(["t"]));
        let scope = scope(&transport, Arc::clone(&tokens));

        let resolution = FetchRequest::organization(&tokens).resolve(&scope).await;
        assert_eq!(
            resolution.result.and_then(|r| r.fail_reason()),
            Some(FailReason::UnexpectedStatus(200))
        );
    }

    #[tokio::test]
    async fn listing_emits_detail_requests_for_matching_names() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/orgs/acme/repos?page=1&per_page=100"),
            200,
            json!([{"name": "svc-a"}, {"name": "docs"}, {"name": "svc-b"}]),
        );
        let tokens = Arc::new(TokenPool::new(["t"]));
        let known = ts("2024-01-01T00:00:00Z");
        let scope = scope(&transport, Arc::clone(&tokens))
            .with_last_updates(HashMap::from([("svc-b".to_string(), known)]));
        let filter = Arc::new(RepoFilter::by_name(NameMatcher::starts_with("svc-")));

        let resolution = FetchRequest::listing(1, 100, filter, &tokens)
            .resolve(&scope)
            .await;

        let Some(FetchResult::Listing(listing)) = resolution.result else {
            panic!("expected listing result");
        };
        assert_eq!(listing.outcome, Ok(2));
        let kinds: Vec<_> = resolution.follow_ups.iter().map(|r| r.kind().clone()).collect();
        assert_eq!(
            kinds,
            vec![
                RequestKind::RepoDetail {
                    repo: "svc-a".to_string(),
                    last_known_update: None,
                },
                RequestKind::RepoDetail {
                    repo: "svc-b".to_string(),
                    last_known_update: Some(known),
                },
            ]
        );
    }

    #[tokio::test]
    async fn name_repeated_across_pages_is_requested_once() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/orgs/acme/repos?page=1&per_page=2"),
            200,
            json!([{"name": "a"}, {"name": "b"}]),
        );
        transport.push_json(
            format!("{API}/orgs/acme/repos?page=2&per_page=2"),
            200,
            json!([{"name": "b"}, {"name": "c"}]),
        );
        let tokens = Arc::new(TokenPool::new(["t"]));
        let scope = scope(&transport, Arc::clone(&tokens));
        let filter = Arc::new(RepoFilter::all());

        let first = FetchRequest::listing(1, 2, Arc::clone(&filter), &tokens)
            .resolve(&scope)
            .await;
        let second = FetchRequest::listing(2, 2, filter, &tokens)
            .resolve(&scope)
            .await;

        let Some(FetchResult::Listing(listing)) = second.result else {
            panic!("expected listing result");
        };
        assert_eq!(listing.outcome, Ok(1));
        let names: Vec<String> = first
            .follow_ups
            .iter()
            .chain(&second.follow_ups)
            .map(|r| r.kind().to_string())
            .collect();
        assert_eq!(names, vec!["detail:a", "detail:b", "detail:c"]);
    }

    #[tokio::test]
    async fn unchanged_repo_requests_no_files() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/repos/acme/api"),
            200,
            repo_json("api", "2024-01-01T00:00:00Z"),
        );
        let tokens = Arc::new(TokenPool::new(["t"]));
        let scope = scope(&transport, Arc::clone(&tokens));

        let resolution = FetchRequest::detail("api", Some(ts("2024-01-01T00:00:00Z")), &tokens)
            .resolve(&scope)
            .await;

        assert!(resolution.follow_ups.is_empty());
        let Some(FetchResult::RepoDetail(detail)) = resolution.result else {
            panic!("expected detail result");
        };
        let repo = detail.outcome.expect("repo");
        assert!(!repo.is_new);
        assert!(!repo.updated);
    }

    #[tokio::test]
    async fn pushed_repo_requests_every_file() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/repos/acme/api"),
            200,
            repo_json("api", "2024-03-01T00:00:00Z"),
        );
        let tokens = Arc::new(TokenPool::new(["t"]));
        let scope = scope(&transport, Arc::clone(&tokens));

        let resolution = FetchRequest::detail("api", Some(ts("2024-01-01T00:00:00Z")), &tokens)
            .resolve(&scope)
            .await;

        let paths: Vec<_> = resolution
            .follow_ups
            .iter()
            .map(|r| r.kind().to_string())
            .collect();
        assert_eq!(paths, vec!["file:api:poetry.lock", "file:api:Cargo.lock"]);
        let Some(FetchResult::RepoDetail(detail)) = resolution.result else {
            panic!("expected detail result");
        };
        let repo = detail.outcome.expect("repo");
        assert!(repo.updated);
        assert!(!repo.is_new);
        assert_eq!(repo.pushed_at, ts("2024-03-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn file_content_is_base64_decoded() {
        let transport = MockTransport::new();
        let encoded = STANDARD.encode("[metadata]\n");
        transport.push_json(
            format!("{API}/repos/acme/api/contents/poetry.lock"),
            200,
            json!({"content": format!("{encoded}\n"), "encoding": "base64"}),
        );
        let tokens = Arc::new(TokenPool::new(["t"]));
        let scope = scope(&transport, Arc::clone(&tokens));

        let resolution = FetchRequest::file("api", "poetry.lock", &tokens)
            .resolve(&scope)
            .await;
        let Some(FetchResult::RepoFile(file)) = resolution.result else {
            panic!("expected file result");
        };
        assert_eq!(file.outcome, Ok("[metadata]\n".to_string()));
        assert!(resolution.follow_ups.is_empty());
    }
}
