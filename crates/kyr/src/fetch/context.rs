use std::sync::Arc;
use std::time::Duration;

use crate::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};
use crate::token::TokenPool;

use super::rate_limit::ApiRateLimiter;
use super::types::{DEFAULT_REQUEST_TIMEOUT_SECS, FailReason};

/// How one HTTP exchange ended, before any request-specific handling.
#[derive(Debug)]
pub enum Exchange {
    /// 200 with its body.
    Ok(HttpResponse),
    /// 403: the bound token should be expired and the request retried.
    Forbidden,
    /// Any other terminal outcome.
    Failed(FailReason),
}

/// Everything a request needs to talk to the host.
#[derive(Clone)]
pub struct FetchContext {
    pub transport: Arc<dyn HttpTransport>,
    pub tokens: Arc<TokenPool>,
    pub rate_limiter: Option<ApiRateLimiter>,
    pub request_timeout: Duration,
}

impl FetchContext {
    pub fn new(transport: Arc<dyn HttpTransport>, tokens: Arc<TokenPool>) -> Self {
        Self {
            transport,
            tokens,
            rate_limiter: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: ApiRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Send `request` and classify the response.
    pub async fn send(&self, request: HttpRequest) -> Exchange {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }

        let url = request.url.clone();
        let sent = tokio::time::timeout(self.request_timeout, self.transport.send(request)).await;

        match sent {
            Ok(Ok(response)) => classify(response),
            Ok(Err(err)) => {
                tracing::debug!(url = %url, error = %err, "request failed before a status was received");
                Exchange::Failed(FailReason::Transport)
            }
            Err(_) => {
                let err = HttpError::Timeout { url };
                tracing::debug!(error = %err, "request timed out");
                Exchange::Failed(FailReason::Transport)
            }
        }
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("tokens", &self.tokens)
            .field("rate_limiter", &self.rate_limiter)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

fn classify(response: HttpResponse) -> Exchange {
    match response.status {
        200 => Exchange::Ok(response),
        403 => Exchange::Forbidden,
        404 => Exchange::Failed(FailReason::NotFound),
        status => Exchange::Failed(FailReason::UnexpectedStatus(status)),
    }
}
