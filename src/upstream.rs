use async_trait::async_trait;
use reqwest::{StatusCode, Url, header::HeaderMap};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use crate::models::{Post, PostQuery, TweetPage, UserLookup};

const TIMELINE_MAX_RESULTS: u32 = 20;
const SEARCH_MAX_RESULTS: u32 = 50;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rate limit hit")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("upstream call timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("user {0} not found")]
    NotFound(String),

    #[error("malformed upstream body: {0}")]
    Decode(String),

    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    // Transient failures say nothing about the query itself
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::RateLimited { .. } | UpstreamError::Timeout | UpstreamError::Transport(_)
        )
    }
}

/// Source of posts. The fetch gate is the only caller.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch_posts(&self, query: &PostQuery) -> Result<Vec<Post>, UpstreamError>;
}

/// Twitter API v2 client authenticated with an app bearer token.
pub struct TwitterClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl TwitterClient {
    pub fn new(base_url: &str, bearer_token: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = Url::parse_with_params(&format!("{}/{}", self.base_url, path), query)
            .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        debug!(%url, "calling twitter");

        let res = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited {
                retry_after_secs: reset_hint(res.headers()),
            });
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        res.json::<T>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn user_timeline(&self, username: &str) -> Result<Vec<Post>, UpstreamError> {
        let lookup: UserLookup = self.get(&format!("users/by/username/{username}"), &[]).await?;
        let user = lookup
            .data
            .ok_or_else(|| UpstreamError::NotFound(username.to_string()))?;

        let page: TweetPage = self
            .get(
                &format!("users/{}/tweets", user.id),
                &[
                    ("max_results", TIMELINE_MAX_RESULTS.to_string()),
                    ("exclude", "retweets,replies".to_string()),
                    ("tweet.fields", "created_at".to_string()),
                ],
            )
            .await?;

        Ok(page.data)
    }

    async fn search_recent(&self, term: &str) -> Result<Vec<Post>, UpstreamError> {
        let page: TweetPage = self
            .get(
                "tweets/search/recent",
                &[
                    ("query", term.to_string()),
                    ("tweet.fields", "created_at".to_string()),
                    ("max_results", SEARCH_MAX_RESULTS.to_string()),
                ],
            )
            .await?;

        Ok(page.data)
    }
}

#[async_trait]
impl Upstream for TwitterClient {
    async fn fetch_posts(&self, query: &PostQuery) -> Result<Vec<Post>, UpstreamError> {
        match query {
            PostQuery::Username(username) => self.user_timeline(username).await,
            PostQuery::Search(term) => self.search_recent(term).await,
        }
    }
}

// x-rate-limit-reset carries the epoch second the window resets at
fn reset_hint(headers: &HeaderMap) -> Option<u64> {
    let reset: i64 = headers
        .get("x-rate-limit-reset")?
        .to_str()
        .ok()?
        .parse()
        .ok()?;
    let now = chrono::Utc::now().timestamp();
    u64::try_from(reset - now).ok().map(|secs| secs.max(1))
}
