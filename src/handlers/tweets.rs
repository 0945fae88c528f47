use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use crate::error::ApiError;
use crate::gate::GateError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{Pick, Placeholder, PostQuery, ResponseMode};
use crate::state::AppState;

const MAX_USERNAME_LEN: usize = 15;
const MAX_SEARCH_LEN: usize = 512;

#[derive(Debug, Deserialize)]
pub struct ModeParams {
    mode: Option<ResponseMode>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
    mode: Option<ResponseMode>,
}

// {data: ...} shape served by GET /api/tweets
#[derive(Serialize)]
struct Envelope<T> {
    data: T,
}

// GET /api/tweets/{username}: all posts by default
pub async fn user_tweets_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    params: Result<Query<ModeParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let username = valid_username(&username)?;
    let query = PostQuery::Username(username);

    let pick = timed(state.gate.pick(&query, params.mode.unwrap_or(ResponseMode::All))).await?;
    Ok(bare(pick))
}

// GET /api/search?q=...
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let term = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or(ApiError::EmptySearch)?;
    if term.chars().count() > MAX_SEARCH_LEN {
        return Err(ApiError::SearchTooLong { max: MAX_SEARCH_LEN });
    }
    let query = PostQuery::Search(term.to_string());

    let pick = timed(state.gate.pick(&query, params.mode.unwrap_or(ResponseMode::All))).await?;
    Ok(bare(pick))
}

// GET /api/tweets: one random post from the configured account by default.
// Having nothing to show is not an error here.
pub async fn default_tweet_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ModeParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let query = state
        .default_query
        .as_ref()
        .ok_or(ApiError::NoDefaultUsername)?;

    let pick = match timed(state.gate.pick(query, params.mode.unwrap_or(ResponseMode::Random))).await {
        Ok(pick) => pick,
        Err(GateError::Unavailable) => Pick::NoPosts,
        Err(e) => return Err(e.into()),
    };

    Ok(match pick {
        Pick::One(post) => Json(Envelope { data: post }).into_response(),
        Pick::All(posts) => Json(Envelope { data: posts.as_slice() }).into_response(),
        Pick::NoPosts => Json(Envelope { data: Placeholder::no_posts() }).into_response(),
    })
}

fn bare(pick: Pick) -> Response {
    match pick {
        Pick::One(post) => Json(post).into_response(),
        Pick::All(posts) => Json(posts.as_slice()).into_response(),
        Pick::NoPosts => Json(Placeholder::no_posts()).into_response(),
    }
}

async fn timed<F, T>(fut: F) -> T
where
    F: Future<Output = T>,
{
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();
    let out = fut.await;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    out
}

// Twitter handles: 1-15 of [A-Za-z0-9_], optional leading @
fn valid_username(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim().trim_start_matches('@');
    let ok = !name.is_empty()
        && name.len() <= MAX_USERNAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if ok {
        Ok(name.to_string())
    } else {
        Err(ApiError::InvalidUsername(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_validated() {
        assert_eq!(valid_username("@jack").unwrap(), "jack");
        assert_eq!(valid_username("Elon_Musk").unwrap(), "Elon_Musk");
        assert!(valid_username("").is_err());
        assert!(valid_username("has space").is_err());
        assert!(valid_username("../admin").is_err());
        assert!(valid_username("a_name_far_too_long").is_err());
    }
}
