use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Text served when a query has nothing to show.
pub const NO_POSTS_TEXT: &str = "no posts available";

// A single tweet, as returned by the Twitter API v2 and served to the buzzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
impl Post {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            created_at: None,
        }
    }
}

// What to fetch upstream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PostQuery {
    Username(String),
    Search(String),
}

impl PostQuery {
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PostQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostQuery::Username(name) => write!(f, "user:{}", name.to_lowercase()),
            PostQuery::Search(term) => write!(f, "search:{term}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Random,
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pick {
    One(Post),
    All(Arc<Vec<Post>>),
    NoPosts,
}

// Placeholder body for an empty result
#[derive(Debug, Serialize)]
pub struct Placeholder {
    pub text: &'static str,
}

impl Placeholder {
    pub fn no_posts() -> Self {
        Self { text: NO_POSTS_TEXT }
    }
}

// Twitter API v2 envelopes

#[derive(Debug, Deserialize)]
pub struct UserLookup {
    pub data: Option<TwitterUser>,
}

#[derive(Debug, Deserialize)]
pub struct TwitterUser {
    pub id: String,
}

// `data` is omitted entirely when there are no tweets
#[derive(Debug, Deserialize)]
pub struct TweetPage {
    #[serde(default)]
    pub data: Vec<Post>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_separate_usernames_from_searches() {
        let user = PostQuery::Username("Jack".into());
        let search = PostQuery::Search("jack".into());

        assert_eq!(user.cache_key(), "user:jack");
        assert_eq!(search.cache_key(), "search:jack");
        assert_ne!(user.cache_key(), search.cache_key());
    }

    #[test]
    fn tweet_page_without_data_is_empty() {
        let page: TweetPage = serde_json::from_str(r#"{"meta":{"result_count":0}}"#).unwrap();
        assert!(page.data.is_empty());
    }

    #[test]
    fn post_reads_twitter_timestamps() {
        let page: TweetPage = serde_json::from_str(
            r#"{"data":[{"id":"1","text":"hi","created_at":"2024-03-01T12:00:00.000Z"}]}"#,
        )
        .unwrap();

        let post = &page.data[0];
        assert_eq!(post.id, "1");
        assert_eq!(post.created_at.unwrap().to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn mode_parses_lowercase() {
        let mode: ResponseMode = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(mode, ResponseMode::All);
    }
}
