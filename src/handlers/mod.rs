mod health;
mod metrics;
mod tweets;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use tweets::{default_tweet_handler, search_handler, user_tweets_handler};
