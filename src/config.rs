use clap::{Parser, ValueEnum};
use std::time::Duration;
use thiserror::Error;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "tweet-buzzer")]
#[command(about = "Rate limited, cached tweet fetcher behind the buzzer button")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    // Twitter API bearer token
    #[arg(long, env = "TWITTER_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: String,

    // Twitter API base url
    #[arg(long, env = "TWITTER_API_URL", default_value = "https://api.twitter.com/2")]
    pub api_url: String,

    // Account served by GET /api/tweets
    #[arg(short, long, env = "TWITTER_USERNAME")]
    pub username: Option<String>,

    // Upstream admission: max calls per window
    #[arg(long, env = "TWITTER_RATE_LIMIT_MAX_REQUESTS", default_value_t = 100)]
    pub rate_limit_max_requests: u32,

    // Upstream admission window in milliseconds
    #[arg(long, env = "TWITTER_RATE_LIMIT_WINDOW_MS", default_value_t = 900_000)]
    pub rate_limit_window_ms: u64,

    // Cache freshness in milliseconds
    #[arg(short, long, env = "CACHE_DURATION_MS", default_value_t = 60_000)]
    pub cache_duration_ms: u64,

    // Minimum interval between upstream refreshes of one key
    #[arg(long, env = "API_COOLDOWN_MS", default_value_t = 15_000)]
    pub cooldown_ms: u64,

    // Bound on a single upstream call
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", default_value_t = 10_000)]
    pub upstream_timeout_ms: u64,

    // Per client address HTTP limit
    #[arg(long, env = "API_RATE_LIMIT_MAX_REQUESTS", default_value_t = 100)]
    pub api_max_requests: u32,

    #[arg(long, env = "API_RATE_LIMIT_WINDOW_MS", default_value_t = 900_000)]
    pub api_window_ms: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bearer token must not be blank")]
    BlankToken,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

// Sliding window limits, upstream admission and per-address HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub admission: RateLimitConfig,
    pub cache_duration: Duration,
    pub cooldown: Duration,
    pub upstream_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            admission: RateLimitConfig {
                max_requests: 100,
                window: Duration::from_millis(900_000),
            },
            cache_duration: Duration::from_millis(60_000),
            cooldown: Duration::from_millis(15_000),
            upstream_timeout: Duration::from_millis(10_000),
        }
    }
}

/// Validated process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bearer_token: String,
    pub api_url: String,
    pub username: Option<String>,
    pub gate: GateConfig,
    pub http_limit: RateLimitConfig,
    pub log_format: LogFormat,
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let bearer_token = args.bearer_token.trim().to_string();
        if bearer_token.is_empty() {
            return Err(ConfigError::BlankToken);
        }

        let gate = GateConfig {
            admission: RateLimitConfig {
                max_requests: non_zero("rate limit max requests", args.rate_limit_max_requests)?,
                window: non_zero_ms("rate limit window", args.rate_limit_window_ms)?,
            },
            cache_duration: Duration::from_millis(args.cache_duration_ms),
            cooldown: Duration::from_millis(args.cooldown_ms),
            upstream_timeout: non_zero_ms("upstream timeout", args.upstream_timeout_ms)?,
        };

        let http_limit = RateLimitConfig {
            max_requests: non_zero("api max requests", args.api_max_requests)?,
            window: non_zero_ms("api window", args.api_window_ms)?,
        };

        // blank usernames behave as unset
        let username = args
            .username
            .map(|u| u.trim().trim_start_matches('@').to_string())
            .filter(|u| !u.is_empty());

        Ok(Self {
            port: args.port,
            bearer_token,
            api_url: args.api_url.trim_end_matches('/').to_string(),
            username,
            gate,
            http_limit,
            log_format: args.log_format,
        })
    }
}

fn non_zero(name: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero(name));
    }
    Ok(value)
}

fn non_zero_ms(name: &'static str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero(name));
    }
    Ok(Duration::from_millis(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["tweet-buzzer", "--bearer-token", "secret"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::try_from(parse(&[])).unwrap();

        assert_eq!(config.gate.admission.max_requests, 100);
        assert_eq!(config.gate.admission.window, Duration::from_secs(900));
        assert_eq!(config.gate.cache_duration, Duration::from_secs(60));
        assert_eq!(config.gate.cooldown, Duration::from_secs(15));
        assert_eq!(config.api_url, "https://api.twitter.com/2");
        assert_eq!(config.username, None);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_token_is_rejected() {
        let args = Args::try_parse_from(["tweet-buzzer", "--bearer-token", "  "]).unwrap();
        assert_eq!(Config::try_from(args).unwrap_err(), ConfigError::BlankToken);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = Config::try_from(parse(&["--rate-limit-max-requests", "0"])).unwrap_err();
        assert_eq!(err, ConfigError::Zero("rate limit max requests"));

        let err = Config::try_from(parse(&["--api-window-ms", "0"])).unwrap_err();
        assert_eq!(err, ConfigError::Zero("api window"));
    }

    #[test]
    fn username_is_normalized() {
        let config = Config::try_from(parse(&["--username", " @jack "])).unwrap();
        assert_eq!(config.username.as_deref(), Some("jack"));

        let config = Config::try_from(parse(&["--username", ""])).unwrap();
        assert_eq!(config.username, None);
    }

    #[test]
    fn trailing_slash_is_trimmed_from_api_url() {
        let config = Config::try_from(parse(&["--api-url", "http://localhost:9000/2/"])).unwrap();
        assert_eq!(config.api_url, "http://localhost:9000/2");
    }
}
