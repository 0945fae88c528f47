use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("buzzer_requests_total", "Total number of tweet requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("buzzer_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("buzzer_cache_misses_total", "Total cache misses").unwrap();
    pub static ref STALE_SERVED: Counter =
        register_counter!("buzzer_stale_served_total", "Responses served from stale cache").unwrap();
    pub static ref UPSTREAM_CALLS: Counter =
        register_counter!("buzzer_upstream_calls_total", "Calls made to the Twitter API").unwrap();
    pub static ref ADMISSION_REJECTED: Counter =
        register_counter!("buzzer_admission_rejected_total", "Upstream calls refused by the admission limiter").unwrap();
    pub static ref HTTP_RATE_LIMITED: Counter =
        register_counter!("buzzer_http_rate_limited_total", "Requests refused by the per-address limiter").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "buzzer_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("buzzer_cache_size", "Current number of keys in cache").unwrap();
}

/// Text exposition of everything registered in the default registry.
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
