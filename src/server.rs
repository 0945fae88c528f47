use axum::{
    Json, Router,
    extract::{ConnectInfo, Request, State},
    http::{StatusCode, header::RETRY_AFTER},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::interval;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::handlers::{default_tweet_handler, health_handler, metrics_handler, search_handler, user_tweets_handler};
use crate::metrics::HTTP_RATE_LIMITED;
use crate::state::AppState;
use crate::upstream::TwitterClient;

const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/tweets", get(default_tweet_handler))
        .route("/api/tweets/{username}", get(user_tweets_handler))
        .route("/api/search", get(search_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), http_rate_limit));

    // health and metrics sit outside the per-address limiter
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// Sliding window per client address; requests without connection info share one bucket
async fn http_rate_limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match state.http_limiter.check(&ip, state.clock.now()) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            HTTP_RATE_LIMITED.inc();
            warn!(%ip, retry_after, "client rate limited");
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(RETRY_AFTER, retry_after.to_string())],
                Json(json!({ "error": "Too many requests", "retryAfter": retry_after })),
            )
                .into_response()
        }
    }
}

// Forget clients whose windows have drained
async fn sweep_idle_clients(state: Arc<AppState>, every: Duration) {
    let mut interval = interval(every);

    loop {
        interval.tick().await;
        state.http_limiter.evict_idle(state.clock.now());
        debug!(clients = state.http_limiter.tracked_keys(), "swept idle clients");
    }
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let upstream = TwitterClient::new(&config.api_url, &config.bearer_token, config.gate.upstream_timeout)?;
    let state = AppState::new(&config, Arc::new(upstream), Arc::new(SystemClock));

    tokio::spawn(sweep_idle_clients(state.clone(), IDLE_SWEEP_INTERVAL));

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Buzzer backend running on http://localhost:{}", config.port);
    info!("Fetching from {}", config.api_url);
    match &config.username {
        Some(name) => info!("GET /api/tweets serves @{name}"),
        None => warn!("TWITTER_USERNAME not set, GET /api/tweets will fail"),
    }
    info!(
        max_requests = config.gate.admission.max_requests,
        window_ms = config.gate.admission.window.as_millis() as u64,
        cache_ms = config.gate.cache_duration.as_millis() as u64,
        cooldown_ms = config.gate.cooldown.as_millis() as u64,
        "upstream policy"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
