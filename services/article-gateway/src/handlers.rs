// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the article gateway.
//!
//! Every `/api/v1` request is admitted in order: global bucket, per-source
//! cool-down keyed by peer address, then the access key. Only an admitted
//! request reaches the delivery engine.

use crate::{
    config::Config,
    db::Database,
    delivery::{Delivery, Filter, Page},
    error::{AppError, Result},
    gateway::{AccessGateway, Grant},
    limiter::{CooldownOutcome, RateLimitResult, RateLimiter},
    metrics::{outcome, Metrics},
    reply::Reply,
    validator::parse_limit,
};
use axum::{
    extract::{ConnectInfo, Path, Query, RawQuery, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http::{header, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{debug, info};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub limiter: RateLimiter,
    pub gateway: Arc<AccessGateway>,
    pub delivery: Delivery,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let metrics = Metrics::new().map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Self {
            limiter: RateLimiter::new(&config.rate_limit),
            gateway: Arc::new(AccessGateway::new()),
            delivery: Delivery::new(db, config.delivery.clone()),
            metrics,
            config,
        })
    }

    /// Admission: global bucket, cool-down, then the access key.
    async fn admit(&self, peer: IpAddr, access_key: Option<&str>) -> Result<Grant> {
        if let RateLimitResult::Limited { retry_after } = self.limiter.check_global().await {
            info!(%peer, ?retry_after, "Request rate limited");
            return Err(AppError::RateLimited { retry_after });
        }

        if let CooldownOutcome::Held(wait) = self.limiter.enter(peer).await {
            debug!(%peer, ?wait, "Request released from cool-down");
            self.metrics.record_hold();
        }

        let grant = self.gateway.authorize(access_key.unwrap_or_default()).await?;
        debug!(%peer, used = grant.used, remaining = grant.remaining(), "Access granted");
        Ok(grant)
    }

    /// Map a delivery outcome to a reply and count it.
    fn respond(&self, result: Result<Page>) -> Reply {
        let reply = Reply::from_result(&result);
        let label = match reply.code {
            200 => outcome::DATA,
            204 | 206 => outcome::EMPTY,
            401 => outcome::UNAUTHORIZED,
            429 => outcome::RATE_LIMITED,
            _ => outcome::ERROR,
        };
        self.metrics.record(label);
        reply
    }

    fn topic_or_default<'a>(&'a self, topic: Option<&'a str>) -> &'a str {
        topic
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.config.delivery.default_topic.as_str())
    }

    fn limit(&self, raw: Option<&str>) -> Result<u32> {
        Ok(parse_limit(raw, self.config.delivery.default_limit)?)
    }
}

/// Parameters of the primary query endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ApiQuery {
    pub access_key: Option<String>,
    pub keywords: Option<String>,
    pub date: Option<String>,
    pub categories: Option<String>,
    pub sources: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub sort: Option<String>,
}

impl ApiQuery {
    fn descending(&self) -> bool {
        self.sort
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("desc"))
    }

    /// First entry of `sources`, used as the topic.
    fn source_topic(&self) -> Option<&str> {
        self.sources
            .as_deref()
            .and_then(|s| s.split(',').map(str::trim).find(|s| !s.is_empty()))
    }

    fn filter(&self) -> Filter {
        Filter::content(self.keywords.as_deref().unwrap_or_default())
            .with_categories(self.categories.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KeyQuery {
    pub access_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub access_key: Option<String>,
    pub limit: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestQuery {
    pub access_key: Option<String>,
    pub limit: Option<String>,
    pub filter: Option<String>,
    pub topic: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "article-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Primary query endpoint.
///
/// With `offset`, pages by article id (`sort=desc` walks backwards).
/// Otherwise walks the caller's cursor, which is scoped to its access key.
pub async fn api(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<ApiQuery>,
) -> Reply {
    let result = async {
        let key = params.access_key.as_deref();
        state.admit(peer.ip(), key).await?;

        let limit = state.limit(params.limit.as_deref())?;
        let topic = state.topic_or_default(params.source_topic());
        let filter = params.filter();
        if let Some(date) = params.date.as_deref() {
            debug!(%date, "Date parameter accepted, not applied");
        }

        match params.offset.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(offset) if params.descending() => {
                state.delivery.prev_by_id(offset, limit, &filter, topic).await
            }
            Some(offset) => state.delivery.next_by_id(offset, limit, &filter, topic).await,
            None => {
                let target = key.unwrap_or_default();
                if params.descending() {
                    state.delivery.prev(target, topic, limit, &filter).await
                } else {
                    state.delivery.next(target, topic, limit, &filter).await
                }
            }
        }
    }
    .await;

    state.respond(result)
}

/// Single article by id.
pub async fn article(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
    Query(params): Query<KeyQuery>,
) -> Reply {
    let result = async {
        state.admit(peer.ip(), params.access_key.as_deref()).await?;
        state.delivery.by_id(&id).await
    }
    .await;

    state.respond(result)
}

/// Title search.
pub async fn search_title(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<SearchQuery>,
    RawQuery(raw): RawQuery,
) -> Reply {
    let result = search(&state, peer.ip(), &params, raw.as_deref(), true).await;
    state.respond(result)
}

/// Body search.
pub async fn search_content(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<SearchQuery>,
    RawQuery(raw): RawQuery,
) -> Reply {
    let result = search(&state, peer.ip(), &params, raw.as_deref(), false).await;
    state.respond(result)
}

async fn search(
    state: &AppState,
    peer: IpAddr,
    params: &SearchQuery,
    raw: Option<&str>,
    title: bool,
) -> Result<Page> {
    state.admit(peer, params.access_key.as_deref()).await?;

    let limit = state.limit(params.limit.as_deref())?;
    let topic = state.topic_or_default(params.topic.as_deref());
    // The engine decodes the search string itself, so take it undecoded.
    let q = raw.and_then(|raw| raw_param(raw, "q")).unwrap_or_default();

    if title {
        state.delivery.by_title(q, limit, topic).await
    } else {
        state.delivery.by_content(q, limit, topic).await
    }
}

/// Newest articles for a topic, optionally filtered.
pub async fn latest(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<LatestQuery>,
) -> Reply {
    let result = async {
        state.admit(peer.ip(), params.access_key.as_deref()).await?;
        let limit = state.limit(params.limit.as_deref())?;
        let topic = state.topic_or_default(params.topic.as_deref());
        let filter = Filter::content(params.filter.as_deref().unwrap_or_default());
        state.delivery.latest_by_filter(limit, &filter, topic).await
    }
    .await;

    state.respond(result)
}

/// Prometheus exposition.
pub async fn metrics_text(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Undecoded value of `name` in a raw query string.
fn raw_param<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key == name).then_some(value)
    })
}

/// Build the router.
pub fn app(state: Arc<AppState>) -> Router {
    let static_dir = PathBuf::from(&state.config.static_dir);

    let mut router = Router::new()
        .route("/api/v1", get(api))
        .route("/api/v1/articles/:id", get(article))
        .route("/api/v1/search/title", get(search_title))
        .route("/api/v1/search/content", get(search_content))
        .route("/api/v1/latest", get(latest))
        .route("/health", get(health))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(&static_dir));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(metrics_text));
    }

    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| o.trim().parse().ok())
        .collect();

    let router = router
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    if origins.is_empty() {
        router
    } else {
        router.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::OPTIONS]),
        )
    }
}
