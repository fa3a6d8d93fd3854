// src/api.rs
// HTTP query/control surface consumed by the dashboard. Read endpoints are
// side-effect-free snapshots; pause/resume are the only mutations.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tower_http::cors::CorsLayer;

use crate::catalog::{
    CatalogIndex, FilterCriteria, ProductFilter, ProductOption, SentimentFilter, TallyRecord,
    TimeRange,
};
use crate::event::{ReviewEvent, Sentiment, SentimentCounts};
use crate::feed::FeedAggregator;

#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedAggregator>,
    pub catalog: Arc<CatalogIndex>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/feed", get(feed_window))
        .route("/counts", get(counts))
        .route("/products", get(products))
        .route("/tallies", get(tallies))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct FeedQuery {
    /// Case-insensitive substring match against product ids.
    #[serde(default)]
    asin_contains: Option<String>,
}

async fn feed_window(
    State(state): State<AppState>,
    Query(q): Query<FeedQuery>,
) -> Json<Vec<ReviewEvent>> {
    let events = match q.asin_contains.as_deref() {
        Some(needle) => state.feed.search(needle),
        None => state.feed.window(),
    };
    Json(events.iter().map(|ev| (**ev).clone()).collect())
}

async fn counts(State(state): State<AppState>) -> Json<SentimentCounts> {
    Json(state.feed.counts())
}

async fn products(State(state): State<AppState>) -> Json<Vec<ProductOption>> {
    Json(state.catalog.list_products())
}

#[derive(serde::Deserialize)]
struct TallyQuery {
    #[serde(default)]
    time_range: Option<String>,
    #[serde(default)]
    asin: Option<String>,
    #[serde(default)]
    sentiment: Option<String>,
}

impl TallyQuery {
    /// Missing dimensions default to the `"all"` wildcard; unknown values
    /// are a client error, not a silent match-nothing.
    fn criteria(&self) -> Result<FilterCriteria, String> {
        let time_range = match self.time_range.as_deref() {
            None => TimeRange::All,
            Some(raw) => {
                TimeRange::parse(raw).ok_or_else(|| format!("unknown time_range {raw:?}"))?
            }
        };
        let product_id = match self.asin.as_deref() {
            None | Some("all") => ProductFilter::All,
            Some(asin) => ProductFilter::Exact(asin.to_string()),
        };
        let sentiment = match self.sentiment.as_deref() {
            None | Some("all") => SentimentFilter::All,
            Some(raw) => SentimentFilter::Only(
                Sentiment::parse(raw).ok_or_else(|| format!("unknown sentiment {raw:?}"))?,
            ),
        };
        Ok(FilterCriteria {
            time_range,
            product_id,
            sentiment,
        })
    }
}

async fn tallies(
    State(state): State<AppState>,
    Query(q): Query<TallyQuery>,
) -> Result<Json<Vec<TallyRecord>>, (StatusCode, String)> {
    let criteria = q.criteria().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    Ok(Json(state.catalog.filtered_tallies(&criteria, Utc::now())))
}

#[derive(serde::Serialize)]
struct PauseResponse {
    paused: bool,
}

async fn pause(State(state): State<AppState>) -> Json<PauseResponse> {
    state.feed.pause();
    Json(PauseResponse { paused: true })
}

async fn resume(State(state): State<AppState>) -> Json<PauseResponse> {
    state.feed.resume();
    Json(PauseResponse { paused: false })
}
