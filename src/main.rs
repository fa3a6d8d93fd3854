//! Review Sentiment Feed — Binary Entrypoint
//! Connects to the event source, wires the ingestion pipeline, and serves the
//! dashboard's HTTP query/control surface.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use review_sentiment_feed::{
    api, catalog::CatalogIndex, config::Settings, connection::ConnectionManager,
    connection::WsTransport, feed::FeedAggregator, metrics::Metrics, pipeline,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("review_sentiment_feed=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the variables come from the host.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env()?;
    let feed = Arc::new(FeedAggregator::with_capacity(settings.window_capacity));
    let catalog = Arc::new(CatalogIndex::new());
    let metrics = Metrics::init(feed.capacity());

    let conn = ConnectionManager::new(
        Arc::new(WsTransport::new(settings.ws_url.clone())),
        settings.reconnect.clone(),
    );
    let _subscription = pipeline::attach(&conn, Arc::clone(&feed), Arc::clone(&catalog));
    conn.connect();

    let router = api::create_router(api::AppState { feed, catalog }).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!(addr = %settings.bind_addr, source = %settings.ws_url, "serving dashboard surface");
    axum::serve(listener, router).await?;
    Ok(())
}
