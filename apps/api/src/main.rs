mod chat;
mod collections;
mod config;
mod db;
mod errors;
mod fetch;
mod ingest;
mod items;
mod models;
mod notes;
mod routes;
mod state;
mod store;
mod summarize;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::fetch::{ContentFetcher, SourceFetchers, VideoFetcher, WebsiteFetcher};
use crate::ingest::{Ingestor, RESTART_SWEEP_MESSAGE};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, Store};
use crate::summarize::{LlmClient, LlmSummarizer, Summarizer};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Digest API v{}", env!("CARGO_PKG_VERSION"));

    // Store: Postgres when configured, in-memory otherwise
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    // A restart abandons any in-flight ingestion tasks; settle their rows so
    // nothing stays `processing` with no task behind it.
    let swept = store.fail_orphaned_items(RESTART_SWEEP_MESSAGE).await?;
    if swept > 0 {
        warn!("Marked {swept} orphaned processing item(s) as failed");
    }

    // LLM client + summarization service
    let llm = LlmClient::new(config.openai_api_key.clone(), config.openai_base_url.clone());
    if !llm.is_configured() {
        warn!("OPENAI_API_KEY not set; summarization and chat will report the service as unconfigured");
    }
    let summarizer: Arc<dyn Summarizer> = Arc::new(LlmSummarizer::new(
        llm,
        config.summary_model.clone(),
        config.chat_model.clone(),
        config.summary_temperature,
        config.chat_temperature,
    ));
    info!(
        "Summarizer initialized (summary model: {}, chat model: {})",
        config.summary_model, config.chat_model
    );

    // Content fetchers
    let fetcher: Arc<dyn ContentFetcher> = Arc::new(SourceFetchers::new(
        WebsiteFetcher::new(),
        VideoFetcher::new(config.yt_dlp_path.clone()),
    ));
    info!("Fetchers initialized (yt-dlp: {})", config.yt_dlp_path);

    let ingestor = Ingestor::new(Arc::clone(&store), fetcher, Arc::clone(&summarizer));

    let state = AppState {
        store,
        summarizer,
        ingestor,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
