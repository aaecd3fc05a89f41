use std::sync::Arc;

use crate::config::Config;
use crate::ingest::Ingestor;
use crate::store::Store;
use crate::summarize::Summarizer;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// The store and summarizer are constructed once at startup and injected as
/// trait objects, so the backing database (Postgres vs. in-memory) and the
/// LLM implementation are swappable behind one seam.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub summarizer: Arc<dyn Summarizer>,
    pub ingestor: Ingestor,
    /// Loaded once at startup; handlers currently take everything they need
    /// from the services above, but the config rides along for future knobs.
    #[allow(dead_code)]
    pub config: Config,
}
