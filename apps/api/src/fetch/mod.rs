//! Content fetchers: given a URL and its declared kind, produce title, body
//! text, an optional cover image, and optional source metadata.

pub mod video;
pub mod website;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::item::SourceKind;

pub use video::VideoFetcher;
pub use website::WebsiteFetcher;

/// What a fetcher hands to the summarization step.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub title: String,
    pub body: String,
    pub cover_image: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Fetch failures. These messages are user-visible: on a failed ingestion the
/// rendered error lands in the item's summary field.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch the page: {0}")]
    Http(#[from] reqwest::Error),

    #[error("The page at {url} responded with HTTP {status}")]
    Status { status: u16, url: String },

    #[error("Could not recognize a video id in {0}")]
    UnrecognizedVideoUrl(String),

    #[error("No subtitles are available for this video. Please try a different video that has captions enabled.")]
    NoSubtitles,

    #[error("Subtitle extraction failed: {0}")]
    Tool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dispatch seam the orchestrator is written against.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, kind: SourceKind) -> Result<FetchedContent, FetchError>;
}

/// Production fetcher pair: one per source kind.
pub struct SourceFetchers {
    website: WebsiteFetcher,
    video: VideoFetcher,
}

impl SourceFetchers {
    pub fn new(website: WebsiteFetcher, video: VideoFetcher) -> Self {
        Self { website, video }
    }
}

#[async_trait]
impl ContentFetcher for SourceFetchers {
    async fn fetch(&self, url: &str, kind: SourceKind) -> Result<FetchedContent, FetchError> {
        match kind {
            SourceKind::Website => self.website.fetch(url).await,
            SourceKind::Youtube => self.video.fetch(url).await,
        }
    }
}
