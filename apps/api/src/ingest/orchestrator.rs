//! Ingestion orchestrator — the two-phase job at the heart of the service.
//!
//! Phase 1 is synchronous: insert a placeholder row and hand it back to the
//! caller. Phase 2 runs as a detached task: fetch, summarize, write back.
//! Deletion of the target row is the only cancellation primitive; every
//! checkpoint between awaited steps re-checks that the row still exists, and
//! all write-backs are no-ops against a deleted id, so a delete can never be
//! resurrected by a lagging pipeline.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::errors::AppError;
use crate::fetch::{ContentFetcher, FetchedContent};
use crate::models::item::{ContentItem, ItemStatus, Language, SourceKind, SummaryBundle};
use crate::store::{ItemPatch, NewItem, Store};
use crate::summarize::Summarizer;

/// Written over rows left `processing` by a previous instance. A restart
/// abandons their phase-2 tasks, so without the sweep they would stay
/// `processing` forever.
pub const RESTART_SWEEP_MESSAGE: &str =
    "Processing was interrupted by a server restart. Please submit the URL again.";

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn ContentFetcher>,
    summarizer: Arc<dyn Summarizer>,
    /// Tag stamped onto rows this instance claims.
    worker_id: String,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn ContentFetcher>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            store,
            fetcher,
            summarizer,
            worker_id: format!("api-{}", Uuid::new_v4()),
        }
    }

    /// Phase 1: validate, insert the placeholder, schedule phase 2, return.
    ///
    /// The returned record is committed before the task is spawned, so a
    /// polling client always sees it. The declared kind is trusted;
    /// kind-specific checks happen inside the fetcher.
    pub async fn submit(&self, url: &str, kind: SourceKind) -> Result<ContentItem, AppError> {
        let parsed =
            Url::parse(url).map_err(|e| AppError::Validation(format!("Invalid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Validation(
                "URL must use the http or https scheme".to_string(),
            ));
        }

        let item = self
            .store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: url.to_string(),
                kind,
            })
            .await?;
        info!("Created item {} for {url}", item.id);

        let this = self.clone();
        let id = item.id;
        let url = url.to_string();
        tokio::spawn(async move {
            this.process(id, &url, kind).await;
        });

        Ok(item)
    }

    /// Phase 2. Runs detached from the request that triggered `submit`; all
    /// outcomes are written to the store, never returned to a caller.
    pub(crate) async fn process(&self, id: Uuid, url: &str, kind: SourceKind) {
        if !self.claim(id).await {
            return;
        }

        let fetched = match self.fetcher.fetch(url, kind).await {
            Ok(content) => content,
            Err(e) => return self.finish_failed(id, &e.to_string()).await,
        };
        if !self.is_live(id).await {
            debug!("Item {id} deleted during fetch; discarding result");
            return;
        }

        let bundle = match self
            .summarizer
            .summarize_content(kind, &fetched.title, url, &fetched.body)
            .await
        {
            Ok(bundle) => bundle,
            Err(e) => return self.finish_failed(id, &e.to_string()).await,
        };
        if !self.is_live(id).await {
            debug!("Item {id} deleted during summarization; discarding result");
            return;
        }

        self.commit_success(id, fetched, bundle).await;
    }

    /// First checkpoint: re-read the row and stamp it with this instance's
    /// worker id in one update. `None` means the row was deleted before
    /// processing started.
    async fn claim(&self, id: Uuid) -> bool {
        let patch = ItemPatch {
            worker_id: Some(self.worker_id.clone()),
            ..Default::default()
        };
        match self.store.update_item(id, patch).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                debug!("Item {id} deleted before processing started");
                false
            }
            Err(e) => {
                error!("Failed to claim item {id}: {e}");
                false
            }
        }
    }

    async fn is_live(&self, id: Uuid) -> bool {
        match self.store.get_item(id).await {
            Ok(item) => item.is_some(),
            Err(e) => {
                error!("Existence check for item {id} failed: {e}");
                false
            }
        }
    }

    /// Terminal success: all result fields and the status flip in one update.
    async fn commit_success(&self, id: Uuid, fetched: FetchedContent, bundle: SummaryBundle) {
        let patch = ItemPatch {
            title: Some(fetched.title),
            summary: Some(bundle.summary),
            one_line_summary: Some(bundle.one_line_summary),
            key_points: Some(bundle.key_points),
            cover_image: fetched.cover_image,
            metadata: fetched.metadata,
            status: Some(ItemStatus::Completed),
            ..Default::default()
        };
        match self.store.update_item(id, patch).await {
            Ok(Some(_)) => info!("Item {id} completed"),
            Ok(None) => debug!("Item {id} deleted before results were committed"),
            Err(e) => error!("Failed to commit results for item {id}: {e}"),
        }
    }

    /// Terminal failure: the human-readable reason goes in the summary field,
    /// which is the slot a reader would otherwise see content in. Title and
    /// key points keep their placeholder/unset values.
    async fn finish_failed(&self, id: Uuid, message: &str) {
        warn!("Item {id} failed: {message}");
        let patch = ItemPatch {
            status: Some(ItemStatus::Failed),
            summary: Some(message.to_string()),
            ..Default::default()
        };
        match self.store.update_item(id, patch).await {
            Ok(Some(_)) => {}
            Ok(None) => debug!("Item {id} deleted before failure was recorded"),
            Err(e) => error!("Failed to record failure for item {id}: {e}"),
        }
    }

    /// Bounded polling read: re-reads until the status leaves `processing`,
    /// then one final unconditional read whose result is returned as-is — a
    /// still-`processing` record after the bound means "done waiting", not an
    /// error.
    pub async fn poll_until_settled(
        &self,
        id: Uuid,
        attempts: u32,
        interval: Duration,
    ) -> Result<Option<ContentItem>, AppError> {
        for _ in 0..attempts {
            match self.store.get_item(id).await? {
                None => return Ok(None),
                Some(item) if item.status.is_terminal() => return Ok(Some(item)),
                Some(_) => tokio::time::sleep(interval).await,
            }
        }
        self.store.get_item(id).await
    }

    /// On-demand language variant. Serves from the store when the slot is
    /// already populated; otherwise one summarization pass over the base
    /// summary, persisted as a unit. The write silently no-ops if the item
    /// vanished mid-call.
    pub async fn generate_language_variant(
        &self,
        id: Uuid,
        language: Language,
    ) -> Result<SummaryBundle, AppError> {
        let item = self
            .store
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {id} not found")))?;
        match item.status {
            ItemStatus::Completed => {}
            ItemStatus::Processing => {
                return Err(AppError::UnprocessableEntity(
                    "Item is still processing; its summary is not ready to translate".to_string(),
                ))
            }
            ItemStatus::Failed => {
                return Err(AppError::UnprocessableEntity(
                    "Item failed to process; there is no summary to translate".to_string(),
                ))
            }
        }

        if let Some(existing) = self.store.get_language_variant(id, language).await? {
            debug!("Serving cached {language} variant for item {id}");
            return Ok(existing);
        }

        let bundle = self
            .summarizer
            .render_language(&item.summary, language)
            .await
            .map_err(|e| AppError::Llm(format!("Failed to generate {language} summary: {e}")))?;

        if !self.store.put_language_variant(id, language, &bundle).await? {
            debug!("Item {id} deleted while generating {language} variant");
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::fetch::FetchError;
    use crate::models::item::{PLACEHOLDER_SUMMARY, PLACEHOLDER_TITLE};
    use crate::store::{ContentStore, MemoryStore};
    use crate::summarize::LlmError;

    #[derive(Clone, Copy)]
    enum FetchBehavior {
        Succeed,
        FailBadGateway,
    }

    struct MockFetcher {
        behavior: FetchBehavior,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ContentFetcher for MockFetcher {
        async fn fetch(&self, url: &str, _kind: SourceKind) -> Result<FetchedContent, FetchError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.behavior {
                FetchBehavior::Succeed => Ok(FetchedContent {
                    title: "Fetched Title".to_string(),
                    body: "body text about the topic".to_string(),
                    cover_image: Some("https://example.com/cover.jpg".to_string()),
                    metadata: None,
                }),
                FetchBehavior::FailBadGateway => Err(FetchError::Status {
                    status: 502,
                    url: url.to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct MockSummarizer {
        content_calls: AtomicUsize,
        render_calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Summarizer for MockSummarizer {
        async fn summarize_content(
            &self,
            _kind: SourceKind,
            title: &str,
            _url: &str,
            _body: &str,
        ) -> Result<SummaryBundle, LlmError> {
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::Api {
                    status: 500,
                    message: "model unavailable".to_string(),
                });
            }
            Ok(SummaryBundle {
                summary: format!("Summary of {title}"),
                one_line_summary: "One line.".to_string(),
                key_points: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            })
        }

        async fn render_language(
            &self,
            base_summary: &str,
            language: Language,
        ) -> Result<SummaryBundle, LlmError> {
            self.render_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SummaryBundle {
                summary: format!("[{}] {base_summary}", language.code()),
                one_line_summary: format!("[{}] one line", language.code()),
                key_points: vec![format!("[{}] point", language.code())],
            })
        }

        async fn summarize_note(&self, _html: &str) -> Result<SummaryBundle, LlmError> {
            unimplemented!("not exercised by orchestrator tests")
        }

        async fn answer(&self, _context: &str, _question: &str) -> Result<String, LlmError> {
            unimplemented!("not exercised by orchestrator tests")
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        summarizer: Arc<MockSummarizer>,
        ingestor: Ingestor,
    }

    fn harness(behavior: FetchBehavior, gate: Option<Arc<Notify>>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let summarizer = Arc::new(MockSummarizer::default());
        let ingestor = Ingestor::new(
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::new(MockFetcher { behavior, gate }),
            Arc::clone(&summarizer) as Arc<dyn Summarizer>,
        );
        Harness {
            store,
            summarizer,
            ingestor,
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_malformed_and_non_http_urls() {
        let h = harness(FetchBehavior::Succeed, None);
        assert!(matches!(
            h.ingestor.submit("not a url", SourceKind::Website).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            h.ingestor
                .submit("ftp://example.com/file", SourceKind::Website)
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(h.store.list_items().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_placeholder_visible_before_fetch_completes() {
        let gate = Arc::new(Notify::new());
        let h = harness(FetchBehavior::Succeed, Some(Arc::clone(&gate)));

        let item = h
            .ingestor
            .submit("https://example.com/article", SourceKind::Website)
            .await
            .unwrap();

        // The fetcher is still parked on the gate; the placeholder must
        // already be readable.
        let seen = h.store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(seen.status, ItemStatus::Processing);
        assert_eq!(seen.title, PLACEHOLDER_TITLE);
        assert_eq!(seen.summary, PLACEHOLDER_SUMMARY);

        gate.notify_one();
        let settled = h
            .ingestor
            .poll_until_settled(item.id, 50, Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settled.status, ItemStatus::Completed);
        assert_eq!(settled.title, "Fetched Title");
        assert_eq!(settled.summary, "Summary of Fetched Title");
        assert_eq!(settled.key_points.as_ref().map(Vec::len), Some(3));
        assert_eq!(
            settled.cover_image.as_deref(),
            Some("https://example.com/cover.jpg")
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_lands_reason_in_summary() {
        let h = harness(FetchBehavior::FailBadGateway, None);
        let item = h
            .store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com/broken".to_string(),
                kind: SourceKind::Website,
            })
            .await
            .unwrap();

        h.ingestor
            .process(item.id, "https://example.com/broken", SourceKind::Website)
            .await;

        let failed = h.store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(failed.status, ItemStatus::Failed);
        let expected = FetchError::Status {
            status: 502,
            url: "https://example.com/broken".to_string(),
        }
        .to_string();
        assert_eq!(failed.summary, expected);
        // Everything except status and summary keeps its pre-failure value.
        assert_eq!(failed.title, PLACEHOLDER_TITLE);
        assert!(failed.key_points.is_none());
        assert!(failed.cover_image.is_none());
    }

    #[tokio::test]
    async fn test_summarizer_failure_lands_reason_in_summary() {
        let store = Arc::new(MemoryStore::new());
        let summarizer = Arc::new(MockSummarizer {
            fail: true,
            ..Default::default()
        });
        let ingestor = Ingestor::new(
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::new(MockFetcher {
                behavior: FetchBehavior::Succeed,
                gate: None,
            }),
            Arc::clone(&summarizer) as Arc<dyn Summarizer>,
        );
        let item = store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com/a".to_string(),
                kind: SourceKind::Website,
            })
            .await
            .unwrap();

        ingestor
            .process(item.id, "https://example.com/a", SourceKind::Website)
            .await;

        let failed = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(failed.status, ItemStatus::Failed);
        assert!(failed.summary.contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_deletion_during_fetch_preempts_writeback() {
        let gate = Arc::new(Notify::new());
        let h = harness(FetchBehavior::Succeed, Some(Arc::clone(&gate)));
        let item = h
            .store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com/gone".to_string(),
                kind: SourceKind::Website,
            })
            .await
            .unwrap();

        let ingestor = h.ingestor.clone();
        let id = item.id;
        let task = tokio::spawn(async move {
            ingestor
                .process(id, "https://example.com/gone", SourceKind::Website)
                .await;
        });

        h.store.delete_item(item.id).await.unwrap();
        gate.notify_one();
        task.await.unwrap();

        // The id stays gone; nothing resurrected it.
        assert!(h.store.get_item(item.id).await.unwrap().is_none());
        assert!(h.store.list_items().await.unwrap().is_empty());
        // The summarizer was never consulted for a deleted item.
        assert_eq!(h.summarizer.content_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deletion_before_processing_skips_fetch() {
        let h = harness(FetchBehavior::Succeed, None);
        let id = Uuid::new_v4();
        // Never inserted: claim fails, pipeline stops before any I/O.
        h.ingestor
            .process(id, "https://example.com/x", SourceKind::Website)
            .await;
        assert_eq!(h.summarizer.content_calls.load(Ordering::SeqCst), 0);
        assert!(h.store.get_item(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_language_variant_generated_once_then_cached() {
        let h = harness(FetchBehavior::Succeed, None);
        let item = h
            .store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com/a".to_string(),
                kind: SourceKind::Website,
            })
            .await
            .unwrap();
        h.ingestor
            .process(item.id, "https://example.com/a", SourceKind::Website)
            .await;

        let first = h
            .ingestor
            .generate_language_variant(item.id, Language::French)
            .await
            .unwrap();
        let second = h
            .ingestor
            .generate_language_variant(item.id, Language::French)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(h.summarizer.render_calls.load(Ordering::SeqCst), 1);

        // A different language gets its own slot and its own upstream call.
        h.ingestor
            .generate_language_variant(item.id, Language::Japanese)
            .await
            .unwrap();
        assert_eq!(h.summarizer.render_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_language_variant_rejected_until_completed() {
        let h = harness(FetchBehavior::Succeed, None);
        let item = h
            .store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com/a".to_string(),
                kind: SourceKind::Website,
            })
            .await
            .unwrap();

        let err = h
            .ingestor
            .generate_language_variant(item.id, Language::French)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
        assert_eq!(h.summarizer.render_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_language_variant_not_found_after_delete() {
        let h = harness(FetchBehavior::Succeed, None);
        let item = h
            .ingestor
            .submit("https://example.com/a", SourceKind::Website)
            .await
            .unwrap();
        h.store.delete_item(item.id).await.unwrap();

        let err = h
            .ingestor
            .generate_language_variant(item.id, Language::French)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_settled_returns_final_read_when_bound_exhausted() {
        let gate = Arc::new(Notify::new());
        let h = harness(FetchBehavior::Succeed, Some(gate));
        let item = h
            .ingestor
            .submit("https://example.com/slow", SourceKind::Website)
            .await
            .unwrap();

        // The gate is never released: the item stays processing, and the
        // poller reports that rather than erroring.
        let result = h
            .ingestor
            .poll_until_settled(item.id, 3, Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.status, ItemStatus::Processing);
    }
}
