//! Chat responder: appends the user's message, asks the model, appends the
//! reply. A thread must always show a reply to a sent message, so LLM
//! failures degrade to a fixed apology instead of erroring the request.

use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::message::{ChatMessage, Role};
use crate::store::Store;
use crate::summarize::Summarizer;

pub const APOLOGY_UNCONFIGURED: &str = "I'm sorry, but I need a valid API key to respond. \
Please configure the AI service in the server settings.";

pub const APOLOGY_GENERIC: &str = "I'm sorry, I encountered an error while processing your \
request. Please try again.";

/// Appends the user message and an assistant reply to the thread and returns
/// both, in order.
pub async fn respond(
    store: &Arc<dyn Store>,
    summarizer: &Arc<dyn Summarizer>,
    thread_id: Uuid,
    context: &str,
    message: &str,
) -> Result<(ChatMessage, ChatMessage), AppError> {
    let user_message = store.append_message(thread_id, Role::User, message).await?;

    let reply = match summarizer.answer(context, message).await {
        Ok(text) => text,
        Err(e) if e.is_configuration() => {
            warn!("Chat reply degraded for thread {thread_id}: {e}");
            APOLOGY_UNCONFIGURED.to_string()
        }
        Err(e) => {
            error!("Chat reply failed for thread {thread_id}: {e}");
            APOLOGY_GENERIC.to_string()
        }
    };

    let assistant_message = store
        .append_message(thread_id, Role::Assistant, &reply)
        .await?;
    Ok((user_message, assistant_message))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::models::item::{Language, SourceKind, SummaryBundle};
    use crate::store::MemoryStore;
    use crate::summarize::LlmError;

    enum Behavior {
        Succeed,
        MissingKey,
        Fail,
    }

    struct MockSummarizer {
        behavior: Behavior,
    }

    #[async_trait]
    impl Summarizer for MockSummarizer {
        async fn summarize_content(
            &self,
            _kind: SourceKind,
            _title: &str,
            _url: &str,
            _body: &str,
        ) -> Result<SummaryBundle, LlmError> {
            unimplemented!("not exercised by responder tests")
        }

        async fn render_language(
            &self,
            _base_summary: &str,
            _language: Language,
        ) -> Result<SummaryBundle, LlmError> {
            unimplemented!("not exercised by responder tests")
        }

        async fn summarize_note(&self, _html: &str) -> Result<SummaryBundle, LlmError> {
            unimplemented!("not exercised by responder tests")
        }

        async fn answer(&self, _context: &str, question: &str) -> Result<String, LlmError> {
            match self.behavior {
                Behavior::Succeed => Ok(format!("Answer to: {question}")),
                Behavior::MissingKey => Err(LlmError::MissingApiKey),
                Behavior::Fail => Err(LlmError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                }),
            }
        }
    }

    async fn run(behavior: Behavior) -> (Arc<dyn Store>, Uuid, ChatMessage, ChatMessage) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let summarizer: Arc<dyn Summarizer> = Arc::new(MockSummarizer { behavior });
        let thread_id = Uuid::new_v4();
        let (user, assistant) = respond(&store, &summarizer, thread_id, "context", "a question")
            .await
            .unwrap();
        (store, thread_id, user, assistant)
    }

    #[tokio::test]
    async fn test_both_messages_appended_in_order() {
        let (store, thread_id, user, assistant) = run(Behavior::Succeed).await;
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "a question");
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, "Answer to: a question");

        let listed = store.list_messages(thread_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, user.id);
        assert_eq!(listed[1].id, assistant.id);
    }

    #[tokio::test]
    async fn test_llm_failure_still_produces_a_reply() {
        let (_, _, _, assistant) = run(Behavior::Fail).await;
        assert_eq!(assistant.content, APOLOGY_GENERIC);
    }

    #[tokio::test]
    async fn test_missing_credentials_get_configuration_apology() {
        let (_, _, _, assistant) = run(Behavior::MissingKey).await;
        assert_eq!(assistant.content, APOLOGY_UNCONFIGURED);
    }
}
