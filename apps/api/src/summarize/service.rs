//! Summarization service: the trait the orchestrator and chat responder are
//! written against, plus the production implementation on top of `LlmClient`.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::models::item::{Language, SourceKind, SummaryBundle};
use crate::summarize::client::{Completion, LlmClient, LlmError};
use crate::summarize::prompts;

/// Characters of source text fed into a single prompt.
const PROMPT_BODY_LIMIT: usize = 8000;
/// Key-point lists are capped regardless of how many lines the model returns.
const MAX_KEY_POINTS: usize = 5;

const SUMMARY_MAX_TOKENS: u32 = 500;
const ONE_LINE_MAX_TOKENS: u32 = 50;
const KEY_POINTS_MAX_TOKENS: u32 = 200;
const NOTE_MAX_TOKENS: u32 = 1000;
const ANSWER_MAX_TOKENS: u32 = 1000;

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produces the base English summary triple for freshly fetched content.
    async fn summarize_content(
        &self,
        kind: SourceKind,
        title: &str,
        url: &str,
        body: &str,
    ) -> Result<SummaryBundle, LlmError>;

    /// Renders an already-produced summary into the target language.
    async fn render_language(
        &self,
        base_summary: &str,
        language: Language,
    ) -> Result<SummaryBundle, LlmError>;

    /// Summarizes a user-written note (rich-text HTML).
    async fn summarize_note(&self, html: &str) -> Result<SummaryBundle, LlmError>;

    /// Answers a question grounded in the given context text.
    async fn answer(&self, context: &str, question: &str) -> Result<String, LlmError>;
}

pub struct LlmSummarizer {
    client: LlmClient,
    summary_model: String,
    chat_model: String,
    summary_temperature: f32,
    chat_temperature: f32,
}

impl LlmSummarizer {
    pub fn new(
        client: LlmClient,
        summary_model: String,
        chat_model: String,
        summary_temperature: f32,
        chat_temperature: f32,
    ) -> Self {
        Self {
            client,
            summary_model,
            chat_model,
            summary_temperature,
            chat_temperature,
        }
    }

    fn summary_completion<'a>(&'a self, system: &'a str, prompt: &'a str, max_tokens: u32)
        -> Completion<'a> {
        Completion {
            model: &self.summary_model,
            system,
            prompt,
            max_tokens,
            temperature: self.summary_temperature,
        }
    }

    /// Runs the three summary calls concurrently and assembles the bundle.
    async fn triple(
        &self,
        summary_system: &str,
        one_line_system: &str,
        key_points_system: &str,
        summary_prompt: &str,
        one_line_prompt: &str,
        key_points_prompt: &str,
    ) -> Result<SummaryBundle, LlmError> {
        let (summary, one_line_summary, key_points_text) = tokio::try_join!(
            self.client
                .complete(self.summary_completion(summary_system, summary_prompt, SUMMARY_MAX_TOKENS)),
            self.client.complete(self.summary_completion(
                one_line_system,
                one_line_prompt,
                ONE_LINE_MAX_TOKENS
            )),
            self.client.complete(self.summary_completion(
                key_points_system,
                key_points_prompt,
                KEY_POINTS_MAX_TOKENS
            )),
        )?;

        Ok(SummaryBundle {
            summary,
            one_line_summary,
            key_points: parse_key_points(&key_points_text),
        })
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize_content(
        &self,
        kind: SourceKind,
        title: &str,
        url: &str,
        body: &str,
    ) -> Result<SummaryBundle, LlmError> {
        let body = clip(body, PROMPT_BODY_LIMIT);
        let (summary_tpl, one_line_tpl, key_points_tpl) = match kind {
            SourceKind::Website => (
                prompts::WEB_SUMMARY_PROMPT,
                prompts::WEB_ONE_LINE_PROMPT,
                prompts::WEB_KEY_POINTS_PROMPT,
            ),
            SourceKind::Youtube => (
                prompts::VIDEO_SUMMARY_PROMPT,
                prompts::VIDEO_ONE_LINE_PROMPT,
                prompts::VIDEO_KEY_POINTS_PROMPT,
            ),
        };
        let fill = |tpl: &str| {
            tpl.replace("{title}", title)
                .replace("{url}", url)
                .replace("{body}", body)
        };

        debug!("Summarizing {} content from {url}", kind.as_str());
        self.triple(
            prompts::SUMMARY_SYSTEM,
            prompts::ONE_LINE_SYSTEM,
            prompts::KEY_POINTS_SYSTEM,
            &fill(summary_tpl),
            &fill(one_line_tpl),
            &fill(key_points_tpl),
        )
        .await
    }

    async fn render_language(
        &self,
        base_summary: &str,
        language: Language,
    ) -> Result<SummaryBundle, LlmError> {
        let body = clip(base_summary, PROMPT_BODY_LIMIT);
        let fill = |tpl: &str| {
            tpl.replace("{instruction}", language.instruction())
                .replace("{language}", language.display_name())
                .replace("{body}", body)
        };
        let summary_system = format!(
            "{} Respond in {}.",
            prompts::SUMMARY_SYSTEM,
            language.display_name()
        );
        let one_line_system = format!(
            "{} Respond in {}.",
            prompts::ONE_LINE_SYSTEM,
            language.display_name()
        );
        let key_points_system = format!(
            "{} Respond in {}.",
            prompts::KEY_POINTS_SYSTEM,
            language.display_name()
        );

        debug!("Rendering summary in {}", language.code());
        self.triple(
            &summary_system,
            &one_line_system,
            &key_points_system,
            &fill(prompts::LANGUAGE_SUMMARY_PROMPT),
            &fill(prompts::LANGUAGE_ONE_LINE_PROMPT),
            &fill(prompts::LANGUAGE_KEY_POINTS_PROMPT),
        )
        .await
    }

    async fn summarize_note(&self, html: &str) -> Result<SummaryBundle, LlmError> {
        let text = strip_html(html);
        let prompt = prompts::NOTE_SUMMARY_PROMPT.replace("{body}", clip(&text, PROMPT_BODY_LIMIT));
        let raw = self
            .client
            .complete(Completion {
                model: &self.summary_model,
                system: prompts::SUMMARY_SYSTEM,
                prompt: &prompt,
                max_tokens: NOTE_MAX_TOKENS,
                temperature: self.summary_temperature,
            })
            .await?;
        Ok(parse_note_bundle(&raw))
    }

    async fn answer(&self, context: &str, question: &str) -> Result<String, LlmError> {
        let prompt = prompts::ANSWER_PROMPT
            .replace("{context}", context)
            .replace("{question}", question);
        self.client
            .complete(Completion {
                model: &self.chat_model,
                system: prompts::CHAT_SYSTEM,
                prompt: &prompt,
                max_tokens: ANSWER_MAX_TOKENS,
                temperature: self.chat_temperature,
            })
            .await
    }
}

lazy_static! {
    static ref LIST_MARKER: Regex = Regex::new(r"^\s*(?:\d+[.)]\s*|[-*•]\s+)").expect("valid regex");
}

/// Parses a free-text numbered (or bulleted) list into at most five entries.
pub fn parse_key_points(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| LIST_MARKER.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(MAX_KEY_POINTS)
        .collect()
}

/// Truncates on a char boundary at or below `max_chars` bytes.
fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").expect("valid regex");
}

/// Reduces rich-text HTML to plain text: tags dropped, the common entities
/// decoded, whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteSummaryJson {
    summary: String,
    one_line_summary: String,
    #[serde(default)]
    key_points: Vec<String>,
}

/// Parses the note-summary JSON response, falling back to a best-effort split
/// of the raw text when the model ignored the format instructions.
fn parse_note_bundle(raw: &str) -> SummaryBundle {
    let cleaned = strip_json_fences(raw);
    match serde_json::from_str::<NoteSummaryJson>(cleaned) {
        Ok(parsed) => SummaryBundle {
            summary: parsed.summary,
            one_line_summary: parsed.one_line_summary,
            key_points: parsed.key_points.into_iter().take(MAX_KEY_POINTS).collect(),
        },
        Err(_) => SummaryBundle {
            summary: raw.to_string(),
            one_line_summary: raw
                .split('.')
                .next()
                .map(|s| format!("{}.", s.trim()))
                .unwrap_or_else(|| raw.to_string()),
            key_points: raw
                .lines()
                .filter(|line| line.trim_start().starts_with('-'))
                .map(|line| line.trim_start().trim_start_matches('-').trim().to_string())
                .take(MAX_KEY_POINTS)
                .collect(),
        },
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_points_numbered() {
        let text = "1. First point\n2. Second point\n3) Third point";
        assert_eq!(
            parse_key_points(text),
            vec!["First point", "Second point", "Third point"]
        );
    }

    #[test]
    fn test_parse_key_points_bulleted_and_capped() {
        let text = "- one\n- two\n* three\n• four\n- five\n- six\n- seven";
        let points = parse_key_points(text);
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], "one");
        assert_eq!(points[4], "five");
    }

    #[test]
    fn test_parse_key_points_skips_blank_lines() {
        let text = "1. Alpha\n\n   \n2. Beta";
        assert_eq!(parse_key_points(text), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(clip(text, 5), "héllo");
        assert_eq!(clip(text, 100), text);
    }

    #[test]
    fn test_strip_html() {
        let html = "<p>Hello&nbsp;<b>world</b> &amp; friends</p>";
        assert_eq!(strip_html(html), "Hello world & friends");
    }

    #[test]
    fn test_parse_note_bundle_json() {
        let raw = r#"```json
{"summary": "Long form.", "oneLineSummary": "Short.", "keyPoints": ["a", "b"]}
```"#;
        let bundle = parse_note_bundle(raw);
        assert_eq!(bundle.summary, "Long form.");
        assert_eq!(bundle.one_line_summary, "Short.");
        assert_eq!(bundle.key_points, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_note_bundle_fallback() {
        let raw = "A plain answer. More detail follows.\n- first\n- second";
        let bundle = parse_note_bundle(raw);
        assert_eq!(bundle.summary, raw);
        assert_eq!(bundle.one_line_summary, "A plain answer.");
        assert_eq!(bundle.key_points, vec!["first", "second"]);
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }
}
