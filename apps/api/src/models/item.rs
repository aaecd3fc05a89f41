use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Title shown on a freshly created item until ingestion completes.
pub const PLACEHOLDER_TITLE: &str = "Processing...";
/// Summary shown on a freshly created item until ingestion completes.
pub const PLACEHOLDER_SUMMARY: &str = "Processing content...";

/// What kind of source an item was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Website,
    Youtube,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Website => "website",
            SourceKind::Youtube => "youtube",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "website" => Ok(SourceKind::Website),
            "youtube" => Ok(SourceKind::Youtube),
            other => Err(format!("unknown source kind '{other}'")),
        }
    }
}

/// Lifecycle status of an item. Starts at `Processing` and moves exactly once
/// to `Completed` or `Failed`; terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ItemStatus::Processing),
            "completed" => Ok(ItemStatus::Completed),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(format!("unknown item status '{other}'")),
        }
    }
}

/// Languages a summary can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "es-eu")]
    EuropeanSpanish,
    #[serde(rename = "pt-eu")]
    EuropeanPortuguese,
    #[serde(rename = "es-latam")]
    LatamSpanish,
    #[serde(rename = "pt-latam")]
    LatamPortuguese,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "th")]
    Thai,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::English,
        Language::Chinese,
        Language::EuropeanSpanish,
        Language::EuropeanPortuguese,
        Language::LatamSpanish,
        Language::LatamPortuguese,
        Language::German,
        Language::French,
        Language::Japanese,
        Language::Thai,
    ];

    /// The wire/storage code for this language.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
            Language::EuropeanSpanish => "es-eu",
            Language::EuropeanPortuguese => "pt-eu",
            Language::LatamSpanish => "es-latam",
            Language::LatamPortuguese => "pt-latam",
            Language::German => "de",
            Language::French => "fr",
            Language::Japanese => "ja",
            Language::Thai => "th",
        }
    }

    /// English display name, interpolated into prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Chinese => "Chinese",
            Language::EuropeanSpanish => "European Spanish",
            Language::EuropeanPortuguese => "European Portuguese",
            Language::LatamSpanish => "Latin American Spanish",
            Language::LatamPortuguese => "Latin American Portuguese",
            Language::German => "German",
            Language::French => "French",
            Language::Japanese => "Japanese",
            Language::Thai => "Thai",
        }
    }

    /// Instruction prefix written in the target language itself, which steers
    /// the model more reliably than an English-only request.
    pub fn instruction(&self) -> &'static str {
        match self {
            Language::English => "Please use English to",
            Language::Chinese => "请用中文",
            Language::EuropeanSpanish => "Por favor usa español europeo para",
            Language::EuropeanPortuguese => "Por favor usa português europeu para",
            Language::LatamSpanish => "Por favor usa español latinoamericano para",
            Language::LatamPortuguese => "Por favor usa português latinoamericano para",
            Language::German => "Bitte verwende Deutsch, um",
            Language::French => "Veuillez utiliser le français pour",
            Language::Japanese => "日本語を使用して",
            Language::Thai => "กรุณาใช้ภาษาไทยเพื่อ",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .iter()
            .find(|l| l.code() == s)
            .copied()
            .ok_or_else(|| format!("unknown language code '{s}'"))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A summary triple: the long summary, the one-liner, and 3-5 key points.
/// Stored as a unit — a language slot is either absent or fully set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBundle {
    pub summary: String,
    pub one_line_summary: String,
    pub key_points: Vec<String>,
}

/// A tracked unit of ingested content with its lifecycle status, base summary
/// fields, and lazily generated per-language variants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    pub source_url: String,
    pub kind: SourceKind,
    pub status: ItemStatus,
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_line_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Per-language summary variants keyed by language code.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub languages: BTreeMap<Language, SummaryBundle>,
    /// Instance tag set by the worker that claimed phase 2; used for orphan
    /// detection after a restart. Not exposed over the API.
    #[serde(skip_serializing)]
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `items` row as stored in Postgres.
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub source_url: String,
    pub kind: String,
    pub status: String,
    pub title: String,
    pub summary: String,
    pub one_line_summary: Option<String>,
    pub key_points: Option<Value>,
    pub cover_image: Option<String>,
    pub metadata: Option<Value>,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `item_languages` row as stored in Postgres.
#[derive(Debug, Clone, FromRow)]
pub struct ItemLanguageRow {
    pub item_id: Uuid,
    pub language: String,
    pub summary: String,
    pub one_line_summary: String,
    pub key_points: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes_round_trip() {
        for lang in Language::ALL {
            assert_eq!(lang.code().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn test_language_rejects_unknown_code() {
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_serde_uses_code() {
        let json = serde_json::to_string(&Language::EuropeanSpanish).unwrap();
        assert_eq!(json, "\"es-eu\"");
        let back: Language = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Language::EuropeanSpanish);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ItemStatus::Processing.is_terminal());
        assert!(ItemStatus::Completed.is_terminal());
        assert!(ItemStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [ItemStatus::Processing, ItemStatus::Completed, ItemStatus::Failed] {
            assert_eq!(status.as_str().parse::<ItemStatus>().unwrap(), status);
        }
    }
}
