use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
///
/// Only `PORT` has a hard parse requirement; everything else degrades: without
/// `DATABASE_URL` the server runs on the in-memory store, and without
/// `OPENAI_API_KEY` summarization calls fail with a "not configured" error at
/// call time rather than at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub summary_model: String,
    pub chat_model: String,
    pub summary_temperature: f32,
    pub chat_temperature: f32,
    pub yt_dlp_path: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            summary_model: std::env::var("OPENAI_MODEL_SUMMARY")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            chat_model: std::env::var("OPENAI_MODEL_CHAT")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            summary_temperature: float_env("OPENAI_TEMPERATURE_SUMMARY", 0.3)?,
            chat_temperature: float_env("OPENAI_TEMPERATURE_CHAT", 0.7)?,
            yt_dlp_path: std::env::var("YT_DLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn float_env(key: &str, default: f32) -> Result<f32> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<f32>()
            .with_context(|| format!("{key} must be a number")),
        Err(_) => Ok(default),
    }
}
