pub mod client;
pub mod prompts;
pub mod service;

pub use client::{LlmClient, LlmError};
pub use service::{LlmSummarizer, Summarizer};
