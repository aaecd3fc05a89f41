pub mod handlers;
pub mod orchestrator;

pub use orchestrator::{Ingestor, RESTART_SWEEP_MESSAGE};
