//! Inbox Assist: local email triage with drafts and Q&A.

pub mod assistant;
pub mod config;
pub mod error;
pub mod inbox;
pub mod pipeline;
pub mod qa;
pub mod repl;
pub mod store;

pub use assistant::Assistant;
pub use config::AppConfig;
pub use error::{Error, Result};
