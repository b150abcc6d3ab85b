//! File-backed persistence: one JSON document per store.

pub mod drafts;
pub(crate) mod file;
pub mod processed;
pub mod templates;

pub use drafts::DraftStore;
pub use processed::ProcessedStateStore;
pub use templates::{PromptTemplate, TemplateStore};
