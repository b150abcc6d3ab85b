//! The `Assistant` facade: the only surface the front-end talks to.
//!
//! Stores are opened once and shared by `Arc`. Processing and draft edits
//! write disjoint documents, so an edited draft is never lost to a rerun.

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::error::{PipelineError, QaError, Result, StoreError, TemplateError};
use crate::inbox::Inbox;
use crate::pipeline::heuristics::HeuristicEngine;
use crate::pipeline::processor::{self, InboxProcessor};
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{Category, Draft, EmailIntelligence, ProcessedEntry, ProcessedState};
use crate::qa::{Answer, QaMatcher};
use crate::store::{DraftStore, ProcessedStateStore, PromptTemplate, TemplateStore};

pub struct Assistant {
    inbox: Arc<Inbox>,
    templates: Arc<TemplateStore>,
    state: Arc<ProcessedStateStore>,
    drafts: Arc<DraftStore>,
    processor: InboxProcessor,
    qa: QaMatcher,
}

impl Assistant {
    /// Load the inbox and open every store at the configured paths, using
    /// the built-in heuristics engine.
    ///
    /// Stored results and drafts that point at emails missing from the inbox
    /// fail with `DataIntegrity`; they are never served or dropped.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: config.data_dir.clone(),
                source,
            })?;

        let inbox = Inbox::load(&config.inbox_path).await?;
        let templates = Arc::new(TemplateStore::open(&config.templates_path).await?);
        let state = Arc::new(ProcessedStateStore::open(&config.state_path).await?);
        let drafts = Arc::new(DraftStore::open(&config.drafts_path).await?);
        check_references(&inbox, &state, &drafts).await?;
        let engine = Arc::new(HeuristicEngine::new(
            RulesEngine::default_rules(),
            Arc::clone(&templates),
        ));

        info!(
            data_dir = %config.data_dir.display(),
            emails = inbox.len(),
            "Assistant ready"
        );
        Ok(Self::new(inbox, templates, state, drafts, engine))
    }

    /// Wire an assistant from already-open parts.
    pub fn new(
        inbox: Inbox,
        templates: Arc<TemplateStore>,
        state: Arc<ProcessedStateStore>,
        drafts: Arc<DraftStore>,
        engine: Arc<dyn EmailIntelligence>,
    ) -> Self {
        let inbox = Arc::new(inbox);
        let processor = InboxProcessor::new(engine, Arc::clone(&state));
        let qa = QaMatcher::new(
            Arc::clone(&inbox),
            Arc::clone(&templates),
            Arc::clone(&state),
            Arc::clone(&drafts),
        );
        Self {
            inbox,
            templates,
            state,
            drafts,
            processor,
            qa,
        }
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    // ── Processing ──────────────────────────────────────────────────

    /// Process the whole inbox and replace the stored state.
    pub async fn process_inbox(&self) -> std::result::Result<ProcessedState, PipelineError> {
        self.processor.process_all(&self.inbox).await
    }

    pub async fn processed_entry(&self, email_id: &str) -> std::result::Result<ProcessedEntry, StoreError> {
        self.state.get(email_id).await
    }

    pub async fn last_run(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.state.run_timestamp().await
    }

    pub async fn urgent_emails(&self) -> Vec<String> {
        self.state.all_urgent().await
    }

    pub async fn emails_in_category(&self, category: Category) -> Vec<String> {
        self.state.by_category(category).await
    }

    // ── Q&A ─────────────────────────────────────────────────────────

    /// Answer a question; failures come back as guidance text.
    pub async fn ask(&self, question: &str, email_id: Option<&str>) -> String {
        self.qa.ask(question, email_id).await
    }

    pub async fn answer(
        &self,
        question: &str,
        email_id: Option<&str>,
    ) -> std::result::Result<Answer, QaError> {
        self.qa.answer(question, email_id).await
    }

    // ── Drafts ──────────────────────────────────────────────────────

    /// Save a user-edited draft. The email must be in the inbox.
    pub async fn save_draft(&self, email_id: &str, body: &str) -> Result<Draft> {
        if !self.inbox.contains(email_id) {
            return Err(PipelineError::DataIntegrity {
                email_id: email_id.to_string(),
                reason: "draft references an email that is not in the inbox".to_string(),
            }
            .into());
        }
        Ok(self.drafts.save(email_id, body).await?)
    }

    /// The user-edited draft only.
    pub async fn get_draft(&self, email_id: &str) -> std::result::Result<Draft, StoreError> {
        self.drafts.get(email_id).await
    }

    /// Drop the edited draft; the auto draft becomes effective again.
    pub async fn clear_draft(&self, email_id: &str) -> std::result::Result<bool, StoreError> {
        self.drafts.clear(email_id).await
    }

    /// Edited draft if present, otherwise the auto draft.
    pub async fn effective_draft(&self, email_id: &str) -> std::result::Result<Draft, StoreError> {
        self.drafts.effective(email_id, &self.state).await
    }

    /// Nothing leaves the machine: "sending" logs the effective draft and
    /// returns it.
    pub async fn send_draft(&self, email_id: &str) -> std::result::Result<Draft, StoreError> {
        let draft = self.effective_draft(email_id).await?;
        info!(
            email_id,
            source = ?draft.source,
            chars = draft.body.chars().count(),
            "Draft sent (simulated)"
        );
        Ok(draft)
    }

    // ── Templates ───────────────────────────────────────────────────

    pub async fn upsert_template(
        &self,
        name: &str,
        text: &str,
    ) -> std::result::Result<PromptTemplate, TemplateError> {
        self.templates.upsert(name, text).await
    }

    pub async fn get_template(&self, name: &str) -> std::result::Result<PromptTemplate, TemplateError> {
        self.templates.get(name).await
    }

    pub async fn list_templates(&self) -> Vec<String> {
        self.templates.list().await
    }
}

/// Persisted documents must only reference emails in the current inbox.
async fn check_references(
    inbox: &Inbox,
    state: &ProcessedStateStore,
    drafts: &DraftStore,
) -> std::result::Result<(), PipelineError> {
    if let Some(snapshot) = state.snapshot().await {
        processor::check_state(inbox, &snapshot)?;
    }
    for (email_id, draft) in drafts.snapshot().await {
        if !inbox.contains(&email_id) || draft.email_id != email_id {
            return Err(PipelineError::DataIntegrity {
                email_id,
                reason: "saved draft references an email that is not in the inbox".to_string(),
            });
        }
    }
    Ok(())
}
