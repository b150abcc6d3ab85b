//! Inbox processor: the single writer of `ProcessedState`.
//!
//! Flow for one "Process Inbox" run:
//! 1. Run every email through the `EmailIntelligence` engine
//! 2. Check that every action item and draft points at an inbox email
//! 3. Commit the whole batch with one atomic replace
//!
//! A failure at any step leaves the previous state untouched. Edited drafts
//! live in the draft store and are never read or written here.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::inbox::Inbox;
use crate::pipeline::types::{Email, EmailIntelligence, ProcessedEntry, ProcessedState};
use crate::store::ProcessedStateStore;

/// Runs the engine over the inbox and commits the result.
pub struct InboxProcessor {
    engine: Arc<dyn EmailIntelligence>,
    state: Arc<ProcessedStateStore>,
}

impl InboxProcessor {
    pub fn new(engine: Arc<dyn EmailIntelligence>, state: Arc<ProcessedStateStore>) -> Self {
        Self { engine, state }
    }

    /// Process every email and replace the stored state wholesale.
    pub async fn process_all(&self, inbox: &Inbox) -> Result<ProcessedState, PipelineError> {
        info!(
            emails = inbox.len(),
            engine = self.engine.name(),
            "Processing inbox"
        );

        let mut next = ProcessedState::new(Utc::now());
        for (position, email) in inbox.emails().iter().enumerate() {
            let entry = self.process_email(position, email).await;
            if let Err(e) = check_integrity(inbox, email, &entry) {
                error!(email_id = %email.id, error = %e, "Aborting run, nothing committed");
                return Err(e);
            }
            next.entries.insert(email.id.clone(), entry);
        }

        self.state.replace(next.clone()).await?;

        info!(
            emails = next.entries.len(),
            run = %next.run_timestamp,
            "Inbox processed"
        );
        Ok(next)
    }

    async fn process_email(&self, position: usize, email: &Email) -> ProcessedEntry {
        let category = self.engine.categorize(email).await;
        let actions = self.engine.extract_actions(email).await;
        let summary = self.engine.summarize(email).await;
        let draft = self.engine.draft_reply(email, category).await;

        debug!(
            email_id = %email.id,
            category = %category,
            actions = actions.len(),
            template = draft.template.as_deref().unwrap_or("-"),
            "Email processed"
        );

        ProcessedEntry {
            position,
            category,
            actions,
            summary,
            draft,
        }
    }
}

/// Check a previously committed state against the current inbox. Every
/// entry, action item and draft must belong to an email still present.
pub fn check_state(inbox: &Inbox, state: &ProcessedState) -> Result<(), PipelineError> {
    for (email_id, entry) in state.ordered() {
        let Some(email) = inbox.get(email_id) else {
            return Err(PipelineError::DataIntegrity {
                email_id: email_id.clone(),
                reason: "processed state references an email that is not in the inbox".to_string(),
            });
        };
        check_integrity(inbox, email, entry)?;
    }
    Ok(())
}

/// Every reference in `entry` must point at `email`, which must be in the inbox.
fn check_integrity(inbox: &Inbox, email: &Email, entry: &ProcessedEntry) -> Result<(), PipelineError> {
    let references = entry
        .actions
        .iter()
        .map(|a| ("action item", a.email_id.as_str()))
        .chain(std::iter::once(("draft", entry.draft.email_id.as_str())));

    for (kind, referenced) in references {
        if !inbox.contains(referenced) {
            return Err(PipelineError::DataIntegrity {
                email_id: email.id.clone(),
                reason: format!("{kind} references unknown email {referenced}"),
            });
        }
        if referenced != email.id {
            return Err(PipelineError::DataIntegrity {
                email_id: email.id.clone(),
                reason: format!("{kind} is attributed to email {referenced}"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use tempfile::TempDir;

    use crate::pipeline::heuristics::HeuristicEngine;
    use crate::pipeline::rules::RulesEngine;
    use crate::pipeline::types::{ActionItem, Category, Draft};
    use crate::store::TemplateStore;

    fn make_email(id: &str, subject: &str, body: &str) -> Email {
        Email {
            id: id.into(),
            sender: format!("sender{id}@corp.com"),
            subject: subject.into(),
            body: body.into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            thread_id: None,
        }
    }

    fn sample_inbox() -> Inbox {
        Inbox::new(vec![
            make_email("1", "Q3", "Please send the Q3 report by Friday, this is urgent"),
            make_email("2", "Status", "FYI, the deploy went out. No action needed."),
            make_email("3", "Hello", "Nice to meet you"),
        ])
        .unwrap()
    }

    async fn setup() -> (InboxProcessor, Arc<ProcessedStateStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let templates = Arc::new(
            TemplateStore::open(dir.path().join("templates.json"))
                .await
                .unwrap(),
        );
        let state = Arc::new(
            ProcessedStateStore::open(dir.path().join("state.json"))
                .await
                .unwrap(),
        );
        let engine = Arc::new(HeuristicEngine::new(RulesEngine::default_rules(), templates));
        (InboxProcessor::new(engine, Arc::clone(&state)), state, dir)
    }

    /// Engine that attributes its action items to a fixed email id.
    struct MisattributingEngine {
        action_owner: String,
    }

    #[async_trait]
    impl EmailIntelligence for MisattributingEngine {
        fn name(&self) -> &str {
            "misattributing"
        }
        async fn categorize(&self, _email: &Email) -> Category {
            Category::Other
        }
        async fn extract_actions(&self, _email: &Email) -> Vec<ActionItem> {
            vec![ActionItem::new(&self.action_owner, 0, "ghost task")]
        }
        async fn draft_reply(&self, email: &Email, _category: Category) -> Draft {
            Draft::auto(&email.id, "hi", "reply.generic")
        }
        async fn summarize(&self, _email: &Email) -> String {
            String::new()
        }
    }

    #[tokio::test]
    async fn processes_every_email() {
        let (processor, state, _dir) = setup().await;
        let processed = processor.process_all(&sample_inbox()).await.unwrap();

        assert_eq!(processed.entries.len(), 3);
        let first = &processed.entries["1"];
        assert_eq!(first.category, Category::Urgent);
        assert_eq!(first.actions[0].description, "send the Q3 report");
        assert_eq!(first.actions[0].due_hint.as_deref(), Some("Friday"));
        assert_eq!(first.draft.template.as_deref(), Some("reply.urgent"));
        assert_eq!(processed.entries["2"].category, Category::Informational);
        assert_eq!(processed.entries["3"].category, Category::Other);
        assert_eq!(processed.entries["3"].position, 2);

        assert_eq!(state.snapshot().await, Some(processed));
        assert_eq!(state.all_urgent().await, vec!["1"]);
    }

    #[tokio::test]
    async fn rerun_is_identical_apart_from_timestamp() {
        let (processor, state, _dir) = setup().await;
        let inbox = sample_inbox();

        let first = processor.process_all(&inbox).await.unwrap();
        let first_doc = std::fs::read_to_string(state.path()).unwrap();
        let mut second = processor.process_all(&inbox).await.unwrap();
        let second_doc = std::fs::read_to_string(state.path()).unwrap();

        second.run_timestamp = first.run_timestamp;
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let strip = |doc: &str| -> String {
            doc.lines()
                .filter(|l| !l.trim_start().starts_with("\"run_timestamp\""))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(strip(&first_doc), strip(&second_doc));
    }

    #[tokio::test]
    async fn empty_inbox_commits_empty_state() {
        let (processor, state, _dir) = setup().await;
        let processed = processor.process_all(&Inbox::default()).await.unwrap();
        assert!(processed.entries.is_empty());
        assert!(state.has_run().await);
    }

    #[tokio::test]
    async fn orphaned_action_aborts_and_keeps_prior_state() {
        let (processor, state, _dir) = setup().await;
        let inbox = sample_inbox();
        let prior = processor.process_all(&inbox).await.unwrap();

        let bad = InboxProcessor::new(
            Arc::new(MisattributingEngine {
                action_owner: "999".into(),
            }),
            Arc::clone(&state),
        );
        let err = bad.process_all(&inbox).await.unwrap_err();
        match err {
            PipelineError::DataIntegrity { email_id, reason } => {
                assert_eq!(email_id, "1");
                assert!(reason.contains("unknown email 999"));
            }
            other => panic!("Expected DataIntegrity, got {:?}", other),
        }

        assert_eq!(state.snapshot().await, Some(prior));
    }

    #[tokio::test]
    async fn misattributed_action_is_an_integrity_error() {
        let (_processor, state, _dir) = setup().await;
        let bad = InboxProcessor::new(
            Arc::new(MisattributingEngine {
                action_owner: "3".into(),
            }),
            Arc::clone(&state),
        );
        let err = bad.process_all(&sample_inbox()).await.unwrap_err();
        assert!(matches!(err, PipelineError::DataIntegrity { .. }));
        assert!(!state.has_run().await);
    }

    #[tokio::test]
    async fn committed_state_checked_against_inbox() {
        let (processor, _state, _dir) = setup().await;
        let processed = processor.process_all(&sample_inbox()).await.unwrap();
        assert!(check_state(&sample_inbox(), &processed).is_ok());

        let shrunk = Inbox::new(vec![make_email("2", "Status", "FYI")]).unwrap();
        match check_state(&shrunk, &processed).unwrap_err() {
            PipelineError::DataIntegrity { email_id, .. } => assert_eq!(email_id, "1"),
            other => panic!("Expected DataIntegrity, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn storage_failure_keeps_prior_state() {
        let (processor, state, dir) = setup().await;
        let inbox = sample_inbox();
        let prior = processor.process_all(&inbox).await.unwrap();

        std::fs::create_dir(dir.path().join("state.json.tmp")).unwrap();
        let err = processor.process_all(&inbox).await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(_)));

        assert_eq!(state.snapshot().await, Some(prior.clone()));
        let on_disk: ProcessedState =
            serde_json::from_str(&std::fs::read_to_string(state.path()).unwrap()).unwrap();
        assert_eq!(on_disk, prior);
    }
}
