//! Q&A matcher: answers free-text questions about one email or the inbox.
//!
//! Per request:
//! 1. Parse intent against the phrases in the `intent.*` templates
//! 2. Resolve scope: single-email intents use the selected email,
//!    inbox-level intents ignore any selection
//! 3. Assemble the answer from processed state and drafts
//!
//! No state of its own. `answer` returns typed errors; `ask` is total and
//! turns them into guidance text.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::QaError;
use crate::inbox::Inbox;
use crate::pipeline::types::{Category, Email, ProcessedEntry};
use crate::store::{DraftStore, ProcessedStateStore, TemplateStore};

/// Reply for questions that match no intent.
pub const FALLBACK_MESSAGE: &str = "Sorry, I can't answer that yet. Try asking me to \
summarize this email, list its tasks, show its draft reply, check whether it is urgent, \
show all urgent emails, give an overview of the inbox, list all drafts, \
or list all action items in the inbox.";

/// Closed set of question intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    SummarizeEmail,
    ListTasksForEmail,
    ShowDraft,
    EmailUrgency,
    ListUrgentEmails,
    ListAllActionItems,
    SummarizeInbox,
    ListDrafts,
    Unknown,
}

impl Intent {
    /// Order in which intents are tried. Inbox-wide phrasings go first so
    /// "all tasks" is not read as a single-email task question, and
    /// "is this urgent" is tried before the bare "urgent" inbox list.
    pub const MATCH_ORDER: [Intent; 8] = [
        Intent::ListAllActionItems,
        Intent::SummarizeInbox,
        Intent::ListDrafts,
        Intent::EmailUrgency,
        Intent::ListUrgentEmails,
        Intent::ListTasksForEmail,
        Intent::ShowDraft,
        Intent::SummarizeEmail,
    ];

    /// Template holding this intent's phrases.
    pub fn template_name(&self) -> String {
        format!("intent.{self}")
    }

    /// Whether the intent works over the whole inbox.
    pub fn is_inbox_level(&self) -> bool {
        matches!(
            self,
            Self::ListUrgentEmails
                | Self::ListAllActionItems
                | Self::SummarizeInbox
                | Self::ListDrafts
        )
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SummarizeEmail => "summarize_email",
            Self::ListTasksForEmail => "list_tasks_for_email",
            Self::ShowDraft => "show_draft",
            Self::EmailUrgency => "email_urgency",
            Self::SummarizeInbox => "summarize_inbox",
            Self::ListDrafts => "list_drafts",
            Self::ListUrgentEmails => "list_urgent_emails",
            Self::ListAllActionItems => "list_all_action_items",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A resolved answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub intent: Intent,
    pub text: String,
    /// Emails the answer is about, in inbox order.
    pub email_ids: Vec<String>,
}

impl Answer {
    fn new(intent: Intent, text: impl Into<String>, email_ids: Vec<String>) -> Self {
        Self {
            intent,
            text: text.into(),
            email_ids,
        }
    }
}

/// Intent matcher over the inbox and its stores.
pub struct QaMatcher {
    inbox: Arc<Inbox>,
    templates: Arc<TemplateStore>,
    state: Arc<ProcessedStateStore>,
    drafts: Arc<DraftStore>,
}

impl QaMatcher {
    pub fn new(
        inbox: Arc<Inbox>,
        templates: Arc<TemplateStore>,
        state: Arc<ProcessedStateStore>,
        drafts: Arc<DraftStore>,
    ) -> Self {
        Self {
            inbox,
            templates,
            state,
            drafts,
        }
    }

    /// Classify a question. Missing intent templates simply never match.
    pub async fn parse_intent(&self, question: &str) -> Intent {
        let lowered = question.to_lowercase();
        for intent in Intent::MATCH_ORDER {
            let Ok(template) = self.templates.get(&intent.template_name()).await else {
                continue;
            };
            if let Some(phrase) = template
                .phrases()
                .into_iter()
                .find(|p| lowered.contains(p.as_str()))
            {
                debug!(intent = %intent, phrase = %phrase, "Question matched intent");
                return intent;
            }
        }
        Intent::Unknown
    }

    /// Answer a question, returning typed errors for missing data.
    pub async fn answer(&self, question: &str, email_id: Option<&str>) -> Result<Answer, QaError> {
        let intent = self.parse_intent(question).await;
        match intent {
            Intent::ListUrgentEmails => Ok(self.list_urgent().await),
            Intent::ListAllActionItems => Ok(self.list_all_actions().await),
            Intent::SummarizeInbox => Ok(self.summarize_inbox().await),
            Intent::ListDrafts => Ok(self.list_drafts().await),
            Intent::EmailUrgency => {
                let (email, entry) = self.selected(email_id).await?;
                let text = if entry.category == Category::Urgent {
                    "This email is tagged as urgent.".to_string()
                } else {
                    format!(
                        "This email does not appear urgent. It is categorized as {}.",
                        entry.category.label()
                    )
                };
                Ok(Answer::new(intent, text, vec![email.id.clone()]))
            }
            Intent::SummarizeEmail => {
                let (email, entry) = self.selected(email_id).await?;
                let text = format!("{}\nCategory: {}", entry.summary, entry.category.label());
                Ok(Answer::new(intent, text, vec![email.id.clone()]))
            }
            Intent::ListTasksForEmail => {
                let (email, entry) = self.selected(email_id).await?;
                let text = if entry.actions.is_empty() {
                    "No action items found in this email.".to_string()
                } else {
                    entry
                        .actions
                        .iter()
                        .map(|a| format!("- {}", a.display_line()))
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                Ok(Answer::new(intent, text, vec![email.id.clone()]))
            }
            Intent::ShowDraft => {
                let email = self.selected_email(email_id)?;
                let draft = self
                    .drafts
                    .effective(&email.id, &self.state)
                    .await
                    .map_err(|e| {
                        if e.is_not_found() {
                            QaError::NoProcessedData {
                                email_id: email.id.clone(),
                            }
                        } else {
                            QaError::Store(e)
                        }
                    })?;
                let marker = if draft.is_edited() { " (edited)" } else { "" };
                let subject = draft.subject.clone().unwrap_or_else(|| email.reply_subject());
                let mut text = format!("Subject: {subject}{marker}\n\n{}", draft.body);
                if !draft.followups.is_empty() {
                    text.push_str("\n\nSuggested follow-ups:");
                    for followup in &draft.followups {
                        text.push_str("\n- ");
                        text.push_str(followup);
                    }
                }
                Ok(Answer::new(intent, text, vec![email.id.clone()]))
            }
            Intent::Unknown if email_id.is_none() => {
                let processed = match self.state.snapshot().await {
                    Some(state) => state
                        .entries
                        .keys()
                        .filter(|id| self.inbox.contains(id))
                        .count(),
                    None => 0,
                };
                let text = format!(
                    "Processed {} of {} emails. {}",
                    processed,
                    self.inbox.len(),
                    FALLBACK_MESSAGE
                );
                Ok(Answer::new(intent, text, Vec::new()))
            }
            Intent::Unknown => Ok(Answer::new(intent, FALLBACK_MESSAGE, Vec::new())),
        }
    }

    /// Total version of `answer`: errors become guidance text.
    pub async fn ask(&self, question: &str, email_id: Option<&str>) -> String {
        match self.answer(question, email_id).await {
            Ok(answer) => answer.text,
            Err(e) => {
                debug!(error = %e, "Question could not be answered");
                guidance(&e)
            }
        }
    }

    fn selected_email(&self, email_id: Option<&str>) -> Result<&Email, QaError> {
        let email_id = email_id.ok_or(QaError::NoEmailSelected)?;
        self.inbox.get(email_id).ok_or_else(|| QaError::UnknownEmail {
            email_id: email_id.to_string(),
        })
    }

    async fn selected(&self, email_id: Option<&str>) -> Result<(&Email, ProcessedEntry), QaError> {
        let email = self.selected_email(email_id)?;
        let entry = self.state.get(&email.id).await.map_err(|e| {
            if e.is_not_found() {
                QaError::NoProcessedData {
                    email_id: email.id.clone(),
                }
            } else {
                QaError::Store(e)
            }
        })?;
        Ok((email, entry))
    }

    async fn list_urgent(&self) -> Answer {
        let intent = Intent::ListUrgentEmails;
        if !self.state.has_run().await {
            return Answer::new(
                intent,
                "The inbox hasn't been processed yet, so no emails are marked urgent.",
                Vec::new(),
            );
        }
        let ids = self.state.all_urgent().await;
        if ids.is_empty() {
            return Answer::new(intent, "No urgent emails at the moment.", ids);
        }
        let text = ids
            .iter()
            .map(|id| self.email_line(id))
            .collect::<Vec<_>>()
            .join("\n");
        Answer::new(intent, text, ids)
    }

    async fn list_all_actions(&self) -> Answer {
        let intent = Intent::ListAllActionItems;
        if !self.state.has_run().await {
            return Answer::new(
                intent,
                "The inbox hasn't been processed yet, so there are no action items.",
                Vec::new(),
            );
        }
        let grouped = self.state.all_action_items().await;
        if grouped.is_empty() {
            return Answer::new(intent, "No action items found in the inbox.", Vec::new());
        }
        let text = grouped
            .iter()
            .map(|(id, actions)| {
                let items = actions
                    .iter()
                    .map(|a| a.display_line())
                    .collect::<Vec<_>>()
                    .join("; ");
                format!("{} -> {}", self.email_line(id), items)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let ids = grouped.into_iter().map(|(id, _)| id).collect();
        Answer::new(intent, text, ids)
    }

    async fn summarize_inbox(&self) -> Answer {
        let intent = Intent::SummarizeInbox;
        let Some(state) = self.state.snapshot().await else {
            return Answer::new(
                intent,
                "The inbox hasn't been processed yet, so there are no summaries.",
                Vec::new(),
            );
        };
        if state.entries.is_empty() {
            return Answer::new(intent, "The inbox is empty.", Vec::new());
        }
        let ordered = state.ordered();
        let text = ordered
            .iter()
            .map(|(id, entry)| format!("{} :: {}", self.email_line(id), entry.summary))
            .collect::<Vec<_>>()
            .join("\n");
        let ids = ordered.into_iter().map(|(id, _)| id.clone()).collect();
        Answer::new(intent, text, ids)
    }

    async fn list_drafts(&self) -> Answer {
        let intent = Intent::ListDrafts;
        let Some(state) = self.state.snapshot().await else {
            return Answer::new(
                intent,
                "The inbox hasn't been processed yet, so there are no drafts.",
                Vec::new(),
            );
        };
        if state.entries.is_empty() {
            return Answer::new(intent, "The inbox is empty.", Vec::new());
        }
        let edited = self.drafts.snapshot().await;
        let ordered = state.ordered();
        let text = ordered
            .iter()
            .map(|(id, entry)| {
                let subject = entry
                    .draft
                    .subject
                    .clone()
                    .or_else(|| self.inbox.get(id).map(|e| e.reply_subject()))
                    .unwrap_or_else(|| "Re: (no subject)".to_string());
                let marker = if edited.contains_key(id.as_str()) {
                    " (edited)"
                } else {
                    ""
                };
                format!("{} -> {}{}", self.email_line(id), subject, marker)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let ids = ordered.into_iter().map(|(id, _)| id.clone()).collect();
        Answer::new(intent, text, ids)
    }

    fn email_line(&self, email_id: &str) -> String {
        match self.inbox.get(email_id) {
            Some(email) => format!(
                "#{} {} ({})",
                email.id,
                email.subject,
                email.timestamp.format("%b %-d, %Y")
            ),
            None => {
                warn!(email_id, "Processed email is no longer in the inbox");
                format!("#{email_id}")
            }
        }
    }
}

/// User-facing text for an unanswerable question.
pub fn guidance(error: &QaError) -> String {
    match error {
        QaError::NoProcessedData { .. } => {
            "I don't have results for this email yet. Process the inbox first, then ask again."
                .to_string()
        }
        QaError::NoEmailSelected => "Select an email first, then ask again.".to_string(),
        QaError::UnknownEmail { email_id } => {
            format!("Email {email_id} is not in the inbox.")
        }
        QaError::Store(e) if e.is_not_found() => {
            "I don't have results for this email yet. Process the inbox first, then ask again."
                .to_string()
        }
        QaError::Store(e) => format!("Couldn't read local state: {e}"),
    }
}
