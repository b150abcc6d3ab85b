//! Shared types for the inbox processing pipeline.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Email ───────────────────────────────────────────────────────────

/// A single email from the inbox. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    /// Stable identifier. Numeric ids in the source file are normalised to strings.
    #[serde(deserialize_with = "de_email_id")]
    pub id: String,
    /// Raw sender header, e.g. `"Jane Doe <jane@example.com>"`.
    #[serde(rename = "from")]
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub timestamp: DateTime<Utc>,
    /// Conversation this email belongs to, if the source tracks threads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl Email {
    /// Subject and body joined, for rule matching.
    pub fn searchable_text(&self) -> String {
        format!("{}\n{}", self.subject, self.body)
    }

    /// Subject line for a reply, without stacking `Re:` prefixes.
    pub fn reply_subject(&self) -> String {
        let subject = self.subject.trim();
        if subject.is_empty() {
            "Re: (no subject)".to_string()
        } else if subject.to_lowercase().starts_with("re:") {
            subject.to_string()
        } else {
            format!("Re: {subject}")
        }
    }

    /// Best-effort human name for the sender.
    ///
    /// `"Jane Doe <jane@x.com>"` → `"Jane Doe"`, `"jane@x.com"` → `"jane"`.
    pub fn sender_name(&self) -> String {
        let raw = self.sender.trim();
        if let Some(start) = raw.find('<') {
            let name = raw[..start].trim().trim_matches('"').trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
        let address = raw.trim_start_matches('<').trim_end_matches('>');
        match address.split_once('@') {
            Some((local, _)) if !local.is_empty() => local.to_string(),
            _ if address.is_empty() => "there".to_string(),
            _ => address.to_string(),
        }
    }
}

fn de_email_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

// ── Category ────────────────────────────────────────────────────────

/// Closed set of email categories.
///
/// Declaration order is the tie-break priority: earlier wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Urgent,
    ActionRequired,
    Informational,
    Promotional,
    Other,
}

impl Category {
    /// All categories in tie-break priority order.
    pub const ALL: [Category; 5] = [
        Category::Urgent,
        Category::ActionRequired,
        Category::Informational,
        Category::Promotional,
        Category::Other,
    ];

    /// Name of the reply template for this category.
    pub fn reply_template_name(&self) -> String {
        format!("reply.{self}")
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Urgent => "Urgent",
            Self::ActionRequired => "Action Required",
            Self::Informational => "Informational",
            Self::Promotional => "Promotional",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Urgent => "urgent",
            Self::ActionRequired => "action_required",
            Self::Informational => "informational",
            Self::Promotional => "promotional",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "urgent" => Ok(Self::Urgent),
            "action_required" => Ok(Self::ActionRequired),
            "informational" => Ok(Self::Informational),
            "promotional" => Ok(Self::Promotional),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

// ── Action items ────────────────────────────────────────────────────

/// A task extracted from an email body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    /// `<email_id>-<index>`; stable across identical runs.
    pub id: String,
    pub email_id: String,
    pub description: String,
    /// Free-text deadline as written in the email ("Friday", "end of day").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_hint: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl ActionItem {
    pub fn new(email_id: &str, index: usize, description: impl Into<String>) -> Self {
        Self {
            id: format!("{email_id}-{index}"),
            email_id: email_id.to_string(),
            description: description.into(),
            due_hint: None,
            completed: false,
        }
    }

    pub fn with_due_hint(mut self, due: impl Into<String>) -> Self {
        self.due_hint = Some(due.into());
        self
    }

    /// One-line rendering used in answers.
    pub fn display_line(&self) -> String {
        match &self.due_hint {
            Some(due) => format!("{} (due {})", self.description, due),
            None => self.description.clone(),
        }
    }
}

// ── Drafts ──────────────────────────────────────────────────────────

/// Where a draft came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftSource {
    /// Generated by the heuristics engine during processing.
    Auto,
    /// Written by the user. Never overwritten by processing.
    Edited,
}

/// A reply body for one email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub email_id: String,
    pub body: String,
    pub source: DraftSource,
    /// Reply subject line. Edited drafts leave it to the email's `Re:` subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Suggested next steps shown alongside the body.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub followups: Vec<String>,
    /// Reply template the body was filled from (auto drafts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Set on edited drafts. Auto drafts share the run timestamp of their
    /// `ProcessedState`, which keeps identical runs identical.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Draft {
    pub fn auto(email_id: &str, body: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            email_id: email_id.to_string(),
            body: body.into(),
            source: DraftSource::Auto,
            subject: None,
            followups: Vec::new(),
            template: Some(template.into()),
            last_modified: None,
        }
    }

    pub fn edited(email_id: &str, body: impl Into<String>) -> Self {
        Self {
            email_id: email_id.to_string(),
            body: body.into(),
            source: DraftSource::Edited,
            subject: None,
            followups: Vec::new(),
            template: None,
            last_modified: Some(Utc::now()),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_followups(mut self, followups: Vec<String>) -> Self {
        self.followups = followups;
        self
    }

    pub fn is_edited(&self) -> bool {
        self.source == DraftSource::Edited
    }
}

// ── Processed state ─────────────────────────────────────────────────

/// Processing result for one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEntry {
    /// Index of the email in the inbox at processing time.
    pub position: usize,
    pub category: Category,
    pub actions: Vec<ActionItem>,
    pub summary: String,
    pub draft: Draft,
}

/// Full result of one "Process Inbox" run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedState {
    pub run_timestamp: DateTime<Utc>,
    pub entries: BTreeMap<String, ProcessedEntry>,
}

impl ProcessedState {
    pub fn new(run_timestamp: DateTime<Utc>) -> Self {
        Self {
            run_timestamp,
            entries: BTreeMap::new(),
        }
    }

    /// Entries in inbox order.
    pub fn ordered(&self) -> Vec<(&String, &ProcessedEntry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.position);
        entries
    }

    /// Ids of entries in `category`, in inbox order.
    pub fn ids_in_category(&self, category: Category) -> Vec<String> {
        self.ordered()
            .into_iter()
            .filter(|(_, entry)| entry.category == category)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

// ── Templates ───────────────────────────────────────────────────────

/// What a prompt template is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateUse {
    Categorization,
    ActionExtraction,
    Drafting,
    QaIntent,
}

impl TemplateUse {
    /// Infer the target use of a new template from its name.
    pub fn infer_from_name(name: &str) -> Self {
        if name.starts_with("intent.") {
            Self::QaIntent
        } else if name.starts_with("categorization") {
            Self::Categorization
        } else if name.starts_with("action") {
            Self::ActionExtraction
        } else {
            Self::Drafting
        }
    }
}

impl std::fmt::Display for TemplateUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Categorization => "categorization",
            Self::ActionExtraction => "action_extraction",
            Self::Drafting => "drafting",
            Self::QaIntent => "qa_intent",
        };
        write!(f, "{s}")
    }
}

// ── Intelligence seam ───────────────────────────────────────────────

/// The capability set the pipeline needs from a language engine.
///
/// The built-in implementation is rule-based; a model-backed one can be
/// swapped in without touching the processor. Implementations must not
/// fail: they degrade to `Other`, no actions, and a generic draft.
#[async_trait]
pub trait EmailIntelligence: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    async fn categorize(&self, email: &Email) -> Category;

    async fn extract_actions(&self, email: &Email) -> Vec<ActionItem>;

    async fn draft_reply(&self, email: &Email, category: Category) -> Draft;

    async fn summarize(&self, email: &Email) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(sender: &str, subject: &str) -> Email {
        Email {
            id: "1".into(),
            sender: sender.into(),
            subject: subject.into(),
            body: String::new(),
            timestamp: Utc::now(),
            thread_id: None,
        }
    }

    #[test]
    fn email_accepts_numeric_and_string_ids() {
        let json = r#"[
            {"id": 7, "from": "a@x.com", "subject": "s", "body": "b", "timestamp": "2024-05-01T09:30:00Z"},
            {"id": "abc", "from": "b@x.com", "subject": "t", "body": "c", "timestamp": "2024-05-01T10:00:00Z", "thread_id": "t-1"}
        ]"#;
        let emails: Vec<Email> = serde_json::from_str(json).unwrap();
        assert_eq!(emails[0].id, "7");
        assert_eq!(emails[1].id, "abc");
        assert_eq!(emails[1].thread_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn sender_name_prefers_display_name() {
        assert_eq!(email("Jane Doe <jane@x.com>", "").sender_name(), "Jane Doe");
        assert_eq!(email("\"Ops Team\" <ops@x.com>", "").sender_name(), "Ops Team");
        assert_eq!(email("bob@x.com", "").sender_name(), "bob");
        assert_eq!(email("<carol@x.com>", "").sender_name(), "carol");
        assert_eq!(email("", "").sender_name(), "there");
    }

    #[test]
    fn reply_subject_does_not_stack_prefix() {
        assert_eq!(email("a@x.com", "Budget").reply_subject(), "Re: Budget");
        assert_eq!(email("a@x.com", "RE: Budget").reply_subject(), "RE: Budget");
        assert_eq!(email("a@x.com", "  ").reply_subject(), "Re: (no subject)");
    }

    #[test]
    fn category_order_is_tie_break_priority() {
        let mut shuffled = vec![
            Category::Other,
            Category::Promotional,
            Category::Urgent,
            Category::Informational,
            Category::ActionRequired,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Category::ALL.to_vec());
    }

    #[test]
    fn category_parse_and_display() {
        for category in Category::ALL {
            let parsed: Category = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert_eq!("Action-Required".parse::<Category>().unwrap(), Category::ActionRequired);
        assert!("spam".parse::<Category>().is_err());
        assert_eq!(Category::Urgent.reply_template_name(), "reply.urgent");
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_value(Category::ActionRequired).unwrap();
        assert_eq!(json, "action_required");
    }

    #[test]
    fn action_item_ids_are_deterministic() {
        let item = ActionItem::new("42", 1, "review the deck").with_due_hint("Monday");
        assert_eq!(item.id, "42-1");
        assert!(!item.completed);
        assert_eq!(item.display_line(), "review the deck (due Monday)");
    }

    #[test]
    fn auto_draft_has_no_timestamp() {
        let draft = Draft::auto("1", "hi", "reply.other");
        assert!(!draft.is_edited());
        assert!(draft.last_modified.is_none());
        let json = serde_json::to_value(&draft).unwrap();
        assert!(json.get("last_modified").is_none());
        assert_eq!(json["source"], "auto");

        let edited = Draft::edited("1", "mine");
        assert!(edited.is_edited());
        assert!(edited.last_modified.is_some());
    }

    #[test]
    fn template_use_inferred_from_prefix() {
        assert_eq!(TemplateUse::infer_from_name("intent.summarize_email"), TemplateUse::QaIntent);
        assert_eq!(TemplateUse::infer_from_name("reply.urgent"), TemplateUse::Drafting);
        assert_eq!(
            TemplateUse::infer_from_name("categorization_prompt"),
            TemplateUse::Categorization
        );
        assert_eq!(
            TemplateUse::infer_from_name("action_item_prompt"),
            TemplateUse::ActionExtraction
        );
        assert_eq!(TemplateUse::infer_from_name("signature"), TemplateUse::Drafting);
    }

    #[test]
    fn processed_state_orders_by_inbox_position() {
        let mut state = ProcessedState::new(Utc::now());
        for (id, position, category) in [
            ("10", 0, Category::Urgent),
            ("2", 1, Category::Other),
            ("1", 2, Category::Urgent),
        ] {
            state.entries.insert(
                id.to_string(),
                ProcessedEntry {
                    position,
                    category,
                    actions: vec![],
                    summary: String::new(),
                    draft: Draft::auto(id, "", "reply.generic"),
                },
            );
        }
        assert_eq!(state.ids_in_category(Category::Urgent), vec!["10", "1"]);
        let order: Vec<&str> = state.ordered().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["10", "2", "1"]);
    }
}
