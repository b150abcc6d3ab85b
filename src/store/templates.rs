//! Prompt/template store: named templates persisted as one JSON document.
//!
//! Reply templates (`reply.<category>`) feed the draft generator; intent
//! templates (`intent.<intent>`) hold the comma-separated phrases the Q&A
//! matcher recognises. Every upsert is written through to disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::TemplateError;
use crate::pipeline::types::TemplateUse;
use crate::store::file;

/// Name of the fallback reply template used when a category has none.
pub const GENERIC_REPLY: &str = "reply.generic";

/// Body of the built-in acknowledgment. Only uses slots every email can fill.
pub const GENERIC_REPLY_TEXT: &str = "Hi {{sender_name}},\n\n\
Thanks for your email about \"{{subject}}\". I've received it and will get back to you soon.\n\n\
Best regards";

/// Any `{{...}}` span. Names that no slot can supply (`{{due date}}`,
/// `{{sender-name}}`, `{{}}`) still count, so they surface as unresolved.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("valid placeholder regex"));

/// Built-in templates seeded when the store has no document yet.
const DEFAULT_TEMPLATES: &[(&str, TemplateUse, &str)] = &[
    (
        "reply.urgent",
        TemplateUse::Drafting,
        "Hi {{sender_name}},\n\n\
Thanks for flagging \"{{subject}}\". I understand this is urgent and I'm on it now. \
I'll follow up as soon as I have an update.\n\n\
Best regards",
    ),
    (
        "reply.action_required",
        TemplateUse::Drafting,
        "Hi {{sender_name}},\n\n\
Thanks for your note on \"{{subject}}\". I'll take care of the requested items and \
confirm once they're done.\n\n\
Best regards",
    ),
    (
        "reply.informational",
        TemplateUse::Drafting,
        "Hi {{sender_name}},\n\n\
Thanks for the update on \"{{subject}}\". Noted, and I appreciate you keeping me in the loop.\n\n\
Best regards",
    ),
    (
        "reply.promotional",
        TemplateUse::Drafting,
        "Hi {{sender_name}},\n\n\
Thanks for reaching out about \"{{subject}}\". I'm not interested at the moment.\n\n\
Best regards",
    ),
    (GENERIC_REPLY, TemplateUse::Drafting, GENERIC_REPLY_TEXT),
    (
        "intent.summarize_email",
        TemplateUse::QaIntent,
        "summarize, summarise, summary, tl;dr, tldr, gist, what is this about, what's this about",
    ),
    (
        "intent.list_tasks_for_email",
        TemplateUse::QaIntent,
        "task, action item, to do, todo, to-do, what do i need to do, next step",
    ),
    (
        "intent.list_urgent_emails",
        TemplateUse::QaIntent,
        "urgent, asap, high priority",
    ),
    (
        "intent.list_all_action_items",
        TemplateUse::QaIntent,
        "all action items, all tasks, all my tasks, all todos, all to-dos, every task, \
across the inbox, across my inbox, inbox tasks",
    ),
    (
        "intent.show_draft",
        TemplateUse::QaIntent,
        "draft, reply, respond, response",
    ),
    (
        "intent.summarize_inbox",
        TemplateUse::QaIntent,
        "overview, summarize the inbox, summarise the inbox, summarize my inbox, \
summarise my inbox, summarize all, summarise all, summarize everything, inbox summary",
    ),
    (
        "intent.list_drafts",
        TemplateUse::QaIntent,
        "all drafts, all replies, all my drafts, every draft, drafts for the inbox, \
draft replies for all, inbox drafts",
    ),
    (
        "intent.email_urgency",
        TemplateUse::QaIntent,
        "is this urgent, is this email urgent, is it urgent, is this a priority, \
is this high priority, how urgent is this, is this important",
    ),
];

/// A named prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: String,
    pub text: String,
    pub target_use: TemplateUse,
}

impl PromptTemplate {
    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.text) {
            let name = caps[1].trim().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Substitute every `{{slot}}`. A slot without a value is an error.
    pub fn fill(&self, values: &BTreeMap<&str, String>) -> Result<String, TemplateError> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| !values.contains_key(name.as_str()))
        {
            return Err(TemplateError::UnresolvedPlaceholder {
                name: self.name.clone(),
                placeholder: missing,
            });
        }

        let filled = PLACEHOLDER.replace_all(&self.text, |caps: &regex::Captures<'_>| {
            values.get(caps[1].trim()).cloned().unwrap_or_default()
        });
        Ok(filled.into_owned())
    }

    /// Lowercased, comma- or newline-separated phrases (intent templates).
    pub fn phrases(&self) -> Vec<String> {
        self.text
            .split([',', '\n'])
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// On-disk record: the document maps template name to this.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TemplateRecord {
    text: String,
    target_use: TemplateUse,
}

/// File-backed template store.
pub struct TemplateStore {
    path: PathBuf,
    templates: RwLock<BTreeMap<String, TemplateRecord>>,
}

impl TemplateStore {
    /// Open the store, seeding built-in templates that the document lacks.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, TemplateError> {
        let path = path.into();
        let mut templates: BTreeMap<String, TemplateRecord> =
            file::load_json(&path).await?.unwrap_or_default();

        let loaded = templates.len();
        for (name, target_use, text) in DEFAULT_TEMPLATES {
            templates
                .entry((*name).to_string())
                .or_insert_with(|| TemplateRecord {
                    text: (*text).to_string(),
                    target_use: *target_use,
                });
        }
        info!(
            path = %path.display(),
            loaded,
            total = templates.len(),
            "Template store opened"
        );

        Ok(Self {
            path,
            templates: RwLock::new(templates),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a template by name.
    pub async fn get(&self, name: &str) -> Result<PromptTemplate, TemplateError> {
        let templates = self.templates.read().await;
        templates
            .get(name)
            .map(|record| to_template(name, record))
            .ok_or_else(|| TemplateError::NotFound {
                name: name.to_string(),
            })
    }

    /// Insert or replace a template's text and persist the whole document.
    ///
    /// An existing template keeps its target use; a new one infers it from
    /// the name prefix.
    pub async fn upsert(&self, name: &str, text: &str) -> Result<PromptTemplate, TemplateError> {
        let name = name.trim();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(TemplateError::InvalidName(name.to_string()));
        }

        let mut templates = self.templates.write().await;
        let target_use = templates
            .get(name)
            .map(|record| record.target_use)
            .unwrap_or_else(|| TemplateUse::infer_from_name(name));

        let mut updated = templates.clone();
        let record = TemplateRecord {
            text: text.to_string(),
            target_use,
        };
        updated.insert(name.to_string(), record.clone());
        file::write_json(&self.path, &updated).await?;
        *templates = updated;

        info!(template = %name, target_use = %target_use, "Template saved");
        Ok(to_template(name, &record))
    }

    /// All template names, sorted.
    pub async fn list(&self) -> Vec<String> {
        self.templates.read().await.keys().cloned().collect()
    }

    /// Templates with a given target use, sorted by name.
    pub async fn by_use(&self, target_use: TemplateUse) -> Vec<PromptTemplate> {
        self.templates
            .read()
            .await
            .iter()
            .filter(|(_, record)| record.target_use == target_use)
            .map(|(name, record)| to_template(name, record))
            .collect()
    }
}

fn to_template(name: &str, record: &TemplateRecord) -> PromptTemplate {
    PromptTemplate {
        name: name.to_string(),
        text: record.text.clone(),
        target_use: record.target_use,
    }
}
