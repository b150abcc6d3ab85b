//! Offline language heuristics: the default `EmailIntelligence`.
//!
//! Categorization, extraction and summaries come from `RulesEngine`.
//! Drafts are filled from the `reply.<category>` template, falling back to
//! `reply.generic` and finally to the built-in acknowledgment text. Every
//! auto draft carries its `Re:` subject and follow-up suggestions.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{ActionItem, Category, Draft, Email, EmailIntelligence, TemplateUse};
use crate::store::templates::{GENERIC_REPLY, GENERIC_REPLY_TEXT, PromptTemplate, TemplateStore};

/// Rule-based engine backed by the template store for drafting.
pub struct HeuristicEngine {
    rules: RulesEngine,
    templates: Arc<TemplateStore>,
}

impl HeuristicEngine {
    pub fn new(rules: RulesEngine, templates: Arc<TemplateStore>) -> Self {
        Self { rules, templates }
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }
}

#[async_trait]
impl EmailIntelligence for HeuristicEngine {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn categorize(&self, email: &Email) -> Category {
        self.rules.categorize(email)
    }

    async fn extract_actions(&self, email: &Email) -> Vec<ActionItem> {
        self.rules.extract_actions(email)
    }

    async fn draft_reply(&self, email: &Email, category: Category) -> Draft {
        let name = category.reply_template_name();
        let template = match self.templates.get(&name).await {
            Ok(t) => Some(t),
            Err(_) => {
                debug!(template = %name, "No reply template for category, using generic");
                self.templates.get(GENERIC_REPLY).await.ok()
            }
        };
        let actions = self.rules.extract_actions(email);
        render_draft(email, category, &actions, template.as_ref())
    }

    async fn summarize(&self, email: &Email) -> String {
        self.rules.summarize(email)
    }
}

/// Slot values available to reply templates.
pub fn draft_values(email: &Email, category: Category) -> BTreeMap<&'static str, String> {
    let mut values = BTreeMap::new();
    values.insert("sender", email.sender.clone());
    values.insert("sender_name", email.sender_name());
    values.insert("subject", email.subject.trim().to_string());
    values.insert("reply_subject", email.reply_subject());
    values.insert("category", category.label().to_string());
    values.insert("date", email.timestamp.format("%b %-d, %Y").to_string());
    values
}

/// Suggested next steps for a reply, in a fixed order.
pub fn followups(email: &Email, actions: &[ActionItem]) -> Vec<String> {
    let subject = if email.subject.trim().is_empty() {
        "(no subject)"
    } else {
        email.subject.trim()
    };
    let mut followups = vec![
        format!("Confirm next steps for '{subject}'."),
        format!("Schedule a call with {}.", email.sender_name()),
    ];
    if !actions.is_empty() {
        let items = actions
            .iter()
            .map(|a| a.display_line())
            .collect::<Vec<_>>()
            .join("; ");
        followups.push(format!("Review action items: {items}."));
    }
    followups
}

/// Fill `template` for `email`. Never fails: a missing or unfillable template
/// falls back to the built-in acknowledgment.
pub fn render_draft(
    email: &Email,
    category: Category,
    actions: &[ActionItem],
    template: Option<&PromptTemplate>,
) -> Draft {
    let values = draft_values(email, category);
    let finish = |draft: Draft| {
        draft
            .with_subject(email.reply_subject())
            .with_followups(followups(email, actions))
    };

    if let Some(template) = template {
        match template.fill(&values) {
            Ok(body) => return finish(Draft::auto(&email.id, body, template.name.clone())),
            Err(e) => warn!(
                email_id = %email.id,
                template = %template.name,
                error = %e,
                "Reply template could not be filled, using generic acknowledgment"
            ),
        }
    }

    let generic = PromptTemplate {
        name: GENERIC_REPLY.to_string(),
        text: GENERIC_REPLY_TEXT.to_string(),
        target_use: TemplateUse::Drafting,
    };
    let body = generic.fill(&values).unwrap_or_else(|_| {
        format!(
            "Hi {},\n\nThanks for your email. I'll get back to you soon.\n\nBest regards",
            email.sender_name()
        )
    });
    finish(Draft::auto(&email.id, body, GENERIC_REPLY))
}
