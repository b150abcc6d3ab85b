//! Rule tables for the offline language heuristics.
//!
//! Everything here is pure and deterministic:
//! - weighted category rules → `categorize()`
//! - request / imperative / deadline patterns → `extract_actions()`
//! - first-sentence summaries → `summarize()`
//!
//! Category scores are the sum of matching rule weights. The highest score
//! wins; ties go to the earlier category in `Category::ALL`. A zero score is
//! `Other`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{ActionItem, Category, Email};

/// Maximum characters of body text quoted in a summary.
const SUMMARY_MAX_CHARS: usize = 140;

/// Which field a rule matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    Sender,
    Subject,
    Body,
    /// Subject and body together; a hit counts once.
    Text,
}

/// A weighted pattern voting for one category.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    /// Human-readable pattern description.
    pub pattern: String,
    pub regex: Regex,
    pub field: RuleField,
    pub category: Category,
    pub weight: u32,
}

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?;]+(?:\s+|$)").unwrap());

static LABELLED_TASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:action(?: item)?|todo|to-do|request|task)\s*:\s*(?P<task>.+)$").unwrap()
});

static REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:also|and|so|then|but|ok|okay)\b,?\s*)?(?:(?:can|could|would|will) you(?: please)?|please|kindly|pls|(?:i|we) need you to|make sure (?:to|you)|remember to|don'?t forget to)\s+(?P<task>.+)$",
    )
    .unwrap()
});

static IMPERATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<task>(?:send|review|approve|sign|submit|confirm|schedule|reply|respond|call|prepare|share|complete|fill out|book|forward|pay|register|rsvp|follow up)\s+\w.*)$",
    )
    .unwrap()
});

static NOT_A_TASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:find|see)\s+(?:the\s+)?(?:attached|below|enclosed)|feel free|note that|be advised|ignore|let (?:me|us) know if you have (?:any )?questions)",
    )
    .unwrap()
});

/// Clause tails that are commentary rather than part of the task.
static TRAILING_REMARK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i),\s*(?:this|it|that|thanks|thank|as|so|because|since|if|which|otherwise)\b.*$",
    )
    .unwrap()
});

static DEADLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s+(?:by|before|no later than|until|due(?:\s+(?:on|by))?)\s+(?P<due>(?:the\s+)?(?:end of (?:the\s+)?(?:day|week|month)|eod|eow|cob|tomorrow|today|tonight|noon|midnight|next\s+\w+|this\s+\w+|(?:mon|tues|wednes|thurs|fri|satur|sun)day|\d{1,2}(?::\d{2})?\s*(?:am|pm)|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?|\d{1,2}/\d{1,2}(?:/\d{2,4})?)\b.*)$",
    )
    .unwrap()
});

/// Rule-based categorizer, action extractor and summarizer.
pub struct RulesEngine {
    category_rules: Vec<CategoryRule>,
}

impl RulesEngine {
    /// Create a rules engine with the default category rules.
    pub fn default_rules() -> Self {
        let mut engine = Self::empty();
        let defaults: &[(&str, RuleField, Category, u32)] = &[
            // Urgency keywords outweigh ordinary request phrasing.
            (
                r"(?i)\b(urgent|urgently|asap|a\.s\.a\.p|immediately|emergency|critical|time[- ]sensitive|right away)\b",
                RuleField::Text,
                Category::Urgent,
                5,
            ),
            (
                r"(?i)^\s*(\[urgent\]|urgent:|important:|high priority)",
                RuleField::Subject,
                Category::Urgent,
                2,
            ),
            (
                r"(?i)\b(by|before)\s+(end of (the\s+)?day|eod|cob|today|tonight|this morning|noon)\b",
                RuleField::Text,
                Category::Urgent,
                2,
            ),
            // Requests and deadlines.
            (
                r"(?i)\b(please|kindly|could you|can you|would you|need you to|make sure)\b",
                RuleField::Text,
                Category::ActionRequired,
                2,
            ),
            (
                r"(?i)(\b(by|before|no later than|due)\s+(mon|tues|wednes|thurs|fri|satur|sun)day\b|\bdeadline\b|\bdue (date|by|on)\b)",
                RuleField::Text,
                Category::ActionRequired,
                2,
            ),
            (
                r"(?i)\b(action required|action needed|approval needed|awaiting your|sign[- ]off|rsvp|respond by)\b",
                RuleField::Text,
                Category::ActionRequired,
                2,
            ),
            (
                r"(?im)^\s*(action|todo|to-do|request)\s*:",
                RuleField::Body,
                Category::ActionRequired,
                2,
            ),
            // FYI-style traffic.
            (
                r"(?i)\b(fyi|for your information|heads[- ]up|no action (is )?(needed|required)|just letting you know)\b",
                RuleField::Text,
                Category::Informational,
                2,
            ),
            (
                r"(?i)\b(update|status|progress|recap|minutes|notes|announcement|report)\b",
                RuleField::Text,
                Category::Informational,
                1,
            ),
            // Marketing.
            (
                r"(?i)\b(unsubscribe|\d+% off|sale|discount|coupon|promo code|limited[- ]time|special offer|free trial|shop now|buy now)\b",
                RuleField::Text,
                Category::Promotional,
                3,
            ),
            (
                r"(?i)(^|<)[^@<]*(no[-_.]?reply|newsletter|marketing|promo|deals|offers)[^@]*@",
                RuleField::Sender,
                Category::Promotional,
                2,
            ),
        ];

        for (pattern, field, category, weight) in defaults {
            engine
                .add_category_rule(pattern, *field, *category, *weight)
                .expect("default category rules are valid regexes");
        }
        engine
    }

    /// Create an engine with no category rules (everything is `Other`).
    pub fn empty() -> Self {
        Self {
            category_rules: Vec::new(),
        }
    }

    /// Add a weighted category rule.
    pub fn add_category_rule(
        &mut self,
        pattern: &str,
        field: RuleField,
        category: Category,
        weight: u32,
    ) -> Result<(), regex::Error> {
        self.category_rules.push(CategoryRule {
            pattern: pattern.into(),
            regex: Regex::new(pattern)?,
            field,
            category,
            weight,
        });
        Ok(())
    }

    /// Sum of matching rule weights per category.
    pub fn score(&self, email: &Email) -> BTreeMap<Category, u32> {
        let text = email.searchable_text();
        let mut scores = BTreeMap::new();

        for rule in &self.category_rules {
            let field_value = match rule.field {
                RuleField::Sender => email.sender.as_str(),
                RuleField::Subject => email.subject.as_str(),
                RuleField::Body => email.body.as_str(),
                RuleField::Text => text.as_str(),
            };

            if rule.regex.is_match(field_value) {
                debug!(
                    email_id = %email.id,
                    rule = %rule.pattern,
                    category = %rule.category,
                    weight = rule.weight,
                    "Category rule matched"
                );
                *scores.entry(rule.category).or_insert(0) += rule.weight;
            }
        }
        scores
    }

    /// Exactly one category for any input.
    pub fn categorize(&self, email: &Email) -> Category {
        pick_category(&self.score(email))
    }

    /// Tasks in body order. No match yields an empty list.
    pub fn extract_actions(&self, email: &Email) -> Vec<ActionItem> {
        let mut actions: Vec<ActionItem> = Vec::new();

        for clause in clauses(&email.body) {
            let Some(raw_task) = match_task(clause) else {
                continue;
            };
            let (description, due) = split_deadline(raw_task);
            if description.chars().count() < 3 || NOT_A_TASK.is_match(&description) {
                continue;
            }
            if actions
                .iter()
                .any(|a| a.description.eq_ignore_ascii_case(&description))
            {
                continue;
            }

            let mut item = ActionItem::new(&email.id, actions.len(), description);
            if let Some(due) = due {
                item = item.with_due_hint(due);
            }
            actions.push(item);
        }

        debug!(email_id = %email.id, count = actions.len(), "Actions extracted");
        actions
    }

    /// "<sender> wrote about '<subject>'. <first sentence>"
    pub fn summarize(&self, email: &Email) -> String {
        let subject = if email.subject.trim().is_empty() {
            "(no subject)"
        } else {
            email.subject.trim()
        };
        let first_sentence: String = email
            .body
            .split(['.', '!', '?'])
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(SUMMARY_MAX_CHARS)
            .collect();

        format!(
            "{} wrote about '{}'. {}",
            email.sender_name(),
            subject,
            first_sentence
        )
        .trim()
        .to_string()
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::default_rules()
    }
}

/// Highest score wins; ties resolved by `Category::ALL` order; no score → `Other`.
pub fn pick_category(scores: &BTreeMap<Category, u32>) -> Category {
    let mut best = Category::Other;
    let mut best_score = 0;
    for category in Category::ALL {
        let score = scores.get(&category).copied().unwrap_or(0);
        if score > best_score {
            best = category;
            best_score = score;
        }
    }
    best
}

fn clauses(body: &str) -> impl Iterator<Item = &str> {
    body.lines()
        .flat_map(|line| SENTENCE_END.split(line))
        .map(|clause| clause.trim().trim_start_matches(['-', '*', '•']).trim())
        .filter(|clause| !clause.is_empty())
}

fn match_task(clause: &str) -> Option<&str> {
    for pattern in [&*LABELLED_TASK, &*REQUEST, &*IMPERATIVE] {
        if let Some(caps) = pattern.captures(clause) {
            return caps.name("task").map(|m| m.as_str());
        }
    }
    None
}

/// Strip trailing remarks, then split off a deadline phrase if present.
fn split_deadline(task: &str) -> (String, Option<String>) {
    let task = TRAILING_REMARK.replace(task, "");
    let task = task.trim();

    let (description, due) = match DEADLINE.captures(task) {
        Some(caps) => {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(task.len());
            let due = caps
                .name("due")
                .map(|m| clean(m.as_str()))
                .filter(|d| !d.is_empty());
            (&task[..start], due)
        }
        None => (task, None),
    };

    (clean(description), due)
}

fn clean(s: &str) -> String {
    s.trim()
        .trim_end_matches(['.', '!', '?', ';', ':', ','])
        .trim()
        .to_string()
}
