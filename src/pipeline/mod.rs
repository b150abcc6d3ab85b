//! Inbox processing pipeline.
//!
//! Every email flows through:
//! 1. `EmailIntelligence`: categorize, extract actions, summarize, draft
//!    (`HeuristicEngine` over `RulesEngine` by default)
//! 2. `InboxProcessor`: integrity check, then one atomic state replace
//!
//! **Nothing is ever sent.** Drafts are stored for the user to review.

pub mod heuristics;
pub mod processor;
pub mod rules;
pub mod types;
