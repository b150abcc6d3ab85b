//! Read-only inbox loaded from a JSON array of emails.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::pipeline::types::Email;
use crate::store::file;

/// Ordered, immutable collection of emails with unique ids.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    emails: Vec<Email>,
}

impl Inbox {
    /// Build an inbox, rejecting duplicate ids.
    pub fn new(emails: Vec<Email>) -> std::result::Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        for email in &emails {
            if !seen.insert(email.id.as_str()) {
                return Err(PipelineError::DataIntegrity {
                    email_id: email.id.clone(),
                    reason: "duplicate email id in inbox".to_string(),
                });
            }
        }
        Ok(Self { emails })
    }

    /// Load the inbox file. A missing file is an empty inbox.
    pub async fn load(path: &Path) -> Result<Self> {
        let emails: Vec<Email> = file::load_json(path).await?.unwrap_or_default();
        let inbox = Self::new(emails)?;
        info!(path = %path.display(), emails = inbox.len(), "Inbox loaded");
        Ok(inbox)
    }

    pub fn get(&self, email_id: &str) -> Option<&Email> {
        self.emails.iter().find(|e| e.id == email_id)
    }

    pub fn contains(&self, email_id: &str) -> bool {
        self.get(email_id).is_some()
    }

    pub fn emails(&self) -> &[Email] {
        &self.emails
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}
