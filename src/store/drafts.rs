//! Draft store: user-edited reply drafts, kept apart from auto drafts.
//!
//! Only explicit user actions write here. Re-processing the inbox never
//! touches this document, so an edited draft survives every run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::info;

use crate::error::StoreError;
use crate::pipeline::types::Draft;
use crate::store::file;
use crate::store::processed::ProcessedStateStore;

/// File-backed map of email id → edited draft.
pub struct DraftStore {
    path: PathBuf,
    drafts: RwLock<BTreeMap<String, Draft>>,
}

impl DraftStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let drafts: BTreeMap<String, Draft> = file::load_json(&path).await?.unwrap_or_default();
        info!(path = %path.display(), drafts = drafts.len(), "Draft store opened");
        Ok(Self {
            path,
            drafts: RwLock::new(drafts),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Edited draft for an email.
    pub async fn get(&self, email_id: &str) -> Result<Draft, StoreError> {
        self.drafts
            .read()
            .await
            .get(email_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("draft", email_id))
    }

    /// Upsert an edited draft and stamp its modification time.
    pub async fn save(&self, email_id: &str, body: &str) -> Result<Draft, StoreError> {
        let draft = Draft::edited(email_id, body);
        let mut drafts = self.drafts.write().await;
        let mut updated = drafts.clone();
        updated.insert(email_id.to_string(), draft.clone());
        file::write_json(&self.path, &updated).await?;
        *drafts = updated;
        info!(email_id, chars = body.chars().count(), "Draft saved");
        Ok(draft)
    }

    /// Remove an edited draft. Returns whether one existed.
    pub async fn clear(&self, email_id: &str) -> Result<bool, StoreError> {
        let mut drafts = self.drafts.write().await;
        if !drafts.contains_key(email_id) {
            return Ok(false);
        }
        let mut updated = drafts.clone();
        updated.remove(email_id);
        file::write_json(&self.path, &updated).await?;
        *drafts = updated;
        info!(email_id, "Draft cleared");
        Ok(true)
    }

    /// Draft to display or "send": the edited draft if there is one,
    /// otherwise the auto draft from the last processing run.
    pub async fn effective(
        &self,
        email_id: &str,
        processed: &ProcessedStateStore,
    ) -> Result<Draft, StoreError> {
        if let Some(edited) = self.drafts.read().await.get(email_id) {
            return Ok(edited.clone());
        }
        processed.get(email_id).await.map(|entry| entry.draft)
    }

    /// Every edited draft, keyed by email id.
    pub async fn snapshot(&self) -> BTreeMap<String, Draft> {
        self.drafts.read().await.clone()
    }

    /// Email ids that have an edited draft.
    pub async fn email_ids(&self) -> Vec<String> {
        self.drafts.read().await.keys().cloned().collect()
    }
}
