//! Processed-state store: the result of the latest "Process Inbox" run.
//!
//! Exactly one `ProcessedState` exists at a time. `replace` is the only
//! writer: it persists the new document and swaps the in-memory copy while
//! holding the write lock, so readers see the old state or the new one.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::StoreError;
use crate::pipeline::types::{ActionItem, Category, ProcessedEntry, ProcessedState};
use crate::store::file;

/// File-backed holder of the current `ProcessedState`.
pub struct ProcessedStateStore {
    path: PathBuf,
    state: RwLock<Option<ProcessedState>>,
}

impl ProcessedStateStore {
    /// Open the store, loading the last committed run if one exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state: Option<ProcessedState> = file::load_json(&path).await?;
        match &state {
            Some(s) => info!(
                path = %path.display(),
                emails = s.entries.len(),
                run = %s.run_timestamp,
                "Loaded processed state"
            ),
            None => info!(path = %path.display(), "No processed state yet"),
        }
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `next` and make it the current state. All-or-nothing: on error
    /// the previous state stays in place, on disk and in memory.
    pub(crate) async fn replace(&self, next: ProcessedState) -> Result<(), StoreError> {
        let mut current = self.state.write().await;
        file::write_json(&self.path, &next).await?;
        info!(
            emails = next.entries.len(),
            run = %next.run_timestamp,
            "Processed state replaced"
        );
        *current = Some(next);
        Ok(())
    }

    /// Clone of the current state, if any run has been committed.
    pub async fn snapshot(&self) -> Option<ProcessedState> {
        self.state.read().await.clone()
    }

    /// Whether a run has been committed.
    pub async fn has_run(&self) -> bool {
        self.state.read().await.is_some()
    }

    pub async fn run_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.as_ref().map(|s| s.run_timestamp)
    }

    /// Point lookup. `NotFound` before the first run or for an unknown id.
    pub async fn get(&self, email_id: &str) -> Result<ProcessedEntry, StoreError> {
        self.state
            .read()
            .await
            .as_ref()
            .and_then(|s| s.entries.get(email_id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("processed email", email_id))
    }

    /// Ids of emails in `category`, in inbox order. Empty before the first run.
    pub async fn by_category(&self, category: Category) -> Vec<String> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|s| s.ids_in_category(category))
            .unwrap_or_default()
    }

    pub async fn all_urgent(&self) -> Vec<String> {
        self.by_category(Category::Urgent).await
    }

    /// Every action item, grouped per email in inbox order.
    pub async fn all_action_items(&self) -> Vec<(String, Vec<ActionItem>)> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|s| {
                s.ordered()
                    .into_iter()
                    .filter(|(_, entry)| !entry.actions.is_empty())
                    .map(|(id, entry)| (id.clone(), entry.actions.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Draft;
    use tempfile::TempDir;

    fn entry(id: &str, position: usize, category: Category, actions: usize) -> ProcessedEntry {
        ProcessedEntry {
            position,
            category,
            actions: (0..actions)
                .map(|i| ActionItem::new(id, i, format!("task {i}")))
                .collect(),
            summary: format!("summary of {id}"),
            draft: Draft::auto(id, "body", "reply.generic"),
        }
    }

    fn state(entries: &[(&str, Category, usize)]) -> ProcessedState {
        let mut s = ProcessedState::new(Utc::now());
        for (position, (id, category, actions)) in entries.iter().enumerate() {
            s.entries
                .insert(id.to_string(), entry(id, position, *category, *actions));
        }
        s
    }

    #[tokio::test]
    async fn get_before_any_run_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ProcessedStateStore::open(dir.path().join("state.json"))
            .await
            .unwrap();
        assert!(!store.has_run().await);
        assert!(store.get("1").await.unwrap_err().is_not_found());
        assert!(store.all_urgent().await.is_empty());
    }

    #[tokio::test]
    async fn replace_then_read_back_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = ProcessedStateStore::open(&path).await.unwrap();
        let next = state(&[
            ("a", Category::Urgent, 1),
            ("b", Category::Other, 0),
            ("c", Category::Urgent, 2),
        ]);

        store.replace(next.clone()).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().category, Category::Urgent);
        assert!(store.get("zzz").await.unwrap_err().is_not_found());
        assert_eq!(store.all_urgent().await, vec!["a", "c"]);
        assert_eq!(store.by_category(Category::Other).await, vec!["b"]);

        let actions = store.all_action_items().await;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].0, "a");
        assert_eq!(actions[1].1.len(), 2);

        let reopened = ProcessedStateStore::open(&path).await.unwrap();
        assert_eq!(reopened.snapshot().await, Some(next));
    }

    #[tokio::test]
    async fn failed_replace_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = ProcessedStateStore::open(&path).await.unwrap();
        let first = state(&[("a", Category::Urgent, 1)]);
        store.replace(first.clone()).await.unwrap();

        std::fs::create_dir(dir.path().join("state.json.tmp")).unwrap();
        let result = store
            .replace(state(&[("x", Category::Other, 0), ("y", Category::Other, 0)]))
            .await;
        assert!(result.is_err());

        assert_eq!(store.snapshot().await, Some(first.clone()));
        assert!(store.get("x").await.is_err());
        let reopened = ProcessedStateStore::open(&path).await.unwrap();
        assert_eq!(reopened.snapshot().await, Some(first));
    }
}
