//! JSON document persistence shared by the file-backed stores.
//!
//! Writes go to a sibling temp file which is flushed, synced and renamed over
//! the target, so a failed write never leaves a half-written document behind.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StoreError;

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Load a JSON document, or `None` if the file does not exist.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    let value = serde_json::from_str(&content).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}

/// Serialize `value` and atomically replace the document at `path`.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut content =
        serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        })?;
    content.push('\n');

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = write_and_rename(&temp_path, path, content.as_bytes()).await {
        // Best effort: the temp file may not exist if creation failed.
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    debug!(path = %path.display(), bytes = content.len(), "Document written");
    Ok(())
}

async fn write_and_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| io_error(temp_path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| io_error(temp_path, e))?;
    file.flush().await.map_err(|e| io_error(temp_path, e))?;
    file.sync_all().await.map_err(|e| io_error(temp_path, e))?;
    drop(file);

    fs::rename(temp_path, path)
        .await
        .map_err(|e| io_error(path, e))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let loaded: Option<BTreeMap<String, String>> =
            load_json(&dir.path().join("nope.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn write_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/doc.json");
        let mut doc = BTreeMap::new();
        doc.insert("k".to_string(), "v".to_string());

        write_json(&path, &doc).await.unwrap();

        let loaded: BTreeMap<String, String> = load_json(&path).await.unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(!dir.path().join("a/b/doc.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_document_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let result: Result<Option<BTreeMap<String, String>>, _> = load_json(&path).await;
        assert!(matches!(result, Err(StoreError::Serialization { .. })));
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        write_json(&path, &vec![1, 2, 3]).await.unwrap();

        // A directory squatting on the temp path makes the write fail.
        std::fs::create_dir(dir.path().join("doc.json.tmp")).unwrap();
        let result = write_json(&path, &vec![4]).await;
        assert!(matches!(result, Err(StoreError::Io { .. })));

        let loaded: Vec<i32> = load_json(&path).await.unwrap().unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);
    }
}
