//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// File locations for the assistant. Everything is local; there is no
/// network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding the persisted documents.
    pub data_dir: PathBuf,
    /// Mock inbox JSON (read-only).
    pub inbox_path: PathBuf,
    pub templates_path: PathBuf,
    pub drafts_path: PathBuf,
    pub state_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::in_dir("./data")
    }
}

impl AppConfig {
    /// Default layout with all documents under `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            templates_path: data_dir.join("templates.json"),
            drafts_path: data_dir.join("drafts.json"),
            state_path: data_dir.join("processed_state.json"),
            inbox_path: PathBuf::from("./assets/mock_inbox.json"),
            data_dir,
        }
    }

    /// Build from `INBOX_ASSIST_*` environment variables.
    ///
    /// - `INBOX_ASSIST_DATA_DIR` (default `./data`)
    /// - `INBOX_ASSIST_INBOX` (default `./assets/mock_inbox.json`)
    /// - `INBOX_ASSIST_TEMPLATES`, `INBOX_ASSIST_DRAFTS`, `INBOX_ASSIST_STATE`
    ///   override single documents
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str| -> Result<Option<PathBuf>, ConfigError> {
            match lookup(key) {
                None => Ok(None),
                Some(value) if value.trim().is_empty() => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "path must not be empty".to_string(),
                }),
                Some(value) => Ok(Some(PathBuf::from(value.trim()))),
            }
        };

        let mut config = match path("INBOX_ASSIST_DATA_DIR")? {
            Some(dir) => Self::in_dir(dir),
            None => Self::default(),
        };
        if let Some(inbox) = path("INBOX_ASSIST_INBOX")? {
            config.inbox_path = inbox;
        }
        if let Some(templates) = path("INBOX_ASSIST_TEMPLATES")? {
            config.templates_path = templates;
        }
        if let Some(drafts) = path("INBOX_ASSIST_DRAFTS")? {
            config.drafts_path = drafts;
        }
        if let Some(state) = path("INBOX_ASSIST_STATE")? {
            config.state_path = state;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.state_path, PathBuf::from("./data/processed_state.json"));
        assert_eq!(config.inbox_path, PathBuf::from("./assets/mock_inbox.json"));
    }

    #[test]
    fn data_dir_moves_all_documents() {
        let config = AppConfig::from_lookup(lookup(&[("INBOX_ASSIST_DATA_DIR", "/tmp/ia")])).unwrap();
        assert_eq!(config.templates_path, PathBuf::from("/tmp/ia/templates.json"));
        assert_eq!(config.drafts_path, PathBuf::from("/tmp/ia/drafts.json"));
    }

    #[test]
    fn per_document_overrides_win() {
        let config = AppConfig::from_lookup(lookup(&[
            ("INBOX_ASSIST_DATA_DIR", "/tmp/ia"),
            ("INBOX_ASSIST_DRAFTS", "/elsewhere/d.json"),
            ("INBOX_ASSIST_INBOX", "inbox.json"),
        ]))
        .unwrap();
        assert_eq!(config.drafts_path, PathBuf::from("/elsewhere/d.json"));
        assert_eq!(config.state_path, PathBuf::from("/tmp/ia/processed_state.json"));
        assert_eq!(config.inbox_path, PathBuf::from("inbox.json"));
    }

    #[test]
    fn empty_value_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("INBOX_ASSIST_STATE", "  ")])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "INBOX_ASSIST_STATE"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }
}
