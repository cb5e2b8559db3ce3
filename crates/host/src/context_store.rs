use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::ResultExt;

use crate::error::{
    CreateDirSnafu, HostResult, ParseStateSnafu, ReadFileSnafu, RenameTempFileSnafu,
    SerializeStateSnafu, WriteFileSnafu,
};

/// Which key/value namespace an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextScope {
    Global,
    Workspace,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ContextState {
    #[serde(default)]
    global: BTreeMap<String, Value>,
    #[serde(default)]
    workspace: BTreeMap<String, Value>,
}

/// Global and workspace key/value context, optionally backed by a JSON file.
#[derive(Debug, Default)]
pub struct ContextStore {
    path: Option<PathBuf>,
    state: ContextState,
}

impl ContextStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the store at `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> HostResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            Self::read_state(&path)?
        } else {
            tracing::info!("context state not found at {:?}, starting empty", path);
            ContextState::default()
        };

        Ok(Self {
            path: Some(path),
            state,
        })
    }

    /// Like [`ContextStore::open`], falling back to an empty store when the file is unreadable.
    pub fn open_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(store) => store,
            Err(error) => {
                tracing::warn!("{}. starting with empty context", error);
                Self {
                    path: Some(path),
                    state: ContextState::default(),
                }
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, scope: ContextScope, key: &str) -> Option<&Value> {
        self.map(scope).get(key)
    }

    /// Stores `value` and persists the whole state. Null removes the key.
    pub fn set(&mut self, scope: ContextScope, key: &str, value: Value) -> HostResult<()> {
        let map = match scope {
            ContextScope::Global => &mut self.state.global,
            ContextScope::Workspace => &mut self.state.workspace,
        };
        if value.is_null() {
            map.remove(key);
        } else {
            map.insert(key.to_string(), value);
        }
        self.persist()
    }

    pub fn len(&self, scope: ContextScope) -> usize {
        self.map(scope).len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.global.is_empty() && self.state.workspace.is_empty()
    }

    fn map(&self, scope: ContextScope) -> &BTreeMap<String, Value> {
        match scope {
            ContextScope::Global => &self.state.global,
            ContextScope::Workspace => &self.state.workspace,
        }
    }

    fn read_state(path: &Path) -> HostResult<ContextState> {
        let content = std::fs::read_to_string(path).context(ReadFileSnafu {
            stage: "read-context-state",
            path: path.to_path_buf(),
        })?;
        serde_json::from_str(&content).context(ParseStateSnafu {
            stage: "parse-context-state",
            path: path.to_path_buf(),
        })
    }

    fn persist(&self) -> HostResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-context-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(&self.state).context(SerializeStateSnafu {
            stage: "serialize-context-state",
            what: "context state",
        })?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-context-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, path).context(RenameTempFileSnafu {
            stage: "rename-temporary-context-file",
            from: temp_path,
            to: path.clone(),
        })?;

        tracing::debug!("saved context state to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scopes_are_disjoint() {
        let mut store = ContextStore::in_memory();
        store
            .set(ContextScope::Workspace, "auto-scroll", json!(true))
            .expect("set");

        assert_eq!(
            store.get(ContextScope::Workspace, "auto-scroll"),
            Some(&json!(true))
        );
        assert_eq!(store.get(ContextScope::Global, "auto-scroll"), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("context.json");

        let mut store = ContextStore::open(&path).expect("open");
        store
            .set(
                ContextScope::Workspace,
                "last-conversation",
                json!([{ "role": "user", "content": "hi" }]),
            )
            .expect("set");
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = ContextStore::open(&path).expect("reopen");
        assert_eq!(reopened.len(ContextScope::Workspace), 1);
    }

    #[test]
    fn null_removes_key() {
        let mut store = ContextStore::in_memory();
        store
            .set(ContextScope::Global, "k", json!("v"))
            .expect("set");
        store.set(ContextScope::Global, "k", Value::Null).expect("clear");
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("context.json");
        std::fs::write(&path, "not json").expect("write");

        assert!(ContextStore::open(&path).is_err());
        let store = ContextStore::open_or_default(&path);
        assert!(store.is_empty());
        assert_eq!(store.path(), Some(path.as_path()));
    }
}
