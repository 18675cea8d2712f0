//! Last-known table hint persistence
//!
//! The hint only helps a reloaded client find its table again. It is never
//! consulted for escrow decisions.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use crate::error::{FlowResult, StakeFlowError};

/// Injected key-value store for the table hint
pub trait TableHintStore: Send + Sync {
    fn get(&self, key: &str) -> FlowResult<Option<String>>;
    fn set(&self, key: &str, table_id: &str) -> FlowResult<()>;
    fn clear(&self, key: &str) -> FlowResult<()>;
}

fn poisoned() -> StakeFlowError {
    StakeFlowError::Storage {
        message: "table hint store lock poisoned".to_string(),
    }
}

/// Process-local hint store
#[derive(Debug, Default)]
pub struct InMemoryTableHintStore {
    hints: Mutex<HashMap<String, String>>,
}

impl InMemoryTableHintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableHintStore for InMemoryTableHintStore {
    fn get(&self, key: &str) -> FlowResult<Option<String>> {
        Ok(self.hints.lock().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn set(&self, key: &str, table_id: &str) -> FlowResult<()> {
        self.hints
            .lock()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), table_id.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> FlowResult<()> {
        self.hints.lock().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}

/// Hint store backed by a small JSON file, surviving process restarts
#[derive(Debug)]
pub struct FileTableHintStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTableHintStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> FlowResult<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, hints: &HashMap<String, String>) -> FlowResult<()> {
        let content = serde_json::to_string_pretty(hints)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl TableHintStore for FileTableHintStore {
    fn get(&self, key: &str) -> FlowResult<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, table_id: &str) -> FlowResult<()> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut hints = self.load()?;
        hints.insert(key.to_string(), table_id.to_string());
        self.save(&hints)
    }

    fn clear(&self, key: &str) -> FlowResult<()> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut hints = self.load()?;
        if hints.remove(key).is_some() {
            self.save(&hints)?;
        }
        Ok(())
    }
}
