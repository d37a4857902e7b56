//! Persistent key/value settings for the lumen shell.
//!
//! One flat JSON document under the per-user config directory. Reads are
//! typed with caller-supplied defaults; writes persist immediately. A
//! missing file means defaults; a malformed file is tolerated with a
//! warning and an empty in-memory document.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use lumen_types::{LumenError, Result};

/// Default settings file location: `<config_dir>/lumen/settings.json`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lumen").join("settings.json"))
}

/// The settings store. Interior mutability so a shared handle can serve
/// the dispatcher, completion engine, and prompt within one thread.
pub struct Settings {
    path: Option<PathBuf>,
    doc: RefCell<Map<String, Value>>,
}

impl Settings {
    /// Load from the per-user config directory (or in-memory defaults if
    /// no config directory can be resolved).
    pub fn load_default() -> Self {
        match default_path() {
            Some(path) => Self::load(&path),
            None => {
                log::warn!("no per-user config directory; settings will not persist");
                Self {
                    path: None,
                    doc: RefCell::new(Map::new()),
                }
            },
        }
    }

    /// Load from an explicit file path.
    pub fn load(path: &Path) -> Self {
        let doc = match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    log::warn!("{}: not a JSON object; using defaults", path.display());
                    Map::new()
                },
                Err(e) => {
                    log::warn!("{}: malformed settings ({e}); using defaults", path.display());
                    Map::new()
                },
            },
            Err(_) => Map::new(),
        };
        Self {
            path: Some(path.to_path_buf()),
            doc: RefCell::new(doc),
        }
    }

    /// An in-memory store that never persists. For tests.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            doc: RefCell::new(Map::new()),
        }
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        match self.doc.borrow().get(key) {
            Some(Value::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.doc.borrow().get(key) {
            Some(Value::Bool(b)) => *b,
            _ => default,
        }
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.doc.borrow().get(key) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
            _ => default,
        }
    }

    /// All keys, sorted, with their raw JSON values rendered. For `settings list`.
    pub fn entries(&self) -> Vec<(String, String)> {
        let doc = self.doc.borrow();
        let mut entries: Vec<(String, String)> = doc
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Raw value lookup, rendered. `None` if the key is absent.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.doc.borrow().get(key).map(|v| v.to_string())
    }

    /// Set a key and persist immediately. Strings that parse as JSON
    /// booleans or integers are stored typed.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let parsed = match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => match value.parse::<i64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => Value::String(value.to_string()),
            },
        };
        self.doc.borrow_mut().insert(key.to_string(), parsed);
        self.persist()
    }

    /// Remove a key and persist immediately. Returns whether it existed.
    pub fn unset(&self, key: &str) -> Result<bool> {
        let existed = self.doc.borrow_mut().remove(key).is_some();
        if existed {
            self.persist()?;
        }
        Ok(existed)
    }

    fn persist(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&Value::Object(self.doc.borrow().clone()))?;
        fs::write(path, text).map_err(|e| {
            LumenError::Settings(format!("cannot write {}: {e}", path.display()))
        })
    }
}
