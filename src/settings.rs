//! Persistent key/value settings stored as a JSON object on disk.
//!
//! Only identifiers live here (currently the conversation thread id); the
//! file is read and rewritten on every access so separate invocations of the
//! CLI always agree.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::ChatError;

/// Handle to the settings file. Cheap to clone; holds no open file.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
}

impl Settings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// String value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        Ok(self
            .read()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        let mut map = self.read()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write(&map)
    }

    /// Remove `key`; absent keys are not an error.
    pub fn remove(&self, key: &str) -> Result<(), ChatError> {
        let mut map = self.read()?;
        if map.remove(key).is_some() {
            self.write(&map)?;
        }
        Ok(())
    }

    /// Delete the settings file entirely.
    pub fn clear(&self) -> Result<(), ChatError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChatError::Io(e)),
        }
    }

    fn read(&self) -> Result<Map<String, Value>, ChatError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(ChatError::Io(e)),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ChatError::Settings(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(ChatError::Settings(format!(
                "{} is not valid JSON: {e}",
                self.path.display()
            ))),
        }
    }

    fn write(&self, map: &Map<String, Value>) -> Result<(), ChatError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }
}
