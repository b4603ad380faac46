//! Plain JSON preferences file from older app versions
//!
//! Older builds kept cached credits and the exception flag in an unencrypted
//! preferences file. This adapter only needs to read and remove entries so the
//! cache can migrate them into the keychain.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use creditsync_common::error::{CommonError, CommonResult};
use creditsync_core::ports::{LegacyStore, LegacyValue};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// [`LegacyStore`] over a JSON object on disk.
///
/// A missing file reads as empty. Values that are neither booleans nor
/// integers are ignored on read and preserved on rewrite.
#[derive(Debug)]
pub struct JsonPreferencesStore {
    path: PathBuf,
    // serialises read-modify-write of the file
    lock: Mutex<()>,
}

impl JsonPreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> CommonResult<Map<String, Value>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(CommonError::persistence(
                    "read",
                    format!("{}: {e}", self.path.display()),
                ))
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CommonError::serialization("json", "preferences file is not an object")),
            Err(e) => Err(CommonError::serialization("json", e.to_string())),
        }
    }

    fn store(&self, map: &Map<String, Value>) -> CommonResult<()> {
        let contents = serde_json::to_string_pretty(map)
            .map_err(|e| CommonError::serialization("json", e.to_string()))?;
        fs::write(&self.path, contents).map_err(|e| {
            CommonError::persistence("write", format!("{}: {e}", self.path.display()))
        })
    }
}

fn scalar(value: &Value) -> Option<LegacyValue> {
    match value {
        Value::Bool(b) => Some(LegacyValue::Bool(*b)),
        Value::Number(n) => n.as_i64().map(LegacyValue::Int),
        _ => None,
    }
}

impl LegacyStore for JsonPreferencesStore {
    fn read(&self, key: &str) -> CommonResult<Option<LegacyValue>> {
        let _guard = self.lock.lock();
        let map = self.load()?;

        let value = map.get(key).and_then(|raw| {
            let value = scalar(raw);
            if value.is_none() {
                warn!(key, "legacy preference is not a scalar, ignoring");
            }
            value
        });
        Ok(value)
    }

    fn remove(&self, key: &str) -> CommonResult<()> {
        let _guard = self.lock.lock();
        let mut map = self.load()?;

        if map.remove(key).is_none() {
            return Ok(());
        }
        self.store(&map)?;
        debug!(key, path = %self.path.display(), "legacy preference removed");
        Ok(())
    }
}
