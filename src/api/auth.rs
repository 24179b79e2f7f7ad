//! Session file operations for bearer token storage.
//!
//! The session file is a flat JSON object holding `access_token` and, when
//! the user asked to be remembered, `email`/`password`. Every write is a
//! single read/merge/write transaction: serialized by an in-process lock and
//! committed by renaming a sibling temp file over the target.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};
use thiserror::Error;

use super::types::Credentials;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const EMAIL_KEY: &str = "email";
pub const PASSWORD_KEY: &str = "password";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Session file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Session file is not a JSON object")]
    NotAnObject,
}

/// JSON key-value store backing the remembered session.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read a single key. A missing file reads as `None`.
    pub fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        let _guard = self.guard();
        Ok(self.read_map()?.and_then(|mut map| map.remove(key)))
    }

    /// Set `key` to `value`, keeping every other key in the file.
    pub fn update(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.transaction(|map| {
            map.insert(key.to_string(), value);
            Ok(())
        })
    }

    /// Remove `key`. Deletes the file if it ends up empty.
    pub fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.transaction(|map| {
            map.remove(key);
            Ok(())
        })
    }

    /// Run `f` against the current document and commit the result.
    ///
    /// Nothing is written if `f` fails. An empty document deletes the file.
    pub fn transaction<F>(&self, f: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut Map<String, Value>) -> Result<(), SessionError>,
    {
        let _guard = self.guard();
        let mut map = self.read_map()?.unwrap_or_default();
        f(&mut map)?;
        if map.is_empty() {
            self.delete_file()
        } else {
            self.write_map(&map)
        }
    }

    /// Delete the session file. Idempotent.
    pub fn clear(&self) -> Result<(), SessionError> {
        let _guard = self.guard();
        self.delete_file()
    }

    /// Stored bearer token, if any. Non-string values count as absent.
    pub fn access_token(&self) -> Result<Option<String>, SessionError> {
        Ok(self
            .get(ACCESS_TOKEN_KEY)?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|t| !t.is_empty()))
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), SessionError> {
        self.update(ACCESS_TOKEN_KEY, Value::String(token.to_string()))
    }

    pub fn forget_token(&self) -> Result<(), SessionError> {
        self.remove(ACCESS_TOKEN_KEY)
    }

    /// Remembered email/password pair. Both keys must be present strings.
    pub fn credentials(&self) -> Result<Option<Credentials>, SessionError> {
        let _guard = self.guard();
        let Some(map) = self.read_map()? else {
            return Ok(None);
        };
        let email = map.get(EMAIL_KEY).and_then(Value::as_str);
        let password = map.get(PASSWORD_KEY).and_then(Value::as_str);
        Ok(match (email, password) {
            (Some(email), Some(password)) => Some(Credentials::new(email, password)),
            _ => None,
        })
    }

    pub fn remember_credentials(&self, credentials: &Credentials) -> Result<(), SessionError> {
        self.transaction(|map| {
            map.insert(EMAIL_KEY.to_string(), Value::String(credentials.email.clone()));
            map.insert(
                PASSWORD_KEY.to_string(),
                Value::String(credentials.password.clone()),
            );
            Ok(())
        })
    }

    pub fn forget_credentials(&self) -> Result<(), SessionError> {
        self.transaction(|map| {
            map.remove(EMAIL_KEY);
            map.remove(PASSWORD_KEY);
            Ok(())
        })
    }

    // A poisoned lock only means another transaction panicked; the file on
    // disk is still whole because commits are renames.
    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_map(&self) -> Result<Option<Map<String, Value>>, SessionError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&contents)? {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(SessionError::NotAnObject),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(map)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, contents)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn delete_file(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()), // already gone
            Err(e) => Err(e.into()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
