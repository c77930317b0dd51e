//! Durable session storage.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Key-value store for the session token and user profile.
///
/// Backed by a JSON file when a path is given; every mutation is written
/// through so the session survives restarts.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<DashMap<String, Value>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed store, loading existing contents if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        let store = Self {
            inner: Arc::new(DashMap::new()),
            path: Some(path.clone()),
        };

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let map: HashMap<String, Value> = serde_json::from_reader(reader)?;
            for (k, v) in map {
                store.inner.insert(k, v);
            }
            tracing::debug!(path = %path.display(), entries = store.inner.len(), "Session loaded");
        }
        Ok(store)
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .get(TOKEN_KEY)
            .and_then(|r| r.value().as_str().map(str::to_string))
    }

    pub fn set_token(&self, token: &str) -> Result<(), SessionError> {
        self.inner.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.persist()
    }

    pub fn user(&self) -> Option<Value> {
        self.inner.get(USER_KEY).map(|r| r.value().clone())
    }

    pub fn set_user(&self, user: Value) -> Result<(), SessionError> {
        self.inner.insert(USER_KEY.to_string(), user);
        self.persist()
    }

    /// Forget the session entirely.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.inner.clear();
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn persist(&self) -> Result<(), SessionError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let map: HashMap<_, _> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let mut writer = BufWriter::new(create_private(path)?);
        serde_json::to_writer(&mut writer, &map)?;
        writer.flush()?;
        Ok(())
    }
}

/// Open `path` for writing, readable by the owner only. The session file
/// holds a bearer token.
fn create_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        options.mode(0o600);
        let file = options.open(path)?;
        // `mode` only applies to newly created files.
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    options.open(path)
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("path", &self.path)
            .field("authenticated", &self.inner.contains_key(TOKEN_KEY))
            .finish()
    }
}
