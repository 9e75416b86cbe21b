//! Access-token persistence.

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{CredentialConfig, StoreKind};

/// Key-value home of the current access token.
///
/// Reads happen on every outbound request, so they must be cheap.
pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Option<String>;
    fn store(&self, token: &str) -> std::io::Result<()>;
    fn clear(&self) -> std::io::Result<()>;
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: ArcSwapOption<String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: ArcSwapOption::from_pointee(token.to_string()),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.token.load_full().map(|t| t.as_ref().clone())
    }

    fn store(&self, token: &str) -> std::io::Result<()> {
        self.token.store(Some(Arc::new(token.to_string())));
        Ok(())
    }

    fn clear(&self) -> std::io::Result<()> {
        self.token.store(None);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// Write-through JSON file store, so a session survives process restarts.
pub struct FileCredentialStore {
    path: PathBuf,
    cached: MemoryCredentialStore,
}

impl FileCredentialStore {
    /// Open the store, loading the token from `path` if the file exists.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cached = MemoryCredentialStore::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let file: TokenFile = serde_json::from_reader(reader)?;
            cached.store(&file.token)?;
            tracing::debug!(path = ?path, "Loaded persisted credential");
        }
        Ok(Self { path, cached })
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Option<String> {
        self.cached.token()
    }

    fn store(&self, token: &str) -> std::io::Result<()> {
        self.cached.store(token)?;
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer(writer, &TokenFile { token: token.to_string() })?;
        Ok(())
    }

    fn clear(&self) -> std::io::Result<()> {
        self.cached.clear()?;
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Build the store selected by configuration.
pub fn open_store(config: &CredentialConfig) -> std::io::Result<Arc<dyn CredentialStore>> {
    match (config.store, config.path.as_deref()) {
        (StoreKind::File, Some(path)) => Ok(Arc::new(FileCredentialStore::open(path)?)),
        (StoreKind::File, None) => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "file credential store needs a path",
        )),
        (StoreKind::Memory, _) => Ok(Arc::new(MemoryCredentialStore::new())),
    }
}
