use gatepass_core::{CoreError, CoreResult, SessionStore};
use gatepass_shared::Session;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Session persisted as a JSON file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write through a sibling temp file so a crash never leaves half a file
pub(crate) fn write_atomically(path: &Path, contents: &str) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CoreError::Storage(e.to_string()))?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(|e| CoreError::Storage(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| CoreError::Storage(e.to_string()))
}

pub(crate) fn remove_if_present(path: &Path) -> CoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoreError::Storage(e.to_string())),
    }
}

pub(crate) fn read_if_present(path: &Path) -> CoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::Storage(e.to_string())),
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> CoreResult<Option<Session>> {
        match read_if_present(&self.path)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, session: &Session) -> CoreResult<()> {
        let raw = serde_json::to_string_pretty(session)?;
        write_atomically(&self.path, &raw)?;
        info!("Session saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        remove_if_present(&self.path)
    }
}
