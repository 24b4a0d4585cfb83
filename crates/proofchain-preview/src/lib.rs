#![warn(missing_docs)]
//! # proofchain-preview
//!
//! ## Purpose
//! Owns the temporary displayable handle for the currently selected file.
//!
//! ## Responsibilities
//! - Define a backend-agnostic [`PreviewBackend`] trait.
//! - Materialize previews as temporary files ([`TempFilePreviewBackend`]).
//! - Provide a recording backend for tests ([`RecordingPreviewBackend`]).
//! - Guarantee at most one live handle, released exactly once.
//!
//! ## Data flow
//! Selection -> [`PreviewManager::acquire`] -> [`PreviewBackend::create`] ->
//! [`PreviewHandle`] shown by the front-end -> [`PreviewManager::release`]
//! (or replacement, or drop) -> [`PreviewBackend::revoke`].
//!
//! ## Ownership and lifetimes
//! The manager is the only owner of the live handle's backing resource.
//! Callers receive clones of the handle for display; releasing a clone that is
//! no longer live is a no-op.
//!
//! ## Error model
//! Backend creation failures return [`PreviewError`]. Revocation is
//! infallible by contract.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex};

use proofchain_core::Selection;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Displayable reference to the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    id: u64,
    uri: String,
}

impl PreviewHandle {
    /// Manager-assigned identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// URI a viewer can open.
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// Trait implemented by concrete preview providers.
pub trait PreviewBackend: Send + Sync {
    /// Creates the displayable resource for `selection` and returns its URI.
    ///
    /// # Errors
    /// Returns [`PreviewError::Backend`] when the resource cannot be created.
    fn create(&self, id: u64, selection: &Selection) -> Result<String, PreviewError>;

    /// Destroys the resource previously created under `id`.
    fn revoke(&self, id: u64);
}

/// Backend that writes each preview to a self-deleting temporary file.
#[derive(Debug, Default)]
pub struct TempFilePreviewBackend {
    files: Mutex<HashMap<u64, NamedTempFile>>,
}

impl TempFilePreviewBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreviewBackend for TempFilePreviewBackend {
    fn create(&self, id: u64, selection: &Selection) -> Result<String, PreviewError> {
        let suffix = std::path::Path::new(selection.name())
            .extension()
            .map(|extension| format!(".{}", extension.to_string_lossy()))
            .unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix("proofchain-preview-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|error| PreviewError::Backend(format!("temp file creation failed: {error}")))?;
        file.write_all(selection.bytes())
            .map_err(|error| PreviewError::Backend(format!("temp file write failed: {error}")))?;

        let uri = Url::from_file_path(file.path())
            .map_err(|_| PreviewError::Backend("temp path is not absolute".to_string()))?
            .to_string();

        let mut files = self
            .files
            .lock()
            .map_err(|_| PreviewError::Backend("preview registry lock poisoned".to_string()))?;
        files.insert(id, file);
        Ok(uri)
    }

    fn revoke(&self, id: u64) {
        match self.files.lock() {
            // Dropping the temp file deletes it.
            Ok(mut files) => drop(files.remove(&id)),
            Err(_) => warn!(
                stage = "preview",
                action = "revoke",
                id,
                "preview registry lock poisoned"
            ),
        }
    }
}

/// Snapshot of a [`RecordingPreviewBackend`]'s bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewLedger {
    /// Number of successful `create` calls.
    pub created: usize,
    /// Number of `revoke` calls.
    pub revoked: usize,
    /// Ids created and not yet revoked.
    pub live: HashSet<u64>,
    /// Ids revoked more than once, or revoked without being created.
    pub double_revoked: Vec<u64>,
}

/// In-memory backend that records every create/revoke pair.
#[derive(Debug, Default)]
pub struct RecordingPreviewBackend {
    ledger: Mutex<PreviewLedger>,
}

impl RecordingPreviewBackend {
    /// Creates an empty recording backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current bookkeeping snapshot.
    pub fn snapshot(&self) -> PreviewLedger {
        self.ledger
            .lock()
            .map(|ledger| ledger.clone())
            .unwrap_or_default()
    }
}

impl PreviewBackend for RecordingPreviewBackend {
    fn create(&self, id: u64, _selection: &Selection) -> Result<String, PreviewError> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| PreviewError::Backend("recording lock poisoned".to_string()))?;
        ledger.created += 1;
        ledger.live.insert(id);
        Ok(format!("memory://preview/{id}"))
    }

    fn revoke(&self, id: u64) {
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.revoked += 1;
            if !ledger.live.remove(&id) {
                ledger.double_revoked.push(id);
            }
        }
    }
}

/// Enforces the single-live-handle lifecycle.
pub struct PreviewManager {
    backend: Arc<dyn PreviewBackend>,
    next_id: u64,
    live: Option<PreviewHandle>,
}

impl PreviewManager {
    /// Creates a manager with no live handle.
    pub fn new(backend: Arc<dyn PreviewBackend>) -> Self {
        Self {
            backend,
            next_id: 1,
            live: None,
        }
    }

    /// Releases any live handle, then creates one for `selection`.
    ///
    /// # Errors
    /// Propagates backend creation failures. The previous handle has already
    /// been released at that point, so no handle is live afterwards.
    pub fn acquire(&mut self, selection: &Selection) -> Result<PreviewHandle, PreviewError> {
        self.release_current();

        let id = self.next_id;
        self.next_id += 1;

        let uri = self.backend.create(id, selection)?;
        let handle = PreviewHandle { id, uri };
        debug!(stage = "preview", action = "acquire", id, "preview handle acquired");
        self.live = Some(handle.clone());
        Ok(handle)
    }

    /// Releases `handle` if it is still live; otherwise does nothing.
    pub fn release(&mut self, handle: &PreviewHandle) {
        if self.live.as_ref().is_some_and(|live| live.id == handle.id) {
            self.release_current();
        }
    }

    /// Releases whatever handle is live.
    pub fn release_current(&mut self) {
        // Detach before revoking so a revoked handle is never the live one.
        if let Some(handle) = self.live.take() {
            self.backend.revoke(handle.id);
            debug!(
                stage = "preview",
                action = "release",
                id = handle.id,
                "preview handle released"
            );
        }
    }
}

impl Drop for PreviewManager {
    fn drop(&mut self) {
        self.release_current();
    }
}

impl std::fmt::Debug for PreviewManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PreviewManager")
            .field("next_id", &self.next_id)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

/// Preview layer error type.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Backend runtime failure.
    #[error("preview backend failure: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for handle lifecycle.

    use super::*;

    fn selection(name: &str) -> Selection {
        Selection::new(name, "image/png", vec![1, 2, 3]).expect("selection should build")
    }

    #[test]
    fn replacing_selection_releases_previous_handle_first() {
        let backend = Arc::new(RecordingPreviewBackend::new());
        let mut manager = PreviewManager::new(backend.clone());

        let first = manager.acquire(&selection("a.png")).expect("acquire should work");
        let second = manager.acquire(&selection("b.png")).expect("acquire should work");
        assert_ne!(first.id(), second.id());

        let snapshot = backend.snapshot();
        assert_eq!(snapshot.created, 2);
        assert_eq!(snapshot.revoked, 1);
        assert_eq!(snapshot.live, HashSet::from([second.id()]));

        // Stale clone: no second revoke.
        manager.release(&first);
        assert_eq!(backend.snapshot().revoked, 1);
    }

    #[test]
    fn drop_releases_live_handle() {
        let backend = Arc::new(RecordingPreviewBackend::new());
        {
            let mut manager = PreviewManager::new(backend.clone());
            manager.acquire(&selection("a.png")).expect("acquire should work");
        }
        let snapshot = backend.snapshot();
        assert!(snapshot.live.is_empty());
        assert!(snapshot.double_revoked.is_empty());
    }

    #[test]
    fn temp_file_backend_deletes_file_on_release() {
        let backend = Arc::new(TempFilePreviewBackend::new());
        let mut manager = PreviewManager::new(backend);

        let handle = manager.acquire(&selection("a.png")).expect("acquire should work");
        let path = Url::parse(handle.uri())
            .expect("uri should parse")
            .to_file_path()
            .expect("uri should be a file path");
        assert_eq!(std::fs::read(&path).expect("preview should exist"), vec![1, 2, 3]);
        assert!(path.to_string_lossy().ends_with(".png"));

        manager.release(&handle);
        assert!(!path.exists());
    }
}
