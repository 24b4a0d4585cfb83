#![warn(missing_docs)]
//! # proofchain-ledger
//!
//! ## Purpose
//! Keeps the bounded, newest-first record of recent anchored verifications
//! and the persisted theme preference.
//!
//! ## Responsibilities
//! - Load the persisted history once at session start, tolerating absence and
//!   corruption.
//! - Prepend new entries, cap the sequence at [`HISTORY_CAPACITY`], and
//!   persist the capped sequence with a single store write.
//! - Read and write the theme preference.
//!
//! ## Data flow
//! Session start -> [`HistoryLedger::load`]; anchored success ->
//! [`HistoryLedger::append`] -> [`KeyValueStore::set`] under [`HISTORY_KEY`].
//!
//! ## Error model
//! Loading never fails. Persistence failures come back as [`LedgerError`]
//! after the in-memory sequence has been updated, so the caller can log them
//! without losing the entry for the rest of the session.

mod store;

use std::sync::Arc;

use proofchain_core::HistoryEntry;
use thiserror::Error;
use tracing::{debug, warn};

pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

/// Store key for the persisted history array.
pub const HISTORY_KEY: &str = "proof_history";
/// Store key for the theme preference.
pub const THEME_KEY: &str = "theme";
/// Maximum number of retained history entries.
pub const HISTORY_CAPACITY: usize = 5;

/// Capped, newest-first verification history.
pub struct HistoryLedger {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<HistoryEntry>,
}

impl HistoryLedger {
    /// Loads the persisted history.
    ///
    /// Missing, unreadable, or malformed values yield an empty ledger.
    /// Oversized persisted sequences are truncated to [`HISTORY_CAPACITY`].
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let entries = match store.get(HISTORY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
                Ok(mut entries) => {
                    entries.truncate(HISTORY_CAPACITY);
                    entries
                }
                Err(error) => {
                    warn!(
                        stage = "ledger",
                        action = "load",
                        %error,
                        "discarding malformed history"
                    );
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(error) => {
                warn!(stage = "ledger", action = "load", %error, "history store unreadable");
                Vec::new()
            }
        };

        debug!(stage = "ledger", action = "load", entries = entries.len(), "history loaded");
        Self { store, entries }
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prepends `entry`, drops anything beyond [`HISTORY_CAPACITY`], and
    /// persists the result.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the sequence cannot be encoded or written.
    /// The in-memory sequence is updated either way.
    pub fn append(&mut self, entry: HistoryEntry) -> Result<(), LedgerError> {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAPACITY);

        let encoded = serde_json::to_string(&self.entries)?;
        self.store.set(HISTORY_KEY, &encoded)?;
        debug!(
            stage = "ledger",
            action = "append",
            entries = self.entries.len(),
            "history persisted"
        );
        Ok(())
    }
}

impl std::fmt::Debug for HistoryLedger {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HistoryLedger")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

/// Persisted visual theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Dark palette.
    #[default]
    Dark,
    /// Light palette.
    Light,
}

impl Theme {
    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    /// Parses the stored string form.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    /// The other theme.
    pub fn toggled(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Reads the theme preference, falling back to [`Theme::Dark`].
pub fn load_theme(store: &dyn KeyValueStore) -> Theme {
    match store.get(THEME_KEY) {
        Ok(Some(raw)) => Theme::parse(&raw).unwrap_or_default(),
        Ok(None) => Theme::default(),
        Err(error) => {
            warn!(stage = "preferences", action = "load_theme", %error, "theme store unreadable");
            Theme::default()
        }
    }
}

/// Persists the theme preference.
///
/// # Errors
/// Returns [`LedgerError::Store`] on write failure.
pub fn save_theme(store: &dyn KeyValueStore, theme: Theme) -> Result<(), LedgerError> {
    store.set(THEME_KEY, theme.as_str())?;
    Ok(())
}

/// Ledger persistence errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Entries could not be serialized.
    #[error("history encode failure: {0}")]
    Encode(#[from] serde_json::Error),
    /// Store write failed.
    #[error("history store failure: {0}")]
    Store(#[from] StoreError),
}
