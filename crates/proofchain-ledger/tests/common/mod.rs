//! Shared fixtures for ledger integration tests.

use chrono::{DateTime, TimeZone, Utc};
use proofchain_core::HistoryEntry;
use proofchain_ledger::{KeyValueStore, StoreError};

/// Deterministic timestamp `seconds` after a fixed epoch.
#[allow(dead_code)]
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_735_689_600 + seconds, 0)
        .single()
        .expect("fixture timestamp should be valid")
}

/// Creates an anchored history entry fixture.
#[allow(dead_code)]
pub fn entry(index: i64) -> HistoryEntry {
    HistoryEntry {
        name: format!("file-{index}.jpg"),
        hash: format!("hash-{index}"),
        is_fake: index % 2 == 0,
        explorer_link: Some(format!("https://explorer.example/tx/{index}")),
        encoded_image: None,
        timestamp: at(index),
    }
}

/// Store whose writes always fail.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct ReadOnlyStore;

impl KeyValueStore for ReadOnlyStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("read-only volume")))
    }
}
