//! Integration tests for the theme subcommand behavior.

use proofchain_app::{AppError, THEME_TOGGLE, apply_theme_choice};
use proofchain_ledger::{KeyValueStore, MemoryStore, THEME_KEY, Theme};

#[test]
fn theme_preference_tests_default_is_dark_and_reading_does_not_write() {
    let store = MemoryStore::new();
    assert_eq!(apply_theme_choice(&store, None).expect("read should work"), Theme::Dark);
    assert_eq!(store.get(THEME_KEY).expect("get should work"), None);
}

#[test]
fn theme_preference_tests_toggle_flips_and_persists() {
    let store = MemoryStore::new();

    let first = apply_theme_choice(&store, Some(THEME_TOGGLE)).expect("toggle should work");
    assert_eq!(first, Theme::Light);
    assert_eq!(store.get(THEME_KEY).expect("get should work").as_deref(), Some("light"));

    let second = apply_theme_choice(&store, Some(THEME_TOGGLE)).expect("toggle should work");
    assert_eq!(second, Theme::Dark);
    assert_eq!(apply_theme_choice(&store, None).expect("read should work"), Theme::Dark);
}

#[test]
fn theme_preference_tests_explicit_value_is_stored_and_unknown_is_rejected() {
    let store = MemoryStore::new();
    assert_eq!(apply_theme_choice(&store, Some("light")).expect("set should work"), Theme::Light);

    let rejected = apply_theme_choice(&store, Some("sepia"));
    assert!(matches!(rejected, Err(AppError::InvalidInput(_))));
    assert_eq!(store.get(THEME_KEY).expect("get should work").as_deref(), Some("light"));
}
