//! Integration tests for complete verification flows.

mod common;

use std::cell::RefCell;
use std::sync::Arc;

use proofchain_artifacts::{EncodeOptions, encode};
use proofchain_core::{ChainAnchor, HistoryEntry, VerificationResult};
use proofchain_ledger::{HISTORY_KEY, KeyValueStore, MemoryStore, StoreError};
use proofchain_preview::RecordingPreviewBackend;
use proofchain_session::{CompletionOutcome, SessionState, run_analysis};

struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
}

#[tokio::test]
async fn verification_flow_tests_anchored_success_opens_certificate_and_records_history() {
    let store = Arc::new(MemoryStore::new());
    let session = RefCell::new(common::controller(
        Arc::new(RecordingPreviewBackend::new()),
        store.clone(),
    ));
    let client = common::client(Arc::new(common::ScriptedTransport::immediate(
        200,
        common::ANCHORED_BODY,
    )));

    session.borrow_mut().select_file(common::selection("portrait.jpg"));
    let outcome = run_analysis(&session, &client).await.expect("analysis should run");
    assert_eq!(
        outcome,
        CompletionOutcome::Applied {
            code_generated: true,
            certificate_view_opened: true,
            history_recorded: true,
        }
    );

    let mut controller = session.borrow_mut();
    assert_eq!(controller.state(), SessionState::CertificateViewOpen);

    let verdict = controller
        .result()
        .and_then(VerificationResult::verdict)
        .expect("verdict should be shown")
        .clone();
    assert_eq!(verdict.hash, "abc123");
    assert!(!verdict.is_fake);
    assert_eq!(verdict.confidence_display(), "97.00%");
    assert_eq!(
        verdict.chain,
        Some(ChainAnchor::Anchored {
            tx_id: "0xdead".to_string(),
            explorer_link: common::EXPLORER.to_string(),
        })
    );

    let expected_code =
        encode(common::EXPLORER, &EncodeOptions::default()).expect("link should encode");
    assert_eq!(controller.encoded_image(), Some(&expected_code));

    let history = controller.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].name, "portrait.jpg");
    assert_eq!(history[0].hash, "abc123");
    assert!(!history[0].is_fake);
    assert_eq!(history[0].explorer_link.as_deref(), Some(common::EXPLORER));
    assert_eq!(history[0].encoded_image.as_ref(), Some(&expected_code));

    let persisted = store
        .get(HISTORY_KEY)
        .expect("store should be readable")
        .expect("history should be persisted");
    let persisted: Vec<HistoryEntry> = serde_json::from_str(&persisted).expect("history json");
    assert_eq!(persisted, controller.history());

    let certificate = controller.render_certificate().expect("certificate should render");
    assert_eq!((certificate.width, certificate.height), (800, 1000));

    controller.close_certificate_view().expect("view should close");
    assert!(matches!(
        controller.state(),
        SessionState::ResultReady(VerificationResult::Success(_))
    ));
    controller.open_certificate_view().expect("view should reopen");
    assert_eq!(controller.state(), SessionState::CertificateViewOpen);
}

#[tokio::test]
async fn verification_flow_tests_server_error_surfaces_body_without_artifacts() {
    let store = Arc::new(MemoryStore::new());
    let session = RefCell::new(common::controller(
        Arc::new(RecordingPreviewBackend::new()),
        store.clone(),
    ));
    let client = common::client(Arc::new(common::ScriptedTransport::immediate(
        413,
        "file too large",
    )));

    session.borrow_mut().select_file(common::selection("huge.jpg"));
    let outcome = run_analysis(&session, &client).await.expect("analysis should run");
    assert_eq!(
        outcome,
        CompletionOutcome::Applied {
            code_generated: false,
            certificate_view_opened: false,
            history_recorded: false,
        }
    );

    let controller = session.borrow();
    assert_eq!(
        controller.state(),
        SessionState::ResultReady(VerificationResult::failure("file too large"))
    );
    assert_eq!(controller.encoded_image(), None);
    assert!(controller.history().is_empty());
    assert_eq!(store.get(HISTORY_KEY).expect("store should be readable"), None);
}

#[tokio::test]
async fn verification_flow_tests_unanchored_success_shows_verdict_only() {
    let store = Arc::new(MemoryStore::new());
    let session = RefCell::new(common::controller(
        Arc::new(RecordingPreviewBackend::new()),
        store.clone(),
    ));
    let client = common::client(Arc::new(common::ScriptedTransport::immediate(
        200,
        common::UNANCHORED_BODY,
    )));

    session.borrow_mut().select_file(common::selection("edited.jpg"));
    run_analysis(&session, &client).await.expect("analysis should run");

    let mut controller = session.borrow_mut();
    let SessionState::ResultReady(VerificationResult::Success(verdict)) = controller.state() else {
        panic!("expected a shown verdict, got {:?}", controller.state());
    };
    assert!(verdict.is_fake);
    assert_eq!(verdict.chain, None);
    assert!(controller.history().is_empty());
    assert!(controller.open_certificate_view().is_err());
    assert!(controller.render_certificate().is_err());
}

#[tokio::test]
async fn verification_flow_tests_persistence_failure_keeps_verdict() {
    let session = RefCell::new(common::controller(
        Arc::new(RecordingPreviewBackend::new()),
        Arc::new(BrokenStore),
    ));
    let client = common::client(Arc::new(common::ScriptedTransport::immediate(
        200,
        common::ANCHORED_BODY,
    )));

    session.borrow_mut().select_file(common::selection("portrait.jpg"));
    run_analysis(&session, &client).await.expect("analysis should run");

    let controller = session.borrow();
    assert_eq!(controller.state(), SessionState::CertificateViewOpen);
    assert_eq!(controller.history().len(), 1);
}

#[tokio::test]
async fn verification_flow_tests_retry_after_failure_replaces_result() {
    let session = RefCell::new(common::controller(
        Arc::new(RecordingPreviewBackend::new()),
        Arc::new(MemoryStore::new()),
    ));
    let failing = common::client(Arc::new(common::ScriptedTransport::immediate(502, "")));
    let healthy = common::client(Arc::new(common::ScriptedTransport::immediate(
        200,
        common::UNANCHORED_BODY,
    )));

    session.borrow_mut().select_file(common::selection("retry.jpg"));
    run_analysis(&session, &failing).await.expect("analysis should run");
    assert_eq!(
        session.borrow().result(),
        Some(&VerificationResult::failure("Upload failed"))
    );

    run_analysis(&session, &healthy).await.expect("manual retry should run");
    assert!(matches!(
        session.borrow().result(),
        Some(VerificationResult::Success(_))
    ));
}

#[tokio::test]
async fn verification_flow_tests_encode_failure_keeps_verdict_and_sets_notice() {
    // Far beyond the byte capacity of a level-H code.
    let explorer = format!("https://explorer.example/{}", "0".repeat(3_000));
    let body = format!(
        r#"{{"hash":"abc123","is_fake":false,"confidence":0.9,"sui":{{"success":true,"txDigest":"0xdead","explorer":"{explorer}"}}}}"#
    );
    let store = Arc::new(MemoryStore::new());
    let session = RefCell::new(common::controller(
        Arc::new(RecordingPreviewBackend::new()),
        store.clone(),
    ));
    let client = common::client(Arc::new(common::ScriptedTransport::immediate(200, &body)));

    session.borrow_mut().select_file(common::selection("portrait.jpg"));
    let outcome = run_analysis(&session, &client).await.expect("analysis should run");
    assert_eq!(
        outcome,
        CompletionOutcome::Applied {
            code_generated: false,
            certificate_view_opened: false,
            history_recorded: true,
        }
    );

    let mut controller = session.borrow_mut();
    assert!(matches!(
        controller.state(),
        SessionState::ResultReady(VerificationResult::Success(_))
    ));
    let verdict = controller
        .result()
        .and_then(VerificationResult::verdict)
        .expect("verdict should be shown");
    assert_eq!(verdict.explorer_link(), Some(explorer.as_str()));
    assert!(
        controller
            .notice()
            .is_some_and(|notice| notice.starts_with("Could not generate QR code"))
    );
    assert_eq!(controller.encoded_image(), None);
    assert!(controller.open_certificate_view().is_err());

    let history = controller.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].explorer_link.as_deref(), Some(explorer.as_str()));
    assert_eq!(history[0].encoded_image, None);

    let persisted = store
        .get(HISTORY_KEY)
        .expect("store should be readable")
        .expect("history should be persisted");
    assert!(persisted.contains(r#""qr":null"#));
}
