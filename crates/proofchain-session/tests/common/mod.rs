//! Shared fixtures for session integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use proofchain_analysis_client::{
    AnalysisClient, AnalysisTransport, TransportError, TransportResponse, UploadRequest,
};
use proofchain_artifacts::EncodeOptions;
use proofchain_core::Selection;
use proofchain_ledger::{HistoryLedger, KeyValueStore};
use proofchain_preview::{PreviewManager, RecordingPreviewBackend};
use proofchain_session::SessionController;
use tokio::sync::Notify;
use url::Url;

/// Explorer link used by anchored fixtures.
#[allow(dead_code)]
pub const EXPLORER: &str = "https://explorer.example/0xdead";

/// Anchored success body.
#[allow(dead_code)]
pub const ANCHORED_BODY: &str = r#"{
    "hash":"abc123",
    "is_fake":false,
    "confidence":0.97,
    "message":"Authentic",
    "sui":{"success":true,"txDigest":"0xdead","explorer":"https://explorer.example/0xdead"}
}"#;

/// Success body without a `sui` block.
#[allow(dead_code)]
pub const UNANCHORED_BODY: &str =
    r#"{"hash":"abc123","is_fake":true,"confidence":0.61,"message":"Likely edited"}"#;

/// Transport answering every call with one canned response.
#[allow(dead_code)]
pub struct ScriptedTransport {
    response: TransportResponse,
    gate: Option<Notify>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedTransport {
    /// Answers immediately.
    pub fn immediate(status: u16, body: &str) -> Self {
        Self {
            response: TransportResponse {
                status,
                body: body.to_string(),
            },
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers only after [`ScriptedTransport::release`].
    pub fn gated(status: u16, body: &str) -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::immediate(status, body)
        }
    }

    /// Lets one gated call finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Number of submitted requests.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisTransport for ScriptedTransport {
    async fn submit(
        &self,
        _endpoint: &Url,
        _request: &UploadRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.response.clone())
    }
}

/// Builds a client over `transport`.
#[allow(dead_code)]
pub fn client(transport: Arc<ScriptedTransport>) -> AnalysisClient {
    AnalysisClient::new("https://api.example.test/analyze", false, transport)
        .expect("client fixture should build")
}

/// Builds an idle controller over recording previews and `store`.
#[allow(dead_code)]
pub fn controller(
    previews: Arc<RecordingPreviewBackend>,
    store: Arc<dyn KeyValueStore>,
) -> SessionController {
    SessionController::new(
        PreviewManager::new(previews),
        HistoryLedger::load(store),
        EncodeOptions::default(),
    )
}

/// Creates an image selection fixture.
#[allow(dead_code)]
pub fn selection(name: &str) -> Selection {
    Selection::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
        .expect("selection fixture should build")
}
