#![warn(missing_docs)]
//! # proofchain-app
//!
//! ## Purpose
//! Wires configuration, storage, previews, the analysis client, and the
//! session controller into a runnable verification client.
//!
//! ## Responsibilities
//! - Resolve [`AppConfig`] from environment variables.
//! - Build the production [`AppRuntime`].
//! - Drive one verification end to end ([`verify_file`]).
//! - Project results and history into plain text lines.
//!
//! ## Data flow
//! Env/CLI -> [`AppConfig`] -> [`AppRuntime::open`] -> [`verify_file`] ->
//! [`VerifyReport`] printed by the binary.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]. A failed verification is a
//! normal [`VerificationResult::Failure`], not an error.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use proofchain_analysis_client::{
    AnalysisClient, AnalysisTransport, ClientError, DEFAULT_ANALYSIS_ENDPOINT, HttpTransport,
};
use proofchain_artifacts::EncodeOptions;
use proofchain_core::{ChainAnchor, CoreError, HistoryEntry, Selection, VerificationResult};
use proofchain_ledger::{
    FileStore, HistoryLedger, KeyValueStore, StoreError, Theme, load_theme, save_theme,
};
use proofchain_preview::{PreviewManager, TempFilePreviewBackend};
use proofchain_session::{SessionController, SessionError, SessionState, run_analysis};
use thiserror::Error;
use tracing::info;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("PROOFCHAIN_VERSION");

/// Env var overriding the analysis endpoint.
pub const ENDPOINT_ENV: &str = "PROOFCHAIN_ENDPOINT";
/// Env var overriding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "PROOFCHAIN_TIMEOUT_SECS";
/// Env var overriding the data directory.
pub const DATA_DIR_ENV: &str = "PROOFCHAIN_DATA_DIR";
/// Env var allowing plain-HTTP endpoints.
pub const ALLOW_HTTP_ENV: &str = "PROOFCHAIN_ALLOW_HTTP";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Analysis endpoint URL.
    pub endpoint: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Directory holding persisted history and preferences.
    pub data_dir: PathBuf,
    /// Permit `http://` endpoints (local development).
    pub allow_insecure_http: bool,
}

impl AppConfig {
    /// Resolves configuration from process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, applying defaults for unset or
    /// unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let endpoint = lookup(ENDPOINT_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ANALYSIS_ENDPOINT.to_string());

        let timeout_secs = lookup(TIMEOUT_ENV)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let data_dir = lookup(DATA_DIR_ENV)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let allow_insecure_http = lookup(ALLOW_HTTP_ENV)
            .map(|value| flag_enabled(&value))
            .unwrap_or(false);

        Self {
            endpoint,
            timeout: Duration::from_secs(timeout_secs),
            data_dir,
            allow_insecure_http,
        }
    }
}

/// Interprets `1`, `true`, `yes`, `on` (case-insensitive) as enabled.
pub fn flag_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("proofchain"))
        .unwrap_or_else(|| PathBuf::from(".proofchain"))
}

/// Production collaborators for one session.
pub struct AppRuntime {
    /// Session controller on the current execution context.
    pub session: RefCell<SessionController>,
    /// Single-flight analysis client.
    pub client: AnalysisClient,
    /// Durable store shared by ledger and preferences.
    pub store: Arc<FileStore>,
}

impl AppRuntime {
    /// Opens storage, loads history, and builds the HTTP client.
    ///
    /// # Errors
    /// Returns [`AppError::Store`] when the data directory is unusable and
    /// [`AppError::Client`] for endpoint policy or TLS setup failures.
    pub fn open(config: &AppConfig) -> Result<Self, AppError> {
        let transport = Arc::new(HttpTransport::new(config.timeout)?);
        Self::with_transport(config, transport)
    }

    /// Same as [`AppRuntime::open`] over a caller-supplied transport.
    ///
    /// # Errors
    /// See [`AppRuntime::open`].
    pub fn with_transport(
        config: &AppConfig,
        transport: Arc<dyn AnalysisTransport>,
    ) -> Result<Self, AppError> {
        let store = Arc::new(FileStore::open(&config.data_dir)?);
        let ledger = HistoryLedger::load(store.clone());
        let previews = PreviewManager::new(Arc::new(TempFilePreviewBackend::new()));
        let session = SessionController::new(previews, ledger, EncodeOptions::default());
        let client = AnalysisClient::new(&config.endpoint, config.allow_insecure_http, transport)?;

        info!(
            stage = "bootstrap",
            action = "open",
            version = app_version(),
            data_dir = %config.data_dir.display(),
            history = session.history().len(),
            "runtime ready"
        );
        Ok(Self {
            session: RefCell::new(session),
            client,
            store,
        })
    }

    /// Store as the trait object the ledger helpers expect.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }
}

/// Where to write artifacts after a successful anchored verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactOutputs {
    /// Certificate PNG destination.
    pub certificate: Option<PathBuf>,
    /// Scannable code PNG destination.
    pub code: Option<PathBuf>,
}

/// Outcome of [`verify_file`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    /// Result shown to the user.
    pub result: Option<VerificationResult>,
    /// Text projection of the result.
    pub lines: Vec<String>,
    /// Files written.
    pub written: Vec<PathBuf>,
    /// Inline notice, if artifact generation degraded.
    pub notice: Option<String>,
}

/// Runs one select -> analyze -> artifacts pass for `path`.
///
/// # Errors
/// Returns [`AppError::Core`] when the file cannot be read,
/// [`AppError::Session`] when the session rejects the analysis, and
/// [`AppError::Core`] when an artifact cannot be written.
pub async fn verify_file(
    runtime: &AppRuntime,
    path: &Path,
    outputs: &ArtifactOutputs,
) -> Result<VerifyReport, AppError> {
    let selection = Selection::from_path(path)?;
    runtime.session.borrow_mut().select_file(selection);

    run_analysis(&runtime.session, &runtime.client).await?;

    let mut session = runtime.session.borrow_mut();
    let mut written = Vec::new();

    if session.state() == SessionState::CertificateViewOpen {
        if let (Some(path), Some(code)) = (&outputs.code, session.encoded_image()) {
            std::fs::write(path, code.png()).map_err(CoreError::from)?;
            written.push(path.clone());
        }

        if let Some(path) = &outputs.certificate {
            // Render failures are kept as the session notice.
            if let Ok(certificate) = session.render_certificate() {
                certificate.write_to(path)?;
                written.push(path.clone());
            }
        }
        session.close_certificate_view()?;
    }

    let result = session.result().cloned();
    let lines = result.as_ref().map(describe_result).unwrap_or_default();
    let notice = session.notice().map(str::to_string);
    session.clear_selection()?;

    Ok(VerifyReport {
        result,
        lines,
        written,
        notice,
    })
}

/// Argument that flips the stored theme.
pub const THEME_TOGGLE: &str = "toggle";

/// Shows, sets, or toggles the theme preference.
///
/// `None` reads the stored preference, [`THEME_TOGGLE`] flips it, and
/// `dark`/`light` store that value.
///
/// # Errors
/// Returns [`AppError::InvalidInput`] for any other value and
/// [`AppError::Ledger`] when the preference cannot be written.
pub fn apply_theme_choice(
    store: &dyn KeyValueStore,
    choice: Option<&str>,
) -> Result<Theme, AppError> {
    let Some(raw) = choice else {
        return Ok(load_theme(store));
    };

    let theme = if raw.trim() == THEME_TOGGLE {
        load_theme(store).toggled()
    } else {
        Theme::parse(raw)
            .ok_or_else(|| AppError::InvalidInput(format!("unknown theme '{raw}'")))?
    };
    save_theme(store, theme)?;
    info!(
        stage = "preferences",
        action = "theme",
        theme = theme.as_str(),
        "theme stored"
    );
    Ok(theme)
}

/// Text projection of a verification result.
pub fn describe_result(result: &VerificationResult) -> Vec<String> {
    let verdict = match result {
        VerificationResult::Failure { message } => return vec![format!("Error: {message}")],
        VerificationResult::Success(verdict) => verdict,
    };

    let mut lines = vec![
        format!("Hash: {}", verdict.hash),
        format!("Fake?: {}", if verdict.is_fake { "Yes" } else { "No" }),
        format!("Confidence: {}", verdict.confidence_display()),
    ];
    if !verdict.message.is_empty() {
        lines.push(verdict.message.clone());
    }

    match &verdict.chain {
        Some(ChainAnchor::Anchored {
            tx_id,
            explorer_link,
        }) => {
            lines.push(format!("On-chain TX: {tx_id}"));
            lines.push(format!("Explorer: {explorer_link}"));
        }
        Some(ChainAnchor::Failed { error }) => lines.push(format!("Chain write error: {error}")),
        None => {}
    }
    lines
}

/// One-line projection of a history entry in local time.
pub fn describe_history_entry(entry: &HistoryEntry) -> String {
    let when = entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    let verdict = if entry.is_fake { "fake" } else { "authentic" };
    match &entry.explorer_link {
        Some(link) => format!("{when}  {}  {}  {verdict}  {link}", entry.name, entry.hash),
        None => format!("{when}  {}  {}  {verdict}", entry.name, entry.hash),
    }
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Core model or file error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    /// Analysis client construction error.
    #[error("client error: {0}")]
    Client(#[from] ClientError),
    /// Storage error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Session rejected an action.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    /// Preference persistence error.
    #[error("preference error: {0}")]
    Ledger(#[from] proofchain_ledger::LedgerError),
    /// User input could not be interpreted.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
