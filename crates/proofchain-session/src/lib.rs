#![warn(missing_docs)]
//! # proofchain-session
//!
//! ## Purpose
//! Sequences one verification session: file intake, the single outstanding
//! analysis request, derived artifacts, and the persisted history.
//!
//! ## Responsibilities
//! - Own the current [`Selection`], its preview handle, and the current
//!   [`VerificationResult`].
//! - Gate "start analysis" on having a selection and nothing in flight.
//! - Discard completions whose selection has since been replaced or cleared.
//! - On anchored successes, encode the explorer link once, open the
//!   certificate view, and record a [`HistoryEntry`] that reuses the code.
//!
//! ## Data flow
//! [`SessionController::select_file`] -> [`SessionController::begin_analysis`]
//! -> caller awaits the analysis client -> [`SessionController::complete_analysis`].
//! [`run_analysis`] performs the middle three steps against a shared
//! controller without holding a borrow across the network call.
//!
//! ## Ownership and lifetimes
//! The controller lives in a `RefCell` on a single execution context. Tickets
//! carry their own clone of the selection so the upload can proceed while the
//! user replaces or clears it.
//!
//! ## Error model
//! Rejected user actions return [`SessionError`] and leave state unchanged.
//! Artifact and persistence failures never revert a verdict; they surface as
//! a notice (artifacts) or a log line (persistence).

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use proofchain_analysis_client::{AnalysisClient, ClientError};
use proofchain_artifacts::{ArtifactError, EncodeOptions};
use proofchain_core::{CertificateImage, EncodedImage, HistoryEntry, Selection, VerificationResult};
use proofchain_ledger::HistoryLedger;
use proofchain_preview::{PreviewHandle, PreviewManager};
use thiserror::Error;
use tracing::{info, warn};

/// Observable session state, derived from the controller's fields.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Nothing selected.
    Idle,
    /// A file is selected and no result is shown.
    FileSelected,
    /// The current selection's analysis is outstanding.
    Analyzing,
    /// A result for the current selection is shown.
    ResultReady(VerificationResult),
    /// The certificate view is open over an anchored result.
    CertificateViewOpen,
}

impl SessionState {
    /// Stable name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::FileSelected => "file_selected",
            SessionState::Analyzing => "analyzing",
            SessionState::ResultReady(_) => "result_ready",
            SessionState::CertificateViewOpen => "certificate_view_open",
        }
    }
}

/// Proof that an analysis was started for one specific selection.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    generation: u64,
    selection: Selection,
}

impl AnalysisTicket {
    /// Selection the analysis was started for.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }
}

/// What [`SessionController::complete_analysis`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The result became the current result.
    Applied {
        /// An encoded image was produced for the explorer link.
        code_generated: bool,
        /// The certificate view was opened.
        certificate_view_opened: bool,
        /// A history entry was appended.
        history_recorded: bool,
    },
    /// The selection changed while the request was outstanding.
    DiscardedStale,
}

struct ActiveSelection {
    generation: u64,
    selection: Selection,
    preview: Option<PreviewHandle>,
}

/// Verification session state machine.
pub struct SessionController {
    previews: PreviewManager,
    ledger: HistoryLedger,
    encode_options: EncodeOptions,
    generation: u64,
    active: Option<ActiveSelection>,
    in_flight: Option<u64>,
    result: Option<VerificationResult>,
    code: Option<EncodedImage>,
    certificate_view_open: bool,
    notice: Option<String>,
}

impl SessionController {
    /// Creates an idle controller around injected collaborators.
    pub fn new(
        previews: PreviewManager,
        ledger: HistoryLedger,
        encode_options: EncodeOptions,
    ) -> Self {
        Self {
            previews,
            ledger,
            encode_options,
            generation: 0,
            active: None,
            in_flight: None,
            result: None,
            code: None,
            certificate_view_open: false,
            notice: None,
        }
    }

    /// Current observable state.
    pub fn state(&self) -> SessionState {
        let Some(active) = &self.active else {
            return SessionState::Idle;
        };

        if self.in_flight == Some(active.generation) {
            SessionState::Analyzing
        } else if self.certificate_view_open {
            SessionState::CertificateViewOpen
        } else if let Some(result) = &self.result {
            SessionState::ResultReady(result.clone())
        } else {
            SessionState::FileSelected
        }
    }

    /// Current selection.
    pub fn selection(&self) -> Option<&Selection> {
        self.active.as_ref().map(|active| &active.selection)
    }

    /// Preview handle of the current selection, when one could be created.
    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.active.as_ref().and_then(|active| active.preview.as_ref())
    }

    /// Current result, including while the certificate view is open.
    pub fn result(&self) -> Option<&VerificationResult> {
        self.result.as_ref()
    }

    /// Scannable code derived for the current result.
    pub fn encoded_image(&self) -> Option<&EncodedImage> {
        self.code.as_ref()
    }

    /// Inline notice for non-fatal artifact failures.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Recent anchored verifications, newest first.
    pub fn history(&self) -> &[HistoryEntry] {
        self.ledger.entries()
    }

    /// Returns `true` while any analysis request is outstanding, stale or not.
    pub fn is_analysis_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Replaces the selection.
    ///
    /// Allowed in every state. The previous preview handle is released before
    /// the new one is acquired, and an outstanding analysis becomes stale.
    /// A preview failure leaves the selection usable without a preview.
    pub fn select_file(&mut self, selection: Selection) -> Option<&PreviewHandle> {
        self.generation += 1;
        self.reset_outcome();

        let preview = match self.previews.acquire(&selection) {
            Ok(handle) => Some(handle),
            Err(error) => {
                warn!(stage = "session", action = "select_file", %error, "preview unavailable");
                None
            }
        };

        info!(
            stage = "session",
            action = "select_file",
            file = selection.name(),
            kind = selection.kind().label(),
            size = %selection.size_display(),
            "file selected"
        );
        self.active = Some(ActiveSelection {
            generation: self.generation,
            selection,
            preview,
        });
        self.preview()
    }

    /// Clears the selection, its preview, and any result.
    ///
    /// # Errors
    /// Returns [`SessionError::NoFileSelected`] when nothing is selected.
    pub fn clear_selection(&mut self) -> Result<(), SessionError> {
        let Some(active) = self.active.take() else {
            return Err(SessionError::NoFileSelected);
        };

        if let Some(preview) = &active.preview {
            self.previews.release(preview);
        }
        self.generation += 1;
        self.reset_outcome();
        info!(
            stage = "session",
            action = "clear",
            file = active.selection.name(),
            "selection cleared"
        );
        Ok(())
    }

    /// Starts analysis of the current selection.
    ///
    /// Also valid from a shown result, which acts as a manual retry.
    ///
    /// # Errors
    /// - [`SessionError::NoFileSelected`] without a selection.
    /// - [`SessionError::RequestInFlight`] while any request is outstanding.
    /// - [`SessionError::InvalidTransition`] while the certificate view is open.
    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, SessionError> {
        let state = self.state();
        let Some(active) = &self.active else {
            return Err(SessionError::NoFileSelected);
        };
        if self.in_flight.is_some() {
            return Err(SessionError::RequestInFlight);
        }
        if state == SessionState::CertificateViewOpen {
            return Err(SessionError::InvalidTransition {
                action: "start_analysis",
                state: state.name(),
            });
        }

        let ticket = AnalysisTicket {
            generation: active.generation,
            selection: active.selection.clone(),
        };
        self.in_flight = Some(ticket.generation);
        self.reset_outcome();
        info!(
            stage = "session",
            action = "begin_analysis",
            file = ticket.selection.name(),
            "analysis started"
        );
        Ok(ticket)
    }

    /// Releases the in-flight slot without applying a result.
    pub fn abandon_analysis(&mut self, ticket: AnalysisTicket) {
        if self.in_flight == Some(ticket.generation) {
            self.in_flight = None;
        }
    }

    /// Applies a finished analysis.
    ///
    /// Stale completions (selection replaced or cleared since
    /// [`begin_analysis`](Self::begin_analysis)) only free the in-flight slot.
    pub fn complete_analysis(
        &mut self,
        ticket: AnalysisTicket,
        result: VerificationResult,
        now: DateTime<Utc>,
    ) -> CompletionOutcome {
        if self.in_flight == Some(ticket.generation) {
            self.in_flight = None;
        }

        let current = self.active.as_ref().map(|active| active.generation);
        if current != Some(ticket.generation) {
            info!(
                stage = "session",
                action = "complete_analysis",
                file = ticket.selection.name(),
                "discarding stale analysis result"
            );
            return CompletionOutcome::DiscardedStale;
        }

        let mut code_generated = false;
        let mut history_recorded = false;

        if let Some(verdict) = result.verdict()
            && let Some(link) = verdict.explorer_link()
        {
            match proofchain_artifacts::encode(link, &self.encode_options) {
                Ok(code) => {
                    self.code = Some(code);
                    code_generated = true;
                }
                Err(error) => {
                    warn!(
                        stage = "session",
                        action = "encode",
                        %error,
                        "scannable code generation failed"
                    );
                    self.notice = Some(format!("Could not generate QR code: {error}"));
                }
            }

            if let Some(entry) = HistoryEntry::from_anchored_verdict(
                ticket.selection.name(),
                verdict,
                self.code.clone(),
                now,
            ) {
                if let Err(error) = self.ledger.append(entry) {
                    warn!(
                        stage = "session",
                        action = "record_history",
                        %error,
                        "history not persisted"
                    );
                }
                history_recorded = true;
            }
        }

        // The certificate needs the code, so the view only opens with one.
        self.certificate_view_open = code_generated;
        info!(
            stage = "session",
            action = "complete_analysis",
            failed = result.is_failure(),
            code_generated,
            history_recorded,
            "analysis result applied"
        );
        self.result = Some(result);

        CompletionOutcome::Applied {
            code_generated,
            certificate_view_opened: code_generated,
            history_recorded,
        }
    }

    /// Reopens the certificate view over an anchored result.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] unless a result with a
    /// generated code is shown.
    pub fn open_certificate_view(&mut self) -> Result<(), SessionError> {
        let state = self.state();
        match state {
            SessionState::ResultReady(_) if self.code.is_some() => {
                self.certificate_view_open = true;
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition {
                action: "open_certificate_view",
                state: state.name(),
            }),
        }
    }

    /// Closes the certificate view, returning to the shown result.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] when the view is not open.
    pub fn close_certificate_view(&mut self) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::CertificateViewOpen {
            return Err(SessionError::InvalidTransition {
                action: "close_certificate_view",
                state: state.name(),
            });
        }
        self.certificate_view_open = false;
        Ok(())
    }

    /// Renders the certificate for the result shown in the certificate view.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] outside the certificate
    /// view and [`SessionError::Artifact`] when rendering fails; the failure
    /// is also kept as the inline notice.
    pub fn render_certificate(&mut self) -> Result<CertificateImage, SessionError> {
        let state = self.state();
        let (Some(verdict), Some(code)) = (
            self.result.as_ref().and_then(VerificationResult::verdict),
            self.code.as_ref(),
        ) else {
            return Err(SessionError::InvalidTransition {
                action: "render_certificate",
                state: state.name(),
            });
        };
        if state != SessionState::CertificateViewOpen {
            return Err(SessionError::InvalidTransition {
                action: "render_certificate",
                state: state.name(),
            });
        }

        match proofchain_artifacts::render_certificate(&verdict.hash, code) {
            Ok(certificate) => Ok(certificate),
            Err(error) => {
                warn!(
                    stage = "session",
                    action = "render_certificate",
                    %error,
                    "certificate render failed"
                );
                self.notice = Some(format!("Could not render certificate: {error}"));
                Err(SessionError::Artifact(error))
            }
        }
    }

    fn reset_outcome(&mut self) {
        self.result = None;
        self.code = None;
        self.certificate_view_open = false;
        self.notice = None;
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionController")
            .field("state", &self.state().name())
            .field("generation", &self.generation)
            .field("in_flight", &self.in_flight)
            .field("history", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

/// Runs one analysis for the controller's current selection.
///
/// The controller is borrowed only around [`SessionController::begin_analysis`]
/// and [`SessionController::complete_analysis`], so selections made while the
/// request is outstanding are applied immediately and the late result is
/// discarded.
///
/// Dropping the returned future before it resolves frees the session's
/// in-flight slot, so a timed-out or cancelled request never blocks the next
/// start.
///
/// # Errors
/// Returns the [`SessionError`] from `begin_analysis`, or
/// [`SessionError::RequestInFlight`] when `client` is busy with a call made
/// outside this session.
pub async fn run_analysis(
    session: &RefCell<SessionController>,
    client: &AnalysisClient,
) -> Result<CompletionOutcome, SessionError> {
    let ticket = session.borrow_mut().begin_analysis()?;
    let mut pending = PendingAnalysis {
        session,
        ticket,
        armed: true,
    };

    let result = match client.analyze(pending.ticket.selection()).await {
        Ok(result) => result,
        // The guard abandons the ticket on the way out.
        Err(ClientError::RequestInFlight) => return Err(SessionError::RequestInFlight),
        Err(error) => VerificationResult::failure(error.to_string()),
    };

    pending.armed = false;
    let ticket = pending.ticket.clone();
    Ok(session.borrow_mut().complete_analysis(ticket, result, Utc::now()))
}

// Abandons the ticket unless `run_analysis` reached completion.
struct PendingAnalysis<'a> {
    session: &'a RefCell<SessionController>,
    ticket: AnalysisTicket,
    armed: bool,
}

impl Drop for PendingAnalysis<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        match self.session.try_borrow_mut() {
            Ok(mut session) => {
                session.abandon_analysis(self.ticket.clone());
                info!(
                    stage = "session",
                    action = "abandon_analysis",
                    file = self.ticket.selection.name(),
                    "analysis abandoned before completion"
                );
            }
            Err(_) => warn!(
                stage = "session",
                action = "abandon_analysis",
                "session busy; in-flight slot not released"
            ),
        }
    }
}

/// Rejected session actions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The action needs a selected file.
    #[error("no file selected")]
    NoFileSelected,
    /// An analysis request is already outstanding.
    #[error("an analysis request is already in flight")]
    RequestInFlight,
    /// The action is not valid in the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        /// Attempted action.
        action: &'static str,
        /// State name at the time of the attempt.
        state: &'static str,
    },
    /// Artifact generation failed.
    #[error("artifact generation failed: {0}")]
    Artifact(#[from] ArtifactError),
}
