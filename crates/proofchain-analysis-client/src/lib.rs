#![warn(missing_docs)]
//! # proofchain-analysis-client
//!
//! ## Purpose
//! Submits one selected file to the remote analysis service and normalizes
//! every outcome into a [`VerificationResult`].
//!
//! ## Responsibilities
//! - Validate endpoint policy (HTTPS unless insecure HTTP is opted into).
//! - Enforce single-flight: at most one request outstanding per client.
//! - Send the file through an injectable [`AnalysisTransport`].
//! - Convert transport errors, non-2xx statuses, and malformed bodies into
//!   [`VerificationResult::Failure`].
//!
//! ## Data flow
//! [`Selection`] -> [`UploadRequest`] -> [`AnalysisTransport::submit`] ->
//! [`TransportResponse`] -> [`normalize_response`] -> [`VerificationResult`].
//!
//! ## Error model
//! [`AnalysisClient::analyze`] only fails with [`ClientError::RequestInFlight`].
//! Every network or contract problem becomes a failure result instead.
//!
//! ## Security and privacy notes
//! File bytes and response bodies are never logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use proofchain_analysis_contract::parse_analysis_response;
use proofchain_core::{Selection, VerificationResult};
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Production analysis endpoint.
pub const DEFAULT_ANALYSIS_ENDPOINT: &str = "https://proofchain-backend.onrender.com/analyze";

/// Multipart field carrying the file.
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Message used when a non-2xx response carries no body.
pub const GENERIC_UPLOAD_FAILURE: &str = "Upload failed";

/// Message used when the transport fails without any description.
pub const GENERIC_TRANSPORT_FAILURE: &str = "Failed to analyze file";

/// One multipart upload as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// File name sent in the multipart part.
    pub file_name: String,
    /// Declared MIME type of the part.
    pub mime_type: String,
    /// Raw file bytes.
    pub bytes: Arc<[u8]>,
}

impl From<&Selection> for UploadRequest {
    fn from(selection: &Selection) -> Self {
        Self {
            file_name: selection.name().to_string(),
            mime_type: selection.mime_type().to_string(),
            bytes: selection.shared_bytes(),
        }
    }
}

/// Raw HTTP outcome returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl TransportResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstract transport used by the analysis client.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    /// Posts the upload to `endpoint` and returns status plus body.
    async fn submit(
        &self,
        endpoint: &Url,
        request: &UploadRequest,
    ) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed multipart transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds an HTTP transport with a whole-request timeout.
    ///
    /// # Errors
    /// Returns [`ClientError::HttpClient`] when the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ClientError::HttpClient(error.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn submit(
        &self,
        endpoint: &Url,
        request: &UploadRequest,
    ) -> Result<TransportResponse, TransportError> {
        let form = Form::new().part(UPLOAD_FIELD_NAME, build_file_part(request));

        let response = self
            .client
            .post(endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(TransportResponse { status, body })
    }
}

fn build_file_part(request: &UploadRequest) -> Part {
    let part = Part::bytes(request.bytes.to_vec()).file_name(request.file_name.clone());
    match part.mime_str(&request.mime_type) {
        Ok(part) => part,
        // Unparseable MIME types are sent untyped rather than rejected.
        Err(_) => Part::bytes(request.bytes.to_vec()).file_name(request.file_name.clone()),
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.without_url().to_string())
    } else {
        TransportError::Other(error.without_url().to_string())
    }
}

/// Single-flight analysis client.
pub struct AnalysisClient {
    endpoint: Url,
    transport: Arc<dyn AnalysisTransport>,
    in_flight: AtomicBool,
}

impl AnalysisClient {
    /// Creates a validated analysis client.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidEndpoint`] for malformed URLs or for
    /// plain HTTP when `allow_insecure_http` is `false`.
    pub fn new(
        endpoint: &str,
        allow_insecure_http: bool,
        transport: Arc<dyn AnalysisTransport>,
    ) -> Result<Self, ClientError> {
        let endpoint = validate_analysis_endpoint(endpoint, allow_insecure_http)?;
        Ok(Self {
            endpoint,
            transport,
            in_flight: AtomicBool::new(false),
        })
    }

    /// Configured endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns `true` while a request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Uploads `selection` and normalizes the outcome.
    ///
    /// # Errors
    /// Returns [`ClientError::RequestInFlight`] when another call has not
    /// completed yet. The rejected call sends nothing.
    pub async fn analyze(&self, selection: &Selection) -> Result<VerificationResult, ClientError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        info!(
            stage = "analysis",
            action = "submit",
            endpoint = %redacted_endpoint(&self.endpoint),
            file = selection.name(),
            size_bytes = selection.size_bytes(),
            "submitting file for analysis"
        );

        let request = UploadRequest::from(selection);
        let result = match self.transport.submit(&self.endpoint, &request).await {
            Ok(response) => normalize_response(&response),
            Err(error) => {
                warn!(
                    stage = "analysis",
                    action = "transport",
                    %error,
                    "analysis transport failed"
                );
                VerificationResult::failure(transport_failure_message(&error))
            }
        };

        debug!(
            stage = "analysis",
            action = "complete",
            failed = result.is_failure(),
            "analysis request finished"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for AnalysisClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AnalysisClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("in_flight", &self.is_in_flight())
            .finish_non_exhaustive()
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ClientError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::RequestInFlight)?;
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Converts a raw HTTP outcome into a verification result.
///
/// Non-2xx statuses surface the server text (or [`GENERIC_UPLOAD_FAILURE`]);
/// 2xx bodies must satisfy the analysis contract.
pub fn normalize_response(response: &TransportResponse) -> VerificationResult {
    if !response.is_success() {
        let text = response.body.trim();
        warn!(
            stage = "analysis",
            action = "status",
            status = response.status,
            "analysis service rejected request"
        );
        return VerificationResult::failure(if text.is_empty() {
            GENERIC_UPLOAD_FAILURE
        } else {
            text
        });
    }

    match parse_analysis_response(&response.body) {
        Ok(verdict) => VerificationResult::Success(verdict),
        Err(error) => {
            warn!(stage = "analysis", action = "parse", %error, "malformed analysis response");
            VerificationResult::failure(format!("Malformed analysis response: {error}"))
        }
    }
}

fn transport_failure_message(error: &TransportError) -> String {
    let text = error.to_string();
    if text.trim().is_empty() {
        GENERIC_TRANSPORT_FAILURE.to_string()
    } else {
        text
    }
}

/// Validates analysis endpoint constraints.
///
/// # Errors
/// Returns [`ClientError::InvalidEndpoint`] for unparseable URLs, URLs without
/// a host, or non-HTTPS schemes that were not explicitly allowed.
pub fn validate_analysis_endpoint(
    endpoint: &str,
    allow_insecure_http: bool,
) -> Result<Url, ClientError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| ClientError::InvalidEndpoint(format!("invalid analysis url: {error}")))?;

    if parsed.host_str().is_none() {
        return Err(ClientError::InvalidEndpoint(
            "analysis endpoint must include a host".to_string(),
        ));
    }

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if allow_insecure_http => Ok(parsed),
        _ => Err(ClientError::InvalidEndpoint(
            "analysis endpoint must use https".to_string(),
        )),
    }
}

fn redacted_endpoint(endpoint: &Url) -> String {
    let mut redacted = endpoint.clone();
    redacted.set_query(None);
    redacted.set_fragment(None);
    redacted.to_string()
}

/// Transport-level failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete in time.
    #[error("analysis request timed out")]
    Timeout,
    /// The service could not be reached.
    #[error("could not reach analysis service: {0}")]
    Connect(String),
    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Client construction and guard errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Endpoint violates the endpoint policy.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// HTTP client could not be built.
    #[error("http client initialization failed: {0}")]
    HttpClient(String),
    /// Another analysis request is still outstanding.
    #[error("an analysis request is already in flight")]
    RequestInFlight,
}

#[cfg(test)]
mod tests {
    //! Unit tests for response normalization and endpoint policy.

    use super::*;

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn non_success_status_uses_server_text() {
        assert_eq!(
            normalize_response(&response(413, "file too large")),
            VerificationResult::failure("file too large")
        );
    }

    #[test]
    fn empty_error_body_uses_generic_message() {
        assert_eq!(
            normalize_response(&response(500, "  ")),
            VerificationResult::failure(GENERIC_UPLOAD_FAILURE)
        );
    }

    #[test]
    fn missing_verdict_fields_become_failure() {
        let result = normalize_response(&response(200, r#"{"hash":"abc"}"#));
        assert!(result.is_failure());
    }

    #[test]
    fn endpoint_policy_requires_https_by_default() {
        assert!(validate_analysis_endpoint("https://api.example.test/analyze", false).is_ok());
        assert!(validate_analysis_endpoint("http://localhost:8000/analyze", false).is_err());
        assert!(validate_analysis_endpoint("http://localhost:8000/analyze", true).is_ok());
        assert!(validate_analysis_endpoint("ftp://example.test/analyze", true).is_err());
    }
}
