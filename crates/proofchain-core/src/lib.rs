#![warn(missing_docs)]
//! # proofchain-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `proofchain` workspace.
//!
//! ## Responsibilities
//! - Represent the user's file [`Selection`] and its media category.
//! - Represent normalized analysis outcomes ([`VerificationResult`]).
//! - Represent derived artifacts ([`EncodedImage`], [`CertificateImage`]).
//! - Represent immutable ledger snapshots ([`HistoryEntry`]) and their
//!   persisted JSON shape.
//!
//! ## Data flow
//! The session controller wraps user input in a [`Selection`], the analysis
//! client yields a [`VerificationResult`], the artifact generator produces an
//! [`EncodedImage`], and the ledger stores a [`HistoryEntry`] built from all
//! three.
//!
//! ## Ownership and lifetimes
//! Selection bytes are shared through `Arc<[u8]>` so the preview backend and
//! the in-flight upload can hold them without copying. Everything else owns
//! its `String`/`Vec<u8>` buffers.
//!
//! ## Error model
//! Construction and codec failures return [`CoreError`].
//!
//! ## Example
//! ```rust
//! use proofchain_core::{MediaKind, Selection};
//!
//! let selection = Selection::new("photo.jpg", "image/jpeg", vec![0; 2_097_152]).unwrap();
//! assert_eq!(selection.kind(), MediaKind::Image);
//! assert_eq!(selection.size_display(), "2.00 MB");
//! ```

use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Prefix used when an encoded image travels as a data URL.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Coarse media category derived from a MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// `image/*`.
    Image,
    /// `video/*`.
    Video,
    /// PDF documents.
    Document,
    /// Anything else.
    Unknown,
}

impl MediaKind {
    /// Maps a declared MIME type into a media category.
    pub fn from_mime(mime_type: &str) -> Self {
        let normalized = mime_type.trim().to_ascii_lowercase();
        if normalized.starts_with("image/") {
            MediaKind::Image
        } else if normalized.starts_with("video/") {
            MediaKind::Video
        } else if normalized.contains("pdf") {
            MediaKind::Document
        } else {
            MediaKind::Unknown
        }
    }

    /// Short label used by text front-ends.
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Unknown => "file",
        }
    }
}

/// The file currently chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    name: String,
    mime_type: String,
    kind: MediaKind,
    bytes: Arc<[u8]>,
}

impl Selection {
    /// Creates a selection from in-memory bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyFileName`] when `name` is blank.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::EmptyFileName);
        }

        let mime_type = mime_type.into();
        Ok(Self {
            kind: MediaKind::from_mime(&mime_type),
            name,
            mime_type,
            bytes: bytes.into(),
        })
    }

    /// Reads a selection from disk, inferring the MIME type from the extension.
    ///
    /// # Errors
    /// Returns [`CoreError::Io`] when the file cannot be read and
    /// [`CoreError::EmptyFileName`] when the path has no file name.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(path)?;
        Self::new(name, mime_type_for_path(path), bytes)
    }

    /// Display name of the file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared MIME type sent alongside the upload.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Media category derived from the MIME type.
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Raw file bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the raw file bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// File size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// File size in megabytes with two decimals, e.g. `1.50 MB`.
    pub fn size_display(&self) -> String {
        format!("{:.2} MB", self.size_bytes() as f64 / 1024.0 / 1024.0)
    }
}

/// Best-effort MIME type for the media formats the service accepts.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// On-chain anchoring outcome, independent from the verdict itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainAnchor {
    /// The verdict was written on chain.
    Anchored {
        /// Transaction digest.
        tx_id: String,
        /// Public explorer URL for the transaction.
        explorer_link: String,
    },
    /// The chain write failed; the verdict may still be valid.
    Failed {
        /// Error reported by the service.
        error: String,
    },
}

/// Authenticity verdict returned by a successful analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Content hash computed by the service.
    pub hash: String,
    /// Whether the media was judged manipulated.
    pub is_fake: bool,
    /// Model confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Human-readable summary from the service.
    pub message: String,
    /// Optional on-chain anchoring outcome.
    pub chain: Option<ChainAnchor>,
}

impl Verdict {
    /// Explorer link when the verdict was anchored on chain.
    pub fn explorer_link(&self) -> Option<&str> {
        match &self.chain {
            Some(ChainAnchor::Anchored { explorer_link, .. }) => Some(explorer_link),
            _ => None,
        }
    }

    /// Confidence as a percentage with two decimals, e.g. `97.00%`.
    pub fn confidence_display(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

/// Normalized outcome of one analysis attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    /// The service returned a well-formed verdict.
    Success(Verdict),
    /// The attempt failed; `message` is user-facing.
    Failure {
        /// User-facing failure description.
        message: String,
    },
}

impl VerificationResult {
    /// Convenience constructor for failures.
    pub fn failure(message: impl Into<String>) -> Self {
        VerificationResult::Failure {
            message: message.into(),
        }
    }

    /// Returns the verdict for successful results.
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            VerificationResult::Success(verdict) => Some(verdict),
            VerificationResult::Failure { .. } => None,
        }
    }

    /// Returns `true` for failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, VerificationResult::Failure { .. })
    }
}

/// Scannable code rendered as PNG bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    png: Vec<u8>,
}

impl EncodedImage {
    /// Wraps already-encoded PNG bytes.
    pub fn from_png(png: Vec<u8>) -> Self {
        Self { png }
    }

    /// PNG bytes.
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Encodes as a `data:image/png;base64,...` URL.
    pub fn to_data_url(&self) -> String {
        format!("{PNG_DATA_URL_PREFIX}{}", BASE64.encode(&self.png))
    }

    /// Parses a PNG data URL.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidDataUrl`] for a missing prefix or bad base64.
    pub fn from_data_url(raw: &str) -> Result<Self, CoreError> {
        let payload = raw
            .strip_prefix(PNG_DATA_URL_PREFIX)
            .ok_or_else(|| CoreError::InvalidDataUrl("missing png data url prefix".to_string()))?;
        let png = BASE64
            .decode(payload)
            .map_err(|error| CoreError::InvalidDataUrl(error.to_string()))?;
        Ok(Self { png })
    }
}

/// Composed certificate raster, PNG-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateImage {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// PNG bytes.
    pub png: Vec<u8>,
}

impl CertificateImage {
    /// Writes the PNG to `path`.
    ///
    /// # Errors
    /// Returns [`CoreError::Io`] on write failure.
    pub fn write_to(&self, path: &Path) -> Result<(), CoreError> {
        std::fs::write(path, &self.png)?;
        Ok(())
    }
}

/// Immutable snapshot of one anchored verification.
///
/// The serialized field names match the records already stored by the web
/// client under the `proof_history` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// File display name.
    pub name: String,
    /// Content hash.
    pub hash: String,
    /// Verdict flag.
    #[serde(rename = "fake")]
    pub is_fake: bool,
    /// Explorer link of the anchoring transaction.
    #[serde(rename = "explorer", default)]
    pub explorer_link: Option<String>,
    /// Scannable code for the explorer link, when one could be produced.
    #[serde(
        rename = "qr",
        default,
        serialize_with = "serialize_encoded_image",
        deserialize_with = "deserialize_encoded_image"
    )]
    pub encoded_image: Option<EncodedImage>,
    /// Time the entry was recorded.
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Builds a snapshot from an anchored verdict.
    ///
    /// Returns `None` when the verdict carries no explorer link: only
    /// chain-anchored verifications are recorded.
    pub fn from_anchored_verdict(
        name: impl Into<String>,
        verdict: &Verdict,
        encoded_image: Option<EncodedImage>,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let explorer_link = verdict.explorer_link()?.to_string();
        Some(Self {
            name: name.into(),
            hash: verdict.hash.clone(),
            is_fake: verdict.is_fake,
            explorer_link: Some(explorer_link),
            encoded_image,
            timestamp,
        })
    }
}

fn serialize_encoded_image<S>(
    image: &Option<EncodedImage>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match image {
        Some(image) => serializer.serialize_some(&image.to_data_url()),
        None => serializer.serialize_none(),
    }
}

// A corrupt data URL degrades to "no image" instead of rejecting the entry.
fn deserialize_encoded_image<'de, D>(deserializer: D) -> Result<Option<EncodedImage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| EncodedImage::from_data_url(&raw).ok()))
}

/// Error type for core model construction and codecs.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Selections need a display name.
    #[error("file name is empty")]
    EmptyFileName,
    /// Data URL could not be decoded.
    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),
    /// Filesystem failure.
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}
