#![warn(missing_docs)]
//! # proofchain-analysis-contract
//!
//! ## Purpose
//! Defines the analysis service response schema and its strict mapping into a
//! [`Verdict`].
//!
//! ## Responsibilities
//! - Decode the JSON envelope returned by a successful `POST /analyze`.
//! - Reject envelopes missing mandatory verdict fields.
//! - Map the optional `sui` block into a [`ChainAnchor`] without letting an
//!   anchoring failure invalidate the verdict.
//!
//! ## Data flow
//! Raw 2xx body -> [`parse_analysis_response`] -> [`Verdict`] consumed by the
//! analysis client, which converts errors into a failure result.
//!
//! ## Error model
//! Invalid JSON, wrong field types, and contract violations return
//! [`AnalysisContractError`].

use proofchain_core::{ChainAnchor, Verdict};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decoded response envelope as sent by the service.
///
/// Every field is optional at the wire level so that contract checks can name
/// exactly which mandatory field was missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    /// Content hash.
    #[serde(default)]
    pub hash: Option<String>,
    /// Manipulation verdict.
    #[serde(default)]
    pub is_fake: Option<bool>,
    /// Confidence in `[0.0, 1.0]`.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Human-readable summary.
    #[serde(default)]
    pub message: Option<String>,
    /// On-chain anchoring block.
    #[serde(default)]
    pub sui: Option<ChainEnvelope>,
}

/// `sui` block of the response envelope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChainEnvelope {
    /// Whether the chain write succeeded.
    #[serde(default)]
    pub success: Option<bool>,
    /// Transaction digest.
    #[serde(rename = "txDigest", default)]
    pub tx_digest: Option<String>,
    /// Explorer URL for the transaction.
    #[serde(default)]
    pub explorer: Option<String>,
    /// Error text when the write failed.
    #[serde(default)]
    pub error: Option<String>,
}

/// Parses and validates a 2xx analysis body.
///
/// # Errors
/// Returns [`AnalysisContractError::Decode`] for invalid JSON or wrongly typed
/// fields, and [`AnalysisContractError::MissingField`] /
/// [`AnalysisContractError::InvalidContract`] for contract violations.
pub fn parse_analysis_response(raw: &str) -> Result<Verdict, AnalysisContractError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(AnalysisContractError::InvalidContract(
            "response body is not a JSON object".to_string(),
        ));
    }

    let envelope: AnalysisEnvelope = serde_json::from_value(value)?;
    validate_envelope(envelope)
}

/// Validates an already decoded envelope.
///
/// # Errors
/// See [`parse_analysis_response`].
pub fn validate_envelope(envelope: AnalysisEnvelope) -> Result<Verdict, AnalysisContractError> {
    let hash = envelope
        .hash
        .filter(|hash| !hash.trim().is_empty())
        .ok_or(AnalysisContractError::MissingField("hash"))?;
    let is_fake = envelope
        .is_fake
        .ok_or(AnalysisContractError::MissingField("is_fake"))?;

    let confidence = envelope.confidence.unwrap_or(0.0);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(AnalysisContractError::InvalidContract(format!(
            "confidence {confidence} outside [0, 1]"
        )));
    }

    Ok(Verdict {
        hash,
        is_fake,
        confidence,
        message: envelope.message.unwrap_or_default(),
        chain: envelope.sui.map(map_chain_envelope),
    })
}

fn map_chain_envelope(chain: ChainEnvelope) -> ChainAnchor {
    let tx_id = chain.tx_digest.filter(|value| !value.trim().is_empty());
    let explorer_link = chain.explorer.filter(|value| !value.trim().is_empty());
    let error = chain.error.filter(|value| !value.trim().is_empty());

    match (chain.success, tx_id, explorer_link) {
        (Some(true), Some(tx_id), Some(explorer_link)) => ChainAnchor::Anchored {
            tx_id,
            explorer_link,
        },
        (Some(true), _, _) => ChainAnchor::Failed {
            error: error
                .unwrap_or_else(|| "chain anchor is missing txDigest or explorer".to_string()),
        },
        _ => ChainAnchor::Failed {
            error: error.unwrap_or_else(|| "chain write failed".to_string()),
        },
    }
}

/// Analysis contract errors.
#[derive(Debug, Error)]
pub enum AnalysisContractError {
    /// JSON decode failure, including wrongly typed fields.
    #[error("analysis decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// A mandatory verdict field is absent.
    #[error("analysis response is missing `{0}`")]
    MissingField(&'static str),
    /// Parsed payload violates contract invariants.
    #[error("analysis contract violation: {0}")]
    InvalidContract(String),
}
