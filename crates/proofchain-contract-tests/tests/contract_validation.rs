//! Validates contract fixtures against frozen JSON schemas.

use chrono::{TimeZone, Utc};
use jsonschema::JSONSchema;
use proofchain_analysis_contract::parse_analysis_response;
use proofchain_core::{ChainAnchor, EncodedImage, HistoryEntry};
use serde_json::Value;

fn contract_path(relative: &str) -> String {
    format!("{}/../../contracts/{relative}", env!("CARGO_MANIFEST_DIR"))
}

fn load_raw(relative: &str) -> String {
    std::fs::read_to_string(contract_path(relative)).expect("contract file should be readable")
}

fn load_json(relative: &str) -> Value {
    serde_json::from_str(&load_raw(relative)).expect("contract file should be valid json")
}

fn compile_validator(schema: &str) -> JSONSchema {
    let schema = load_json(schema);
    JSONSchema::compile(&schema).expect("schema should compile")
}

#[test]
fn analysis_fixture_matches_schema() {
    let validator = compile_validator("analysis-response.schema.json");
    for fixture in [
        "fixtures/analysis-response.valid.json",
        "fixtures/analysis-response.unanchored.json",
    ] {
        assert!(
            validator.is_valid(&load_json(fixture)),
            "{fixture} should validate against schema"
        );
    }
}

#[test]
fn analysis_invalid_fixture_is_rejected_by_schema_and_parser() {
    let validator = compile_validator("analysis-response.schema.json");
    let raw = load_raw("fixtures/analysis-response.invalid.json");
    let fixture: Value = serde_json::from_str(&raw).expect("fixture should be json");

    assert!(!validator.is_valid(&fixture));
    assert!(parse_analysis_response(&raw).is_err());
}

#[test]
fn analysis_fixtures_parse_into_expected_chain_outcome() {
    let anchored = parse_analysis_response(&load_raw("fixtures/analysis-response.valid.json"))
        .expect("valid fixture should parse");
    assert_eq!(anchored.explorer_link(), Some("https://suiscan.xyz/testnet/tx/0xdead"));

    let unanchored =
        parse_analysis_response(&load_raw("fixtures/analysis-response.unanchored.json"))
            .expect("unanchored fixture should parse");
    assert_eq!(
        unanchored.chain,
        Some(ChainAnchor::Failed {
            error: "gas budget exceeded".to_string()
        })
    );
}

#[test]
fn history_fixture_matches_schema_and_model() {
    let validator = compile_validator("history-entry.schema.json");
    assert!(validator.is_valid(&load_json("fixtures/history-entry.valid.json")));

    let entries: Vec<HistoryEntry> =
        serde_json::from_str(&load_raw("fixtures/history-entry.valid.json"))
            .expect("fixture should deserialize");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "photo.png");
    assert!(!entries[0].is_fake);
}

#[test]
fn history_serialization_matches_schema() {
    let validator = compile_validator("history-entry.schema.json");
    let entries = vec![HistoryEntry {
        name: "clip.mp4".to_string(),
        hash: "ff00".to_string(),
        is_fake: true,
        explorer_link: Some("https://suiscan.xyz/testnet/tx/0xbeef".to_string()),
        encoded_image: Some(EncodedImage::from_png(vec![0x89, b'P', b'N', b'G'])),
        timestamp: Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid time"),
    }];

    let serialized = serde_json::to_value(&entries).expect("entries should serialize");
    assert!(validator.is_valid(&serialized), "serialized history should validate");
}
