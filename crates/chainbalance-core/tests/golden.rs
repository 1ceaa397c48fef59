//! Golden fixture tests for response decoding.
//!
//! Each fixture in `fixtures/responses/` carries a recorded
//! `triggerconstantcontract` body plus either the expected rendered balance
//! or the expected failure message.

use chainbalance_core::{ClientError, TriggerConstantContractResponse};

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn fixture_path(name: &str) -> std::path::PathBuf {
    let mut p = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("../../fixtures/responses");
    p.push(name);
    p
}

fn load_fixture(name: &str) -> serde_json::Value {
    let content = std::fs::read_to_string(fixture_path(name)).expect("fixture not found");
    serde_json::from_str(&content).expect("invalid fixture JSON")
}

fn decode_fixture(fixture: &serde_json::Value) -> Result<String, ClientError> {
    let body = fixture["body"].to_string();
    TriggerConstantContractResponse::from_body(&body)?.into_balance(6)
}

fn assert_balance(name: &str) {
    let f = load_fixture(name);
    let balance = decode_fixture(&f).unwrap_or_else(|e| panic!("{name}: {e}"));
    assert_eq!(balance, f["expectedBalance"].as_str().unwrap(), "{name}");
}

fn assert_query_failed(name: &str) {
    let f = load_fixture(name);
    match decode_fixture(&f) {
        Err(ClientError::QueryFailed { message }) => {
            assert_eq!(message, f["expectedError"].as_str().unwrap(), "{name}");
        }
        other => panic!("{name}: expected QueryFailed, got {other:?}"),
    }
}

// ─── Success ──────────────────────────────────────────────────────────────────

#[test]
fn golden_success_usdt_balance() {
    assert_balance("success-usdt-balance.json");
}

#[test]
fn golden_success_zero_balance() {
    assert_balance("success-zero-balance.json");
}

#[test]
fn golden_success_large_balance() {
    assert_balance("success-large-balance.json");
}

// ─── Failures ─────────────────────────────────────────────────────────────────

#[test]
fn golden_error_top_level() {
    assert_query_failed("error-top-level.json");
}

#[test]
fn golden_error_result_false() {
    assert_query_failed("error-result-false.json");
}

#[test]
fn golden_error_result_code_only() {
    assert_query_failed("error-result-code-only.json");
}

#[test]
fn golden_error_no_constant_result() {
    assert_query_failed("error-no-constant-result.json");
}
