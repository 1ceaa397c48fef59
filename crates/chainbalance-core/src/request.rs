//! `triggerconstantcontract` wire types.

use serde::{Deserialize, Serialize};

use crate::amount;
use crate::error::ClientError;

/// Body of a `/wallet/triggerconstantcontract` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConstantContractRequest {
    pub owner_address: String,
    pub contract_address: String,
    pub function_selector: String,
    pub parameter: String,
    pub visible: bool,
}

/// Nested `result` object of a contract call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallResult {
    #[serde(default)]
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response of a `/wallet/triggerconstantcontract` call.
///
/// Failures arrive either as a top-level `Error` pair or as
/// `result.result == false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConstantContractResponse {
    #[serde(default)]
    pub constant_result: Vec<String>,
    #[serde(default)]
    pub result: CallResult,
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "Error Description", default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl TriggerConstantContractResponse {
    pub fn from_body(body: &str) -> Result<Self, ClientError> {
        serde_json::from_str(body).map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Unwrap the first `constant_result` word, checking the failure channels
    /// in order: top-level `Error`, `result.result == false`, missing result.
    pub fn into_word(self) -> Result<String, ClientError> {
        if let Some(error) = non_empty(&self.error) {
            let message = non_empty(&self.error_description).unwrap_or(error);
            return Err(ClientError::QueryFailed {
                message: message.to_string(),
            });
        }

        if !self.result.result {
            let message = non_empty(&self.result.message)
                .or_else(|| non_empty(&self.result.code))
                .unwrap_or("unknown");
            return Err(ClientError::QueryFailed {
                message: message.to_string(),
            });
        }

        self.constant_result
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::QueryFailed {
                message: "response has no constant_result".into(),
            })
    }

    /// Decode the balance word and render it with `decimals` places.
    pub fn into_balance(self, decimals: u32) -> Result<String, ClientError> {
        let word = self.into_word()?;
        let value = amount::parse_hex_amount(&word)
            .ok_or_else(|| ClientError::Parse(format!("invalid hex balance: {word}")))?;
        Ok(amount::format_units(value, decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(body: &str) -> Result<String, ClientError> {
        TriggerConstantContractResponse::from_body(body)?.into_balance(6)
    }

    #[test]
    fn request_serialization() {
        let req = TriggerConstantContractRequest {
            owner_address: "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7".into(),
            contract_address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
            function_selector: "balanceOf(address)".into(),
            parameter: "00".into(),
            visible: true,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"owner_address\":\"TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7\""));
        assert!(json.contains("\"function_selector\":\"balanceOf(address)\""));
        assert!(json.contains("\"visible\":true"));
    }

    #[test]
    fn success_body() {
        let body = r#"{"result":{"result":true},"constant_result":["00000000000000000000000000000000000000000000000000000000001e8480"]}"#;
        assert_eq!(balance(body).unwrap(), "2");
    }

    #[test]
    fn empty_word_is_zero() {
        let body = r#"{"result":{"result":true},"constant_result":[""]}"#;
        assert_eq!(balance(body).unwrap(), "0");
    }

    #[test]
    fn top_level_error_wins() {
        let body = r#"{"Error":"class org.tron.core.exception","Error Description":"invalid address","result":{"result":true},"constant_result":["01"]}"#;
        match balance(body) {
            Err(ClientError::QueryFailed { message }) => assert_eq!(message, "invalid address"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn top_level_error_without_description() {
        let body = r#"{"Error":"boom"}"#;
        match balance(body) {
            Err(ClientError::QueryFailed { message }) => assert_eq!(message, "boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn result_false_message_code_unknown() {
        let with_msg = r#"{"result":{"result":false,"code":"CONTRACT_VALIDATE_ERROR","message":"no contract"}}"#;
        let with_code = r#"{"result":{"result":false,"code":"CONTRACT_VALIDATE_ERROR"}}"#;
        let bare = r#"{"result":{}}"#;
        for (body, expected) in [
            (with_msg, "no contract"),
            (with_code, "CONTRACT_VALIDATE_ERROR"),
            (bare, "unknown"),
        ] {
            match balance(body) {
                Err(ClientError::QueryFailed { message }) => assert_eq!(message, expected),
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[test]
    fn missing_constant_result() {
        let body = r#"{"result":{"result":true}}"#;
        assert!(matches!(balance(body), Err(ClientError::QueryFailed { .. })));
    }

    #[test]
    fn malformed_payloads() {
        assert!(matches!(balance("not json"), Err(ClientError::Parse(_))));
        let bad_hex = r#"{"result":{"result":true},"constant_result":["xyz"]}"#;
        assert!(matches!(balance(bad_hex), Err(ClientError::Parse(_))));
    }
}
