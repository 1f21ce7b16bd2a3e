//! Pub/Sub event envelope decoding
//!
//! Budget notifications reach the harness in one of two shapes:
//!
//! | Delivery | Body |
//! |----------|------|
//! | Pub/Sub push subscription | `{"message": {"data": "<base64>", ...}, "subscription": "..."}` |
//! | Background function event | `{"context": {...}, "data": {"data": "<base64>", ...}}` |
//!
//! Both carry the notice JSON base64-encoded in a nested `data` field.

use crate::notice::{BillingNotice, DecodeError};
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PubSubMessage {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Push { message: PubSubMessage },
    Background { data: PubSubMessage },
}

/// Extract the raw notice bytes from a delivery envelope.
pub fn decode_envelope(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    let message = match envelope {
        Envelope::Push { message } => message,
        Envelope::Background { data } => data,
    };
    let data = message.data.ok_or(DecodeError::MissingData)?;
    Ok(base64::engine::general_purpose::STANDARD.decode(data.trim())?)
}

/// Decode an envelope and the notice inside it in one step.
pub fn decode_notice(body: &[u8]) -> Result<BillingNotice, DecodeError> {
    BillingNotice::from_json(&decode_envelope(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s)
    }

    #[test]
    fn test_push_envelope() {
        let body = format!(
            r#"{{"message": {{"data": "{}", "messageId": "1"}}, "subscription": "projects/p/subscriptions/s"}}"#,
            encode(r#"{"costAmount": 1, "budgetAmount": 2}"#)
        );
        let notice = decode_notice(body.as_bytes()).unwrap();
        assert_eq!(notice.cost_amount, 1.0);
        assert_eq!(notice.budget_amount, 2.0);
    }

    #[test]
    fn test_background_envelope() {
        let body = format!(
            r#"{{"context": {{"eventId": "1"}}, "data": {{"@type": "type.googleapis.com/google.pubsub.v1.PubsubMessage", "data": "{}"}}}}"#,
            encode(r#"{"costAmount": 3, "budgetAmount": 2}"#)
        );
        let notice = decode_notice(body.as_bytes()).unwrap();
        assert_eq!(notice.cost_amount, 3.0);
    }

    #[test]
    fn test_missing_data() {
        let err = decode_envelope(br#"{"message": {"messageId": "1"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingData));
    }

    #[test]
    fn test_bad_base64() {
        let err = decode_envelope(br#"{"message": {"data": "%%%"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn test_unrecognised_shape() {
        let err = decode_envelope(br#"{"hello": "world"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }
}
