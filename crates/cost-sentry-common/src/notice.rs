//! Billing budget notification
//!
//! Cloud Billing publishes one of these to Pub/Sub every time a budget is
//! evaluated. Only `costAmount` and `budgetAmount` drive any decision; the
//! other fields are carried for logging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while turning an inbound payload into a [`BillingNotice`]
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not a valid notice document
    #[error("cannot parse billing notice: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope data field is not valid base64
    #[error("cannot decode envelope data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Envelope carried no data field
    #[error("envelope has no message data")]
    MissingData,

    /// An amount is negative, NaN or infinite
    #[error("{field} must be a non-negative finite number, got {value}")]
    InvalidAmount { field: &'static str, value: f64 },
}

/// Budget notification as delivered by Cloud Billing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingNotice {
    /// Budget display name
    #[serde(rename = "budgetDisplayName", default)]
    pub display_name: String,

    /// Fraction of the budget whose alert threshold was crossed (e.g. 0.9)
    #[serde(rename = "alertThresholdExceeded", default)]
    pub threshold_exceeded: f64,

    /// Cost accrued in the current interval
    #[serde(rename = "costAmount")]
    pub cost_amount: f64,

    /// Start of the cost interval
    #[serde(default)]
    pub cost_interval_start: Option<DateTime<Utc>>,

    /// Budget ceiling for the interval
    pub budget_amount: f64,

    /// `SPECIFIED_AMOUNT` or `LAST_PERIODS_AMOUNT`
    #[serde(default)]
    pub budget_amount_type: String,

    /// ISO 4217 currency code
    #[serde(default)]
    pub currency_code: String,
}

impl BillingNotice {
    /// Decode a notice from the raw JSON bytes carried in the event data.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DecodeError> {
        let notice: Self = serde_json::from_slice(bytes)?;
        notice.validate()?;
        Ok(notice)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        for (field, value) in [
            ("costAmount", self.cost_amount),
            ("budgetAmount", self.budget_amount),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DecodeError::InvalidAmount { field, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "budgetDisplayName": "app-in-a-box",
        "alertThresholdExceeded": 1.0,
        "costAmount": 150.25,
        "costIntervalStart": "2026-10-01T07:00:00Z",
        "budgetAmount": 100.0,
        "budgetAmountType": "SPECIFIED_AMOUNT",
        "currencyCode": "USD"
    }"#;

    #[test]
    fn test_decode_full_notice() {
        let notice = BillingNotice::from_json(SAMPLE.as_bytes()).unwrap();
        assert_eq!(notice.display_name, "app-in-a-box");
        assert_eq!(notice.cost_amount, 150.25);
        assert_eq!(notice.budget_amount, 100.0);
        assert_eq!(notice.currency_code, "USD");
        assert_eq!(
            notice.cost_interval_start.unwrap().to_rfc3339(),
            "2026-10-01T07:00:00+00:00"
        );
    }

    #[test]
    fn test_decode_minimal_notice() {
        let notice =
            BillingNotice::from_json(br#"{"costAmount": 5, "budgetAmount": 10}"#).unwrap();
        assert_eq!(notice.threshold_exceeded, 0.0);
        assert!(notice.cost_interval_start.is_none());
        assert!(notice.display_name.is_empty());
    }

    #[test]
    fn test_missing_cost_is_rejected() {
        let err = BillingNotice::from_json(br#"{"budgetAmount": 10}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = BillingNotice::from_json(b"not json").unwrap_err();
        assert!(err.to_string().starts_with("cannot parse billing notice"));
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        let err =
            BillingNotice::from_json(br#"{"costAmount": -1, "budgetAmount": 10}"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidAmount {
                field: "costAmount",
                ..
            }
        ));
    }
}
