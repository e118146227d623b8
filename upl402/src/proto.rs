//! Wire types for the payment-required handshake.
//!
//! A service answers an unpaid request with `402 Payment Required` and a
//! JSON [`PaymentRequirements`] body. After settling on-chain, the client
//! retries with a [`PaymentPayload`] carried as base64-of-JSON in the
//! [`PAYMENT_HEADER`] request header.
//!
//! The requirement's `timeout` field is counted in **seconds** everywhere in
//! this SDK; the payload `timestamp` is the only millisecond field on the
//! wire.

use crate::amount::Amount;
use crate::encoding::Base64Bytes;
use crate::error::PaymentError;
use crate::timestamp::UnixMillis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request header carrying the base64-encoded [`PaymentPayload`].
pub const PAYMENT_HEADER: &str = "X-Payment";

/// Default window for observing transfer confirmation when the requirement
/// does not specify a `timeout`.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// What a service demands to be paid, parsed from a 402 response body.
///
/// Immutable once received; each instance is consumed by exactly one payment
/// attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme identifier (e.g. `solana`).
    pub scheme: String,
    /// Cluster the payment must settle on (e.g. `devnet`).
    pub network: String,
    /// Asset identifier: `SOL` for the native coin or a token mint address.
    pub asset: String,
    /// Payee address.
    pub pay_to: String,
    /// Decimal amount string in the asset's native precision.
    pub amount: String,
    /// Seconds the payer has to settle before the quote expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Replay-protection nonce, echoed back in the payment payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Free-form memo, echoed back in the payment payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl PaymentRequirements {
    /// Validates the requirement and returns its parsed amount.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::MalformedRequirement`] when a required field
    /// is empty or the amount is not a non-negative decimal.
    pub fn validate(&self) -> Result<Amount, PaymentError> {
        for (field, value) in [
            ("network", &self.network),
            ("asset", &self.asset),
            ("payTo", &self.pay_to),
        ] {
            if value.trim().is_empty() {
                return Err(PaymentError::MalformedRequirement(format!(
                    "missing field: {field}"
                )));
            }
        }
        self.amount
            .parse::<Amount>()
            .map_err(|e| PaymentError::MalformedRequirement(e.to_string()))
    }

    /// Returns the confirmation window for this requirement.
    ///
    /// The requirement's `timeout` (seconds) when present, otherwise
    /// [`DEFAULT_SETTLE_TIMEOUT`].
    #[must_use]
    pub fn settle_timeout(&self) -> Duration {
        self.timeout
            .map_or(DEFAULT_SETTLE_TIMEOUT, Duration::from_secs)
    }
}

/// Proof of payment, transmitted base64-encoded in [`PAYMENT_HEADER`].
///
/// `amount` and `nonce` must match the triggering requirement; `signature`
/// references the confirmed on-chain transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Cluster the transfer settled on.
    pub network: String,
    /// Asset identifier, echoed from the requirement.
    pub asset: String,
    /// Payer address.
    pub from: String,
    /// Payee address, echoed from the requirement.
    pub to: String,
    /// Decimal amount string, echoed from the requirement.
    pub amount: String,
    /// Base58 signature of the settled transaction.
    pub signature: String,
    /// Time the payload was produced, in milliseconds.
    pub timestamp: UnixMillis,
    /// Requirement nonce, or a fresh one when the service sent none.
    pub nonce: String,
    /// Memo, echoed from the requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl PaymentPayload {
    /// Builds the payload for a settled transfer.
    ///
    /// Echoes the requirement's amount, nonce, and memo; generates a fresh
    /// nonce when the service supplied none.
    #[must_use]
    pub fn for_settlement(
        requirements: &PaymentRequirements,
        payer: impl Into<String>,
        transaction_signature: impl Into<String>,
    ) -> Self {
        Self {
            network: requirements.network.clone(),
            asset: requirements.asset.clone(),
            from: payer.into(),
            to: requirements.pay_to.clone(),
            amount: requirements.amount.clone(),
            signature: transaction_signature.into(),
            timestamp: UnixMillis::now(),
            nonce: requirements
                .nonce
                .clone()
                .unwrap_or_else(generate_nonce),
            memo: requirements.memo.clone(),
        }
    }

    /// Renders the payload as a [`PAYMENT_HEADER`] value.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_header(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(Base64Bytes::encode(&json).into_string())
    }

    /// Parses a [`PAYMENT_HEADER`] value back into a payload.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderDecodeError`] if the value is not valid base64 or the
    /// decoded bytes are not a well-formed payload.
    pub fn from_header(value: &str) -> Result<Self, HeaderDecodeError> {
        let bytes = Base64Bytes::from(value).decode()?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Errors decoding a payment header value.
#[derive(Debug, thiserror::Error)]
pub enum HeaderDecodeError {
    /// The header value is not valid base64.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not a well-formed payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Generates a 16-byte random nonce, hex-encoded.
#[must_use]
pub fn generate_nonce() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "solana".into(),
            network: "devnet".into(),
            asset: "SOL".into(),
            pay_to: "GqTPL6qRf5aUuqscLh8Rg2HTxPUXfhhAXDptNLLmWSd7".into(),
            amount: "0.01".into(),
            timeout: Some(60),
            nonce: Some("abc".into()),
            memo: None,
        }
    }

    #[test]
    fn test_requirements_wire_naming() {
        let json = serde_json::to_value(requirements()).unwrap();
        assert_eq!(json["payTo"], "GqTPL6qRf5aUuqscLh8Rg2HTxPUXfhhAXDptNLLmWSd7");
        assert_eq!(json["amount"], "0.01");
        assert_eq!(json["timeout"], 60);
    }

    #[test]
    fn test_requirements_validate() {
        assert_eq!(
            requirements().validate().unwrap(),
            "0.01".parse().unwrap()
        );
    }

    #[test]
    fn test_validate_rejects_missing_pay_to() {
        let mut req = requirements();
        req.pay_to = String::new();
        assert!(matches!(
            req.validate(),
            Err(PaymentError::MalformedRequirement(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_amount() {
        let mut req = requirements();
        req.amount = "-0.01".into();
        assert!(matches!(
            req.validate(),
            Err(PaymentError::MalformedRequirement(_))
        ));
    }

    #[test]
    fn test_settle_timeout_defaults() {
        let mut req = requirements();
        assert_eq!(req.settle_timeout(), Duration::from_secs(60));
        req.timeout = None;
        assert_eq!(req.settle_timeout(), DEFAULT_SETTLE_TIMEOUT);
    }

    #[test]
    fn test_payload_echoes_requirement() {
        let payload = PaymentPayload::for_settlement(&requirements(), "Payer111", "Sig111");
        assert_eq!(payload.nonce, "abc");
        assert_eq!(payload.amount, "0.01");
        assert_eq!(payload.to, "GqTPL6qRf5aUuqscLh8Rg2HTxPUXfhhAXDptNLLmWSd7");
    }

    #[test]
    fn test_payload_generates_nonce_when_absent() {
        let mut req = requirements();
        req.nonce = None;
        let payload = PaymentPayload::for_settlement(&req, "Payer111", "Sig111");
        // 16 random bytes, hex-encoded.
        assert_eq!(payload.nonce.len(), 32);
    }

    #[test]
    fn test_header_round_trip() {
        let payload = PaymentPayload::for_settlement(&requirements(), "Payer111", "Sig111");
        let header = payload.to_header().unwrap();
        let decoded = PaymentPayload::from_header(&header).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_header_decode_rejects_garbage() {
        assert!(matches!(
            PaymentPayload::from_header("@@@"),
            Err(HeaderDecodeError::Base64(_))
        ));
        let not_payload = Base64Bytes::encode(b"{}").into_string();
        assert!(matches!(
            PaymentPayload::from_header(&not_payload),
            Err(HeaderDecodeError::Json(_))
        ));
    }
}
