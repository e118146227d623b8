//! The payment outcome taxonomy.
//!
//! Every failure a payment cycle can produce is a distinct variant, because
//! the variants differ in a way that has financial consequences: some mean
//! no funds moved, some mean funds definitely moved, and one means the
//! outcome is genuinely unknown. Callers doing payment bookkeeping must be
//! able to tell these apart, so nothing here is ever collapsed into a
//! generic failure.

use crate::amount::Amount;
use rust_decimal::Decimal;

/// A failed payment cycle, classified by what happened to the funds.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The 402 body was missing required fields or carried an unparseable
    /// amount. No funds moved; retrying without fixing the service
    /// integration will not help.
    #[error("malformed payment requirement: {0}")]
    MalformedRequirement(String),

    /// The wallet balance was below the requested amount. Checked before
    /// any transaction is built, so no funds moved; retriable after funding.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// The amount the requirement asked for.
        required: Amount,
        /// The wallet balance at check time.
        available: Amount,
    },

    /// Building, signing, or broadcasting the transfer failed, or the chain
    /// rejected it outright. Assume no funds moved unless a transaction
    /// signature is present in the message.
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// The transfer was broadcast but its confirmed status was not observed
    /// before the deadline. Ambiguous: the transaction may still land
    /// on-chain, so callers must not treat this as "no funds moved".
    #[error("confirmation timed out for transaction {signature}; the transfer may still settle")]
    ConfirmationTimeout {
        /// Signature of the broadcast transaction, for reconciliation.
        signature: String,
    },

    /// Funds moved and were confirmed, but the service refused the retried
    /// request. Terminal for this payment: paying again cannot fix it, the
    /// mismatch needs operator attention.
    #[error("settlement rejected with HTTP {status} after transaction {signature}")]
    SettlementRejected {
        /// HTTP status of the refused retry.
        status: u16,
        /// Signature of the confirmed transfer.
        signature: String,
    },

    /// The requirement's amount exceeds what is left of the hourly spending
    /// budget. Refused before anything is broadcast.
    #[error("hourly budget exceeded: requested {requested}, remaining {remaining}")]
    BudgetExceeded {
        /// The amount the requirement asked for.
        requested: Amount,
        /// The budget left in the current hour.
        remaining: Decimal,
    },

    /// Transient HTTP-layer failure before or after the payment itself.
    #[error("network error: {context}: {source}")]
    Network {
        /// Human-readable operation context.
        context: &'static str,
        /// The underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Chain-RPC transport failure while reading state (balances, accounts).
    /// Distinct from [`PaymentError::TransferFailed`]: nothing was broadcast.
    #[error("rpc error: {context}: {source}")]
    Rpc {
        /// Human-readable operation context.
        context: &'static str,
        /// The underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PaymentError {
    /// Wraps an HTTP transport error with context.
    pub fn network<E>(context: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            context,
            source: Box::new(source),
        }
    }

    /// Wraps a chain-RPC transport error with context.
    pub fn rpc<E>(context: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Rpc {
            context,
            source: Box::new(source),
        }
    }

    /// Returns `true` when the outcome of the payment is unknown and funds
    /// may have moved despite the error.
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Self::ConfirmationTimeout { .. })
    }

    /// Returns `true` when it is safe to retry the cycle with a fresh
    /// payment: no funds moved and the failure is not a protocol mismatch.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::TransferFailed(_)
                | Self::Network { .. }
                | Self::Rpc { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_timeout_is_ambiguous() {
        let err = PaymentError::ConfirmationTimeout {
            signature: "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW".into(),
        };
        assert!(err.is_ambiguous());
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_settlement_rejection_is_terminal() {
        let err = PaymentError::SettlementRejected {
            status: 403,
            signature: "sig".into(),
        };
        assert!(!err.is_ambiguous());
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_insufficient_balance_is_retriable() {
        let err = PaymentError::InsufficientBalance {
            required: "0.01".parse().unwrap(),
            available: "0.001".parse().unwrap(),
        };
        assert!(err.is_retriable());
    }
}
