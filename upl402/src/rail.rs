//! The transfer-rail seam between the protocol engine and the chain.
//!
//! The payment executor never talks to a blockchain directly; it drives a
//! [`TransferRail`], which settles a requirement on whatever chain it fronts
//! and reports back the confirmed transaction. This keeps the engine
//! testable against stub rails and keeps chain crates out of its
//! dependency graph.

use crate::amount::Amount;
use crate::error::PaymentError;
use crate::proto::PaymentRequirements;
use async_trait::async_trait;

/// Outcome of a settled transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Signature of the confirmed transaction, base58.
    pub signature: String,
    /// The decimal amount that was moved.
    pub amount: Amount,
}

/// A payment rail that can settle a requirement on-chain.
///
/// Implementations must broadcast at most one transaction per call, wait for
/// its confirmation, and surface every failure through the
/// [`PaymentError`] taxonomy so the caller can tell whether funds moved.
#[async_trait]
pub trait TransferRail: Send + Sync {
    /// The payer address funds are drawn from.
    fn address(&self) -> String;

    /// Settles the requirement and returns the confirmed transfer.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::MalformedRequirement`] for unusable addresses or assets
    /// - [`PaymentError::InsufficientBalance`] before anything is broadcast
    /// - [`PaymentError::TransferFailed`] when the broadcast is rejected
    /// - [`PaymentError::ConfirmationTimeout`] when the outcome stays unknown
    async fn transfer(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<TransferReceipt, PaymentError>;
}
