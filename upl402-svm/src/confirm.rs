//! Confirmation polling for broadcast transactions.
//!
//! A broadcast transaction cannot be cancelled: even when the local deadline
//! expires, the transfer may still land on-chain. The poller therefore
//! reports a timeout as [`PaymentError::ConfirmationTimeout`] carrying the
//! signature, which callers must treat as "outcome unknown", not as failure.
//!
//! Polling is a fixed 1-second interval with no backoff, bounded by the
//! caller-supplied deadline.

use crate::rpc::{RpcApi, SignatureStatus};
use solana_signature::Signature;
use std::time::Duration;
use upl402::error::PaymentError;

/// Interval between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Waits until the transaction confirms, fails, or the deadline passes.
///
/// Transient RPC errors during polling are tolerated: the poll simply
/// continues until the deadline, since a flaky status endpoint says nothing
/// about the transaction itself.
///
/// # Errors
///
/// - [`PaymentError::TransferFailed`] when the chain reports the
///   transaction as failed; it will never confirm.
/// - [`PaymentError::ConfirmationTimeout`] at or after the deadline, never
///   before it.
#[cfg_attr(
    feature = "telemetry",
    tracing::instrument(name = "upl402.svm.confirm", skip(rpc), err)
)]
pub async fn confirm<R: RpcApi + ?Sized>(
    rpc: &R,
    signature: &Signature,
    timeout: Duration,
) -> Result<(), PaymentError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match rpc.signature_status(signature).await {
            Ok(SignatureStatus::Confirmed) => return Ok(()),
            Ok(SignatureStatus::Failed) => {
                return Err(PaymentError::TransferFailed(format!(
                    "transaction {signature} failed on-chain"
                )));
            }
            Ok(SignatureStatus::Pending) | Err(_) => {}
        }
        if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
            return Err(PaymentError::ConfirmationTimeout {
                signature: signature.to_string(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
