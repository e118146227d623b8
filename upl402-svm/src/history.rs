//! Payment history backfill from on-chain signatures.
//!
//! A fresh session starts with an empty ledger; this module reconstructs
//! recent wallet activity from chain metadata instead. Only fee-payer
//! lamport deltas are inspected, which is what the wallet actually paid or
//! received; transactions the chain has no metadata for are skipped rather
//! than failing the whole backfill.

use crate::rpc::RpcApi;
use solana_pubkey::Pubkey;
use upl402::amount::{Amount, NATIVE_DECIMALS};
use upl402::error::PaymentError;
use upl402::ledger::{Direction, PaymentRecord};
use upl402::timestamp::UnixMillis;

/// Reconstructs up to `limit` payment records for `wallet`, newest first.
///
/// # Errors
///
/// Returns [`PaymentError::Rpc`] when the signature listing itself fails;
/// individual transactions that cannot be fetched are skipped.
pub async fn fetch_history<R: RpcApi + ?Sized>(
    rpc: &R,
    wallet: &Pubkey,
    limit: usize,
) -> Result<Vec<PaymentRecord>, PaymentError> {
    let signatures = rpc
        .recent_signatures(wallet, limit)
        .await
        .map_err(|e| PaymentError::rpc("signature listing", e))?;

    let mut records = Vec::new();
    for info in signatures {
        let Ok(Some(delta)) = rpc.fee_payer_delta(&info.signature).await else {
            continue;
        };
        let moved = i128::from(delta.post) - i128::from(delta.pre);
        if moved == 0 {
            continue;
        }
        let direction = if moved < 0 {
            Direction::Sent
        } else {
            Direction::Received
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let lamports = moved.unsigned_abs() as u64;
        let timestamp = info.block_time.map_or_else(UnixMillis::now, |secs| {
            UnixMillis::from_millis(secs.unsigned_abs().saturating_mul(1000))
        });
        records.push(PaymentRecord {
            signature: Some(info.signature.to_string()),
            timestamp,
            amount: Amount::from_base_units(lamports, NATIVE_DECIMALS),
            asset: "SOL".to_string(),
            direction,
            from: wallet.to_string(),
            to: String::new(),
        });
    }
    Ok(records)
}
