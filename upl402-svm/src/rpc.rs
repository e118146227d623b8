//! The chain-RPC subset the rail consumes.
//!
//! [`RpcApi`] narrows the full Solana JSON-RPC surface to the handful of
//! calls a payer needs, with return types simple enough to stub in tests.
//! The network is treated as unreliable and rate-limited: every method
//! returns a transport error the caller must expect, distinct from
//! definitive on-chain failures.

use async_trait::async_trait;
use solana_account::Account;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use std::str::FromStr;

/// A chain-RPC transport failure.
///
/// Deliberately stringly: the underlying client error types are large and
/// version-churned, and callers only route on "the read failed", never on
/// the failure's internals.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct RpcError(pub String);

/// Observed status of a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Not yet confirmed at the target commitment.
    Pending,
    /// Confirmed at the target commitment.
    Confirmed,
    /// Landed on-chain but execution failed; it will never confirm.
    Failed,
}

/// A signature involving an address, as reported by the chain.
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    /// The transaction signature.
    pub signature: Signature,
    /// Block time in Unix seconds, when the chain reports one.
    pub block_time: Option<i64>,
}

/// Fee-payer lamport balances around a transaction.
#[derive(Debug, Clone, Copy)]
pub struct LamportDelta {
    /// Balance before the transaction.
    pub pre: u64,
    /// Balance after the transaction.
    pub post: u64,
}

/// The RPC operations the Solana rail depends on.
#[async_trait]
pub trait RpcApi: Send + Sync {
    /// Lamport balance of an address.
    async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// Fetches an account, `None` when it does not exist.
    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, RpcError>;

    /// Latest blockhash to anchor a transaction's fee context.
    async fn latest_blockhash(&self) -> Result<Hash, RpcError>;

    /// Broadcasts a signed transaction, returning its signature.
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, RpcError>;

    /// Current status of a broadcast transaction.
    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus, RpcError>;

    /// Most recent signatures involving an address, newest first.
    async fn recent_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, RpcError>;

    /// Fee-payer balances around a transaction, `None` when the chain has
    /// no metadata for it.
    async fn fee_payer_delta(
        &self,
        signature: &Signature,
    ) -> Result<Option<LamportDelta>, RpcError>;
}

#[async_trait]
impl RpcApi for RpcClient {
    async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        self.get_balance(address)
            .await
            .map_err(|e| RpcError(e.to_string()))
    }

    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, RpcError> {
        let response = self
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .map_err(|e| RpcError(e.to_string()))?;
        Ok(response.value)
    }

    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        self.get_latest_blockhash()
            .await
            .map_err(|e| RpcError(e.to_string()))
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, RpcError> {
        RpcClient::send_transaction(self, transaction)
            .await
            .map_err(|e| RpcError(e.to_string()))
    }

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus, RpcError> {
        let response = self
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| RpcError(e.to_string()))?;
        let status = response.value.into_iter().next().flatten();
        Ok(match status {
            Some(status) if status.err.is_some() => SignatureStatus::Failed,
            Some(status) if status.satisfies_commitment(CommitmentConfig::confirmed()) => {
                SignatureStatus::Confirmed
            }
            _ => SignatureStatus::Pending,
        })
    }

    async fn recent_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, RpcError> {
        let infos = self
            .get_signatures_for_address(address)
            .await
            .map_err(|e| RpcError(e.to_string()))?;
        Ok(infos
            .into_iter()
            .take(limit)
            .filter_map(|info| {
                let signature = Signature::from_str(&info.signature).ok()?;
                Some(SignatureRecord {
                    signature,
                    block_time: info.block_time,
                })
            })
            .collect())
    }

    async fn fee_payer_delta(
        &self,
        signature: &Signature,
    ) -> Result<Option<LamportDelta>, RpcError> {
        let config = RpcTransactionConfig {
            max_supported_transaction_version: Some(0),
            ..RpcTransactionConfig::default()
        };
        let transaction = self
            .get_transaction_with_config(signature, config)
            .await
            .map_err(|e| RpcError(e.to_string()))?;
        let Some(meta) = transaction.transaction.meta else {
            return Ok(None);
        };
        // Account index 0 is always the fee payer.
        let pre = meta.pre_balances.first().copied().unwrap_or(0);
        let post = meta.post_balances.first().copied().unwrap_or(0);
        Ok(Some(LamportDelta { pre, post }))
    }
}
