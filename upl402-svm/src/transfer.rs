//! Transfer strategies and the Solana rail.
//!
//! [`SolanaRail`] settles a payment requirement by broadcasting exactly one
//! transaction. The strategy is resolved once per cycle from the
//! requirement's asset:
//!
//! - **Native**: a single system-program transfer of lamports.
//! - **Token**: a `TransferChecked` between associated token accounts,
//!   preceded by an idempotent create for the payee's account when it does
//!   not exist yet. The mint account is fetched to learn the owning token
//!   program (SPL Token or Token-2022) and the decimal precision.
//!
//! Balances are verified before anything is built, so
//! [`PaymentError::InsufficientBalance`] always means no funds moved.

use crate::confirm::confirm;
use crate::history;
use crate::rpc::RpcApi;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_instruction::{AccountMeta, Instruction};
use solana_message::v0::Message as MessageV0;
use solana_message::VersionedMessage;
use solana_pubkey::{Pubkey, pubkey};
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;
use std::str::FromStr;
use std::time::Duration;
use upl402::amount::{Amount, Asset, NATIVE_DECIMALS};
use upl402::error::PaymentError;
use upl402::ledger::PaymentRecord;
use upl402::networks;
use upl402::proto::{DEFAULT_SETTLE_TIMEOUT, PaymentRequirements};
use upl402::rail::{TransferRail, TransferReceipt};

/// The associated-token-account program.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// The cluster name is not in the built-in network table and no RPC URL was
/// given.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetworkError(pub String);

/// A [`TransferRail`] that settles payments on Solana.
///
/// Generic over the signer and the RPC transport so tests can substitute
/// both. One rail serves one wallet; drive it from a single payment cycle at
/// a time.
pub struct SolanaRail<S, R> {
    signer: S,
    rpc: R,
    confirm_ceiling: Duration,
}

impl<S, R> std::fmt::Debug for SolanaRail<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRail")
            .field("confirm_ceiling", &self.confirm_ceiling)
            .finish_non_exhaustive()
    }
}

impl<S, R> SolanaRail<S, R> {
    /// Creates a rail from a signer and an RPC transport.
    pub const fn new(signer: S, rpc: R) -> Self {
        Self {
            signer,
            rpc,
            confirm_ceiling: DEFAULT_SETTLE_TIMEOUT,
        }
    }

    /// Overrides the confirmation window used when a requirement carries no
    /// `timeout` of its own.
    #[must_use]
    pub const fn with_confirm_ceiling(mut self, ceiling: Duration) -> Self {
        self.confirm_ceiling = ceiling;
        self
    }
}

impl<S> SolanaRail<S, RpcClient> {
    /// Creates a rail against a named cluster's default RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetworkError`] for cluster names outside
    /// [`networks::SOLANA_NETWORKS`].
    pub fn for_network(signer: S, network: &str) -> Result<Self, UnknownNetworkError> {
        let url = networks::default_rpc_url(network)
            .ok_or_else(|| UnknownNetworkError(network.to_string()))?;
        Ok(Self::new(signer, RpcClient::new(url.to_string())))
    }
}

impl<S, R> SolanaRail<S, R>
where
    S: Signer + Send + Sync,
    R: RpcApi,
{
    /// Wallet balance in the given asset, as a decimal amount.
    ///
    /// A missing token account reads as zero rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Rpc`] on transport failure and
    /// [`PaymentError::MalformedRequirement`] for an unusable asset.
    pub async fn balance(&self, asset: &Asset) -> Result<Amount, PaymentError> {
        let payer = self.signer.pubkey();
        match asset {
            Asset::Native => {
                let lamports = self
                    .rpc
                    .balance(&payer)
                    .await
                    .map_err(|e| PaymentError::rpc("wallet balance", e))?;
                Ok(Amount::from_base_units(lamports, NATIVE_DECIMALS))
            }
            Asset::Token(mint) => {
                let mint = parse_address(mint)?;
                let (decimals, token_program) = fetch_mint(&self.rpc, &mint).await?;
                let source = associated_token_address(&payer, &mint, &token_program);
                let units = self.token_balance(&source, &token_program).await?;
                Ok(Amount::from_base_units(units, decimals))
            }
        }
    }

    /// Recent sends and receives of this wallet, reconstructed from chain
    /// metadata. See [`history::fetch_history`].
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Rpc`] when the signature listing fails.
    pub async fn payment_history(&self, limit: usize) -> Result<Vec<PaymentRecord>, PaymentError> {
        history::fetch_history(&self.rpc, &self.signer.pubkey(), limit).await
    }

    async fn native_instructions(
        &self,
        payer: &Pubkey,
        pay_to: &Pubkey,
        amount: Amount,
    ) -> Result<Vec<Instruction>, PaymentError> {
        let lamports = amount
            .to_base_units(NATIVE_DECIMALS)
            .map_err(|e| PaymentError::MalformedRequirement(e.to_string()))?;
        let balance = self
            .rpc
            .balance(payer)
            .await
            .map_err(|e| PaymentError::rpc("wallet balance", e))?;
        if balance < lamports {
            return Err(PaymentError::InsufficientBalance {
                required: amount,
                available: Amount::from_base_units(balance, NATIVE_DECIMALS),
            });
        }
        Ok(vec![solana_system_interface::instruction::transfer(
            payer, pay_to, lamports,
        )])
    }

    async fn token_instructions(
        &self,
        payer: &Pubkey,
        pay_to: &Pubkey,
        mint: &Pubkey,
        amount: Amount,
    ) -> Result<Vec<Instruction>, PaymentError> {
        let (decimals, token_program) = fetch_mint(&self.rpc, mint).await?;
        let units = amount
            .to_base_units(decimals)
            .map_err(|e| PaymentError::MalformedRequirement(e.to_string()))?;

        let source = associated_token_address(payer, mint, &token_program);
        let destination = associated_token_address(pay_to, mint, &token_program);

        let available = self.token_balance(&source, &token_program).await?;
        if available < units {
            return Err(PaymentError::InsufficientBalance {
                required: amount,
                available: Amount::from_base_units(available, decimals),
            });
        }

        let mut instructions = Vec::with_capacity(2);
        let destination_exists = self
            .rpc
            .account(&destination)
            .await
            .map_err(|e| PaymentError::rpc("payee token account", e))?
            .is_some();
        if !destination_exists {
            instructions.push(create_associated_token_account_idempotent(
                payer,
                &destination,
                pay_to,
                mint,
                &token_program,
            ));
        }

        let transfer = if token_program == spl_token_2022::id() {
            spl_token_2022::instruction::transfer_checked(
                &token_program,
                &source,
                mint,
                &destination,
                payer,
                &[],
                units,
                decimals,
            )
        } else {
            spl_token::instruction::transfer_checked(
                &token_program,
                &source,
                mint,
                &destination,
                payer,
                &[],
                units,
                decimals,
            )
        }
        .map_err(|e| PaymentError::TransferFailed(format!("transfer instruction: {e}")))?;
        instructions.push(transfer);
        Ok(instructions)
    }

    async fn token_balance(
        &self,
        account: &Pubkey,
        token_program: &Pubkey,
    ) -> Result<u64, PaymentError> {
        let Some(account) = self
            .rpc
            .account(account)
            .await
            .map_err(|e| PaymentError::rpc("token account", e))?
        else {
            return Ok(0);
        };
        let amount = if *token_program == spl_token_2022::id() {
            spl_token_2022::state::Account::unpack(&account.data)
                .map_err(|e| PaymentError::TransferFailed(format!("unreadable token account: {e}")))?
                .amount
        } else {
            spl_token::state::Account::unpack(&account.data)
                .map_err(|e| PaymentError::TransferFailed(format!("unreadable token account: {e}")))?
                .amount
        };
        Ok(amount)
    }
}

#[async_trait]
impl<S, R> TransferRail for SolanaRail<S, R>
where
    S: Signer + Send + Sync,
    R: RpcApi,
{
    fn address(&self) -> String {
        self.signer.pubkey().to_string()
    }

    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "upl402.svm.transfer", skip_all, err)
    )]
    async fn transfer(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<TransferReceipt, PaymentError> {
        let amount = requirements.validate()?;
        let payer = self.signer.pubkey();
        let pay_to = parse_address(&requirements.pay_to)?;

        let instructions = match Asset::parse(&requirements.asset) {
            Asset::Native => self.native_instructions(&payer, &pay_to, amount).await?,
            Asset::Token(mint) => {
                let mint = parse_address(&mint)?;
                self.token_instructions(&payer, &pay_to, &mint, amount)
                    .await?
            }
        };

        let blockhash = self
            .rpc
            .latest_blockhash()
            .await
            .map_err(|e| PaymentError::rpc("latest blockhash", e))?;
        let message = MessageV0::try_compile(&payer, &instructions, &[], blockhash)
            .map_err(|e| PaymentError::TransferFailed(format!("message compile: {e:?}")))?;
        let transaction =
            VersionedTransaction::try_new(VersionedMessage::V0(message), &[&self.signer])
                .map_err(|e| PaymentError::TransferFailed(format!("signing: {e}")))?;

        let signature = self
            .rpc
            .send_transaction(&transaction)
            .await
            .map_err(|e| PaymentError::TransferFailed(format!("broadcast rejected: {e}")))?;

        #[cfg(feature = "telemetry")]
        tracing::debug!(%signature, "Transfer broadcast, awaiting confirmation");

        // Confirmation is a separate step: its failures must stay
        // distinguishable from broadcast failures.
        let timeout = requirements
            .timeout
            .map_or(self.confirm_ceiling, Duration::from_secs);
        confirm(&self.rpc, &signature, timeout).await?;

        Ok(TransferReceipt {
            signature: signature.to_string(),
            amount,
        })
    }
}

/// Fetches a mint account and returns its decimal precision and owning
/// token program.
///
/// # Errors
///
/// Returns [`PaymentError::MalformedRequirement`] when the account does not
/// exist or is not a token mint, [`PaymentError::Rpc`] on transport failure.
pub async fn fetch_mint<R: RpcApi + ?Sized>(
    rpc: &R,
    mint: &Pubkey,
) -> Result<(u8, Pubkey), PaymentError> {
    let account = rpc
        .account(mint)
        .await
        .map_err(|e| PaymentError::rpc("fetch mint", e))?
        .ok_or_else(|| PaymentError::MalformedRequirement(format!("unknown mint {mint}")))?;
    if account.owner == spl_token::id() {
        let state = spl_token::state::Mint::unpack(&account.data)
            .map_err(|e| PaymentError::MalformedRequirement(format!("bad mint {mint}: {e}")))?;
        Ok((state.decimals, spl_token::id()))
    } else if account.owner == spl_token_2022::id() {
        let state = spl_token_2022::state::Mint::unpack(&account.data)
            .map_err(|e| PaymentError::MalformedRequirement(format!("bad mint {mint}: {e}")))?;
        Ok((state.decimals, spl_token_2022::id()))
    } else {
        Err(PaymentError::MalformedRequirement(format!(
            "account {mint} is not a token mint"
        )))
    }
}

/// Derives the associated token account of `owner` for `mint`.
#[must_use]
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// Builds the idempotent create instruction for an associated token account.
fn create_associated_token_account_idempotent(
    funder: &Pubkey,
    account: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    // CreateIdempotent discriminator byte is 1
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*funder, true),
            AccountMeta::new(*account, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(solana_system_interface::program::ID, false),
            AccountMeta::new_readonly(*token_program, false),
        ],
        data: vec![1],
    }
}

fn parse_address(address: &str) -> Result<Pubkey, PaymentError> {
    Pubkey::from_str(address)
        .map_err(|e| PaymentError::MalformedRequirement(format!("invalid address {address}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{LamportDelta, RpcError, SignatureRecord, SignatureStatus};
    use solana_account::Account;
    use solana_keypair::Keypair;
    use solana_message::Hash;
    use solana_signature::Signature;
    use spl_token::solana_program::program_option::COption;
    use spl_token::state::AccountState;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockRpc {
        balances: HashMap<Pubkey, u64>,
        accounts: HashMap<Pubkey, Account>,
        sent: Mutex<Vec<VersionedTransaction>>,
    }

    #[async_trait]
    impl RpcApi for MockRpc {
        async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
            Ok(self.balances.get(address).copied().unwrap_or(0))
        }
        async fn account(&self, address: &Pubkey) -> Result<Option<Account>, RpcError> {
            Ok(self.accounts.get(address).cloned())
        }
        async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
            Ok(Hash::default())
        }
        async fn send_transaction(
            &self,
            transaction: &VersionedTransaction,
        ) -> Result<Signature, RpcError> {
            self.sent.lock().unwrap().push(transaction.clone());
            Ok(transaction
                .signatures
                .first()
                .copied()
                .unwrap_or_default())
        }
        async fn signature_status(
            &self,
            _signature: &Signature,
        ) -> Result<SignatureStatus, RpcError> {
            Ok(SignatureStatus::Confirmed)
        }
        async fn recent_signatures(
            &self,
            _address: &Pubkey,
            _limit: usize,
        ) -> Result<Vec<SignatureRecord>, RpcError> {
            Ok(vec![])
        }
        async fn fee_payer_delta(
            &self,
            _signature: &Signature,
        ) -> Result<Option<LamportDelta>, RpcError> {
            Ok(None)
        }
    }

    fn requirements(asset: &str, amount: &str, pay_to: &Pubkey) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "solana".into(),
            network: "devnet".into(),
            asset: asset.into(),
            pay_to: pay_to.to_string(),
            amount: amount.into(),
            timeout: Some(5),
            nonce: Some("abc".into()),
            memo: None,
        }
    }

    fn token_mint_account(decimals: u8) -> Account {
        let state = spl_token::state::Mint {
            mint_authority: COption::None,
            supply: 1_000_000_000,
            decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        };
        let mut data = vec![0u8; spl_token::state::Mint::LEN];
        spl_token::state::Mint::pack(state, &mut data).unwrap();
        Account {
            lamports: 1,
            data,
            owner: spl_token::id(),
            executable: false,
            rent_epoch: 0,
        }
    }

    fn token_holding_account(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Account {
        let state = spl_token::state::Account {
            mint: *mint,
            owner: *owner,
            amount,
            delegate: COption::None,
            state: AccountState::Initialized,
            is_native: COption::None,
            delegated_amount: 0,
            close_authority: COption::None,
        };
        let mut data = vec![0u8; spl_token::state::Account::LEN];
        spl_token::state::Account::pack(state, &mut data).unwrap();
        Account {
            lamports: 1,
            data,
            owner: spl_token::id(),
            executable: false,
            rent_epoch: 0,
        }
    }

    /// Resolves each compiled instruction back to (program id, data).
    fn decoded_instructions(tx: &VersionedTransaction) -> Vec<(Pubkey, Vec<u8>)> {
        let keys = tx.message.static_account_keys();
        tx.message
            .instructions()
            .iter()
            .map(|ix| (keys[ix.program_id_index as usize], ix.data.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_native_transfer_moves_lamports() {
        let signer = Keypair::new();
        let pay_to = Pubkey::new_unique();
        let mut rpc = MockRpc::default();
        rpc.balances.insert(signer.pubkey(), 1_000_000_000);
        let rail = SolanaRail::new(signer, rpc);

        let receipt = rail
            .transfer(&requirements("SOL", "0.01", &pay_to))
            .await
            .unwrap();
        assert_eq!(receipt.amount, "0.01".parse().unwrap());

        let sent = rail.rpc.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let instructions = decoded_instructions(&sent[0]);
        assert_eq!(instructions.len(), 1);
        let (program, data) = &instructions[0];
        assert_eq!(*program, solana_system_interface::program::ID);
        // System transfer data: u32 discriminant 2, then lamports LE.
        assert_eq!(data[..4], 2u32.to_le_bytes());
        assert_eq!(data[4..12], 10_000_000u64.to_le_bytes());
    }

    #[tokio::test]
    async fn test_native_transfer_insufficient_balance() {
        let signer = Keypair::new();
        let pay_to = Pubkey::new_unique();
        let mut rpc = MockRpc::default();
        rpc.balances.insert(signer.pubkey(), 1_000_000);
        let rail = SolanaRail::new(signer, rpc);

        let err = rail
            .transfer(&requirements("NATIVE", "0.01", &pay_to))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InsufficientBalance { .. }));
        // Nothing may be broadcast when the balance check fails.
        assert!(rail.rpc.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_transfer_uses_mint_decimals() {
        let signer = Keypair::new();
        let payer = signer.pubkey();
        let pay_to = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let source = associated_token_address(&payer, &mint, &spl_token::id());
        let destination = associated_token_address(&pay_to, &mint, &spl_token::id());

        let mut rpc = MockRpc::default();
        rpc.accounts.insert(mint, token_mint_account(6));
        rpc.accounts
            .insert(source, token_holding_account(&mint, &payer, 2_000_000));
        rpc.accounts
            .insert(destination, token_holding_account(&mint, &pay_to, 0));
        let rail = SolanaRail::new(signer, rpc);

        rail.transfer(&requirements(&mint.to_string(), "1.5", &pay_to))
            .await
            .unwrap();

        let sent = rail.rpc.sent.lock().unwrap();
        let instructions = decoded_instructions(&sent[0]);
        assert_eq!(instructions.len(), 1);
        let (program, data) = &instructions[0];
        assert_eq!(*program, spl_token::id());
        // TransferChecked data: discriminator 12, amount LE, decimals.
        assert_eq!(data[0], 12);
        assert_eq!(data[1..9], 1_500_000u64.to_le_bytes());
        assert_eq!(data[9], 6);
    }

    #[tokio::test]
    async fn test_token_transfer_creates_missing_payee_account() {
        let signer = Keypair::new();
        let payer = signer.pubkey();
        let pay_to = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let source = associated_token_address(&payer, &mint, &spl_token::id());

        let mut rpc = MockRpc::default();
        rpc.accounts.insert(mint, token_mint_account(6));
        rpc.accounts
            .insert(source, token_holding_account(&mint, &payer, 2_000_000));
        let rail = SolanaRail::new(signer, rpc);

        rail.transfer(&requirements(&mint.to_string(), "1.5", &pay_to))
            .await
            .unwrap();

        let sent = rail.rpc.sent.lock().unwrap();
        let instructions = decoded_instructions(&sent[0]);
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].0, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(instructions[0].1, vec![1]);
        assert_eq!(instructions[1].0, spl_token::id());
    }

    #[tokio::test]
    async fn test_token_transfer_insufficient_token_balance() {
        let signer = Keypair::new();
        let payer = signer.pubkey();
        let pay_to = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let source = associated_token_address(&payer, &mint, &spl_token::id());

        let mut rpc = MockRpc::default();
        rpc.accounts.insert(mint, token_mint_account(6));
        rpc.accounts
            .insert(source, token_holding_account(&mint, &payer, 1_000));
        let rail = SolanaRail::new(signer, rpc);

        let err = rail
            .transfer(&requirements(&mint.to_string(), "1.5", &pay_to))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InsufficientBalance { .. }));
        assert!(rail.rpc.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_mint_is_malformed_requirement() {
        let signer = Keypair::new();
        let pay_to = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let rail = SolanaRail::new(signer, MockRpc::default());

        let err = rail
            .transfer(&requirements(&mint.to_string(), "1.5", &pay_to))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::MalformedRequirement(_)));
    }

    #[tokio::test]
    async fn test_balance_reads_missing_token_account_as_zero() {
        let signer = Keypair::new();
        let mint = Pubkey::new_unique();
        let mut rpc = MockRpc::default();
        rpc.accounts.insert(mint, token_mint_account(6));
        let rail = SolanaRail::new(signer, rpc);

        let balance = rail
            .balance(&Asset::Token(mint.to_string()))
            .await
            .unwrap();
        assert!(balance.is_zero());
    }

    #[test]
    fn test_for_network_rejects_unknown_cluster() {
        let signer = Keypair::new();
        assert!(SolanaRail::for_network(signer, "localnet").is_err());
    }
}
