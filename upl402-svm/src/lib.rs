#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana transfer rail for machine-payable HTTP.
//!
//! Implements the [`upl402::rail::TransferRail`] seam for the Solana chain:
//! native SOL moves through a system-program transfer, fungible tokens move
//! between associated token accounts via `TransferChecked`, with the payee's
//! account created on the fly when it does not exist yet. Broadcast and
//! confirmation are separate steps so their failures stay distinguishable.
//!
//! # Modules
//!
//! - [`confirm`] - Fixed-interval confirmation polling with a hard deadline
//! - [`history`] - Payment history backfill from on-chain signatures
//! - [`rpc`] - The chain-RPC subset the rail consumes, as a mockable trait
//! - [`transfer`] - [`transfer::SolanaRail`] and the two transfer strategies
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod confirm;
pub mod history;
pub mod rpc;
pub mod transfer;

pub use transfer::SolanaRail;
