#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for machine-payable HTTP settled on Solana.
//!
//! This crate provides the foundational types shared by the payer-side
//! protocol engine. A remote service answers a request with
//! `402 Payment Required` and a JSON body describing what it wants to be
//! paid; the client moves funds on-chain, proves it did so in a request
//! header, and retries. Everything chain-specific lives behind the
//! [`rail::TransferRail`] seam, with the Solana implementation provided by a
//! separate crate.
//!
//! # Modules
//!
//! - [`amount`] - Decimal payment amounts and base-unit conversion
//! - [`encoding`] - Base64 wrapper used for header payloads
//! - [`error`] - The payment outcome taxonomy
//! - [`ledger`] - Spending tracker, payment history, and lifetime metrics
//! - [`networks`] - Well-known Solana clusters and their RPC endpoints
//! - [`proto`] - Wire types: payment requirements and the payment header
//! - [`rail`] - The transfer-rail trait the executor drives
//! - [`timestamp`] - Second- and millisecond-precision Unix timestamps
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod amount;
pub mod encoding;
pub mod error;
pub mod ledger;
pub mod networks;
pub mod proto;
pub mod rail;
pub mod timestamp;
