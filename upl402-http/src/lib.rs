#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Payer-side HTTP engine for machine-payable services.
//!
//! [`client::PaymentClient`] issues requests like any HTTP client, but when
//! a service answers `402 Payment Required` it settles the demanded amount
//! on-chain through a [`upl402::rail::TransferRail`], attaches the proof of
//! payment, and retries. Outcomes are classified by what happened to the
//! funds, never collapsed into a generic failure.
//!
//! # Modules
//!
//! - [`client`] - The payment executor and its ledger surface
//! - [`config`] - Client construction options
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod client;
pub mod config;

pub use client::PaymentClient;
pub use config::PaymentClientConfig;
