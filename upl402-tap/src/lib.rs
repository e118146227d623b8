#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Trusted-agent authentication for machine-payable HTTP.
//!
//! Agents authenticate to directory services independently of the payment
//! rail, using HTTP message signatures (an RFC 9421 subset) computed with
//! the same Ed25519 key that signs their transactions. This crate provides
//! the signature primitive and the signed directory client built on it.
//!
//! # Modules
//!
//! - [`rfc9421`] - Signature-base construction, signing, and verification
//! - [`client`] - [`client::TapClient`]: agent registration and discovery
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod client;
pub mod rfc9421;

pub use client::{AgentIdentity, TapClient, TapClientError, TapConfig};
