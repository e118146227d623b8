//! Decimal payment amounts and base-unit conversion.
//!
//! Services quote prices as human-readable decimal strings (`"0.01"`), while
//! the chain settles in an asset's smallest indivisible unit
//! (`amount * 10^decimals`). [`Amount`] is the parsed, validated decimal;
//! conversion in either direction is explicit so precision loss can never
//! happen silently.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal precision of the native coin (SOL): 1 SOL = 10^9 lamports.
pub const NATIVE_DECIMALS: u8 = 9;

/// Base58 address of the system program, accepted as an alias for the
/// native coin in requirement `asset` fields.
pub const SYSTEM_PROGRAM_ADDRESS: &str = "11111111111111111111111111111111";

/// The asset a payment is denominated in.
///
/// Resolved once per payment cycle from the requirement's `asset` field and
/// used to select the transfer strategy: native transfers move lamports via
/// the system program, token transfers move base units between associated
/// token accounts of the given mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    /// The chain's base settlement asset (SOL, measured in lamports).
    Native,
    /// A fungible token identified by its base58 mint address.
    Token(String),
}

impl Asset {
    /// Resolves an `asset` field value into an [`Asset`].
    ///
    /// The literals `SOL` and `NATIVE` (case-insensitive) and the system
    /// program address all denote the native coin; anything else is treated
    /// as a token mint address.
    #[must_use]
    pub fn parse(asset: &str) -> Self {
        if asset.eq_ignore_ascii_case("SOL")
            || asset.eq_ignore_ascii_case("NATIVE")
            || asset == SYSTEM_PROGRAM_ADDRESS
        {
            Self::Native
        } else {
            Self::Token(asset.to_string())
        }
    }
}

/// Errors produced when parsing or converting an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The string is not a well-formed decimal number.
    #[error("invalid decimal amount: {0}")]
    Invalid(String),
    /// The amount is negative; payments are non-negative by definition.
    #[error("negative amount: {0}")]
    Negative(String),
    /// The base-unit value does not fit the chain's 64-bit integer range.
    #[error("amount out of range for {decimals}-decimal base units: {amount}")]
    Overflow {
        /// The decimal amount that overflowed.
        amount: String,
        /// The precision the conversion targeted.
        decimals: u8,
    },
}

/// A non-negative decimal payment amount.
///
/// Backed by a 96-bit decimal, which comfortably covers every asset
/// precision in use. Parsing rejects negative values, so an [`Amount`] can
/// be handed to a transfer strategy without re-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wraps a raw decimal, rejecting negative values.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Negative`] for values below zero.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value.to_string()));
        }
        Ok(Self(value))
    }

    /// Reconstructs a decimal amount from base units at the given precision.
    #[must_use]
    pub fn from_base_units(units: u64, decimals: u8) -> Self {
        Self(Decimal::from_i128_with_scale(
            i128::from(units),
            u32::from(decimals),
        ))
    }

    /// Converts to the asset's smallest integer unit, truncating toward zero.
    ///
    /// `1.5` at 6 decimals becomes `1_500_000`; fractional dust below the
    /// asset's precision is dropped, never rounded up.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] if the scaled value exceeds `u64`.
    pub fn to_base_units(&self, decimals: u8) -> Result<u64, AmountError> {
        let overflow = || AmountError::Overflow {
            amount: self.0.to_string(),
            decimals,
        };
        let factor = 10u64.checked_pow(u32::from(decimals)).ok_or_else(overflow)?;
        let scaled = self
            .0
            .checked_mul(Decimal::from(factor))
            .ok_or_else(overflow)?;
        scaled.trunc().to_u64().ok_or_else(overflow)
    }

    /// Returns the underlying decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns `true` if the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value =
            Decimal::from_str(s.trim()).map_err(|_| AmountError::Invalid(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
