//! Artwork specification types and validation primitives.
//!
//! This crate defines the token-id packing scheme shared with the artwork
//! contract, the pricing rules derived from the contract's base price, and the
//! chain value types (addresses, hashes, receipts) exchanged with the node.
#![deny(missing_docs)]

use thiserror::Error;

/// Chain value types: addresses, hashes, quantities and receipts.
pub mod chain;
/// Token-id encoding and decoding.
pub mod codec;
/// Payment floors and wei/ether conversion.
pub mod pricing;

pub use chain::{Address, Quantity, TransactionReceipt, TxHash, H256};
pub use codec::{
    decode_token_id, derive_sizing, encode_token_id, format_state, DecodedToken, InitialState,
    Rule, SizeClass, Sizing, TokenId, TokenParams,
};
pub use pricing::{payment_floor, Wei, WEI_PER_ETHER};

/// Caller-input errors raised by the token codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Rule is outside `0..=255`.
    #[error("rule {0} is outside 0..=255")]
    InvalidRule(i64),
    /// Size class is outside `1..=5`.
    #[error("size class {0} is outside 1..=5")]
    InvalidSizeClass(i64),
    /// Initial state is negative.
    #[error("initial state must be non-negative")]
    InvalidState,
    /// Initial state text is not a number.
    #[error("malformed initial state {0:?}")]
    MalformedState(String),
    /// Token id text is not a number.
    #[error("malformed token id {0:?}")]
    MalformedTokenId(String),
}

/// Errors raised while parsing or combining currency amounts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Amount text is not a non-negative decimal with at most 18 fractional digits.
    #[error("invalid ether amount {0:?}")]
    Invalid(String),
    /// Amount does not fit in 128 bits of wei.
    #[error("amount overflows 128-bit wei")]
    Overflow,
}

/// Errors raised while parsing fixed-width hex values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Value is missing the `0x` prefix.
    #[error("expected 0x-prefixed hex, got {0:?}")]
    MissingPrefix(String),
    /// Value decoded to the wrong number of bytes.
    #[error("expected {expected} bytes, got {actual}")]
    Length {
        /// Required byte count.
        expected: usize,
        /// Decoded byte count.
        actual: usize,
    },
    /// Value contains non-hex characters.
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    /// Quantity does not fit the target integer type.
    #[error("quantity {0:?} is out of range")]
    Quantity(String),
}
