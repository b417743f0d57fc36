//! Studio orchestration for cellular automaton artwork: configuration loading,
//! mint previews, payment checks, minting and drawing through injected chain and
//! content collaborators.
#![deny(missing_docs)]

use eca_spec::{Address, AmountError, CodecError, Wei};
use eca_transport::{ChainError, FetchError};
use thiserror::Error;

/// Configuration sources and validation.
pub mod config;
/// The [`ArtworkStudio`] orchestrator.
pub mod studio;

pub use config::{load_dotenv, parse_dotenv, ConfigError, StudioConfig};
pub use studio::{Artwork, ArtworkStudio, GenerateRequest, MintOutcome, MintPreview};

/// Errors surfaced by studio operations.
#[derive(Debug, Error)]
pub enum StudioError {
    /// Artwork parameters were rejected.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Price arithmetic failed.
    #[error(transparent)]
    Amount(#[from] AmountError),
    /// Chain collaborator failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// Content collaborator failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Offered payment is below the size-class floor.
    #[error("payment of {offered} is below the required {required}")]
    InsufficientPayment {
        /// Floor for the requested size class.
        required: Wei,
        /// Amount the caller offered.
        offered: Wei,
    },
    /// Sender is not one of the node's accounts.
    #[error("account {0} is not managed by the node")]
    UnknownAccount(Address),
    /// Node exposes no accounts to send from.
    #[error("node exposes no accounts")]
    NoAccounts,
    /// Token content is not valid UTF-8.
    #[error("content at {uri} is not valid UTF-8")]
    NotUtf8 {
        /// Resolved token URI.
        uri: String,
    },
}
