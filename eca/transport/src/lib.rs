//! Collaborator adapters for the artwork studio: a JSON-RPC chain client, a
//! contract ABI codec, a URI content fetcher for `http(s)` and `data:` schemes,
//! and an in-memory chain for offline sessions.
#![deny(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use eca_spec::{Address, TokenId, TokenParams, TransactionReceipt, TxHash, Wei};
use thiserror::Error;

/// Contract ABI artifacts, selectors and word encoding.
pub mod abi;
/// URI content fetching.
pub mod fetch;
/// In-process chain used for offline sessions and tests.
pub mod memory;
/// JSON-RPC 2.0 chain client.
pub mod rpc;

pub use abi::{AbiError, AbiFunction, AbiParam, AbiValue, ContractAbi};
pub use fetch::{decode_data_uri, ContentFetcher, FetchError, HttpFetcher};
pub use memory::InMemoryChain;
pub use rpc::{JsonRpcChain, RpcSettings};

/// Contract view returning the base price in wei.
pub const BASE_PRICE_FN: &str = "BASE_PRICE";
/// Payable contract method minting an artwork.
pub const MINT_FN: &str = "createCellularAutomaton";
/// ERC-721 metadata view resolving a token URI.
pub const TOKEN_URI_FN: &str = "tokenURI";

/// Errors surfaced by chain clients.
#[derive(Debug, Error)]
pub enum ChainError {
    /// HTTP transport failure talking to the node.
    #[error("rpc transport error: {0}")]
    Http(#[from] reqwest::Error),
    /// Node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Node-supplied message.
        message: String,
    },
    /// Response did not have the expected shape.
    #[error("malformed rpc response: {0}")]
    Decode(String),
    /// Call data could not be built or return data could not be read.
    #[error(transparent)]
    Abi(#[from] AbiError),
    /// Transaction was not mined before the receipt timeout.
    #[error("no receipt for {tx_hash} after {waited:?}")]
    ReceiptTimeout {
        /// Submitted transaction.
        tx_hash: TxHash,
        /// Time spent polling.
        waited: Duration,
    },
    /// Transaction was mined but reverted.
    #[error("transaction {} reverted in block {}", .0.transaction_hash, .0.block_number)]
    Reverted(Box<TransactionReceipt>),
}

/// Mint request handed to a chain client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintCall {
    /// Artwork parameters. Clients send the contract
    /// [`TokenParams::masked_state`], not the raw state; the token id is the same.
    pub params: TokenParams,
    /// Paying account.
    pub from: Address,
    /// Value attached to the transaction.
    pub value: Wei,
}

/// Chain operations the studio relies on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Accounts the node can send from.
    async fn accounts(&self) -> Result<Vec<Address>, ChainError>;
    /// Contract base price per unit of size.
    async fn base_price(&self) -> Result<Wei, ChainError>;
    /// Submit a mint transaction and wait for its receipt.
    async fn submit_mint(&self, call: MintCall) -> Result<TransactionReceipt, ChainError>;
    /// Resolve the metadata URI of a minted token.
    async fn token_uri(&self, token_id: TokenId) -> Result<String, ChainError>;
}
