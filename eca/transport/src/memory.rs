use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use eca_spec::{
    payment_floor, Address, Quantity, TokenId, TokenParams, TransactionReceipt, TxHash, Wei, H256,
};
use parking_lot::Mutex;
use sha3::{Digest, Keccak256};
use tracing::info;

use crate::{ChainClient, ChainError, MintCall};

/// JSON-RPC code nodes use for execution reverts.
const EXECUTION_REVERTED: i64 = 3;
/// Gas reported for every in-memory mint.
const MINT_GAS: u64 = 150_000;
/// Default base price: 0.01 ether.
const DEFAULT_BASE_PRICE: Wei = Wei::new(10_000_000_000_000_000);

#[derive(Debug, Clone)]
struct MintedToken {
    params: TokenParams,
    owner: Address,
}

#[derive(Debug, Default)]
struct ChainState {
    tokens: BTreeMap<TokenId, MintedToken>,
    block: u64,
}

/// In-process chain that mints instantly and serves `data:` token URIs.
#[derive(Debug)]
pub struct InMemoryChain {
    contract: Address,
    accounts: Vec<Address>,
    base_price: Wei,
    state: Mutex<ChainState>,
}

fn reverted(reason: &str) -> ChainError {
    ChainError::Rpc {
        code: EXECUTION_REVERTED,
        message: format!("execution reverted: {reason}"),
    }
}

impl InMemoryChain {
    /// Create a chain with the given funded accounts and base price.
    pub fn new(accounts: Vec<Address>, base_price: Wei) -> Self {
        Self {
            contract: Address([0xEC; 20]),
            accounts,
            base_price,
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Three deterministic accounts and a 0.01 ether base price.
    pub fn with_defaults() -> Self {
        let accounts = (1u8..=3).map(|n| Address([n; 20])).collect();
        Self::new(accounts, DEFAULT_BASE_PRICE)
    }

    /// Number of minted tokens.
    pub fn minted(&self) -> usize {
        self.state.lock().tokens.len()
    }

    /// Owner of a minted token.
    pub fn owner_of(&self, token_id: TokenId) -> Option<Address> {
        self.state.lock().tokens.get(&token_id).map(|t| t.owner)
    }

    fn tx_hash(from: &Address, token_id: TokenId, block: u64) -> TxHash {
        let mut hasher = Keccak256::new();
        hasher.update(b"eca-memory:tx");
        hasher.update(from.as_bytes());
        hasher.update(token_id.get().to_be_bytes());
        hasher.update(block.to_be_bytes());
        H256(hasher.finalize().into())
    }

    fn block_hash(block: u64) -> H256 {
        let mut hasher = Keccak256::new();
        hasher.update(b"eca-memory:block");
        hasher.update(block.to_be_bytes());
        H256(hasher.finalize().into())
    }

    fn describe(token_id: TokenId, token: &MintedToken) -> String {
        format!(
            "token {token_id}\nrule {}\nsize class {}\nstate {}\nowner {}\n",
            token.params.rule,
            token.params.size_class,
            token.params.state_bits(),
            token.owner
        )
    }
}

#[async_trait]
impl ChainClient for InMemoryChain {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self.accounts.clone())
    }

    async fn base_price(&self) -> Result<Wei, ChainError> {
        Ok(self.base_price)
    }

    async fn submit_mint(&self, call: MintCall) -> Result<TransactionReceipt, ChainError> {
        if !self.accounts.contains(&call.from) {
            return Err(ChainError::Rpc {
                code: -32000,
                message: format!("unknown account {}", call.from),
            });
        }
        let floor = payment_floor(self.base_price, call.params.size_class)
            .map_err(|err| reverted(&err.to_string()))?;
        if call.value < floor {
            return Err(reverted("insufficient payment"));
        }
        let token_id = call.params.encode();
        let mut state = self.state.lock();
        if state.tokens.contains_key(&token_id) {
            return Err(reverted("token already minted"));
        }
        state.block += 1;
        let block = state.block;
        state.tokens.insert(
            token_id,
            MintedToken {
                params: call.params,
                owner: call.from,
            },
        );
        info!(%token_id, block, "minted in memory");
        Ok(TransactionReceipt {
            transaction_hash: Self::tx_hash(&call.from, token_id, block),
            block_number: Quantity(block),
            block_hash: Self::block_hash(block),
            from: call.from,
            to: Some(self.contract),
            gas_used: Quantity(MINT_GAS),
            status: Some(Quantity(1)),
            logs: Vec::new(),
        })
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String, ChainError> {
        let state = self.state.lock();
        let token = state
            .tokens
            .get(&token_id)
            .ok_or_else(|| reverted("URI query for nonexistent token"))?;
        let body = Self::describe(token_id, token);
        Ok(format!("data:text/plain;base64,{}", STANDARD.encode(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::decode_data_uri;
    use eca_spec::{InitialState, Rule, SizeClass};

    fn params(rule: u8, state: u64, size: i64) -> TokenParams {
        TokenParams::new(
            Rule::from(rule),
            InitialState::from_bits(state),
            SizeClass::new(size).unwrap(),
        )
    }

    #[tokio::test]
    async fn mint_then_resolve_uri() {
        let chain = InMemoryChain::with_defaults();
        let from = chain.accounts().await.unwrap()[0];
        let receipt = chain
            .submit_mint(MintCall {
                params: params(30, 4, 2),
                from,
                value: Wei::new(40_000_000_000_000_000),
            })
            .await
            .unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number, Quantity(1));

        let id = TokenId::new(269_826);
        assert_eq!(chain.owner_of(id), Some(from));
        let uri = chain.token_uri(id).await.unwrap();
        let body = String::from_utf8(decode_data_uri(&uri).unwrap()).unwrap();
        assert!(body.contains("rule 30"));
        assert!(body.contains("state 100"));
    }

    #[tokio::test]
    async fn underpayment_and_duplicates_revert() {
        let chain = InMemoryChain::with_defaults();
        let from = Address([1; 20]);
        let call = MintCall {
            params: params(90, 1, 3),
            from,
            value: Wei::new(89_999_999_999_999_999),
        };
        let err = chain.submit_mint(call.clone()).await.unwrap_err();
        assert!(matches!(err, ChainError::Rpc { code: 3, .. }));

        let paid = MintCall {
            value: Wei::new(90_000_000_000_000_000),
            ..call
        };
        chain.submit_mint(paid.clone()).await.unwrap();
        let err = chain.submit_mint(paid).await.unwrap_err();
        assert!(err.to_string().contains("already minted"));
        assert_eq!(chain.minted(), 1);
    }

    #[tokio::test]
    async fn unknown_accounts_and_tokens_are_rejected() {
        let chain = InMemoryChain::with_defaults();
        let err = chain
            .submit_mint(MintCall {
                params: params(1, 1, 1),
                from: Address([9; 20]),
                value: Wei::new(u128::MAX),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rpc { code: -32000, .. }));
        assert!(chain.token_uri(TokenId::new(1)).await.is_err());
    }
}
