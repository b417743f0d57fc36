use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eca_core::{ArtworkStudio, GenerateRequest, StudioError};
use eca_spec::{Address, TokenId, TokenParams, TransactionReceipt, Wei};
use eca_transport::{
    ChainClient, ChainError, ContentFetcher, FetchError, HttpFetcher, InMemoryChain, MintCall,
};

const CENT: u128 = 10_000_000_000_000_000;

/// Chain wrapper counting base price reads.
struct CountingChain {
    inner: InMemoryChain,
    price_reads: AtomicUsize,
}

#[async_trait]
impl ChainClient for CountingChain {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.inner.accounts().await
    }

    async fn base_price(&self) -> Result<Wei, ChainError> {
        self.price_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.base_price().await
    }

    async fn submit_mint(&self, call: MintCall) -> Result<TransactionReceipt, ChainError> {
        self.inner.submit_mint(call).await
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String, ChainError> {
        self.inner.token_uri(token_id).await
    }
}

struct BinaryFetcher;

#[async_trait]
impl ContentFetcher for BinaryFetcher {
    async fn fetch(&self, _uri: &str) -> Result<Vec<u8>, FetchError> {
        Ok(vec![0xff, 0xfe, 0x00])
    }
}

fn params(rule: i64, state: i128, size: i64) -> TokenParams {
    TokenParams::validate(rule, state, size).expect("valid params")
}

fn memory_studio() -> (Arc<InMemoryChain>, ArtworkStudio) {
    let chain = Arc::new(InMemoryChain::with_defaults());
    let studio = ArtworkStudio::new(chain.clone(), Arc::new(HttpFetcher::new()));
    (chain, studio)
}

#[tokio::test]
async fn generate_defaults_to_first_account_and_floor() {
    let (chain, studio) = memory_studio();
    let outcome = studio
        .generate(GenerateRequest::new(params(30, 4, 2)))
        .await
        .expect("minted");
    assert_eq!(outcome.from, Address([1; 20]));
    assert_eq!(outcome.payment, Wei::new(4 * CENT));
    assert_eq!(outcome.preview.token_id, TokenId::new(269_826));
    assert!(outcome.receipt.succeeded());
    assert_eq!(chain.owner_of(TokenId::new(269_826)), Some(Address([1; 20])));
}

#[tokio::test]
async fn insufficient_payment_is_rejected_before_submission() {
    let (chain, studio) = memory_studio();
    let mut request = GenerateRequest::new(params(110, 77, 3));
    request.payment = Some(Wei::new(9 * CENT - 1));
    match studio.generate(request).await {
        Err(StudioError::InsufficientPayment { required, offered }) => {
            assert_eq!(required, Wei::new(9 * CENT));
            assert_eq!(offered, Wei::new(9 * CENT - 1));
        }
        other => panic!("expected insufficient payment, got {other:?}"),
    }
    assert_eq!(chain.minted(), 0);
}

#[tokio::test]
async fn overpayment_and_explicit_sender_are_honoured() {
    let (chain, studio) = memory_studio();
    let sender = Address([3; 20]);
    let request = GenerateRequest {
        params: params(90, 1, 1),
        from: Some(sender),
        payment: Some(Wei::from_ether_str("1.5").unwrap()),
    };
    let outcome = studio.generate(request).await.unwrap();
    assert_eq!(outcome.payment, Wei::new(150 * CENT));
    assert_eq!(chain.owner_of(outcome.preview.token_id), Some(sender));
}

#[tokio::test]
async fn unknown_sender_is_rejected() {
    let (_, studio) = memory_studio();
    let mut request = GenerateRequest::new(params(1, 1, 1));
    request.from = Some(Address([0x77; 20]));
    let err = studio.generate(request).await.unwrap_err();
    assert!(matches!(err, StudioError::UnknownAccount(addr) if addr == Address([0x77; 20])));
}

#[tokio::test]
async fn node_without_accounts_cannot_mint() {
    let chain = Arc::new(InMemoryChain::new(Vec::new(), Wei::new(CENT)));
    let studio = ArtworkStudio::new(chain, Arc::new(HttpFetcher::new()));
    let err = studio
        .generate(GenerateRequest::new(params(1, 1, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::NoAccounts));
}

#[tokio::test]
async fn duplicate_mint_surfaces_chain_error() {
    let (_, studio) = memory_studio();
    studio
        .generate(GenerateRequest::new(params(30, 4, 2)))
        .await
        .unwrap();
    // Same token id: state 12 masks down to 4 at size class 2.
    let err = studio
        .generate(GenerateRequest::new(params(30, 12, 2)))
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::Chain(ChainError::Rpc { code: 3, .. })));
}

#[tokio::test]
async fn draw_round_trip() {
    let (_, studio) = memory_studio();
    let minted = studio
        .generate(GenerateRequest::new(params(150, 0b1011, 2)))
        .await
        .unwrap();
    let art = studio.draw(params(150, 0b1011, 2)).await.unwrap();
    assert_eq!(art.token_id, minted.preview.token_id);
    assert!(art.uri.starts_with("data:text/plain;base64,"));
    assert!(art.content.contains("rule 150"));
    assert!(art.content.contains("state 011"));

    let by_id = studio.draw_token(minted.preview.token_id).await.unwrap();
    assert_eq!(by_id, art);
}

#[tokio::test]
async fn drawing_unminted_token_fails() {
    let (_, studio) = memory_studio();
    let err = studio.draw_token(TokenId::new(0x1E02)).await.unwrap_err();
    assert!(matches!(err, StudioError::Chain(_)));
}

#[tokio::test]
async fn non_utf8_content_is_reported() {
    let chain = Arc::new(InMemoryChain::with_defaults());
    let studio = ArtworkStudio::new(chain, Arc::new(BinaryFetcher));
    studio
        .generate(GenerateRequest::new(params(30, 4, 2)))
        .await
        .unwrap();
    let err = studio.draw_token(TokenId::new(269_826)).await.unwrap_err();
    assert!(matches!(err, StudioError::NotUtf8 { ref uri } if uri.starts_with("data:")));
}

#[tokio::test]
async fn base_price_is_read_once() {
    let chain = Arc::new(CountingChain {
        inner: InMemoryChain::with_defaults(),
        price_reads: AtomicUsize::new(0),
    });
    let studio = ArtworkStudio::new(chain.clone(), Arc::new(HttpFetcher::new()));
    assert_eq!(studio.min_price().await.unwrap(), Wei::new(CENT));
    studio.price_table().await.unwrap();
    studio
        .generate(GenerateRequest::new(params(30, 4, 2)))
        .await
        .unwrap();
    let clone = studio.clone();
    clone.quote(params(1, 1, 5).size_class).await.unwrap();
    assert_eq!(chain.price_reads.load(Ordering::SeqCst), 1);
}
