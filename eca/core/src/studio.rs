use std::sync::Arc;

use eca_spec::{
    payment_floor, Address, SizeClass, TokenId, TokenParams, TransactionReceipt, Wei,
};
use eca_transport::{ChainClient, ContentFetcher, MintCall};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, info_span, Instrument};

use crate::StudioError;

/// What a mint would produce, computed without touching the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintPreview {
    /// Validated artwork parameters.
    pub params: TokenParams,
    /// Token id the contract will assign.
    pub token_id: TokenId,
    /// Grid bit-width for the size class.
    pub draw_size: u32,
    /// Masked initial state as a `draw_size`-wide binary string.
    pub state_bits: String,
}

impl MintPreview {
    /// Human-readable summary line.
    pub fn message(&self) -> String {
        format!(
            "Generating rule {} state {}",
            self.params.rule, self.state_bits
        )
    }
}

impl From<TokenParams> for MintPreview {
    fn from(params: TokenParams) -> Self {
        Self {
            params,
            token_id: params.encode(),
            draw_size: params.sizing().draw_size,
            state_bits: params.state_bits(),
        }
    }
}

/// Mint request; unset fields fall back to the first node account and the
/// size-class floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Artwork parameters.
    pub params: TokenParams,
    /// Paying account.
    pub from: Option<Address>,
    /// Value to attach.
    pub payment: Option<Wei>,
}

impl GenerateRequest {
    /// Request with default account and payment.
    pub fn new(params: TokenParams) -> Self {
        Self {
            params,
            from: None,
            payment: None,
        }
    }
}

/// Result of a successful mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintOutcome {
    /// Minted artwork.
    pub preview: MintPreview,
    /// Account that paid.
    pub from: Address,
    /// Value attached.
    pub payment: Wei,
    /// Mined receipt.
    pub receipt: TransactionReceipt,
}

/// Resolved artwork content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artwork {
    /// Token drawn.
    pub token_id: TokenId,
    /// Metadata URI returned by the contract.
    pub uri: String,
    /// Content behind the URI.
    pub content: String,
}

/// Orchestrator wiring a chain client and a content fetcher.
#[derive(Clone)]
pub struct ArtworkStudio {
    chain: Arc<dyn ChainClient>,
    fetcher: Arc<dyn ContentFetcher>,
    price_cache: Arc<RwLock<Option<Wei>>>,
}

impl ArtworkStudio {
    /// Create a studio bound to the provided collaborators.
    pub fn new(chain: Arc<dyn ChainClient>, fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self {
            chain,
            fetcher,
            price_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Accounts the node can send from.
    pub async fn accounts(&self) -> Result<Vec<Address>, StudioError> {
        Ok(self.chain.accounts().await?)
    }

    /// Contract base price, read once per studio.
    pub async fn min_price(&self) -> Result<Wei, StudioError> {
        if let Some(price) = *self.price_cache.read() {
            return Ok(price);
        }
        let price = self.chain.base_price().await?;
        debug!(%price, "cached base price");
        *self.price_cache.write() = Some(price);
        Ok(price)
    }

    /// Payment floor for a size class.
    pub async fn quote(&self, size_class: SizeClass) -> Result<Wei, StudioError> {
        Ok(payment_floor(self.min_price().await?, size_class)?)
    }

    /// Floors for every size class.
    pub async fn price_table(&self) -> Result<Vec<(SizeClass, Wei)>, StudioError> {
        let base = self.min_price().await?;
        let table = SizeClass::all()
            .map(|class| payment_floor(base, class).map(|floor| (class, floor)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(table)
    }

    /// Validate raw parameters and describe the artwork they produce.
    pub fn preview(&self, rule: i64, state: i128, size_class: i64) -> Result<MintPreview, StudioError> {
        let params = TokenParams::validate(rule, state, size_class)?;
        Ok(MintPreview::from(params))
    }

    /// Mint an artwork and wait for its receipt.
    pub async fn generate(&self, request: GenerateRequest) -> Result<MintOutcome, StudioError> {
        let preview = MintPreview::from(request.params);
        let required = self.quote(request.params.size_class).await?;
        let payment = request.payment.unwrap_or(required);
        if payment < required {
            return Err(StudioError::InsufficientPayment {
                required,
                offered: payment,
            });
        }
        let accounts = self.chain.accounts().await?;
        let from = match request.from {
            Some(from) if accounts.contains(&from) => from,
            Some(from) => return Err(StudioError::UnknownAccount(from)),
            None => *accounts.first().ok_or(StudioError::NoAccounts)?,
        };

        let span = info_span!("generate", token_id = %preview.token_id, %from);
        info!(parent: &span, "{}", preview.message());
        let receipt = self
            .chain
            .submit_mint(MintCall {
                params: request.params,
                from,
                value: payment,
            })
            .instrument(span.clone())
            .await?;
        info!(
            parent: &span,
            tx_hash = %receipt.transaction_hash,
            block = receipt.block_number.0,
            "minted"
        );
        Ok(MintOutcome {
            preview,
            from,
            payment,
            receipt,
        })
    }

    /// Resolve and fetch the artwork for parameters.
    pub async fn draw(&self, params: TokenParams) -> Result<Artwork, StudioError> {
        self.draw_token(params.encode()).await
    }

    /// Resolve and fetch the artwork for a token id.
    pub async fn draw_token(&self, token_id: TokenId) -> Result<Artwork, StudioError> {
        info!("Drawing {token_id}");
        let uri = self.chain.token_uri(token_id).await?;
        let bytes = self.fetcher.fetch(&uri).await?;
        let content =
            String::from_utf8(bytes).map_err(|_| StudioError::NotUtf8 { uri: uri.clone() })?;
        Ok(Artwork {
            token_id,
            uri,
            content,
        })
    }
}
