use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use eca_spec::{Address, TokenId, TransactionReceipt, TxHash, Wei};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn, Instrument};

use crate::abi::{decode_string, decode_uint, AbiValue, ContractAbi};
use crate::{ChainClient, ChainError, MintCall, BASE_PRICE_FN, MINT_FN, TOKEN_URI_FN};

/// Connection settings for [`JsonRpcChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcSettings {
    /// Node endpoint, e.g. `http://127.0.0.1:8545`.
    pub endpoint: String,
    /// Deployed artwork contract.
    pub contract: Address,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
    /// Give up waiting for a receipt after this long.
    pub receipt_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Chain client speaking JSON-RPC 2.0 over HTTP.
pub struct JsonRpcChain {
    client: Client,
    settings: RpcSettings,
    abi: Arc<ContractAbi>,
    next_id: AtomicU64,
}

impl JsonRpcChain {
    /// Build a client for the given node and contract ABI.
    pub fn new(settings: RpcSettings, abi: ContractAbi) -> Self {
        Self {
            client: Client::new(),
            settings,
            abi: Arc::new(abi),
            next_id: AtomicU64::new(1),
        }
    }

    /// Settings this client was built with.
    pub fn settings(&self) -> &RpcSettings {
        &self.settings
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let span = tracing::debug_span!("rpc", method, id);
        let start = Instant::now();
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response: RpcResponse = async {
            self.client
                .post(&self.settings.endpoint)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<RpcResponse>()
                .await
        }
        .instrument(span.clone())
        .await?;
        span.in_scope(|| {
            debug!(
                latency_ms = start.elapsed().as_millis() as u64,
                "rpc response"
            )
        });
        if let Some(err) = response.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        serde_json::from_value(response.result)
            .map_err(|err| ChainError::Decode(format!("{method}: {err}")))
    }

    async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        let params = json!([
            { "to": self.settings.contract, "data": hex_data(&data) },
            "latest"
        ]);
        let raw: String = self.request("eth_call", params).await?;
        let digits = raw
            .strip_prefix("0x")
            .ok_or_else(|| ChainError::Decode(format!("eth_call returned {raw:?}")))?;
        hex::decode(digits).map_err(|err| ChainError::Decode(format!("eth_call: {err}")))
    }

    /// Poll until the node reports a receipt or the timeout elapses.
    pub async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt, ChainError> {
        let start = Instant::now();
        loop {
            let receipt: Option<TransactionReceipt> = self
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            let waited = start.elapsed();
            if waited >= self.settings.receipt_timeout {
                warn!(%tx_hash, ?waited, "receipt timeout");
                return Err(ChainError::ReceiptTimeout { tx_hash, waited });
            }
            debug!(%tx_hash, "receipt pending");
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[async_trait]
impl ChainClient for JsonRpcChain {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.request("eth_accounts", json!([])).await
    }

    async fn base_price(&self) -> Result<Wei, ChainError> {
        let data = self.abi.function(BASE_PRICE_FN, 0)?.encode_call(&[])?;
        let output = self.call(data).await?;
        Ok(Wei::new(decode_uint(&output)?))
    }

    async fn submit_mint(&self, call: MintCall) -> Result<TransactionReceipt, ChainError> {
        let params = call.params;
        let data = self.abi.function(MINT_FN, 3)?.encode_call(&[
            AbiValue::Uint(u128::from(params.rule.get())),
            AbiValue::Uint(u128::from(params.masked_state())),
            AbiValue::Uint(u128::from(params.size_class.get())),
        ])?;
        let tx = json!({
            "from": call.from,
            "to": self.settings.contract,
            "value": call.value.to_quantity_hex(),
            "data": hex_data(&data),
        });
        let tx_hash: TxHash = self.request("eth_sendTransaction", json!([tx])).await?;
        info!(
            %tx_hash,
            rule = params.rule.get(),
            size_class = params.size_class.get(),
            "submitted mint"
        );
        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            return Err(ChainError::Reverted(Box::new(receipt)));
        }
        Ok(receipt)
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String, ChainError> {
        let data = self
            .abi
            .function(TOKEN_URI_FN, 1)?
            .encode_call(&[AbiValue::Uint(u128::from(token_id.get()))])?;
        let output = self.call(data).await?;
        Ok(decode_string(&output)?)
    }
}
