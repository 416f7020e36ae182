//! Ledger backed by an Ethereum JSON-RPC node.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U128, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use url::Url;

use super::{DevControls, Ledger, LedgerError, Log, LogFilter, Receipt, TxRequest};
use crate::rpc::{self, RpcError};
use crate::wallet::{LegacyTx, Wallet};

/// Headroom added on top of the node's gas estimate, in percent.
const GAS_ESTIMATE_MARGIN: u64 = 20;

/// JSON-RPC ledger. Signs locally when a wallet is attached, otherwise relies on
/// an account unlocked on the node.
#[derive(Debug, Clone)]
pub struct RpcLedger {
    client: reqwest::Client,
    url: Url,
    wallet: Option<Wallet>,
    from: Option<Address>,
    poll_interval: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RpcTx {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<Address>,
    value: U256,
    data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas: Option<U64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    block_number: Option<U64>,
    transaction_hash: Option<B256>,
    log_index: Option<U64>,
}

impl From<RawLog> for Log {
    fn from(raw: RawLog) -> Self {
        Self {
            address: raw.address,
            topics: raw.topics,
            data: raw.data,
            block_number: raw.block_number.map(|n| n.to::<u64>()).unwrap_or_default(),
            transaction_hash: raw.transaction_hash.unwrap_or_default(),
            log_index: raw.log_index.map(|n| n.to::<u64>()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: B256,
    block_number: Option<U64>,
    status: Option<U64>,
    contract_address: Option<Address>,
    gas_used: U64,
    effective_gas_price: Option<U128>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

impl RpcLedger {
    /// A read-only ledger for `url`.
    pub fn new(url: Url) -> Result<Self> {
        Ok(Self {
            client: rpc::create_client()?,
            url,
            wallet: None,
            from: None,
            poll_interval: Duration::from_secs(1),
        })
    }

    /// A ledger that signs with `wallet`.
    pub fn with_wallet(url: Url, wallet: Wallet) -> Result<Self> {
        Ok(Self::new(url)?.connect(wallet))
    }

    /// A ledger that sends from the node's first unlocked account.
    pub async fn unlocked(url: Url) -> Result<Self> {
        let mut ledger = Self::new(url)?;
        let accounts: Vec<Address> = ledger.request("eth_accounts", vec![]).await?;
        let first = accounts
            .first()
            .copied()
            .context("Node exposes no unlocked accounts")?;
        tracing::debug!(account = %first, url = %ledger.url, "Using unlocked node account");
        ledger.from = Some(first);
        Ok(ledger)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Issue a request and surface node-side reverts as [`LedgerError::Reverted`].
    async fn request<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        rpc::json_rpc_call(&self.client, self.url.as_str(), method, params)
            .await
            .map_err(|e| match e.downcast_ref::<RpcError>() {
                Some(err) if err.is_revert() => LedgerError::Reverted(err.message.clone()).into(),
                _ => e,
            })
    }

    fn rpc_tx(&self, tx: &TxRequest) -> RpcTx {
        RpcTx {
            from: tx.from.or_else(|| self.sender()),
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            gas: tx.gas.map(U64::from),
        }
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        if let Some(gas) = tx.gas {
            return Ok(gas);
        }
        let estimate: U64 = self
            .request("eth_estimateGas", vec![json!(self.rpc_tx(tx))])
            .await
            .context("Failed to estimate gas")?;
        let estimate = estimate.to::<u64>();
        Ok(estimate + estimate * GAS_ESTIMATE_MARGIN / 100)
    }

    async fn send_signed(&self, wallet: &Wallet, tx: TxRequest) -> Result<B256> {
        let sender = wallet.address();
        let nonce: U64 = self
            .request("eth_getTransactionCount", vec![json!(sender), json!("pending")])
            .await
            .context("Failed to fetch nonce")?;
        let gas_price: U128 = self
            .request("eth_gasPrice", vec![])
            .await
            .context("Failed to fetch gas price")?;
        let gas_limit = self.estimate_gas(&tx).await?;
        let chain_id = self.chain_id().await?;

        let legacy = LegacyTx {
            nonce: nonce.to::<u64>(),
            gas_price: gas_price.to::<u128>(),
            gas_limit,
            to: tx.to,
            value: tx.value,
            data: tx.data,
            chain_id,
        };
        let raw = wallet.sign_legacy(&legacy)?;

        let hash: B256 = self
            .request("eth_sendRawTransaction", vec![json!(raw)])
            .await
            .context("Failed to send raw transaction")?;

        tracing::debug!(
            tx_hash = %hash,
            from = %sender,
            nonce = legacy.nonce,
            gas_limit,
            "Signed transaction sent"
        );
        Ok(hash)
    }
}

impl Ledger for RpcLedger {
    fn sender(&self) -> Option<Address> {
        self.wallet.as_ref().map(Wallet::address).or(self.from)
    }

    fn connect(&self, wallet: Wallet) -> Self {
        Self {
            from: Some(wallet.address()),
            wallet: Some(wallet),
            ..self.clone()
        }
    }

    async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.request("eth_chainId", vec![]).await?;
        Ok(id.to::<u64>())
    }

    async fn block_number(&self) -> Result<u64> {
        let number: U64 = self.request("eth_blockNumber", vec![]).await?;
        Ok(number.to::<u64>())
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.request("eth_getBalance", vec![json!(address), json!("latest")])
            .await
            .with_context(|| format!("Failed to fetch balance of {}", address))
    }

    async fn code(&self, address: Address) -> Result<Bytes> {
        self.request("eth_getCode", vec![json!(address), json!("latest")])
            .await
            .with_context(|| format!("Failed to fetch code of {}", address))
    }

    async fn call(&self, tx: TxRequest) -> Result<Bytes> {
        self.request("eth_call", vec![json!(self.rpc_tx(&tx)), json!("latest")])
            .await
    }

    async fn send(&self, tx: TxRequest) -> Result<B256> {
        if let Some(wallet) = &self.wallet {
            return self.send_signed(wallet, tx).await;
        }

        let from = tx.from.or(self.from).ok_or(LedgerError::NoSigner)?;
        let request = TxRequest {
            from: Some(from),
            ..tx
        };
        let hash: B256 = self
            .request("eth_sendTransaction", vec![json!(self.rpc_tx(&request))])
            .await?;
        tracing::debug!(tx_hash = %hash, from = %from, "Transaction sent");
        Ok(hash)
    }

    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        let raw: Option<RawReceipt> = self
            .request("eth_getTransactionReceipt", vec![json!(hash)])
            .await
            .with_context(|| format!("Failed to fetch receipt for {}", hash))?;

        // pending transactions may come back without a block number
        let Some(raw) = raw else { return Ok(None) };
        let Some(block_number) = raw.block_number else {
            return Ok(None);
        };

        Ok(Some(Receipt {
            transaction_hash: raw.transaction_hash,
            block_number: block_number.to::<u64>(),
            status: raw.status.is_none_or(|s| s == U64::from(1)),
            contract_address: raw.contract_address,
            gas_used: raw.gas_used.to::<u64>(),
            effective_gas_price: raw
                .effective_gas_price
                .map(|p| p.to::<u128>())
                .unwrap_or_default(),
            logs: raw.logs.into_iter().map(Log::from).collect(),
        }))
    }

    async fn logs(&self, filter: LogFilter) -> Result<Vec<Log>> {
        let mut params = json!({
            "address": filter.address,
            "fromBlock": U64::from(filter.from_block),
            "toBlock": U64::from(filter.to_block),
        });
        if let Some(topic) = filter.topic0 {
            params["topics"] = json!([topic]);
        }

        let raw: Vec<RawLog> = self
            .request("eth_getLogs", vec![params])
            .await
            .context("Failed to fetch logs")?;
        Ok(raw.into_iter().map(Log::from).collect())
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl DevControls for RpcLedger {
    async fn increase_time(&self, seconds: u64) -> Result<()> {
        let _: Value = self
            .request("evm_increaseTime", vec![json!(seconds)])
            .await
            .context("Node does not support evm_increaseTime")?;
        Ok(())
    }

    async fn mine(&self) -> Result<()> {
        let _: Value = self
            .request("evm_mine", vec![])
            .await
            .context("Node does not support evm_mine")?;
        Ok(())
    }
}
