//! The seam between typed clients and a chain.
//!
//! A [`Ledger`] answers reads, accepts state-changing requests and reports
//! receipts and logs. [`RpcLedger`] talks to a JSON-RPC node; [`DevLedger`] is an
//! in-process ephemeral chain with automine and native programs.

mod devnet;
mod rpc;

use std::future::Future;
use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use alloy_core::sol_types::SolEvent;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use devnet::{DevLedger, ExecContext, Program, Revert};
pub use rpc::RpcLedger;

use crate::Wallet;

/// Failures of submitted operations that callers may want to match on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Execution reverted: {0}")]
    Reverted(String),
    #[error("Timed out waiting for transaction {0}")]
    Timeout(B256),
    #[error("No account available to sign transactions")]
    NoSigner,
}

impl LedgerError {
    /// The revert reason, if `err` is a revert.
    pub fn revert_reason(err: &anyhow::Error) -> Option<&str> {
        match err.downcast_ref::<LedgerError>() {
            Some(LedgerError::Reverted(reason)) => Some(reason),
            _ => None,
        }
    }
}

/// A call or transaction to be executed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRequest {
    /// Filled with the ledger's sender when unset.
    pub from: Option<Address>,
    /// `None` creates a contract from `data`.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas: Option<u64>,
}

impl TxRequest {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn create(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// An emitted log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
}

impl Log {
    /// Decode the log as event `E`, or `None` if it is a different event.
    pub fn decode<E: SolEvent>(&self) -> Option<E> {
        if self.topics.first() != Some(&E::SIGNATURE_HASH) {
            return None;
        }
        E::decode_raw_log(self.topics.iter().copied(), &self.data, true).ok()
    }
}

/// Outcome of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    /// `false` when execution reverted.
    pub status: bool,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub logs: Vec<Log>,
}

impl Receipt {
    /// The first log that decodes as `E`.
    pub fn first_event<E: SolEvent>(&self) -> Option<E> {
        self.logs.iter().find_map(Log::decode::<E>)
    }

    /// Total fee paid by the sender.
    pub fn fee(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Selects logs by emitter, first topic and inclusive block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topic0: Option<B256>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    pub fn matches(&self, log: &Log) -> bool {
        log.address == self.address
            && self.topic0.is_none_or(|t| log.topics.first() == Some(&t))
            && (self.from_block..=self.to_block).contains(&log.block_number)
    }
}

/// Access to a chain on behalf of an optional signer.
pub trait Ledger: Clone + Send + Sync + 'static {
    /// The account state-changing requests are sent from.
    fn sender(&self) -> Option<Address>;

    /// The same chain, signing as `wallet`.
    fn connect(&self, wallet: Wallet) -> Self;

    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    fn block_number(&self) -> impl Future<Output = Result<u64>> + Send;

    fn balance(&self, address: Address) -> impl Future<Output = Result<U256>> + Send;

    fn code(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    /// Execute without changing state and return the output.
    fn call(&self, tx: TxRequest) -> impl Future<Output = Result<Bytes>> + Send;

    /// Submit a state-changing request and return its hash.
    fn send(&self, tx: TxRequest) -> impl Future<Output = Result<B256>> + Send;

    fn receipt(&self, hash: B256) -> impl Future<Output = Result<Option<Receipt>>> + Send;

    fn logs(&self, filter: LogFilter) -> impl Future<Output = Result<Vec<Log>>> + Send;

    /// How often waiters re-check receipts and logs.
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(500)
    }
}

/// Clock and block controls of development chains.
pub trait DevControls {
    fn increase_time(&self, seconds: u64) -> impl Future<Output = Result<()>> + Send;

    fn mine(&self) -> impl Future<Output = Result<()>> + Send;
}
