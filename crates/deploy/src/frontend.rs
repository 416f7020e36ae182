//! Wallet-gated console over a `FundMe` instance.
//!
//! The console mirrors a four-button page: connect, fund, balance and withdraw.
//! Without a wallet every action reports an install instruction instead of
//! touching the chain.

use alloy_core::primitives::utils::{format_ether, parse_ether};
use alloy_core::primitives::{Address, B256, U256};
use anyhow::Result;

use crate::contracts::{ContractClient, FundMe};
use crate::ledger::{Ledger, LedgerError};
use crate::pending::{PendingOperation, confirmations_of};

pub const INSTALL_WALLET: &str = "Please install MetaMask";
pub const NOT_CONNECTED: &str = "Cannot fund because not connected to a wallet";

/// Console buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ConsoleAction {
    Connect,
    Fund,
    Balance,
    Withdraw,
}

/// What an action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Connected(Address),
    Funded { tx_hash: B256, confirmations: u64 },
    Balance(U256),
    Withdrawn { tx_hash: B256, confirmations: u64 },
    /// No wallet is available; carries the message shown to the user.
    WalletMissing(&'static str),
    /// The submission failed; carries the logged error.
    Failed(String),
}

/// Console actions against one `FundMe` address.
#[derive(Debug, Clone)]
pub struct FundMeConsole<L> {
    wallet: Option<L>,
    contract: Address,
}

impl<L: Ledger> FundMeConsole<L> {
    /// `wallet` is the signing ledger, if the user has one.
    pub fn new(wallet: Option<L>, contract: Address) -> Self {
        Self { wallet, contract }
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet.is_some()
    }

    pub async fn run(&self, action: ConsoleAction, eth_amount: Option<&str>) -> Result<ActionOutcome> {
        match action {
            ConsoleAction::Connect => self.connect().await,
            ConsoleAction::Fund => self.fund(eth_amount.unwrap_or("0")).await,
            ConsoleAction::Balance => self.balance().await,
            ConsoleAction::Withdraw => self.withdraw().await,
        }
    }

    /// Request the wallet's account.
    pub async fn connect(&self) -> Result<ActionOutcome> {
        let Some(wallet) = &self.wallet else {
            tracing::info!("{}", INSTALL_WALLET);
            return Ok(ActionOutcome::WalletMissing(INSTALL_WALLET));
        };

        match wallet.sender() {
            Some(account) => {
                tracing::info!(account = %account, "Connected!");
                Ok(ActionOutcome::Connected(account))
            }
            None => Err(LedgerError::NoSigner.into()),
        }
    }

    /// Donate `eth_amount` ether (decimal string) and wait for it to be mined.
    pub async fn fund(&self, eth_amount: &str) -> Result<ActionOutcome> {
        let Some(wallet) = &self.wallet else {
            tracing::info!("{}", NOT_CONNECTED);
            return Ok(ActionOutcome::WalletMissing(NOT_CONNECTED));
        };

        let value = match parse_ether(eth_amount.trim()) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(amount = eth_amount, error = %e, "Invalid amount");
                return Ok(ActionOutcome::Failed(format!("invalid amount {}: {}", eth_amount, e)));
            }
        };
        tracing::info!("Funding with {}...", eth_amount);

        let fund_me = FundMe::attach(wallet.clone(), self.contract);
        match fund_me.fund(value).await {
            Ok(pending) => {
                let (tx_hash, confirmations) = self.mine(pending).await?;
                Ok(ActionOutcome::Funded {
                    tx_hash,
                    confirmations,
                })
            }
            Err(e) => {
                tracing::error!("{:#}", e);
                Ok(ActionOutcome::Failed(format!("{:#}", e)))
            }
        }
    }

    /// Ether held by the contract.
    pub async fn balance(&self) -> Result<ActionOutcome> {
        let Some(wallet) = &self.wallet else {
            tracing::info!("{}", NOT_CONNECTED);
            return Ok(ActionOutcome::WalletMissing(NOT_CONNECTED));
        };

        let balance = FundMe::attach(wallet.clone(), self.contract)
            .balance()
            .await?;
        tracing::info!("Balance is {}", format_ether(balance));
        Ok(ActionOutcome::Balance(balance))
    }

    /// Owner only: pull the whole balance.
    pub async fn withdraw(&self) -> Result<ActionOutcome> {
        let Some(wallet) = &self.wallet else {
            tracing::info!("{}", NOT_CONNECTED);
            return Ok(ActionOutcome::WalletMissing(NOT_CONNECTED));
        };

        tracing::info!("Withdrawing...");
        let fund_me = FundMe::attach(wallet.clone(), self.contract);
        match fund_me.withdraw().await {
            Ok(pending) => {
                let (tx_hash, confirmations) = self.mine(pending).await?;
                tracing::info!("Withdrawal completed.");
                Ok(ActionOutcome::Withdrawn {
                    tx_hash,
                    confirmations,
                })
            }
            Err(e) => {
                tracing::error!("{:#}", e);
                Ok(ActionOutcome::Failed(format!("{:#}", e)))
            }
        }
    }

    async fn mine(&self, pending: PendingOperation<L>) -> Result<(B256, u64)> {
        let hash = pending.hash();
        tracing::info!("Mining {}...", hash);

        let receipt = pending.wait(1).await?;
        let confirmations = match &self.wallet {
            Some(wallet) => confirmations_of(wallet, &receipt).await?,
            None => 1,
        };
        tracing::info!("Completed with {} confirmations", confirmations);
        Ok((hash, confirmations))
    }
}
