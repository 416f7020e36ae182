//! Waiting for submitted operations to be included.

use std::time::Duration;

use alloy_core::primitives::B256;
use anyhow::Result;

use crate::ledger::{Ledger, LedgerError, Receipt};

/// A submitted state-changing request, identified by its transaction hash.
///
/// Reads issued right after submission may not observe the change yet; wait for
/// inclusion first.
#[derive(Debug, Clone)]
#[must_use = "a pending operation does nothing unless waited on"]
pub struct PendingOperation<L> {
    ledger: L,
    hash: B256,
}

impl<L: Ledger> PendingOperation<L> {
    pub fn new(ledger: L, hash: B256) -> Self {
        Self { ledger, hash }
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Poll until the operation is included with at least `confirmations` blocks
    /// (counting its own). A reverted receipt is an error.
    pub async fn wait(self, confirmations: u64) -> Result<Receipt> {
        let confirmations = confirmations.max(1);

        loop {
            if let Some(receipt) = self.ledger.receipt(self.hash).await? {
                if !receipt.status {
                    return Err(LedgerError::Reverted(format!(
                        "transaction {} reverted",
                        self.hash
                    ))
                    .into());
                }

                let head = self.ledger.block_number().await?;
                let seen = head.saturating_sub(receipt.block_number) + 1;
                if seen >= confirmations {
                    tracing::debug!(
                        tx_hash = %self.hash,
                        block = receipt.block_number,
                        confirmations = seen,
                        "Transaction confirmed"
                    );
                    return Ok(receipt);
                }

                tracing::trace!(
                    tx_hash = %self.hash,
                    seen,
                    wanted = confirmations,
                    "Waiting for confirmations"
                );
            }

            tokio::time::sleep(self.ledger.poll_interval()).await;
        }
    }

    /// [`wait`](Self::wait), giving up with [`LedgerError::Timeout`] after `timeout`.
    pub async fn wait_timeout(self, confirmations: u64, timeout: Duration) -> Result<Receipt> {
        let hash = self.hash;
        tokio::time::timeout(timeout, self.wait(confirmations))
            .await
            .map_err(|_| LedgerError::Timeout(hash))?
    }
}

/// Blocks seen on top of (and including) the receipt's block.
pub async fn confirmations_of<L: Ledger>(ledger: &L, receipt: &Receipt) -> Result<u64> {
    let head = ledger.block_number().await?;
    Ok(head.saturating_sub(receipt.block_number) + 1)
}
