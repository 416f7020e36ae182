//! One-shot subscriptions to named contract events.

use std::marker::PhantomData;
use std::time::Duration;

use alloy_core::primitives::Address;
use alloy_core::sol_types::SolEvent;
use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::ledger::{Ledger, LogFilter};

/// How a bounded wait on a subscription ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionOutcome<E> {
    Fired(E),
    TimedOut,
}

impl<E> SubscriptionOutcome<E> {
    pub fn fired(self) -> Option<E> {
        match self {
            Self::Fired(event) => Some(event),
            Self::TimedOut => None,
        }
    }
}

/// A live watch for the next `E` emitted by one contract.
///
/// Fires at most once. The background watcher stops when the event is delivered,
/// when a bounded wait times out, on [`unsubscribe`](Self::unsubscribe) and when
/// the handle is dropped.
#[derive(Debug)]
pub struct EventSubscription<E> {
    receiver: Option<oneshot::Receiver<Result<E>>>,
    watcher: JoinHandle<()>,
    _event: PhantomData<fn() -> E>,
}

impl<E: SolEvent + Send + 'static> EventSubscription<E> {
    /// Start watching `address` for `E`, from the block after the current head.
    pub async fn subscribe<L: Ledger>(ledger: L, address: Address) -> Result<Self> {
        let head = ledger
            .block_number()
            .await
            .context("Failed to read head before subscribing")?;
        let (sender, receiver) = oneshot::channel();

        tracing::debug!(
            event = E::SIGNATURE,
            address = %address,
            from_block = head + 1,
            "Subscribed"
        );
        let watcher = tokio::spawn(watch::<E, L>(ledger, address, head + 1, sender));

        Ok(Self {
            receiver: Some(receiver),
            watcher,
            _event: PhantomData,
        })
    }

    /// Wait for the event without a deadline.
    pub async fn next(mut self) -> Result<E> {
        let receiver = self.receiver.take().context("Subscription already consumed")?;
        receiver.await.context("Event watcher stopped")?
    }

    /// Wait for the event for at most `timeout`.
    pub async fn next_timeout(mut self, timeout: Duration) -> Result<SubscriptionOutcome<E>> {
        let receiver = self.receiver.take().context("Subscription already consumed")?;
        match tokio::time::timeout(timeout, receiver).await {
            Ok(delivered) => Ok(SubscriptionOutcome::Fired(
                delivered.context("Event watcher stopped")??,
            )),
            Err(_) => {
                tracing::debug!(event = E::SIGNATURE, ?timeout, "Subscription timed out");
                Ok(SubscriptionOutcome::TimedOut)
            }
        }
    }

    /// Stop watching without waiting for the event.
    pub fn unsubscribe(self) {
        tracing::debug!(event = E::SIGNATURE, "Unsubscribed");
    }
}

impl<E> Drop for EventSubscription<E> {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

async fn watch<E: SolEvent, L: Ledger>(
    ledger: L,
    address: Address,
    mut from_block: u64,
    sender: oneshot::Sender<Result<E>>,
) {
    let found = loop {
        if sender.is_closed() {
            return;
        }

        let head = match ledger.block_number().await {
            Ok(head) => head,
            Err(e) => break Err(e),
        };

        if head >= from_block {
            let filter = LogFilter {
                address,
                topic0: Some(E::SIGNATURE_HASH),
                from_block,
                to_block: head,
            };
            match ledger.logs(filter).await {
                Ok(logs) => {
                    if let Some(event) = logs.iter().find_map(|log| log.decode::<E>()) {
                        break Ok(event);
                    }
                }
                Err(e) => break Err(e),
            }
            from_block = head + 1;
        }

        tokio::time::sleep(ledger.poll_interval()).await;
    };

    if found.is_ok() {
        tracing::debug!(event = E::SIGNATURE, address = %address, "Event fired");
    }
    // the handle may already be gone
    let _ = sender.send(found);
}
