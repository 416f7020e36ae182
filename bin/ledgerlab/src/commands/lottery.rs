use std::time::Duration;

use alloy_core::primitives::utils::format_ether;
use alloy_core::primitives::{Address, U256};
use anyhow::{Result, bail};
use ledgerlab_deploy::contracts::LOTTERY;
use ledgerlab_deploy::{ContractClient, Lottery, SubscriptionOutcome};

use super::session::{Paths, Session};
use crate::cli::{LotteryAction, SignerArgs};

pub async fn run(
    paths: &Paths,
    network: &str,
    signer: &SignerArgs,
    action: LotteryAction,
    address: Option<Address>,
    draw_timeout: Option<Duration>,
) -> Result<()> {
    let session = Session::open(paths, network, signer).await?;
    let confirmations = session.registry.network(network)?.block_confirmations;
    let address = session.resolve(paths, LOTTERY, address)?;
    let lottery = Lottery::attach(session.ledger, address);

    match action {
        LotteryAction::Enter => {
            let fee = lottery.entrance_fee().await?;
            let picked = match draw_timeout {
                Some(_) => Some(lottery.watch_winner().await?),
                None => None,
            };
            tracing::info!(fee = %format_ether(fee), "Entering lottery...");
            let receipt = lottery.enter(fee).await?.wait(confirmations).await?;
            tracing::info!(tx_hash = %receipt.transaction_hash, "Entered lottery");

            if let (Some(picked), Some(timeout)) = (picked, draw_timeout) {
                tracing::info!(?timeout, "Waiting for the draw...");
                match picked.next_timeout(timeout).await? {
                    SubscriptionOutcome::Fired(event) => tracing::info!(
                        winner = %event.winner,
                        state = %lottery.state().await?,
                        players = %lottery.number_of_players().await?,
                        last_draw = %lottery.timestamp().await?,
                        "WinnerPicked event fired!"
                    ),
                    SubscriptionOutcome::TimedOut => {
                        bail!("No winner picked within {}s", timeout.as_secs())
                    }
                }
            }
        }
        LotteryAction::Status => {
            let players = lottery.number_of_players().await?;
            tracing::info!(
                address = %address,
                state = %lottery.state().await?,
                entrance_fee = %format_ether(lottery.entrance_fee().await?),
                interval = %lottery.interval().await?,
                players = %players,
                last_draw = %lottery.timestamp().await?,
                "Lottery status"
            );
            if players > U256::ZERO {
                tracing::info!(first_player = %lottery.player(U256::ZERO).await?, "Current round");
            }
            tracing::info!(winner = %lottery.winner().await?, "Most recent winner");
        }
    }
    Ok(())
}
