use alloy_core::primitives::Address;
use anyhow::Result;
use ledgerlab_deploy::contracts::FUND_ME;
use ledgerlab_deploy::{ActionOutcome, ConsoleAction, FundMeConsole, Ledger};

use super::session::{Paths, Session};
use crate::cli::SignerArgs;

pub async fn run(
    paths: &Paths,
    network: &str,
    signer: &SignerArgs,
    action: ConsoleAction,
    amount: &str,
    address: Option<Address>,
) -> Result<()> {
    let session = Session::open(paths, network, signer).await?;
    let contract = session.resolve(paths, FUND_ME, address)?;

    let wallet = session.ledger.sender().map(|_| session.ledger.clone());
    let console = FundMeConsole::new(wallet, contract);

    match console.run(action, Some(amount)).await? {
        ActionOutcome::Failed(reason) => anyhow::bail!("{} failed: {}", action, reason),
        outcome => {
            tracing::debug!(?outcome, "Console action done");
            Ok(())
        }
    }
}
