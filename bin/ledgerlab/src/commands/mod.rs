mod deploy;
mod deployments;
mod encrypt_key;
mod fund_me;
mod interact;
mod lottery;
mod networks;
mod session;

use std::time::Duration;

use anyhow::Result;

use crate::cli::{Cli, Command};

pub async fn run(cli: Cli) -> Result<()> {
    let paths = session::Paths {
        config: cli.config,
        artifacts: cli.artifacts,
        deployments: cli.deployments,
    };

    match cli.command {
        Command::EncryptKey {
            output,
            max_attempts,
        } => encrypt_key::run(output, max_attempts),
        Command::Deploy {
            network,
            signer,
            tags,
            force,
            etherscan_api_key,
            report,
        } => {
            deploy::run(
                &paths,
                &network.network,
                &signer,
                &tags,
                force,
                etherscan_api_key,
                report,
            )
            .await
        }
        Command::Interact {
            network,
            signer,
            address,
            etherscan_api_key,
        } => {
            interact::run(&paths, &network.network, &signer, address, etherscan_api_key).await
        }
        Command::FundMe {
            action,
            network,
            signer,
            amount,
            address,
        } => fund_me::run(&paths, &network.network, &signer, action, &amount, address).await,
        Command::Lottery {
            action,
            network,
            signer,
            address,
            wait_winner,
            timeout,
        } => {
            let draw_timeout = wait_winner.then(|| Duration::from_secs(timeout));
            lottery::run(&paths, &network.network, &signer, action, address, draw_timeout).await
        }
        Command::Deployments { network } => deployments::run(&paths, &network.network),
        Command::Networks { write } => networks::run(&paths, write.as_deref()),
    }
}
