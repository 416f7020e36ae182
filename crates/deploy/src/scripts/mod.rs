//! The numbered deploy scripts of a standard run.

mod lottery;
mod mocks;

use anyhow::Result;
use futures::future::BoxFuture;

pub use lottery::{DeployLottery, VRF_SUB_FUND_AMOUNT};
pub use mocks::{BASE_FEE, DECIMALS, DeployMocks, GAS_PRICE_LINK, INITIAL_ANSWER};

use crate::contracts::{FUND_ME, PRICE_FEED_MOCK, SIMPLE_STORAGE, TOKEN};
use crate::deployer::{ArgSource, DeployEnv, DeployOptions, DeployScript, DeployTag};
use crate::ledger::Ledger;
use crate::network::ETH_USD_PRICE_FEED;
use crate::verify::SourceVerifier;

/// `FundMe` wired to the local price feed mock or the chain's feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployFundMe;

impl<L: Ledger, V: SourceVerifier> DeployScript<L, V> for DeployFundMe {
    fn name(&self) -> &'static str {
        "01-deploy-fund-me"
    }

    fn tags(&self) -> &'static [DeployTag] {
        &[DeployTag::All, DeployTag::Fundme]
    }

    fn run<'a>(&'a self, env: &'a mut DeployEnv<L, V>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let options = DeployOptions::new()
                .arg(ArgSource::dependency(PRICE_FEED_MOCK, ETH_USD_PRICE_FEED));
            env.deploy(FUND_ME, options).await?;
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeploySimpleStorage;

impl<L: Ledger, V: SourceVerifier> DeployScript<L, V> for DeploySimpleStorage {
    fn name(&self) -> &'static str {
        "03-deploy-simple-storage"
    }

    fn tags(&self) -> &'static [DeployTag] {
        &[DeployTag::All, DeployTag::Storage]
    }

    fn run<'a>(&'a self, env: &'a mut DeployEnv<L, V>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            env.deploy(SIMPLE_STORAGE, DeployOptions::new()).await?;
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployToken;

impl<L: Ledger, V: SourceVerifier> DeployScript<L, V> for DeployToken {
    fn name(&self) -> &'static str {
        "04-deploy-token"
    }

    fn tags(&self) -> &'static [DeployTag] {
        &[DeployTag::All, DeployTag::Token]
    }

    fn run<'a>(&'a self, env: &'a mut DeployEnv<L, V>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            env.deploy(TOKEN, DeployOptions::new()).await?;
            Ok(())
        })
    }
}
