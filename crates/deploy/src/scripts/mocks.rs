//! Price feed and randomness coordinator mocks for ephemeral networks.

use alloy_core::dyn_abi::DynSolValue;
use alloy_core::primitives::{I256, U256};
use anyhow::Result;
use futures::future::BoxFuture;

use crate::contracts::{PRICE_FEED_MOCK, VRF_COORDINATOR_MOCK};
use crate::deployer::{DeployEnv, DeployOptions, DeployScript, DeployTag};
use crate::ledger::Ledger;
use crate::verify::SourceVerifier;

/// Decimals reported by the price feed mock.
pub const DECIMALS: u8 = 8;

/// 1800 USD per ETH, with [`DECIMALS`] decimals.
pub const INITIAL_ANSWER: i64 = 180_000_000_000;

/// Flat LINK premium per randomness request, 0.25 LINK.
pub const BASE_FEE: u128 = 250_000_000_000_000_000;

/// LINK per gas.
pub const GAS_PRICE_LINK: u128 = 1_000_000_000;

/// Stand-ins for the price feed and the randomness coordinator, deployed on
/// ephemeral networks only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployMocks;

impl<L: Ledger, V: SourceVerifier> DeployScript<L, V> for DeployMocks {
    fn name(&self) -> &'static str {
        "00-deploy-mocks"
    }

    fn tags(&self) -> &'static [DeployTag] {
        &[DeployTag::All, DeployTag::Mocks]
    }

    fn run<'a>(&'a self, env: &'a mut DeployEnv<L, V>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !env.is_ephemeral() {
                tracing::debug!(network = %env.network_name(), "Live network, no mocks needed");
                return Ok(());
            }

            tracing::info!("Local network detected! Deploying mocks...");
            env.deploy(
                PRICE_FEED_MOCK,
                DeployOptions::new()
                    .arg(DynSolValue::Uint(U256::from(DECIMALS), 8))
                    .arg(DynSolValue::Int(I256::try_from(INITIAL_ANSWER)?, 256)),
            )
            .await?;
            env.deploy(
                VRF_COORDINATOR_MOCK,
                DeployOptions::new()
                    .arg(DynSolValue::Uint(U256::from(BASE_FEE), 96))
                    .arg(DynSolValue::Uint(U256::from(GAS_PRICE_LINK), 96)),
            )
            .await?;
            tracing::info!("Mocks deployed!");
            Ok(())
        })
    }
}
