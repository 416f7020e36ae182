//! Lottery deployment, with a funded mock subscription on ephemeral networks.

use alloy_core::dyn_abi::DynSolValue;
use alloy_core::primitives::aliases::U96;
use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};
use futures::future::BoxFuture;

use crate::contracts::{
    ContractClient, IVRFCoordinatorV2Mock, LOTTERY, VRF_COORDINATOR_MOCK, VrfCoordinatorMock,
};
use crate::deployer::{ArgSource, DeployEnv, DeployOptions, DeployScript, DeployTag};
use crate::ledger::Ledger;
use crate::network::VRF_COORDINATOR_V2;
use crate::verify::SourceVerifier;

/// LINK credited to the mock subscription, 2 LINK.
pub const VRF_SUB_FUND_AMOUNT: u128 = 2_000_000_000_000_000_000;

/// `Lottery` with a randomness subscription: a freshly created and funded one on
/// ephemeral networks, the profile's otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployLottery;

impl<L: Ledger, V: SourceVerifier> DeployScript<L, V> for DeployLottery {
    fn name(&self) -> &'static str {
        "02-deploy-lottery"
    }

    fn tags(&self) -> &'static [DeployTag] {
        &[DeployTag::All, DeployTag::Lottery]
    }

    fn run<'a>(&'a self, env: &'a mut DeployEnv<L, V>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let params = env.registry().lottery_params(env.chain_id())?.clone();

            let subscription_id = if env.is_ephemeral() {
                let coordinator = env.dependency(LOTTERY, VRF_COORDINATOR_MOCK)?;
                create_funded_subscription(env.ledger().clone(), coordinator).await?
            } else {
                params.subscription_id
            };

            let options = DeployOptions::new()
                .arg(ArgSource::dependency(VRF_COORDINATOR_MOCK, VRF_COORDINATOR_V2))
                .arg(params.entrance_fee)
                .arg(params.gas_lane)
                .arg(DynSolValue::Uint(U256::from(subscription_id), 64))
                .arg(DynSolValue::Uint(U256::from(params.callback_gas_limit), 32))
                .arg(params.interval);
            env.deploy(LOTTERY, options).await?;
            Ok(())
        })
    }
}

async fn create_funded_subscription<L: Ledger>(ledger: L, coordinator: Address) -> Result<u64> {
    let mock = VrfCoordinatorMock::attach(ledger, coordinator);

    let receipt = mock.create_subscription().await?.wait(1).await?;
    let created = receipt
        .first_event::<IVRFCoordinatorV2Mock::SubscriptionCreated>()
        .context("createSubscription emitted no SubscriptionCreated event")?;

    mock.fund_subscription(created.subId, U96::from(VRF_SUB_FUND_AMOUNT))
        .await?
        .wait(1)
        .await?;
    tracing::info!(sub_id = created.subId, "Subscription created and funded");
    Ok(created.subId)
}
