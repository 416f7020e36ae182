use alloy_core::primitives::{Address, U256};
use anyhow::Result;
use ledgerlab_deploy::contracts::SIMPLE_STORAGE;
use ledgerlab_deploy::{
    ArtifactStore, ContractClient, DeployEnv, DeployOptions, DeploymentStore, NetworkRegistry,
    SimpleStorage,
};
use rand::Rng;

use super::session::{Paths, Session, explorer_verifier};
use crate::cli::SignerArgs;

pub async fn run(
    paths: &Paths,
    network: &str,
    signer: &SignerArgs,
    address: Option<Address>,
    etherscan_api_key: Option<String>,
) -> Result<()> {
    let session = Session::open(paths, network, signer).await?;

    if let (false, Some(address)) = (NetworkRegistry::is_ephemeral(network), address) {
        let storage = SimpleStorage::attach(session.ledger, address);
        let person = storage.person(U256::ZERO).await?;
        tracing::info!("Person at 0 is {}", person);
        return Ok(());
    }

    let ledger = session.ledger.clone();
    let mut env = DeployEnv::new(
        session.ledger,
        session.registry,
        network,
        ArtifactStore::new(&paths.artifacts),
        DeploymentStore::in_memory(network),
    )?
    .with_verifier(explorer_verifier(etherscan_api_key)?);
    let record = env
        .deploy(SIMPLE_STORAGE, DeployOptions::new().force(true))
        .await?;
    let storage = SimpleStorage::from_record(ledger, &record);

    let fave = storage.retrieve_fave_number().await?;
    tracing::info!("Favorite number is {}", fave);

    let random = random_favorite_number(&mut rand::rng());
    tracing::info!("Updating favorite number to {}", random);
    storage.store(U256::from(random)).await?.wait(1).await?;
    let fave = storage.retrieve_fave_number().await?;
    tracing::info!("Favorite number is {}", fave);

    tracing::info!("Adding 'Frankenstein'/711");
    storage
        .add_person_memory("Frankenstein", U256::from(711))
        .await?
        .wait(1)
        .await?;
    let person = storage.person(U256::ZERO).await?;
    tracing::info!("Person at 0 is {}", person);
    Ok(())
}

/// A number in `0..=700`, never quite zero-biased.
fn random_favorite_number(rng: &mut impl Rng) -> u64 {
    ((rng.random::<f64>() + 0.001) * 700.0).floor() as u64
}
