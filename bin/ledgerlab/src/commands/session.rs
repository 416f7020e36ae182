use std::path::PathBuf;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use ledgerlab_deploy::keystore::load_credential;
use ledgerlab_deploy::rpc::wait_until_ready;
use ledgerlab_deploy::{
    DeploymentStore, EtherscanVerifier, Ledger, NetworkRegistry, RpcLedger, Wallet,
};

use crate::cli::SignerArgs;

/// Seconds to wait for the node to answer before giving up.
const NODE_READY_TIMEOUT_SECS: u64 = 10;

/// Filesystem locations shared by every command.
#[derive(Debug, Clone)]
pub struct Paths {
    pub config: Option<PathBuf>,
    pub artifacts: PathBuf,
    pub deployments: PathBuf,
}

impl Paths {
    pub fn registry(&self) -> Result<NetworkRegistry> {
        NetworkRegistry::load(self.config.as_deref())
    }

    pub fn store(&self, network: &str) -> Result<DeploymentStore> {
        DeploymentStore::for_network(&self.deployments, network)
    }
}

/// A connection to one network.
pub struct Session {
    pub network: String,
    pub registry: NetworkRegistry,
    pub ledger: RpcLedger,
}

impl SignerArgs {
    pub fn wallet(&self) -> Result<Option<Wallet>> {
        if let Some(key) = &self.private_key {
            return Wallet::from_hex(key).map(Some).context("Invalid PRIVATE_KEY");
        }

        match (&self.keystore, &self.keystore_password) {
            (Some(path), Some(password)) => load_credential(path, password).map(Some),
            (Some(path), None) => anyhow::bail!(
                "KEYSTORE_PASSWORD is required to unlock {}",
                path.display()
            ),
            (None, _) => Ok(None),
        }
    }
}

/// Explorer verifier for `api_key`. A missing or blank key disables verification.
pub fn explorer_verifier(api_key: Option<String>) -> Result<Option<EtherscanVerifier>> {
    match api_key {
        Some(key) if !key.trim().is_empty() => EtherscanVerifier::new(key).map(Some),
        _ => Ok(None),
    }
}

impl Session {
    /// Connect to `network`, signing with the configured key. Without one, local
    /// nodes send from their first unlocked account and live networks are read-only.
    pub async fn open(paths: &Paths, network: &str, signer: &SignerArgs) -> Result<Self> {
        let registry = paths.registry()?;
        let config = registry.network(network)?;

        if network == "hardhat" {
            anyhow::bail!(
                "The in-process hardhat network only lives inside tests; start a node and use --network localhost"
            );
        }

        let url = registry.rpc_url(network)?;
        let node_client = RpcLedger::new(url.clone())?;
        let node = &node_client;
        wait_until_ready(network, NODE_READY_TIMEOUT_SECS, || async move {
            node.block_number().await.map(|_| ())
        })
        .await?;

        let chain_id = node_client.chain_id().await?;
        if chain_id != config.chain_id {
            anyhow::bail!(
                "Network {} expects chain id {}, but the node reports {}",
                network,
                config.chain_id,
                chain_id
            );
        }

        let ledger = match signer.wallet()? {
            Some(wallet) => RpcLedger::with_wallet(url, wallet)?,
            None if NetworkRegistry::is_ephemeral(network) => RpcLedger::unlocked(url).await?,
            None => {
                tracing::warn!(network, "No signer configured, sending is disabled");
                node_client
            }
        };

        tracing::info!(
            network,
            chain_id,
            sender = ?ledger.sender(),
            "Connected"
        );

        Ok(Self {
            network: network.to_string(),
            registry,
            ledger,
        })
    }

    /// `address`, or the recorded deployment of `contract` on this network.
    pub fn resolve(&self, paths: &Paths, contract: &str, address: Option<Address>) -> Result<Address> {
        if let Some(address) = address {
            return Ok(address);
        }
        let store = paths.store(&self.network)?;
        store
            .get(contract)
            .map(|record| record.address)
            .with_context(|| {
                format!(
                    "No {} deployment recorded on {}; run deploy first or pass --address",
                    contract, self.network
                )
            })
    }
}
