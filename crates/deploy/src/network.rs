//! Network and chain profile resolution.
//!
//! Networks are looked up by name (`hardhat`, `rinkeby`, ...) and describe how to
//! reach a chain. Chain profiles are looked up by chain id and describe what lives
//! on that chain: the addresses of external contracts the deploy scripts depend on
//! and the lottery parameters.

use std::collections::BTreeMap;
use std::path::Path;

use alloy_core::primitives::{Address, B256, U256, address, b256};
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Networks that are spun up locally and thrown away.
pub const EPHEMERAL_NETWORKS: [&str; 2] = ["hardhat", "localhost"];

/// Key of the ETH/USD price feed in a chain profile's address book.
pub const ETH_USD_PRICE_FEED: &str = "ethUsdPriceFeed";

/// Key of the VRF coordinator in a chain profile's address book.
pub const VRF_COORDINATOR_V2: &str = "vrfCoordinatorV2";

/// Chain id used by local development nodes.
pub const DEV_CHAIN_ID: u64 = 31337;

/// Prefix of environment variables that override the registry.
pub const ENV_PREFIX: &str = "LEDGERLAB_NET_";

/// Errors raised while resolving networks and profiles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
    #[error("No network profile for chain id {0}")]
    UnknownChain(u64),
    #[error("Chain {chain_id} has no address configured for {key}")]
    MissingAddress { chain_id: u64, key: String },
    #[error("Chain {0} has no lottery parameters")]
    MissingLotteryParams(u64),
    #[error("No RPC URL configured for network {0}")]
    MissingRpcUrl(String),
}

/// How to reach a named network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    /// Literal RPC endpoint.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the RPC endpoint, used when `url` is unset.
    #[serde(default)]
    pub url_env: Option<String>,
    #[serde(default = "default_confirmations")]
    pub block_confirmations: u64,
}

fn default_confirmations() -> u64 {
    1
}

/// Parameters of the lottery contract on a given chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryParams {
    pub entrance_fee: U256,
    pub gas_lane: B256,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub interval: U256,
}

/// Everything known about a chain, keyed by chain id in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProfile {
    pub name: String,
    #[serde(default)]
    pub addresses: BTreeMap<String, Address>,
    #[serde(default)]
    pub lottery: Option<LotteryParams>,
}

/// Read-only registry of networks and chain profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRegistry {
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Chain profiles keyed by the decimal chain id.
    #[serde(default)]
    pub chains: BTreeMap<String, ChainProfile>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NetworkRegistry {
    /// The networks and profiles known without any configuration file.
    pub fn builtin() -> Self {
        let network = |chain_id, url: Option<&str>, url_env: Option<&str>, confirmations| {
            NetworkConfig {
                chain_id,
                url: url.map(String::from),
                url_env: url_env.map(String::from),
                block_confirmations: confirmations,
            }
        };

        let networks = BTreeMap::from([
            ("hardhat".to_string(), network(DEV_CHAIN_ID, None, None, 1)),
            (
                "localhost".to_string(),
                network(DEV_CHAIN_ID, Some("http://127.0.0.1:8545"), None, 1),
            ),
            (
                "rinkeby".to_string(),
                network(4, None, Some("RINKEBY_RPC_URL"), 6),
            ),
            ("kovan".to_string(), network(42, None, Some("KOVAN_RPC_URL"), 6)),
            (
                "avalanche".to_string(),
                network(43114, None, Some("AVALANCHE_RPC_URL"), 6),
            ),
        ]);

        let lottery = LotteryParams {
            entrance_fee: U256::from(10_000_000_000_000_000u64),
            gas_lane: b256!("d89b2bf150e3b9e13446986e571fb9cab24b13cea0a43ea20a6049a85cc807cc"),
            subscription_id: 0,
            callback_gas_limit: 500_000,
            interval: U256::from(30),
        };

        let chains = BTreeMap::from([
            (
                "4".to_string(),
                ChainProfile {
                    name: "rinkeby".to_string(),
                    addresses: BTreeMap::from([
                        (
                            ETH_USD_PRICE_FEED.to_string(),
                            address!("8A753747A1Fa494EC906cE90E9f37563A8AF630e"),
                        ),
                        (
                            VRF_COORDINATOR_V2.to_string(),
                            address!("6168499c0cFfCaCD319c818142124B7A15E857ab"),
                        ),
                    ]),
                    lottery: Some(lottery.clone()),
                },
            ),
            (
                "42".to_string(),
                ChainProfile {
                    name: "kovan".to_string(),
                    addresses: BTreeMap::from([(
                        ETH_USD_PRICE_FEED.to_string(),
                        address!("9326BFA02ADD2366b30bacB125260Af641031331"),
                    )]),
                    lottery: None,
                },
            ),
            (
                "43114".to_string(),
                ChainProfile {
                    name: "avalanche".to_string(),
                    addresses: BTreeMap::from([(
                        ETH_USD_PRICE_FEED.to_string(),
                        address!("976B3D034E162d8bD72D6b9C989d545b839003b0"),
                    )]),
                    lottery: None,
                },
            ),
            (
                DEV_CHAIN_ID.to_string(),
                ChainProfile {
                    name: "hardhat".to_string(),
                    addresses: BTreeMap::new(),
                    lottery: Some(lottery),
                },
            ),
        ]);

        Self { networks, chains }
    }

    /// Merge the built-in registry with an optional TOML file and `LEDGERLAB_NET_*`
    /// environment variables (`__` separates nested keys).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::builtin()));
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Network config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let registry: Self = figment
            .extract()
            .context("Failed to load network configuration")?;

        tracing::debug!(
            networks = registry.networks.len(),
            chains = registry.chains.len(),
            "Network registry loaded"
        );
        Ok(registry)
    }

    /// Write the registry as a TOML file that [`load`](Self::load) accepts.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize network registry to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write network config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Network configuration saved");
        Ok(())
    }

    /// Whether `name` is a throwaway local network.
    pub fn is_ephemeral(name: &str) -> bool {
        EPHEMERAL_NETWORKS.contains(&name)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig, NetworkError> {
        self.networks
            .get(name)
            .ok_or_else(|| NetworkError::UnknownNetwork(name.to_string()))
    }

    /// The profile of `chain_id`. Unknown ids are an error, never a default.
    pub fn profile(&self, chain_id: u64) -> Result<&ChainProfile, NetworkError> {
        self.chains
            .get(&chain_id.to_string())
            .ok_or(NetworkError::UnknownChain(chain_id))
    }

    /// An external dependency address from the profile of `chain_id`.
    pub fn address(&self, chain_id: u64, key: &str) -> Result<Address, NetworkError> {
        self.profile(chain_id)?
            .addresses
            .get(key)
            .copied()
            .ok_or_else(|| NetworkError::MissingAddress {
                chain_id,
                key: key.to_string(),
            })
    }

    pub fn lottery_params(&self, chain_id: u64) -> Result<&LotteryParams, NetworkError> {
        self.profile(chain_id)?
            .lottery
            .as_ref()
            .ok_or(NetworkError::MissingLotteryParams(chain_id))
    }

    /// Resolve the RPC endpoint of a network from its literal URL or its env var.
    pub fn rpc_url(&self, name: &str) -> Result<Url> {
        let network = self.network(name)?;

        let raw = match (&network.url, &network.url_env) {
            (Some(url), _) => url.clone(),
            (None, Some(var)) => std::env::var(var)
                .map_err(|_| NetworkError::MissingRpcUrl(name.to_string()))
                .with_context(|| format!("Set {} to reach {}", var, name))?,
            (None, None) => return Err(NetworkError::MissingRpcUrl(name.to_string()).into()),
        };

        Url::parse(&raw).with_context(|| format!("Invalid RPC URL for {}: {}", name, raw))
    }
}
