//! Deployment runs: argument resolution, publishing, advisory verification and
//! the ordered script runner.

use std::path::Path;

use alloy_core::dyn_abi::DynSolValue;
use alloy_core::primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::artifacts::{Artifact, ArtifactStore};
use crate::deployments::{DeploymentRecord, DeploymentStore, fingerprint};
use crate::ledger::{Ledger, TxRequest};
use crate::network::{NetworkConfig, NetworkRegistry};
use crate::pending::PendingOperation;
use crate::verify::{Advisory, EtherscanVerifier, SourceVerifier, VerificationRequest};

/// Where a constructor argument comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgSource {
    Literal(DynSolValue),
    /// Address of a contract published earlier in the same run.
    Deployed(String),
    /// Address from the chain profile's address book.
    External(String),
    /// `Deployed(local)` on ephemeral networks, `External(remote)` elsewhere.
    Dependency { local: String, remote: String },
}

impl ArgSource {
    pub fn deployed(name: impl Into<String>) -> Self {
        Self::Deployed(name.into())
    }

    pub fn external(key: impl Into<String>) -> Self {
        Self::External(key.into())
    }

    pub fn dependency(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self::Dependency {
            local: local.into(),
            remote: remote.into(),
        }
    }
}

impl From<DynSolValue> for ArgSource {
    fn from(value: DynSolValue) -> Self {
        Self::Literal(value)
    }
}

impl From<Address> for ArgSource {
    fn from(address: Address) -> Self {
        Self::Literal(DynSolValue::Address(address))
    }
}

impl From<U256> for ArgSource {
    fn from(value: U256) -> Self {
        Self::Literal(DynSolValue::Uint(value, 256))
    }
}

impl From<B256> for ArgSource {
    fn from(word: B256) -> Self {
        Self::Literal(DynSolValue::FixedBytes(word, 32))
    }
}

/// Per-deployment knobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployOptions {
    pub args: Vec<ArgSource>,
    /// Overrides the network's confirmation policy.
    pub confirmations: Option<u64>,
    /// Redeploy even when a matching record exists.
    pub force: bool,
}

impl DeployOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, arg: impl Into<ArgSource>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = Some(confirmations);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Deployment failures callers may want to match on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    #[error("{contract} depends on {dependency}, which has not been deployed in this run")]
    MissingDependency { contract: String, dependency: String },
    #[error("Artifact {0} has no creation bytecode")]
    EmptyBytecode(String),
    #[error("Deployment of {0} did not create a contract")]
    NoContractAddress(String),
}

/// One contract handled by a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployedContract {
    pub record: DeploymentRecord,
    /// An existing deployment with the same fingerprint was kept.
    pub reused: bool,
    pub verification: Advisory,
}

/// What a run produced, in deployment order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentReport {
    pub network: String,
    pub contracts: Vec<DeployedContract>,
}

impl DeploymentReport {
    pub fn get(&self, name: &str) -> Option<&DeployedContract> {
        self.contracts.iter().find(|c| c.record.name == name)
    }
}

/// State of one deployment run against one network.
pub struct DeployEnv<L, V = EtherscanVerifier> {
    ledger: L,
    network_name: String,
    network: NetworkConfig,
    registry: NetworkRegistry,
    artifacts: ArtifactStore,
    store: DeploymentStore,
    verifier: Option<V>,
    force: bool,
    deployed: Vec<DeployedContract>,
}

impl<L: Ledger, V: SourceVerifier> DeployEnv<L, V> {
    pub fn new(
        ledger: L,
        registry: NetworkRegistry,
        network_name: &str,
        artifacts: ArtifactStore,
        store: DeploymentStore,
    ) -> Result<Self> {
        let network = registry.network(network_name)?.clone();
        Ok(Self {
            ledger,
            network_name: network_name.to_string(),
            network,
            registry,
            artifacts,
            store,
            verifier: None,
            force: false,
            deployed: Vec::new(),
        })
    }

    /// Verify sources on explorers of non-ephemeral networks.
    pub fn with_verifier(mut self, verifier: Option<V>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Redeploy every contract of the run, ignoring matching records.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    pub fn is_ephemeral(&self) -> bool {
        NetworkRegistry::is_ephemeral(&self.network_name)
    }

    /// A contract published in this run.
    pub fn get(&self, name: &str) -> Option<&DeploymentRecord> {
        self.deployed
            .iter()
            .find(|c| c.record.name == name)
            .map(|c| &c.record)
    }

    /// Publish `name` from its artifact, or reuse a matching earlier deployment.
    pub async fn deploy(&mut self, name: &str, options: DeployOptions) -> Result<DeploymentRecord> {
        let args = self.resolve_args(name, &options.args)?;
        let rendered_args = args.iter().map(render_arg).collect();

        let artifact = self
            .artifacts
            .artifact(name)
            .with_context(|| format!("Failed to load artifact for {}", name))?;
        if artifact.bytecode.is_empty() {
            return Err(DeployError::EmptyBytecode(name.to_string()).into());
        }
        let encoded = artifact.encode_constructor_args(&args)?;
        let fingerprint = fingerprint(&artifact.bytecode, &encoded);

        if !(options.force || self.force) {
            if let Some(record) = self.reusable(name, &fingerprint).await? {
                tracing::info!(
                    contract = name,
                    address = %record.address,
                    network = %self.network_name,
                    "Reusing deployment"
                );
                self.deployed.push(DeployedContract {
                    record: record.clone(),
                    reused: true,
                    verification: Advisory::Skipped("already deployed".to_string()),
                });
                return Ok(record);
            }
        }

        tracing::info!(contract = name, network = %self.network_name, "Deploying...");
        let hash = self
            .ledger
            .send(TxRequest::create(artifact.creation_code(&encoded)))
            .await
            .with_context(|| format!("Failed to submit deployment of {}", name))?;

        let confirmations = options.confirmations.unwrap_or(if self.is_ephemeral() {
            1
        } else {
            self.network.block_confirmations
        });
        tracing::debug!(contract = name, tx_hash = %hash, confirmations, "Waiting for deployment");
        let receipt = PendingOperation::new(self.ledger.clone(), hash)
            .wait(confirmations)
            .await
            .with_context(|| format!("Deployment of {} failed", name))?;
        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::NoContractAddress(name.to_string()))?;

        let record = DeploymentRecord {
            name: name.to_string(),
            address,
            args: rendered_args,
            abi: artifact.abi.clone(),
            transaction_hash: hash,
            block_number: receipt.block_number,
            fingerprint,
            deployed_at: chrono::Utc::now(),
        };
        tracing::info!(
            contract = name,
            address = %address,
            tx_hash = %hash,
            block = receipt.block_number,
            "Deployed"
        );

        let verification = if self.is_ephemeral() {
            Advisory::Skipped("ephemeral network".to_string())
        } else {
            self.verify(&artifact, address, &encoded).await
        };

        self.store.save(record.clone())?;
        self.deployed.push(DeployedContract {
            record: record.clone(),
            reused: false,
            verification,
        });
        Ok(record)
    }

    /// Everything handled so far, in order.
    pub fn into_report(self) -> DeploymentReport {
        DeploymentReport {
            network: self.network_name,
            contracts: self.deployed,
        }
    }

    fn resolve_args(&self, contract: &str, sources: &[ArgSource]) -> Result<Vec<DynSolValue>> {
        sources
            .iter()
            .map(|source| self.resolve_arg(contract, source))
            .collect()
    }

    fn resolve_arg(&self, contract: &str, source: &ArgSource) -> Result<DynSolValue> {
        let address = match source {
            ArgSource::Literal(value) => return Ok(value.clone()),
            ArgSource::Deployed(dependency) => self.dependency(contract, dependency)?,
            ArgSource::External(key) => self.registry.address(self.chain_id(), key)?,
            ArgSource::Dependency { local, remote } => {
                if self.is_ephemeral() {
                    self.dependency(contract, local)?
                } else {
                    self.registry.address(self.chain_id(), remote)?
                }
            }
        };
        Ok(DynSolValue::Address(address))
    }

    /// Address of `dependency`, published earlier in this run on behalf of `contract`.
    pub fn dependency(&self, contract: &str, dependency: &str) -> Result<Address, DeployError> {
        self.get(dependency)
            .map(|record| record.address)
            .ok_or_else(|| DeployError::MissingDependency {
                contract: contract.to_string(),
                dependency: dependency.to_string(),
            })
    }

    /// A stored record with the same fingerprint whose code is still on chain.
    async fn reusable(&self, name: &str, fingerprint: &str) -> Result<Option<DeploymentRecord>> {
        if !self.store.is_persistent() {
            return Ok(None);
        }
        let Some(record) = self.store.get(name) else {
            return Ok(None);
        };
        if record.fingerprint != fingerprint {
            return Ok(None);
        }

        let code = self.ledger.code(record.address).await?;
        if code.is_empty() {
            tracing::debug!(contract = name, address = %record.address, "Stored deployment has no code");
            return Ok(None);
        }
        Ok(Some(record.clone()))
    }

    async fn verify(&self, artifact: &Artifact, address: Address, encoded_args: &[u8]) -> Advisory {
        let Some(verifier) = &self.verifier else {
            return Advisory::Skipped("no explorer API key".to_string());
        };

        let build_info = match self.artifacts.build_info(&artifact.contract_name) {
            Ok(Some(info)) => info,
            Ok(None) => return Advisory::Skipped("no build info".to_string()),
            Err(e) => return Advisory::Failed(format!("{:#}", e)),
        };

        let request = VerificationRequest {
            chain_id: self.chain_id(),
            address,
            contract_name: format!("{}:{}", artifact.source_name, artifact.contract_name),
            compiler_version: build_info.solc_long_version,
            source: build_info.input,
            constructor_args: encoded_args.to_vec().into(),
        };

        match verifier.verify(&request).await {
            Ok(_) => Advisory::Completed,
            Err(e) => {
                tracing::warn!(contract = %artifact.contract_name, error = %e, "Verification failed");
                Advisory::Failed(format!("{:#}", e))
            }
        }
    }
}

/// JSON rendering of a constructor argument for deployment records.
pub fn render_arg(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(address) => Value::String(address.to_string()),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Uint(v, _) => Value::String(v.to_string()),
        DynSolValue::Int(v, _) => Value::String(v.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) | DynSolValue::Tuple(values) => {
            Value::Array(values.iter().map(render_arg).collect())
        }
        other => Value::String(format!("{:?}", other)),
    }
}

/// Selects which scripts of a run execute.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum DeployTag {
    All,
    Mocks,
    Fundme,
    Lottery,
    Storage,
    Token,
}

/// One numbered step of a deployment run.
pub trait DeployScript<L, V>: Send + Sync {
    fn name(&self) -> &'static str;

    fn tags(&self) -> &'static [DeployTag];

    fn run<'a>(&'a self, env: &'a mut DeployEnv<L, V>) -> BoxFuture<'a, Result<()>>;
}

/// Runs deploy scripts in registration order.
pub struct Orchestrator<L, V = EtherscanVerifier> {
    scripts: Vec<Box<dyn DeployScript<L, V>>>,
}

impl<L, V> Default for Orchestrator<L, V> {
    fn default() -> Self {
        Self {
            scripts: Vec::new(),
        }
    }
}

impl<L: Ledger, V: SourceVerifier + 'static> Orchestrator<L, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mocks, fund-me, lottery, storage and token scripts.
    pub fn standard() -> Self {
        Self::new()
            .with_script(crate::scripts::DeployMocks)
            .with_script(crate::scripts::DeployFundMe)
            .with_script(crate::scripts::DeployLottery)
            .with_script(crate::scripts::DeploySimpleStorage)
            .with_script(crate::scripts::DeployToken)
    }

    pub fn with_script(mut self, script: impl DeployScript<L, V> + 'static) -> Self {
        self.scripts.push(Box::new(script));
        self
    }

    pub fn script_names(&self) -> Vec<&'static str> {
        self.scripts.iter().map(|s| s.name()).collect()
    }

    /// Run every script selected by `tags` (all of them when empty or `all`).
    /// Contracts published before a failing script stay published.
    pub async fn run(&self, env: &mut DeployEnv<L, V>, tags: &[DeployTag]) -> Result<()> {
        let run_all = tags.is_empty() || tags.contains(&DeployTag::All);

        for script in &self.scripts {
            let selected = run_all || script.tags().iter().any(|t| tags.contains(t));
            if !selected {
                tracing::debug!(script = script.name(), "Skipped by tags");
                continue;
            }

            tracing::info!(script = script.name(), network = %env.network_name(), "Running deploy script");
            script
                .run(env)
                .await
                .with_context(|| format!("Deploy script {} failed", script.name()))?;
        }
        Ok(())
    }

    /// [`run`](Self::run), then hand back the report.
    pub async fn run_to_report(
        &self,
        mut env: DeployEnv<L, V>,
        tags: &[DeployTag],
    ) -> Result<DeploymentReport> {
        self.run(&mut env, tags).await?;
        Ok(env.into_report())
    }
}

/// Save `report` as pretty JSON.
pub fn save_report(report: &DeploymentReport, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "Deployment report saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{I256, b256};
    use std::str::FromStr;

    #[test]
    fn test_tags_parse_kebab_case() {
        assert_eq!(DeployTag::from_str("fundme").unwrap(), DeployTag::Fundme);
        assert_eq!(DeployTag::from_str("mocks").unwrap(), DeployTag::Mocks);
        assert_eq!(DeployTag::Storage.to_string(), "storage");
        assert!(DeployTag::from_str("nope").is_err());
    }

    #[test]
    fn test_render_args() {
        assert_eq!(
            render_arg(&DynSolValue::Uint(U256::from(8), 8)),
            Value::String("8".to_string())
        );
        assert_eq!(
            render_arg(&DynSolValue::Int(I256::try_from(-5i64).unwrap(), 256)),
            Value::String("-5".to_string())
        );
        let lane = b256!("d89b2bf150e3b9e13446986e571fb9cab24b13cea0a43ea20a6049a85cc807cc");
        assert_eq!(
            render_arg(&DynSolValue::FixedBytes(lane, 32)),
            Value::String(lane.to_string())
        );
    }

    #[test]
    fn test_options_builder() {
        let options = DeployOptions::new()
            .arg(Address::ZERO)
            .arg(ArgSource::dependency("MockV3Aggregator", "ethUsdPriceFeed"))
            .confirmations(2)
            .force(true);
        assert_eq!(options.args.len(), 2);
        assert_eq!(options.args[0], ArgSource::Literal(DynSolValue::Address(Address::ZERO)));
        assert_eq!(options.confirmations, Some(2));
        assert!(options.force);
    }
}
