//! Persisted deployment records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use alloy_core::json_abi::JsonAbi;
use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Directory holding deployment records when none is configured.
pub const DEFAULT_DEPLOYMENTS_DIR: &str = "deployments";

/// A contract instance published by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub name: String,
    pub address: Address,
    /// Constructor arguments, rendered as JSON.
    pub args: Vec<Value>,
    pub abi: JsonAbi,
    pub transaction_hash: B256,
    pub block_number: u64,
    /// SHA-256 of the creation bytecode and encoded constructor arguments.
    pub fingerprint: String,
    pub deployed_at: DateTime<Utc>,
}

/// Fingerprint of a deployment: identical bytecode and arguments produce the same value.
pub fn fingerprint(bytecode: &[u8], encoded_args: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytecode);
    hasher.update(encoded_args);
    hex::encode(hasher.finalize())
}

/// Records of one network, on disk under `<root>/<network>/<Name>.json` or kept
/// in memory for networks that do not outlive the process.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    network: String,
    dir: Option<PathBuf>,
    records: BTreeMap<String, DeploymentRecord>,
}

impl DeploymentStore {
    /// Open the records of `network` under `root`, loading those already saved.
    pub fn open(root: &Path, network: &str) -> Result<Self> {
        let dir = root.join(network);
        let mut records = BTreeMap::new();

        if dir.exists() {
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to read {}", dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let record: DeploymentRecord = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse deployment {}", path.display()))?;
                records.insert(record.name.clone(), record);
            }
        }

        tracing::debug!(
            network,
            dir = %dir.display(),
            records = records.len(),
            "Deployment store opened"
        );

        Ok(Self {
            network: network.to_string(),
            dir: Some(dir),
            records,
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(network: &str) -> Self {
        Self {
            network: network.to_string(),
            dir: None,
            records: BTreeMap::new(),
        }
    }

    /// The in-process `hardhat` network keeps nothing; everything else is persisted.
    pub fn for_network(root: &Path, network: &str) -> Result<Self> {
        if network == "hardhat" {
            Ok(Self::in_memory(network))
        } else {
            Self::open(root, network)
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn is_persistent(&self) -> bool {
        self.dir.is_some()
    }

    pub fn get(&self, name: &str) -> Option<&DeploymentRecord> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.values()
    }

    /// Store `record`, replacing any previous one with the same name.
    pub fn save(&mut self, record: DeploymentRecord) -> Result<()> {
        if let Some(dir) = &self.dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let path = dir.join(format!("{}.json", record.name));
            let content = serde_json::to_string_pretty(&record)
                .context("Failed to serialize deployment record")?;
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::debug!(name = %record.name, path = %path.display(), "Deployment saved");
        }
        self.records.insert(record.name.clone(), record);
        Ok(())
    }
}
