//! Shared harness for the devnet integration tests.
//!
//! Each contract is hosted as a native program on a [`DevLedger`], keyed by the
//! `devnet:<Name>` bytecode of an in-memory artifact.
#![allow(dead_code)]

pub mod programs;

use alloy_core::json_abi::JsonAbi;
use anyhow::Result;
use ledgerlab_deploy::contracts::{
    FUND_ME, LOTTERY, PRICE_FEED_MOCK, SIMPLE_STORAGE, TOKEN, VRF_COORDINATOR_MOCK,
};
use ledgerlab_deploy::verify::{VerificationRequest, VerificationStatus};
use ledgerlab_deploy::{
    Artifact, ArtifactStore, DeployEnv, DeploymentReport, DeploymentStore, DevLedger,
    NetworkRegistry, Orchestrator, SourceVerifier,
};
use serde_json::json;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Creation bytecode standing in for `name`.
pub fn bytecode(name: &str) -> Vec<u8> {
    format!("devnet:{}", name).into_bytes()
}

fn constructor_abi(inputs: &[(&str, &str)]) -> JsonAbi {
    if inputs.is_empty() {
        return JsonAbi::default();
    }
    let inputs: Vec<_> = inputs
        .iter()
        .map(|(name, ty)| json!({ "name": name, "type": ty, "internalType": ty }))
        .collect();
    serde_json::from_value(json!([{
        "type": "constructor",
        "stateMutability": "nonpayable",
        "inputs": inputs,
    }]))
    .unwrap()
}

/// Artifacts of every contract the deploy scripts publish.
pub fn artifacts() -> ArtifactStore {
    let contracts: [(&str, &[(&str, &str)]); 6] = [
        (
            PRICE_FEED_MOCK,
            &[("_decimals", "uint8"), ("_initialAnswer", "int256")],
        ),
        (
            VRF_COORDINATOR_MOCK,
            &[("_baseFee", "uint96"), ("_gasPriceLink", "uint96")],
        ),
        (FUND_ME, &[("priceFeedAddress", "address")]),
        (
            LOTTERY,
            &[
                ("vrfCoordinatorV2", "address"),
                ("entranceFee", "uint256"),
                ("gasLane", "bytes32"),
                ("subscriptionId", "uint64"),
                ("callbackGasLimit", "uint32"),
                ("interval", "uint256"),
            ],
        ),
        (SIMPLE_STORAGE, &[]),
        (TOKEN, &[]),
    ];

    contracts
        .iter()
        .fold(ArtifactStore::in_memory(), |store, (name, inputs)| {
            store.with_artifact(Artifact::new(*name, constructor_abi(inputs), bytecode(name)))
        })
}

/// Initialize tracing for tests (idempotent).
pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init()
        .ok();
}

/// A fresh chain hosting every program.
pub fn dev_ledger() -> DevLedger {
    init_test_tracing();
    let ledger = DevLedger::new();
    programs::register_all(&ledger);
    ledger
}

/// A run environment over `ledger` with the in-memory artifacts.
pub fn deploy_env<V: SourceVerifier>(
    ledger: &DevLedger,
    network: &str,
    store: DeploymentStore,
) -> DeployEnv<DevLedger, V> {
    DeployEnv::new(
        ledger.clone(),
        NetworkRegistry::builtin(),
        network,
        artifacts(),
        store,
    )
    .unwrap()
}

/// Run every standard script against an in-memory `hardhat` store.
pub async fn deploy_all(ledger: &DevLedger) -> Result<DeploymentReport> {
    let env = deploy_env::<RecordingVerifier>(ledger, "hardhat", DeploymentStore::in_memory("hardhat"));
    Orchestrator::standard().run_to_report(env, &[]).await
}

/// Accepts every submission and remembers it.
#[derive(Debug, Clone, Default)]
pub struct RecordingVerifier {
    requests: Arc<Mutex<Vec<VerificationRequest>>>,
}

impl RecordingVerifier {
    pub fn requests(&self) -> Vec<VerificationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl SourceVerifier for RecordingVerifier {
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<VerificationStatus>> + Send {
        self.requests.lock().unwrap().push(request.clone());
        std::future::ready(Ok(VerificationStatus::Verified))
    }
}
