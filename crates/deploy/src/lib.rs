//! ledgerlab-deploy - Lifecycle tooling for EVM contracts.
//!
//! This crate provisions signing credentials, resolves networks, publishes
//! contracts through ordered deploy scripts and drives deployed instances
//! through typed clients.

pub mod artifacts;
pub mod contracts;
pub mod deployer;
pub mod deployments;
pub mod events;
pub mod frontend;
pub mod keystore;
pub mod ledger;
pub mod network;
pub mod pending;
pub mod rpc;
pub mod scripts;
pub mod verify;
pub mod wallet;

pub use artifacts::{Artifact, ArtifactStore, BuildInfo};
pub use contracts::{
    ClientError, ContractClient, FundMe, Lottery, LotteryState, Person, PriceFeedMock,
    SimpleStorage, Target, Token, VrfCoordinatorMock,
};
pub use deployer::{
    ArgSource, DeployEnv, DeployError, DeployOptions, DeployScript, DeployTag, DeployedContract,
    DeploymentReport, Orchestrator,
};
pub use deployments::{DeploymentRecord, DeploymentStore};
pub use events::{EventSubscription, SubscriptionOutcome};
pub use frontend::{ActionOutcome, ConsoleAction, FundMeConsole};
pub use keystore::{KeyProvisioner, ProvisionOutcome, SecretPrompt, TerminalPrompt};
pub use ledger::{DevControls, DevLedger, Ledger, LedgerError, Receipt, RpcLedger, TxRequest};
pub use network::{NetworkError, NetworkRegistry};
pub use pending::PendingOperation;
pub use verify::{Advisory, EtherscanVerifier, SourceVerifier};
pub use wallet::Wallet;
