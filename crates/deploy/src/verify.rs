//! Explorer source verification.
//!
//! Verification is a side action of deployment: its outcome is reported as an
//! [`Advisory`] and never fails a run.

use std::future::Future;
use std::time::Duration;

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Etherscan multichain API endpoint.
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Environment variable holding the explorer API key.
pub const ETHERSCAN_API_KEY_ENV: &str = "ETHERSCAN_API_KEY";

const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_POLLS: usize = 12;

/// Outcome of a side action that must not fail the surrounding operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum Advisory {
    #[display("completed")]
    Completed,
    #[display("skipped: {_0}")]
    Skipped(String),
    #[display("failed: {_0}")]
    Failed(String),
}

/// Everything the explorer needs to match deployed bytecode with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRequest {
    pub chain_id: u64,
    pub address: Address,
    /// Fully qualified name, `contracts/FundMe.sol:FundMe`.
    pub contract_name: String,
    /// Long compiler version, `0.8.7+commit.e28d00a7`.
    pub compiler_version: String,
    /// Solidity standard JSON input.
    pub source: Value,
    pub constructor_args: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    AlreadyVerified,
}

/// Registers contract sources with a block explorer.
pub trait SourceVerifier: Send + Sync {
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<VerificationStatus>> + Send;
}

/// Raw explorer reply. `result` is a guid, a status line or an error message.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub result: String,
}

/// What a submission reply means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Queued(String),
    AlreadyVerified,
}

/// What a status poll reply means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Done(VerificationStatus),
    Failed(String),
}

fn mentions_already_verified(text: &str) -> bool {
    text.to_ascii_lowercase().contains("already verified")
}

pub fn classify_submission(response: &ExplorerResponse) -> Result<Submission> {
    if mentions_already_verified(&response.result) {
        return Ok(Submission::AlreadyVerified);
    }
    if response.status != "1" {
        anyhow::bail!(
            "Explorer rejected verification: {} ({})",
            response.result,
            response.message
        );
    }
    Ok(Submission::Queued(response.result.clone()))
}

pub fn classify_status(response: &ExplorerResponse) -> PollState {
    let result = response.result.as_str();
    if mentions_already_verified(result) {
        PollState::Done(VerificationStatus::AlreadyVerified)
    } else if result.to_ascii_lowercase().contains("pending") {
        PollState::Pending
    } else if response.status == "1" || result.starts_with("Pass") {
        PollState::Done(VerificationStatus::Verified)
    } else {
        PollState::Failed(result.to_string())
    }
}

/// Form fields of a `verifysourcecode` submission.
pub fn submission_form(request: &VerificationRequest, api_key: &str) -> Vec<(&'static str, String)> {
    vec![
        ("apikey", api_key.to_string()),
        ("module", "contract".to_string()),
        ("action", "verifysourcecode".to_string()),
        ("contractaddress", request.address.to_string()),
        ("sourceCode", request.source.to_string()),
        ("codeformat", "solidity-standard-json-input".to_string()),
        ("contractname", request.contract_name.clone()),
        ("compilerversion", format!("v{}", request.compiler_version)),
        // the misspelling is part of the API
        ("constructorArguements", hex::encode(&request.constructor_args)),
    ]
}

#[derive(Debug, thiserror::Error)]
#[error("verification still pending")]
struct StillPending;

/// Etherscan-compatible verifier.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    api_url: Url,
    api_key: String,
    poll_delay: Duration,
    max_polls: usize,
}

impl EtherscanVerifier {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: crate::rpc::create_client()?,
            api_url: Url::parse(ETHERSCAN_API_URL).context("Invalid explorer URL")?,
            api_key: api_key.into(),
            poll_delay: DEFAULT_POLL_DELAY,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    /// A verifier keyed by `ETHERSCAN_API_KEY`, or `None` when it is unset.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(ETHERSCAN_API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(Self::new(key)?)),
            _ => Ok(None),
        }
    }

    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn with_polling(mut self, delay: Duration, max_polls: usize) -> Self {
        self.poll_delay = delay;
        self.max_polls = max_polls;
        self
    }

    fn endpoint(&self, chain_id: u64) -> Url {
        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("chainid", &chain_id.to_string());
        url
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<Submission> {
        let response: ExplorerResponse = self
            .client
            .post(self.endpoint(request.chain_id))
            .form(&submission_form(request, &self.api_key))
            .send()
            .await
            .context("Failed to submit verification")?
            .json()
            .await
            .context("Failed to parse verification reply")?;
        classify_submission(&response)
    }

    async fn poll_once(&self, chain_id: u64, guid: &str) -> Result<VerificationStatus> {
        let response: ExplorerResponse = self
            .client
            .get(self.endpoint(chain_id))
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("Failed to poll verification status")?
            .json()
            .await
            .context("Failed to parse verification status")?;

        match classify_status(&response) {
            PollState::Pending => Err(StillPending.into()),
            PollState::Done(status) => Ok(status),
            PollState::Failed(reason) => anyhow::bail!("Verification failed: {}", reason),
        }
    }
}

impl SourceVerifier for EtherscanVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus> {
        tracing::info!(
            address = %request.address,
            contract = %request.contract_name,
            chain_id = request.chain_id,
            "Verifying contract..."
        );

        let guid = match self.submit(request).await? {
            Submission::AlreadyVerified => {
                tracing::info!(address = %request.address, "Already verified!");
                return Ok(VerificationStatus::AlreadyVerified);
            }
            Submission::Queued(guid) => guid,
        };

        let status = (|| self.poll_once(request.chain_id, &guid))
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_delay)
                    .with_max_times(self.max_polls),
            )
            .when(|e: &anyhow::Error| e.downcast_ref::<StillPending>().is_some())
            .notify(|_, after| tracing::debug!(guid = %guid, ?after, "Verification pending"))
            .await?;

        tracing::info!(address = %request.address, ?status, "Contract verified");
        Ok(status)
    }
}
