use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use ledgerlab_deploy::artifacts::DEFAULT_ARTIFACTS_DIR;
use ledgerlab_deploy::deployments::DEFAULT_DEPLOYMENTS_DIR;
use ledgerlab_deploy::keystore::{DEFAULT_CREDENTIAL_PATH, DEFAULT_MAX_ATTEMPTS};
use ledgerlab_deploy::{ConsoleAction, DeployTag};
use tracing::level_filters::LevelFilter;

/// The network used when none is given.
const DEFAULT_NETWORK: &str = "localhost";

/// How long `lottery enter --wait-winner` waits for a draw.
const DEFAULT_DRAW_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum LotteryAction {
    Enter,
    Status,
}

#[derive(Parser)]
#[command(name = "ledgerlab")]
#[command(
    author,
    version,
    about = "Provision keys, deploy contracts and interact with them"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "LEDGERLAB_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// A TOML file with extra networks and chain profiles.
    #[arg(long, global = true, env = "LEDGERLAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding compiled contract artifacts.
    #[arg(long, global = true, env = "LEDGERLAB_ARTIFACTS", default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts: PathBuf,

    /// Directory holding deployment records.
    #[arg(long, global = true, env = "LEDGERLAB_DEPLOYMENTS", default_value = DEFAULT_DEPLOYMENTS_DIR)]
    pub deployments: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Encrypt a private key into a password-protected keystore file.
    EncryptKey {
        /// Where to write the encrypted credential.
        #[arg(short, long, default_value = DEFAULT_CREDENTIAL_PATH)]
        output: PathBuf,

        /// Password confirmation rounds before giving up.
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: usize,
    },

    /// Run the deploy scripts against a network.
    Deploy {
        #[command(flatten)]
        network: NetworkArgs,

        #[command(flatten)]
        signer: SignerArgs,

        /// Only run scripts with one of these tags (all, mocks, fundme, lottery, storage, token).
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<DeployTag>,

        /// Redeploy contracts even when a matching deployment exists.
        #[arg(long)]
        force: bool,

        /// Explorer API key. Verification is skipped without it.
        #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
        etherscan_api_key: Option<String>,

        /// Also write the deployment report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Walk through the storage contract: read, store, register a person.
    Interact {
        #[command(flatten)]
        network: NetworkArgs,

        #[command(flatten)]
        signer: SignerArgs,

        /// An existing SimpleStorage. On live networks only person 0 is read.
        #[arg(long)]
        address: Option<Address>,

        /// Explorer API key used to verify the freshly deployed contract.
        #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
        etherscan_api_key: Option<String>,
    },

    /// The FundMe console: connect, fund, balance or withdraw.
    FundMe {
        action: ConsoleAction,

        #[command(flatten)]
        network: NetworkArgs,

        #[command(flatten)]
        signer: SignerArgs,

        /// Ether to fund with.
        #[arg(long, default_value = "0.1")]
        amount: String,

        /// The FundMe instance. Defaults to the recorded deployment.
        #[arg(long)]
        address: Option<Address>,
    },

    /// Enter the lottery or show its state.
    Lottery {
        action: LotteryAction,

        #[command(flatten)]
        network: NetworkArgs,

        #[command(flatten)]
        signer: SignerArgs,

        /// The Lottery instance. Defaults to the recorded deployment.
        #[arg(long)]
        address: Option<Address>,

        /// After entering, wait for the next winner to be picked.
        #[arg(long)]
        wait_winner: bool,

        /// Seconds to wait for the draw with --wait-winner.
        #[arg(long, default_value_t = DEFAULT_DRAW_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// List the recorded deployments of a network.
    Deployments {
        #[command(flatten)]
        network: NetworkArgs,
    },

    /// List the known networks.
    Networks {
        /// Write the registry to this TOML file, as a starting point for --config.
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    /// The network name (hardhat, localhost, rinkeby, ...).
    #[arg(short, long, env = "LEDGERLAB_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,
}

/// Where the signing key comes from. The raw key wins over the keystore.
#[derive(Args, Debug, Clone, Default)]
pub struct SignerArgs {
    /// Hex encoded private key.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Encrypted keystore written by `encrypt-key`.
    #[arg(long, env = "KEYSTORE_PATH")]
    pub keystore: Option<PathBuf>,

    /// Password of the keystore.
    #[arg(long, env = "KEYSTORE_PASSWORD", hide_env_values = true)]
    pub keystore_password: Option<String>,
}
