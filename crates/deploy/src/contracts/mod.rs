//! Typed clients for deployed contracts.
//!
//! Every client wraps a [`Target`]: an optional instance plus the ledger used to
//! reach it. Reads return decoded values right away; writes return a
//! [`PendingOperation`] that must be waited on before reads reflect the change.

mod bindings;

use alloy_core::primitives::aliases::U96;
use alloy_core::primitives::{Address, Bytes, I256, U256};
use alloy_core::sol_types::{SolCall, SolEvent};
use anyhow::{Context, Result};

pub use bindings::{IFundMe, ILottery, IPriceFeedMock, ISimpleStorage, IToken, IVRFCoordinatorV2Mock};

use crate::Wallet;
use crate::deployments::DeploymentRecord;
use crate::events::EventSubscription;
use crate::ledger::{Ledger, TxRequest};
use crate::pending::PendingOperation;

pub const SIMPLE_STORAGE: &str = "SimpleStorage";
pub const TOKEN: &str = "Token";
pub const FUND_ME: &str = "FundMe";
pub const LOTTERY: &str = "Lottery";
pub const PRICE_FEED_MOCK: &str = "MockV3Aggregator";
pub const VRF_COORDINATOR_MOCK: &str = "VRFCoordinatorV2Mock";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Contract not defined")]
    ContractNotDefined,
}

/// A deployed contract instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instance {
    pub address: Address,
}

/// An instance, possibly missing, and the ledger used to reach it.
#[derive(Debug, Clone)]
pub struct Target<L> {
    ledger: L,
    instance: Option<Instance>,
}

impl<L: Ledger> Target<L> {
    pub fn new(ledger: L, instance: Option<Instance>) -> Self {
        Self { ledger, instance }
    }

    pub fn attach(ledger: L, address: Address) -> Self {
        Self::new(ledger, Some(Instance { address }))
    }

    pub fn detached(ledger: L) -> Self {
        Self::new(ledger, None)
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn instance(&self) -> Option<Instance> {
        self.instance
    }

    /// The instance address. Checked before any ledger access.
    pub fn address(&self) -> Result<Address, ClientError> {
        self.instance
            .map(|i| i.address)
            .ok_or(ClientError::ContractNotDefined)
    }

    /// Same instance, signing as `wallet`.
    pub fn connect(&self, wallet: Wallet) -> Self {
        Self::new(self.ledger.connect(wallet), self.instance)
    }

    /// Same instance, reached through `ledger`.
    pub fn with_ledger(&self, ledger: L) -> Self {
        Self::new(ledger, self.instance)
    }

    /// Execute `call` without changing state.
    pub async fn call<C: SolCall>(&self, call: &C) -> Result<C::Return> {
        let address = self.address()?;
        let output = self
            .ledger
            .call(TxRequest::call(address, call.abi_encode()))
            .await
            .with_context(|| format!("Call to {} failed", C::SIGNATURE))?;
        C::abi_decode_returns(&output, true)
            .with_context(|| format!("Failed to decode {} output", C::SIGNATURE))
    }

    /// Submit `call` with `value` attached.
    pub async fn send<C: SolCall>(&self, call: &C, value: U256) -> Result<PendingOperation<L>> {
        let address = self.address()?;
        let hash = self
            .ledger
            .send(TxRequest::call(address, call.abi_encode()).with_value(value))
            .await
            .with_context(|| format!("Failed to send {}", C::SIGNATURE))?;
        tracing::debug!(function = C::SIGNATURE, address = %address, tx_hash = %hash, "Submitted");
        Ok(PendingOperation::new(self.ledger.clone(), hash))
    }

    /// Native balance held by the instance.
    pub async fn balance(&self) -> Result<U256> {
        let address = self.address()?;
        self.ledger.balance(address).await
    }

    /// Watch the instance for its next `E`, starting after the current head.
    pub async fn subscribe<E: SolEvent + Send + 'static>(&self) -> Result<EventSubscription<E>> {
        let address = self.address()?;
        EventSubscription::subscribe(self.ledger.clone(), address).await
    }
}

/// Construction shared by every typed client.
pub trait ContractClient<L: Ledger>: Sized {
    fn from_target(target: Target<L>) -> Self;

    fn target(&self) -> &Target<L>;

    fn attach(ledger: L, address: Address) -> Self {
        Self::from_target(Target::attach(ledger, address))
    }

    fn from_record(ledger: L, record: &DeploymentRecord) -> Self {
        Self::attach(ledger, record.address)
    }

    /// A client with no instance: every operation fails with
    /// [`ClientError::ContractNotDefined`].
    fn detached(ledger: L) -> Self {
        Self::from_target(Target::detached(ledger))
    }

    fn connect(&self, wallet: Wallet) -> Self {
        Self::from_target(self.target().connect(wallet))
    }

    fn with_ledger(&self, ledger: L) -> Self {
        Self::from_target(self.target().with_ledger(ledger))
    }

    fn address(&self) -> Result<Address, ClientError> {
        self.target().address()
    }
}

macro_rules! client {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name<L> {
            target: Target<L>,
        }

        impl<L: Ledger> ContractClient<L> for $name<L> {
            fn from_target(target: Target<L>) -> Self {
                Self { target }
            }

            fn target(&self) -> &Target<L> {
                &self.target
            }
        }
    };
}

client!(
    /// Favorite number storage with a person registry.
    SimpleStorage
);
client!(Token);
client!(
    /// Donation treasury priced through an ETH/USD feed.
    FundMe
);
client!(
    /// Randomized draw with automated upkeep.
    Lottery
);
client!(PriceFeedMock);
client!(VrfCoordinatorMock);

/// An entry of the storage person registry.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("{name},{favorite_number}")]
pub struct Person {
    pub name: String,
    pub favorite_number: U256,
}

impl<L: Ledger> SimpleStorage<L> {
    pub async fn retrieve_fave_number(&self) -> Result<U256> {
        Ok(self
            .target
            .call(&ISimpleStorage::retrieve_fave_numberCall {})
            .await?
            ._0)
    }

    pub async fn store(&self, favorite_number: U256) -> Result<PendingOperation<L>> {
        self.target
            .send(
                &ISimpleStorage::storeCall {
                    favoriteNumber: favorite_number,
                },
                U256::ZERO,
            )
            .await
    }

    pub async fn add_person_memory(
        &self,
        name: &str,
        favorite_number: U256,
    ) -> Result<PendingOperation<L>> {
        let person = ISimpleStorage::Person {
            name: name.to_string(),
            favoriteNumber: favorite_number,
        };
        self.target
            .send(&ISimpleStorage::addPersonMemoryCall { person }, U256::ZERO)
            .await
    }

    pub async fn add_person_calldata(
        &self,
        name: &str,
        favorite_number: U256,
    ) -> Result<PendingOperation<L>> {
        let person = ISimpleStorage::Person {
            name: name.to_string(),
            favoriteNumber: favorite_number,
        };
        self.target
            .send(&ISimpleStorage::addPersonCalldataCall { person }, U256::ZERO)
            .await
    }

    /// The person registered at `index`. Out of range indices revert.
    pub async fn person(&self, index: U256) -> Result<Person> {
        let entry = self
            .target
            .call(&ISimpleStorage::peopleCall { index })
            .await?;
        Ok(Person {
            name: entry.name,
            favorite_number: entry.favoriteNumber,
        })
    }

    /// Zero for names never registered.
    pub async fn favorite_number_of(&self, name: &str) -> Result<U256> {
        Ok(self
            .target
            .call(&ISimpleStorage::nameToFavoriteNumberCall {
                name: name.to_string(),
            })
            .await?
            ._0)
    }
}

impl<L: Ledger> Token<L> {
    pub async fn total_supply(&self) -> Result<U256> {
        Ok(self.target.call(&IToken::totalSupplyCall {}).await?._0)
    }

    pub async fn owner(&self) -> Result<Address> {
        Ok(self.target.call(&IToken::ownerCall {}).await?._0)
    }

    pub async fn balance_of(&self, account: Address) -> Result<U256> {
        Ok(self
            .target
            .call(&IToken::balanceOfCall { account })
            .await?
            ._0)
    }

    pub async fn transfer(&self, to: Address, amount: U256) -> Result<PendingOperation<L>> {
        self.target
            .send(&IToken::transferCall { to, amount }, U256::ZERO)
            .await
    }
}

impl<L: Ledger> FundMe<L> {
    pub async fn fund(&self, value: U256) -> Result<PendingOperation<L>> {
        self.target.send(&IFundMe::fundCall {}, value).await
    }

    /// Owner only: sends the whole balance to the owner and resets donations.
    pub async fn withdraw(&self) -> Result<PendingOperation<L>> {
        self.target.send(&IFundMe::withdrawCall {}, U256::ZERO).await
    }

    pub async fn cheaper_withdraw(&self) -> Result<PendingOperation<L>> {
        self.target
            .send(&IFundMe::cheaperWithdrawCall {}, U256::ZERO)
            .await
    }

    pub async fn donations_of(&self, funder: Address) -> Result<U256> {
        Ok(self
            .target
            .call(&IFundMe::getAddressToDonationsCall { funder })
            .await?
            ._0)
    }

    pub async fn funder(&self, index: U256) -> Result<Address> {
        Ok(self.target.call(&IFundMe::fundersCall { index }).await?._0)
    }

    pub async fn owner(&self) -> Result<Address> {
        Ok(self.target.call(&IFundMe::getOwnerCall {}).await?._0)
    }

    pub async fn price_feed(&self) -> Result<Address> {
        Ok(self.target.call(&IFundMe::priceFeedCall {}).await?._0)
    }

    pub async fn balance(&self) -> Result<U256> {
        self.target.balance().await
    }
}

/// Whether the lottery accepts entries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::FromRepr,
)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum LotteryState {
    Open = 0,
    Calculating = 1,
}

impl<L: Ledger> Lottery<L> {
    pub async fn enter(&self, value: U256) -> Result<PendingOperation<L>> {
        self.target.send(&ILottery::enterLotteryCall {}, value).await
    }

    /// Subscribe to the next `WinnerPicked`. Subscribe before entering so the
    /// draw cannot be missed.
    pub async fn watch_winner(&self) -> Result<EventSubscription<ILottery::WinnerPicked>> {
        self.target.subscribe().await
    }

    pub async fn entrance_fee(&self) -> Result<U256> {
        Ok(self.target.call(&ILottery::getEntranceFeeCall {}).await?._0)
    }

    pub async fn interval(&self) -> Result<U256> {
        Ok(self.target.call(&ILottery::getIntervalCall {}).await?._0)
    }

    pub async fn state(&self) -> Result<LotteryState> {
        let raw = self.target.call(&ILottery::getLotteryStateCall {}).await?._0;
        LotteryState::from_repr(raw).with_context(|| format!("Unknown lottery state {}", raw))
    }

    pub async fn player(&self, index: U256) -> Result<Address> {
        Ok(self
            .target
            .call(&ILottery::getPlayerCall { index })
            .await?
            ._0)
    }

    pub async fn number_of_players(&self) -> Result<U256> {
        Ok(self
            .target
            .call(&ILottery::getNumberOfPlayersCall {})
            .await?
            ._0)
    }

    pub async fn winner(&self) -> Result<Address> {
        Ok(self.target.call(&ILottery::getWinnerCall {}).await?._0)
    }

    /// Time of the last draw.
    pub async fn timestamp(&self) -> Result<U256> {
        Ok(self.target.call(&ILottery::getTimestampCall {}).await?._0)
    }

    pub async fn check_upkeep(&self) -> Result<bool> {
        Ok(self
            .target
            .call(&ILottery::checkUpkeepCall {
                performData: Bytes::new(),
            })
            .await?
            .upkeepNeeded)
    }

    /// Close entries and request randomness. Reverts unless upkeep is needed.
    pub async fn perform_upkeep(&self) -> Result<PendingOperation<L>> {
        self.target
            .send(
                &ILottery::performUpkeepCall {
                    performData: Bytes::new(),
                },
                U256::ZERO,
            )
            .await
    }
}

impl<L: Ledger> PriceFeedMock<L> {
    pub async fn decimals(&self) -> Result<u8> {
        Ok(self.target.call(&IPriceFeedMock::decimalsCall {}).await?._0)
    }

    pub async fn latest_answer(&self) -> Result<I256> {
        Ok(self
            .target
            .call(&IPriceFeedMock::latestAnswerCall {})
            .await?
            ._0)
    }
}

impl<L: Ledger> VrfCoordinatorMock<L> {
    /// The id is reported by the `SubscriptionCreated` event of the receipt.
    pub async fn create_subscription(&self) -> Result<PendingOperation<L>> {
        self.target
            .send(&IVRFCoordinatorV2Mock::createSubscriptionCall {}, U256::ZERO)
            .await
    }

    pub async fn fund_subscription(&self, sub_id: u64, amount: U96) -> Result<PendingOperation<L>> {
        self.target
            .send(
                &IVRFCoordinatorV2Mock::fundSubscriptionCall {
                    subId: sub_id,
                    amount,
                },
                U256::ZERO,
            )
            .await
    }

    /// Deliver randomness for `request_id` to `consumer`.
    pub async fn fulfill_random_words(
        &self,
        request_id: U256,
        consumer: Address,
    ) -> Result<PendingOperation<L>> {
        self.target
            .send(
                &IVRFCoordinatorV2Mock::fulfillRandomWordsCall {
                    requestId: request_id,
                    consumer,
                },
                U256::ZERO,
            )
            .await
    }
}
