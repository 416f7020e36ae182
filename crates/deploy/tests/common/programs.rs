//! Native programs mirroring the behavior of the deployed contracts.

use std::collections::HashMap;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_core::primitives::aliases::U96;
use alloy_core::primitives::{Address, B256, Bytes, I256, U256, keccak256};
use alloy_core::sol_types::{SolCall, SolInterface, SolValue};
use ledgerlab_deploy::DevLedger;
use ledgerlab_deploy::contracts::{
    FUND_ME, IFundMe, ILottery, IPriceFeedMock, ISimpleStorage, IToken, IVRFCoordinatorV2Mock,
    LOTTERY, PRICE_FEED_MOCK, SIMPLE_STORAGE, TOKEN, VRF_COORDINATOR_MOCK,
};
use ledgerlab_deploy::ledger::{ExecContext, Program, Revert};

use super::bytecode;

/// Tokens minted to the deployer.
pub const TOKEN_SUPPLY: u64 = 1_000_000;

/// Minimum donation, 50 USD with 18 decimals.
const MINIMUM_USD: u128 = 50 * 10u128.pow(18);

pub fn register_all(ledger: &DevLedger) {
    ledger.register_program(bytecode(PRICE_FEED_MOCK), new_price_feed);
    ledger.register_program(bytecode(VRF_COORDINATOR_MOCK), new_vrf_coordinator);
    ledger.register_program(bytecode(FUND_ME), new_fund_me);
    ledger.register_program(bytecode(LOTTERY), new_lottery);
    ledger.register_program(bytecode(SIMPLE_STORAGE), new_simple_storage);
    ledger.register_program(bytecode(TOKEN), new_token);
}

fn constructor_args(types: &[&str], args: &[u8]) -> Result<Vec<DynSolValue>, Revert> {
    let types = types
        .iter()
        .map(|ty| DynSolType::parse(ty))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Revert::new(e.to_string()))?;
    match DynSolType::Tuple(types).abi_decode_params(args) {
        Ok(DynSolValue::Tuple(values)) => Ok(values),
        Ok(_) => Err(Revert::new("constructor arguments are not a tuple")),
        Err(e) => Err(Revert::new(e.to_string())),
    }
}

fn uint(value: &DynSolValue) -> U256 {
    value.as_uint().map(|(v, _)| v).unwrap_or_default()
}

fn address(value: &DynSolValue) -> Address {
    value.as_address().unwrap_or_default()
}

#[derive(Clone)]
struct PriceFeed {
    decimals: u8,
    answer: I256,
}

fn new_price_feed(_: &mut ExecContext<'_>, args: &[u8]) -> Result<Box<dyn Program>, Revert> {
    let args = constructor_args(&["uint8", "int256"], args)?;
    Ok(Box::new(PriceFeed {
        decimals: uint(&args[0]).to::<u8>(),
        answer: args[1].as_int().map(|(v, _)| v).unwrap_or_default(),
    }))
}

impl Program for PriceFeed {
    fn execute(&mut self, _: &mut ExecContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        use IPriceFeedMock::IPriceFeedMockCalls as Calls;
        match Calls::abi_decode(input, true)? {
            Calls::decimals(_) => Ok(IPriceFeedMock::decimalsCall::abi_encode_returns(&(
                self.decimals,
            ))),
            Calls::latestAnswer(_) => Ok(IPriceFeedMock::latestAnswerCall::abi_encode_returns(
                &(self.answer,),
            )),
            Calls::updateAnswer(call) => {
                self.answer = call.answer;
                Ok(Vec::new())
            }
        }
    }

    fn box_clone(&self) -> Box<dyn Program> {
        Box::new(self.clone())
    }
}

#[derive(Clone)]
struct RandomnessRequest {
    sub_id: u64,
    num_words: u32,
}

#[derive(Clone)]
struct VrfCoordinator {
    base_fee: U256,
    next_sub_id: u64,
    next_request_id: U256,
    subscriptions: HashMap<u64, U256>,
    requests: HashMap<U256, RandomnessRequest>,
}

fn new_vrf_coordinator(_: &mut ExecContext<'_>, args: &[u8]) -> Result<Box<dyn Program>, Revert> {
    let args = constructor_args(&["uint96", "uint96"], args)?;
    Ok(Box::new(VrfCoordinator {
        base_fee: uint(&args[0]),
        next_sub_id: 1,
        next_request_id: U256::from(1),
        subscriptions: HashMap::new(),
        requests: HashMap::new(),
    }))
}

impl Program for VrfCoordinator {
    fn execute(&mut self, ctx: &mut ExecContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        use IVRFCoordinatorV2Mock::IVRFCoordinatorV2MockCalls as Calls;
        match Calls::abi_decode(input, true)? {
            Calls::createSubscription(_) => {
                let sub_id = self.next_sub_id;
                self.next_sub_id += 1;
                self.subscriptions.insert(sub_id, U256::ZERO);
                ctx.emit(&IVRFCoordinatorV2Mock::SubscriptionCreated {
                    subId: sub_id,
                    owner: ctx.caller(),
                });
                Ok(IVRFCoordinatorV2Mock::createSubscriptionCall::abi_encode_returns(&(sub_id,)))
            }
            Calls::fundSubscription(call) => {
                let balance = self
                    .subscriptions
                    .get_mut(&call.subId)
                    .ok_or_else(|| Revert::new("InvalidSubscription"))?;
                let old_balance = *balance;
                *balance += U256::from(call.amount);
                let new_balance = *balance;
                ctx.emit(&IVRFCoordinatorV2Mock::SubscriptionFunded {
                    subId: call.subId,
                    oldBalance: old_balance,
                    newBalance: new_balance,
                });
                Ok(Vec::new())
            }
            Calls::requestRandomWords(call) => {
                Revert::require(
                    self.subscriptions.contains_key(&call.subId),
                    "InvalidSubscription",
                )?;
                let request_id = self.next_request_id;
                self.next_request_id += U256::from(1);
                self.requests.insert(
                    request_id,
                    RandomnessRequest {
                        sub_id: call.subId,
                        num_words: call.numWords,
                    },
                );
                ctx.emit(&IVRFCoordinatorV2Mock::RandomWordsRequested {
                    keyHash: call.keyHash,
                    requestId: request_id,
                    preSeed: request_id,
                    subId: call.subId,
                    minimumRequestConfirmations: call.minimumRequestConfirmations,
                    callbackGasLimit: call.callbackGasLimit,
                    numWords: call.numWords,
                    sender: ctx.caller(),
                });
                Ok(IVRFCoordinatorV2Mock::requestRandomWordsCall::abi_encode_returns(&(
                    request_id,
                )))
            }
            Calls::fulfillRandomWords(call) => {
                let request = self
                    .requests
                    .remove(&call.requestId)
                    .ok_or_else(|| Revert::new("nonexistent request"))?;

                let words = (0..request.num_words)
                    .map(|i| {
                        let seed = keccak256((call.requestId, U256::from(i)).abi_encode());
                        U256::from_be_bytes(seed.0)
                    })
                    .collect();
                ctx.call(
                    call.consumer,
                    U256::ZERO,
                    &ILottery::rawFulfillRandomWordsCall {
                        requestId: call.requestId,
                        randomWords: words,
                    },
                )?;

                let balance = self
                    .subscriptions
                    .get_mut(&request.sub_id)
                    .ok_or_else(|| Revert::new("InvalidSubscription"))?;
                Revert::require(*balance >= self.base_fee, "InsufficientBalance")?;
                *balance -= self.base_fee;

                ctx.emit(&IVRFCoordinatorV2Mock::RandomWordsFulfilled {
                    requestId: call.requestId,
                    outputSeed: call.requestId,
                    payment: U96::from(self.base_fee),
                    success: true,
                });
                Ok(Vec::new())
            }
        }
    }

    fn box_clone(&self) -> Box<dyn Program> {
        Box::new(self.clone())
    }
}

#[derive(Clone)]
struct FundMe {
    owner: Address,
    price_feed: Address,
    funders: Vec<Address>,
    donations: HashMap<Address, U256>,
}

fn new_fund_me(ctx: &mut ExecContext<'_>, args: &[u8]) -> Result<Box<dyn Program>, Revert> {
    let args = constructor_args(&["address"], args)?;
    Ok(Box::new(FundMe {
        owner: ctx.caller(),
        price_feed: address(&args[0]),
        funders: Vec::new(),
        donations: HashMap::new(),
    }))
}

impl FundMe {
    fn fund(&mut self, ctx: &mut ExecContext<'_>) -> Result<Vec<u8>, Revert> {
        let answer = ctx
            .call(self.price_feed, U256::ZERO, &IPriceFeedMock::latestAnswerCall {})?
            ._0;
        let price = answer.into_raw() * U256::from(10u64.pow(10));
        let usd = price * ctx.value() / U256::from(10u64.pow(18));
        Revert::require(usd >= U256::from(MINIMUM_USD), "Must send at least $50 in ETH")?;

        *self.donations.entry(ctx.caller()).or_default() += ctx.value();
        self.funders.push(ctx.caller());
        Ok(Vec::new())
    }

    fn withdraw(&mut self, ctx: &mut ExecContext<'_>) -> Result<Vec<u8>, Revert> {
        Revert::require(ctx.caller() == self.owner, "FundMe__Unauthorized")?;
        for funder in self.funders.drain(..) {
            self.donations.insert(funder, U256::ZERO);
        }
        let balance = ctx.self_balance();
        ctx.transfer(self.owner, balance)?;
        Ok(Vec::new())
    }
}

impl Program for FundMe {
    fn execute(&mut self, ctx: &mut ExecContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        use IFundMe::IFundMeCalls as Calls;
        if input.is_empty() {
            return self.fund(ctx);
        }
        let Ok(call) = Calls::abi_decode(input, true) else {
            return Err(Revert::new("You called fallback"));
        };

        match call {
            Calls::fund(_) => self.fund(ctx),
            Calls::withdraw(_) | Calls::cheaperWithdraw(_) => self.withdraw(ctx),
            Calls::getAddressToDonations(call) => {
                let amount = self.donations.get(&call.funder).copied().unwrap_or_default();
                Ok(IFundMe::getAddressToDonationsCall::abi_encode_returns(&(amount,)))
            }
            Calls::funders(call) => {
                let funder = self
                    .funders
                    .get(call.index.to::<usize>())
                    .ok_or_else(|| Revert::new("index out of bounds"))?;
                Ok(IFundMe::fundersCall::abi_encode_returns(&(*funder,)))
            }
            Calls::getOwner(_) => Ok(IFundMe::getOwnerCall::abi_encode_returns(&(self.owner,))),
            Calls::priceFeed(_) => Ok(IFundMe::priceFeedCall::abi_encode_returns(&(
                self.price_feed,
            ))),
        }
    }

    fn box_clone(&self) -> Box<dyn Program> {
        Box::new(self.clone())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum DrawState {
    Open = 0,
    Calculating = 1,
}

#[derive(Clone)]
struct Lottery {
    coordinator: Address,
    entrance_fee: U256,
    gas_lane: B256,
    subscription_id: u64,
    callback_gas_limit: u32,
    interval: U256,
    players: Vec<Address>,
    state: DrawState,
    last_timestamp: U256,
    winner: Address,
}

fn new_lottery(ctx: &mut ExecContext<'_>, args: &[u8]) -> Result<Box<dyn Program>, Revert> {
    let args = constructor_args(
        &["address", "uint256", "bytes32", "uint64", "uint32", "uint256"],
        args,
    )?;
    let gas_lane = args[2]
        .as_fixed_bytes()
        .map(|(word, _)| B256::from_slice(word))
        .unwrap_or_default();
    Ok(Box::new(Lottery {
        coordinator: address(&args[0]),
        entrance_fee: uint(&args[1]),
        gas_lane,
        subscription_id: uint(&args[3]).to::<u64>(),
        callback_gas_limit: uint(&args[4]).to::<u32>(),
        interval: uint(&args[5]),
        players: Vec::new(),
        state: DrawState::Open,
        last_timestamp: U256::from(ctx.timestamp()),
        winner: Address::ZERO,
    }))
}

impl Lottery {
    fn upkeep_needed(&self, ctx: &ExecContext<'_>) -> bool {
        let elapsed = U256::from(ctx.timestamp()).saturating_sub(self.last_timestamp);
        self.state == DrawState::Open
            && elapsed > self.interval
            && !self.players.is_empty()
            && ctx.self_balance() > U256::ZERO
    }
}

impl Program for Lottery {
    fn execute(&mut self, ctx: &mut ExecContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        use ILottery::ILotteryCalls as Calls;
        match Calls::abi_decode(input, true)? {
            Calls::enterLottery(_) => {
                Revert::require(
                    ctx.value() >= self.entrance_fee,
                    "Lottery__InsufficientFundsForEntrace",
                )?;
                Revert::require(self.state == DrawState::Open, "Lottery__NotOpen")?;
                self.players.push(ctx.caller());
                ctx.emit(&ILottery::LotteryEnter {
                    player: ctx.caller(),
                });
                Ok(Vec::new())
            }
            Calls::checkUpkeep(_) => Ok(ILottery::checkUpkeepCall::abi_encode_returns(&(
                self.upkeep_needed(ctx),
                Bytes::new(),
            ))),
            Calls::performUpkeep(_) => {
                Revert::require(self.upkeep_needed(ctx), "Lottery__UpkeepNotNeeded")?;
                self.state = DrawState::Calculating;
                let request_id = ctx
                    .call(
                        self.coordinator,
                        U256::ZERO,
                        &IVRFCoordinatorV2Mock::requestRandomWordsCall {
                            keyHash: self.gas_lane,
                            subId: self.subscription_id,
                            minimumRequestConfirmations: 3,
                            callbackGasLimit: self.callback_gas_limit,
                            numWords: 1,
                        },
                    )?
                    .requestId;
                ctx.emit(&ILottery::RequestedLotteryWinner {
                    requestId: request_id,
                });
                Ok(Vec::new())
            }
            Calls::rawFulfillRandomWords(call) => {
                Revert::require(
                    ctx.caller() == self.coordinator,
                    "OnlyCoordinatorCanFulfill",
                )?;
                let word = call
                    .randomWords
                    .first()
                    .copied()
                    .ok_or_else(|| Revert::new("no random words"))?;
                Revert::require(!self.players.is_empty(), "no players")?;

                let index = (word % U256::from(self.players.len())).to::<usize>();
                let winner = self.players[index];
                self.winner = winner;
                self.state = DrawState::Open;
                self.players.clear();
                self.last_timestamp = U256::from(ctx.timestamp());

                let prize = ctx.self_balance();
                ctx.transfer(winner, prize)
                    .map_err(|_| Revert::new("Lottery__TransferFailed"))?;
                ctx.emit(&ILottery::WinnerPicked { winner });
                Ok(Vec::new())
            }
            Calls::getEntranceFee(_) => Ok(ILottery::getEntranceFeeCall::abi_encode_returns(&(
                self.entrance_fee,
            ))),
            Calls::getInterval(_) => Ok(ILottery::getIntervalCall::abi_encode_returns(&(
                self.interval,
            ))),
            Calls::getLotteryState(_) => Ok(ILottery::getLotteryStateCall::abi_encode_returns(
                &(self.state as u8,),
            )),
            Calls::getPlayer(call) => {
                let player = self
                    .players
                    .get(call.index.to::<usize>())
                    .ok_or_else(|| Revert::new("index out of bounds"))?;
                Ok(ILottery::getPlayerCall::abi_encode_returns(&(*player,)))
            }
            Calls::getNumberOfPlayers(_) => Ok(
                ILottery::getNumberOfPlayersCall::abi_encode_returns(&(U256::from(
                    self.players.len(),
                ),)),
            ),
            Calls::getWinner(_) => Ok(ILottery::getWinnerCall::abi_encode_returns(&(self.winner,))),
            Calls::getTimestamp(_) => Ok(ILottery::getTimestampCall::abi_encode_returns(&(
                self.last_timestamp,
            ))),
        }
    }

    fn box_clone(&self) -> Box<dyn Program> {
        Box::new(self.clone())
    }
}

#[derive(Clone, Default)]
struct SimpleStorage {
    favorite_number: U256,
    people: Vec<(String, U256)>,
    name_to_number: HashMap<String, U256>,
}

fn new_simple_storage(_: &mut ExecContext<'_>, _: &[u8]) -> Result<Box<dyn Program>, Revert> {
    Ok(Box::new(SimpleStorage::default()))
}

impl SimpleStorage {
    fn add(&mut self, person: ISimpleStorage::Person) -> Result<Vec<u8>, Revert> {
        self.name_to_number
            .insert(person.name.clone(), person.favoriteNumber);
        self.people.push((person.name, person.favoriteNumber));
        Ok(Vec::new())
    }
}

impl Program for SimpleStorage {
    fn execute(&mut self, _: &mut ExecContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        use ISimpleStorage::ISimpleStorageCalls as Calls;
        match Calls::abi_decode(input, true)? {
            Calls::store(call) => {
                self.favorite_number = call.favoriteNumber;
                Ok(Vec::new())
            }
            Calls::retrieve_fave_number(_) => Ok(
                ISimpleStorage::retrieve_fave_numberCall::abi_encode_returns(&(
                    self.favorite_number,
                )),
            ),
            Calls::addPersonMemory(call) => self.add(call.person),
            Calls::addPersonCalldata(call) => self.add(call.person),
            Calls::people(call) => {
                let (name, number) = self
                    .people
                    .get(call.index.to::<usize>())
                    .cloned()
                    .ok_or_else(|| Revert::new("index out of bounds"))?;
                Ok(ISimpleStorage::peopleCall::abi_encode_returns(&(name, number)))
            }
            Calls::nameToFavoriteNumber(call) => {
                let number = self.name_to_number.get(&call.name).copied().unwrap_or_default();
                Ok(ISimpleStorage::nameToFavoriteNumberCall::abi_encode_returns(&(number,)))
            }
        }
    }

    fn box_clone(&self) -> Box<dyn Program> {
        Box::new(self.clone())
    }
}

#[derive(Clone)]
struct Token {
    owner: Address,
    balances: HashMap<Address, U256>,
}

fn new_token(ctx: &mut ExecContext<'_>, _: &[u8]) -> Result<Box<dyn Program>, Revert> {
    let owner = ctx.caller();
    Ok(Box::new(Token {
        owner,
        balances: HashMap::from([(owner, U256::from(TOKEN_SUPPLY))]),
    }))
}

impl Program for Token {
    fn execute(&mut self, ctx: &mut ExecContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        use IToken::ITokenCalls as Calls;
        match Calls::abi_decode(input, true)? {
            Calls::totalSupply(_) => Ok(IToken::totalSupplyCall::abi_encode_returns(&(U256::from(
                TOKEN_SUPPLY,
            ),))),
            Calls::owner(_) => Ok(IToken::ownerCall::abi_encode_returns(&(self.owner,))),
            Calls::balanceOf(call) => {
                let balance = self.balances.get(&call.account).copied().unwrap_or_default();
                Ok(IToken::balanceOfCall::abi_encode_returns(&(balance,)))
            }
            Calls::transfer(call) => {
                let from = self.balances.entry(ctx.caller()).or_default();
                Revert::require(*from >= call.amount, "Not enough tokens to transfer")?;
                *from -= call.amount;
                *self.balances.entry(call.to).or_default() += call.amount;
                Ok(Vec::new())
            }
        }
    }

    fn box_clone(&self) -> Box<dyn Program> {
        Box::new(self.clone())
    }
}
