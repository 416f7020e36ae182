//! In-process ephemeral chain.
//!
//! Contracts are stood in for by native [`Program`]s registered against their
//! creation bytecode. Every accepted request is mined into its own block; a
//! request that reverts leaves no trace and is rejected at submission, the way
//! local development nodes behave.

use std::collections::HashMap;
use std::future::{Future, ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_core::primitives::{Address, B256, Bytes, LogData, U256, address, keccak256};
use alloy_core::sol_types::{SolCall, SolEvent};
use anyhow::Result;

use super::{DevControls, Ledger, LedgerError, Log, LogFilter, Receipt, TxRequest};
use crate::Wallet;
use crate::network::DEV_CHAIN_ID;

/// Accounts funded at genesis, derived from the development mnemonic.
const DEV_ADDRESSES: [Address; 10] = [
    address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
    address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
    address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"),
    address!("90F79bf6EB2c4f870365E785982E1f101E93b906"),
    address!("15d34AAf54267DB7D7c367839AAf71A00a2C6A65"),
    address!("9965507D1a55bcC2695C58ba16FB37d819B0A4dc"),
    address!("976EA74026E726554dB657fA54763abd0C3a0aa9"),
    address!("14dC79964da2C08b23698B3D3cc7Ca32193d9955"),
    address!("23618e81E3f5cdF7f54C3d65f7FBc0aBf5B21E8f"),
    address!("a0Ee7A142d267C1f36714E4a8F75612F20a79720"),
];

/// 10000 ether.
const DEV_BALANCE: u128 = 10_000 * 10u128.pow(18);

/// Flat gas charged per request, plus calldata.
const BASE_GAS: u64 = 21_000;

/// Reason an execution was aborted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Revert(pub String);

impl Revert {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// `Err(Revert(reason))` unless `condition` holds.
    pub fn require(condition: bool, reason: &str) -> Result<(), Revert> {
        if condition {
            Ok(())
        } else {
            Err(Self::new(reason))
        }
    }
}

impl From<alloy_core::sol_types::Error> for Revert {
    fn from(err: alloy_core::sol_types::Error) -> Self {
        Self(format!("invalid calldata: {}", err))
    }
}

/// Native stand-in for a deployed contract.
pub trait Program: Send + Sync + 'static {
    /// Handle a message. Empty `input` is a plain value transfer.
    fn execute(&mut self, ctx: &mut ExecContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert>;

    fn box_clone(&self) -> Box<dyn Program>;
}

impl Clone for Box<dyn Program> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

type ProgramFactory =
    Arc<dyn Fn(&mut ExecContext<'_>, &[u8]) -> Result<Box<dyn Program>, Revert> + Send + Sync>;

#[derive(Clone, Default)]
struct Account {
    balance: U256,
    nonce: u64,
    code: Bytes,
    program: Option<Box<dyn Program>>,
}

#[derive(Clone, Default)]
struct World {
    accounts: HashMap<Address, Account>,
}

impl World {
    fn balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    fn move_value(&mut self, from: Address, to: Address, amount: U256) -> Result<(), Revert> {
        if amount.is_zero() {
            return Ok(());
        }
        let source = self.accounts.entry(from).or_default();
        if source.balance < amount {
            return Err(Revert::new("sender doesn't have enough funds to send tx"));
        }
        source.balance -= amount;
        self.accounts.entry(to).or_default().balance += amount;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockEnv {
    number: u64,
    timestamp: u64,
}

/// What a running program can see and do.
pub struct ExecContext<'a> {
    world: &'a mut World,
    block: BlockEnv,
    logs: &'a mut Vec<(Address, LogData)>,
    address: Address,
    caller: Address,
    value: U256,
}

impl ExecContext<'_> {
    /// Address of the executing program.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    /// Value attached to the current message, already credited.
    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn block_number(&self) -> u64 {
        self.block.number
    }

    pub fn timestamp(&self) -> u64 {
        self.block.timestamp
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.world.balance(&address)
    }

    pub fn self_balance(&self) -> U256 {
        self.world.balance(&self.address)
    }

    pub fn emit<E: SolEvent>(&mut self, event: &E) {
        self.logs.push((self.address, event.encode_log_data()));
    }

    /// Send value from the executing program to `to`.
    pub fn transfer(&mut self, to: Address, amount: U256) -> Result<(), Revert> {
        self.call_raw(to, amount, &[]).map(|_| ())
    }

    pub fn call_raw(&mut self, to: Address, value: U256, input: &[u8]) -> Result<Vec<u8>, Revert> {
        dispatch(
            &mut *self.world,
            self.block,
            &mut *self.logs,
            self.address,
            to,
            value,
            input,
        )
    }

    /// Call another program with typed arguments and returns.
    pub fn call<C: SolCall>(&mut self, to: Address, value: U256, call: &C) -> Result<C::Return, Revert> {
        let output = self.call_raw(to, value, &call.abi_encode())?;
        Ok(C::abi_decode_returns(&output, true)?)
    }
}

fn dispatch(
    world: &mut World,
    block: BlockEnv,
    logs: &mut Vec<(Address, LogData)>,
    caller: Address,
    to: Address,
    value: U256,
    input: &[u8],
) -> Result<Vec<u8>, Revert> {
    world.move_value(caller, to, value)?;

    // the running program is taken out of its account for the duration of the call
    let Some(mut program) = world.accounts.get_mut(&to).and_then(|a| a.program.take()) else {
        return Ok(Vec::new());
    };

    let result = program.execute(
        &mut ExecContext {
            world: &mut *world,
            block,
            logs: &mut *logs,
            address: to,
            caller,
            value,
        },
        input,
    );

    if let Some(account) = world.accounts.get_mut(&to) {
        account.program = Some(program);
    }
    result
}

#[allow(clippy::too_many_arguments)]
fn create(
    world: &mut World,
    factories: &[(Bytes, ProgramFactory)],
    block: BlockEnv,
    logs: &mut Vec<(Address, LogData)>,
    caller: Address,
    nonce: u64,
    value: U256,
    init: &[u8],
) -> Result<Address, Revert> {
    let (code, factory) = factories
        .iter()
        .filter(|(code, _)| init.starts_with(code))
        .max_by_key(|(code, _)| code.len())
        .ok_or_else(|| Revert::new("no program registered for creation bytecode"))?;

    let address = caller.create(nonce);
    world.move_value(caller, address, value)?;

    let program = factory(
        &mut ExecContext {
            world: &mut *world,
            block,
            logs: &mut *logs,
            address,
            caller,
            value,
        },
        &init[code.len()..],
    )?;

    let account = world.accounts.entry(address).or_default();
    account.code = code.clone();
    account.program = Some(program);
    Ok(address)
}

struct DevChain {
    chain_id: u64,
    world: World,
    head: BlockEnv,
    pending_time: u64,
    receipts: HashMap<B256, Receipt>,
    logs: Vec<Log>,
    factories: Vec<(Bytes, ProgramFactory)>,
}

impl DevChain {
    fn next_block(&self) -> BlockEnv {
        BlockEnv {
            number: self.head.number + 1,
            timestamp: self.head.timestamp + 1 + self.pending_time,
        }
    }

    fn seal(&mut self, block: BlockEnv) {
        self.head = block;
        self.pending_time = 0;
    }
}

/// An ephemeral chain living in this process. Clones share the same chain.
#[derive(Clone)]
pub struct DevLedger {
    inner: Arc<Mutex<DevChain>>,
    sender: Option<Address>,
    requests: Arc<AtomicUsize>,
}

impl std::fmt::Debug for DevLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevLedger")
            .field("sender", &self.sender)
            .field("requests", &self.requests())
            .finish_non_exhaustive()
    }
}

impl Default for DevLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DevLedger {
    /// A fresh chain with the development accounts funded, sending from the first.
    pub fn new() -> Self {
        let genesis_time = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();

        let accounts = DEV_ADDRESSES
            .iter()
            .map(|address| {
                let account = Account {
                    balance: U256::from(DEV_BALANCE),
                    ..Default::default()
                };
                (*address, account)
            })
            .collect();

        Self {
            inner: Arc::new(Mutex::new(DevChain {
                chain_id: DEV_CHAIN_ID,
                world: World { accounts },
                head: BlockEnv {
                    number: 0,
                    timestamp: genesis_time,
                },
                pending_time: 0,
                receipts: HashMap::new(),
                logs: Vec::new(),
                factories: Vec::new(),
            })),
            sender: Some(DEV_ADDRESSES[0]),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report `chain_id` instead of the development chain id.
    pub fn with_chain_id(self, chain_id: u64) -> Self {
        self.lock().chain_id = chain_id;
        self
    }

    /// The funded development accounts.
    pub fn accounts() -> &'static [Address] {
        &DEV_ADDRESSES
    }

    /// The same chain, sending from `address` without a key.
    pub fn impersonate(&self, address: Address) -> Self {
        Self {
            sender: Some(address),
            ..self.clone()
        }
    }

    /// Host `factory`'s programs at addresses created from `bytecode`. Bytes after
    /// the longest registered prefix are handed to the factory as constructor input.
    pub fn register_program<F>(&self, bytecode: impl Into<Bytes>, factory: F)
    where
        F: Fn(&mut ExecContext<'_>, &[u8]) -> Result<Box<dyn Program>, Revert> + Send + Sync + 'static,
    {
        self.lock().factories.push((bytecode.into(), Arc::new(factory)));
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.lock().world.accounts.entry(address).or_default().balance = balance;
    }

    /// Number of ledger requests served so far, across all clones.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, DevChain> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn served(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn call_now(&self, tx: TxRequest) -> Result<Bytes> {
        let chain = self.lock();
        let caller = tx.from.or(self.sender).unwrap_or_default();
        let block = chain.next_block();
        let mut world = chain.world.clone();
        let mut logs = Vec::new();

        let output = match tx.to {
            Some(to) => dispatch(&mut world, block, &mut logs, caller, to, tx.value, &tx.data),
            None => {
                let nonce = world.accounts.get(&caller).map(|a| a.nonce).unwrap_or_default();
                create(&mut world, &chain.factories, block, &mut logs, caller, nonce, tx.value, &tx.data)
                    .map(|_| Vec::new())
            }
        };

        output
            .map(Bytes::from)
            .map_err(|revert| LedgerError::Reverted(revert.0).into())
    }

    fn send_now(&self, tx: TxRequest) -> Result<B256> {
        let from = tx.from.or(self.sender).ok_or(LedgerError::NoSigner)?;
        let mut guard = self.lock();
        let chain = &mut *guard;

        let block = chain.next_block();
        let snapshot = chain.world.clone();
        let mut emitted = Vec::new();

        let sender = chain.world.accounts.entry(from).or_default();
        let nonce = sender.nonce;
        sender.nonce += 1;

        let outcome = match tx.to {
            Some(to) => dispatch(&mut chain.world, block, &mut emitted, from, to, tx.value, &tx.data)
                .map(|_| None),
            None => create(
                &mut chain.world,
                &chain.factories,
                block,
                &mut emitted,
                from,
                nonce,
                tx.value,
                &tx.data,
            )
            .map(Some),
        };

        let contract_address = match outcome {
            Ok(address) => address,
            Err(revert) => {
                chain.world = snapshot;
                tracing::debug!(from = %from, reason = %revert, "Request reverted");
                return Err(LedgerError::Reverted(revert.0).into());
            }
        };

        let hash = keccak256(
            [
                chain.chain_id.to_be_bytes().as_slice(),
                from.as_slice(),
                nonce.to_be_bytes().as_slice(),
            ]
            .concat(),
        );

        let logs: Vec<Log> = emitted
            .into_iter()
            .enumerate()
            .map(|(index, (address, data))| Log {
                address,
                topics: data.topics().to_vec(),
                data: data.data,
                block_number: block.number,
                transaction_hash: hash,
                log_index: index as u64,
            })
            .collect();
        chain.logs.extend(logs.iter().cloned());

        chain.receipts.insert(
            hash,
            Receipt {
                transaction_hash: hash,
                block_number: block.number,
                status: true,
                contract_address,
                gas_used: BASE_GAS + 16 * tx.data.len() as u64,
                effective_gas_price: 0,
                logs,
            },
        );
        chain.seal(block);

        tracing::trace!(tx_hash = %hash, block = block.number, from = %from, "Mined");
        Ok(hash)
    }
}

impl Ledger for DevLedger {
    fn sender(&self) -> Option<Address> {
        self.sender
    }

    fn connect(&self, wallet: Wallet) -> Self {
        self.impersonate(wallet.address())
    }

    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send {
        self.served();
        ready(Ok(self.lock().chain_id))
    }

    fn block_number(&self) -> impl Future<Output = Result<u64>> + Send {
        self.served();
        ready(Ok(self.lock().head.number))
    }

    fn balance(&self, address: Address) -> impl Future<Output = Result<U256>> + Send {
        self.served();
        ready(Ok(self.lock().world.balance(&address)))
    }

    fn code(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send {
        self.served();
        let code = self
            .lock()
            .world
            .accounts
            .get(&address)
            .map(|a| a.code.clone())
            .unwrap_or_default();
        ready(Ok(code))
    }

    fn call(&self, tx: TxRequest) -> impl Future<Output = Result<Bytes>> + Send {
        self.served();
        ready(self.call_now(tx))
    }

    fn send(&self, tx: TxRequest) -> impl Future<Output = Result<B256>> + Send {
        self.served();
        ready(self.send_now(tx))
    }

    fn receipt(&self, hash: B256) -> impl Future<Output = Result<Option<Receipt>>> + Send {
        self.served();
        ready(Ok(self.lock().receipts.get(&hash).cloned()))
    }

    fn logs(&self, filter: LogFilter) -> impl Future<Output = Result<Vec<Log>>> + Send {
        self.served();
        let logs = self
            .lock()
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect();
        ready(Ok(logs))
    }

    fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(10)
    }
}

impl DevControls for DevLedger {
    fn increase_time(&self, seconds: u64) -> impl Future<Output = Result<()>> + Send {
        self.lock().pending_time += seconds;
        ready(Ok(()))
    }

    fn mine(&self) -> impl Future<Output = Result<()>> + Send {
        let mut chain = self.lock();
        let block = chain.next_block();
        chain.seal(block);
        ready(Ok(()))
    }
}
