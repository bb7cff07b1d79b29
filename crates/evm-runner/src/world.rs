//! In-memory world state that remembers every account the interpreter asked for.
use std::{collections::BTreeSet, convert::Infallible};

use revm::{
    bytecode::Bytecode,
    database::{CacheDB, EmptyDB},
    database_interface::{Database, DatabaseCommit, DatabaseRef},
    primitives::{Address, B256, KECCAK_EMPTY, StorageKey, StorageValue, U256},
    state::{AccountInfo, EvmState},
};

#[derive(Debug, Default)]
pub struct WorldState {
    db: CacheDB<EmptyDB>,
    queried: BTreeSet<Address>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every address loaded by any execution so far, in ascending order.
    pub fn queried_accounts(&self) -> Vec<Address> {
        self.queried.iter().copied().collect()
    }

    pub fn account(&self, address: Address) -> Option<AccountInfo> {
        unwrap_infallible(self.db.basic_ref(address))
    }

    pub fn nonce(&self, address: Address) -> u64 {
        self.account(address).map_or(0, |info| info.nonce)
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.account(address).map_or(U256::ZERO, |info| info.balance)
    }

    /// Runtime code held by `address`, if any.
    pub fn code(&self, address: Address) -> Option<Bytecode> {
        let info = self.account(address)?;
        if info.code_hash == KECCAK_EMPTY {
            return None;
        }
        let code = match info.code {
            Some(code) => code,
            None => unwrap_infallible(self.db.code_by_hash_ref(info.code_hash)),
        };
        (!code.is_empty()).then_some(code)
    }

    pub fn has_code(&self, address: Address) -> bool {
        self.code(address).is_some()
    }

    pub fn storage(&self, address: Address, slot: StorageKey) -> StorageValue {
        unwrap_infallible(self.db.storage_ref(address, slot))
    }

    pub fn insert_account_info(&mut self, address: Address, info: AccountInfo) {
        self.db.insert_account_info(address, info);
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        let mut info = self.account(address).unwrap_or_default();
        info.balance = balance;
        self.insert_account_info(address, info);
    }

    /// Replaces the code at `address`, keeping balance, nonce and storage.
    /// Empty `code` leaves the account without code.
    pub fn set_code(&mut self, address: Address, code: Bytecode) {
        let mut info = self.account(address).unwrap_or_default();
        if code.is_empty() {
            info.code_hash = KECCAK_EMPTY;
            info.code = None;
        } else {
            info.code_hash = code.hash_slow();
            info.code = Some(code);
        }
        self.insert_account_info(address, info);
    }

    pub(crate) fn apply(&mut self, changes: EvmState) {
        self.db.commit(changes);
    }
}

impl Database for WorldState {
    type Error = Infallible;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        self.queried.insert(address);
        self.db.basic(address)
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.db.code_by_hash(code_hash)
    }

    fn storage(&mut self, address: Address, index: StorageKey) -> Result<StorageValue, Self::Error> {
        self.db.storage(address, index)
    }

    fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error> {
        self.db.block_hash(number)
    }
}

fn unwrap_infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}
