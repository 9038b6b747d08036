//! Transactional key-value store for pools and token balances
//!
//! Every engine operation runs inside a [`Transaction`]: it mutates a staged
//! copy of the state and only [`Transaction::commit`] publishes it. Dropping a
//! transaction without committing discards every change.

use crate::error::{DlmmError, Result};
use crate::state::{Account, PoolId, PoolState};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Fungible balances per `(owner, token)`.
///
/// Stands in for the external token bookkeeping: credit, debit, read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Balances {
    entries: BTreeMap<(Account, String), u128>,
}

impl Balances {
    /// Balance of `owner` in `token`.
    pub fn get(&self, owner: &str, token: &str) -> u128 {
        self.entries.get(&(owner.to_string(), token.to_string())).copied().unwrap_or(0)
    }

    /// Adds `amount`.
    pub fn credit(&mut self, owner: &str, token: &str, amount: u128) -> Result<()> {
        let slot = self.entries.entry((owner.to_string(), token.to_string())).or_insert(0);
        *slot = slot.checked_add(amount).ok_or(DlmmError::MathOverflow)?;
        Ok(())
    }

    /// Removes `amount`, refusing to go negative.
    pub fn debit(&mut self, owner: &str, token: &str, amount: u128) -> Result<()> {
        let available = self.get(owner, token);
        let left = available
            .checked_sub(amount)
            .ok_or(DlmmError::InsufficientBalance { available, required: amount })?;
        self.entries.insert((owner.to_string(), token.to_string()), left);
        Ok(())
    }
}

/// Everything the engine persists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct State {
    /// Pools by id
    pub pools: BTreeMap<PoolId, PoolState>,
    /// Token balances of every account
    pub balances: Balances,
}

impl State {
    /// Pool `pool_id`, or [`DlmmError::NoPoolData`].
    pub fn pool(&self, pool_id: PoolId) -> Result<&PoolState> {
        self.pools.get(&pool_id).ok_or(DlmmError::NoPoolData(pool_id))
    }

    /// Mutable pool `pool_id`, or [`DlmmError::NoPoolData`].
    pub fn pool_mut(&mut self, pool_id: PoolId) -> Result<&mut PoolState> {
        self.pools.get_mut(&pool_id).ok_or(DlmmError::NoPoolData(pool_id))
    }
}

/// Committed state.
#[derive(Clone, Debug, Default)]
pub struct Store {
    committed: State,
}

impl Store {
    /// Empty store.
    pub fn new() -> Self { Self::default() }

    /// Read-only view of committed state.
    pub fn state(&self) -> &State { &self.committed }

    /// Starts a unit of work over a staged copy.
    pub fn begin(&mut self) -> Transaction<'_> {
        let staged = self.committed.clone();
        Transaction { store: self, staged }
    }

    /// Runs `f` atomically: commits on `Ok`, discards on `Err`.
    pub fn atomic<T>(&mut self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut tx = self.begin();
        let out = f(&mut *tx)?;
        tx.commit();
        Ok(out)
    }
}

/// A staged, uncommitted copy of the store.
pub struct Transaction<'a> {
    store: &'a mut Store,
    staged: State,
}

impl Transaction<'_> {
    /// Publishes the staged state.
    pub fn commit(self) {
        self.store.committed = self.staged;
    }

    /// Discards the staged state. Same as dropping the transaction.
    pub fn abort(self) {}
}

impl Deref for Transaction<'_> {
    type Target = State;
    fn deref(&self) -> &State { &self.staged }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut State { &mut self.staged }
}
