use std::collections::{HashMap, VecDeque};

use super::crypto::Address;
use super::transaction::{TransactionStore, TxId};

/// Per-identity index of the outputs each identity has received.
///
/// Entries are never removed; an output counts as unspent while the
/// transaction it points at has `spent == false`.
#[derive(Debug, Clone, Default)]
pub struct UnspentIndex {
    holdings: HashMap<Address, VecDeque<TxId>>,
}

impl UnspentIndex {
    pub fn new() -> Self {
        UnspentIndex::default()
    }

    /// Records `id` as an output owned by `owner`, newest first
    pub fn credit(&mut self, owner: &Address, id: TxId) {
        self.holdings.entry(owner.clone()).or_default().push_front(id);
    }

    /// Every output ever credited to `owner`, spent or not
    pub fn holdings(&self, owner: &Address) -> Vec<TxId> {
        self.holdings
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Outputs of `owner` not yet consumed by a transfer
    pub fn unspent(&self, owner: &Address, store: &TransactionStore) -> Vec<TxId> {
        self.holdings
            .get(owner)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| store.get(*id).map_or(false, |tx| !tx.spent))
            .collect()
    }

    /// Spendable balance of `owner`
    pub fn balance(&self, owner: &Address, store: &TransactionStore) -> u128 {
        self.unspent(owner, store)
            .into_iter()
            .filter_map(|id| store.get(id))
            .map(|tx| u128::from(tx.amount))
            .sum()
    }
}
