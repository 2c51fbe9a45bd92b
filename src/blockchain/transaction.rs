use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use super::actor::Actor;
use super::crypto::{digest, verify_signature, Address, CryptoError, DigitalSignature};

/// Handle of a transaction inside a [`TransactionStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub usize);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Represents a value transfer recorded in the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Position of this transaction in the ledger's store
    pub id: TxId,

    /// Identity receiving the value
    pub recipient: Address,

    /// Amount being transferred
    pub amount: u64,

    /// Timestamp when the transaction was created
    pub timestamp: DateTime<Utc>,

    /// Signature of the sender over the canonical form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,

    /// Whether a later transfer has consumed this output
    pub spent: bool,

    /// Unspent outputs consumed by this transaction; empty for rewards
    pub input_transactions: Vec<TxId>,
}

impl Transaction {
    /// Creates a new unsigned transaction
    pub fn new(id: TxId, recipient: Address, amount: u64, input_transactions: Vec<TxId>) -> Self {
        Transaction {
            id,
            recipient,
            amount,
            timestamp: Utc::now(),
            signature: None,
            spent: false,
            input_transactions,
        }
    }

    /// Creates a reward transaction issuing `amount` to the block's miner
    pub fn new_reward(id: TxId, miner: Address, amount: u64) -> Self {
        Transaction::new(id, miner, amount, Vec::new())
    }

    /// Reward transactions consume nothing and are exempt from balance checks
    pub fn is_reward(&self) -> bool {
        self.input_transactions.is_empty()
    }

    /// Bytes covered by both the hash id and the signature.
    ///
    /// `spent` and `signature` are left out: the first changes when a later
    /// transfer consumes this output, the second is computed over this form.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        serde_json::to_vec(&self.canonical_form())
            .map_err(|e| CryptoError::EncodingError(e.to_string()))
    }

    /// Digest of the current field values. Never cached.
    pub fn hash_id(&self) -> Result<String, CryptoError> {
        digest(&self.canonical_form())
    }

    fn canonical_form(&self) -> (&Address, u64, &DateTime<Utc>, &[TxId]) {
        (
            &self.recipient,
            self.amount,
            &self.timestamp,
            &self.input_transactions,
        )
    }

    /// Signs the canonical form with the sender's key, replacing any earlier signature
    pub fn sign(&mut self, sender: &Actor) -> Result<(), CryptoError> {
        let message = self.canonical_bytes()?;
        self.signature = Some(sender.sign(&message));
        Ok(())
    }

    /// Checks the signature against `sender`.
    ///
    /// An unsigned transaction never verifies.
    pub fn verify_signature(&self, sender: &Address) -> Result<bool, CryptoError> {
        let signature = match &self.signature {
            Some(signature) => signature,
            None => return Ok(false),
        };

        let public_key = sender.to_public_key()?;
        let message = self.canonical_bytes()?;

        verify_signature(&message, signature, &public_key)
    }

    /// Value left over after this transaction is paid out of its inputs.
    ///
    /// Equals `amount` for rewards minted by the ledger. A negative result
    /// means the inputs do not cover the amount; the caller decides whether
    /// that is an error. Inputs must come from `store`.
    pub fn balance(&self, store: &TransactionStore) -> i128 {
        if self.is_reward() {
            return i128::from(self.amount);
        }

        let inputs = store.input_total(&self.input_transactions);
        debug_assert!(inputs.is_ok(), "input {:?} missing from the store", inputs);

        inputs.unwrap_or(0) - i128::from(self.amount)
    }

    /// The sender, recovered as the recipient of the first input
    pub fn sender<'a>(&self, store: &'a TransactionStore) -> Option<&'a Address> {
        self.input_transactions
            .first()
            .and_then(|id| store.get(*id))
            .map(|input| &input.recipient)
    }
}

/// Owns every transaction the ledger has ever admitted.
///
/// Blocks, the pending pool and the unspent index refer to entries by
/// [`TxId`], so a mutation through the store is seen by all of them.
#[derive(Debug, Clone, Default)]
pub struct TransactionStore {
    entries: Vec<Transaction>,
}

impl TransactionStore {
    pub fn new() -> Self {
        TransactionStore::default()
    }

    /// Id the next inserted transaction will receive
    pub fn next_id(&self) -> TxId {
        TxId(self.entries.len())
    }

    /// Stores a transaction built by `build` for the next free id
    pub fn insert_with<F>(&mut self, build: F) -> TxId
    where
        F: FnOnce(TxId) -> Transaction,
    {
        let id = self.next_id();
        let mut transaction = build(id);
        transaction.id = id;
        self.entries.push(transaction);
        id
    }

    pub fn get(&self, id: TxId) -> Option<&Transaction> {
        self.entries.get(id.0)
    }

    pub fn get_mut(&mut self, id: TxId) -> Option<&mut Transaction> {
        self.entries.get_mut(id.0)
    }

    /// Sum of the amounts behind `ids`, or the first id the store does not hold
    pub fn input_total(&self, ids: &[TxId]) -> Result<i128, TxId> {
        ids.iter().try_fold(0i128, |total, id| {
            self.get(*id)
                .map(|input| total + i128::from(input.amount))
                .ok_or(*id)
        })
    }

    /// Clones the transactions behind `ids`, skipping unknown ids
    pub fn snapshot<'a, I>(&self, ids: I) -> Vec<Transaction>
    where
        I: IntoIterator<Item = &'a TxId>,
    {
        ids.into_iter().filter_map(|id| self.get(*id)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(store: &mut TransactionStore, owner: &Address, amount: u64) -> TxId {
        store.insert_with(|id| Transaction::new_reward(id, owner.clone(), amount))
    }

    #[test]
    fn test_new_transaction() {
        let recipient = Actor::new();
        let transaction = Transaction::new(TxId(3), recipient.address().clone(), 10, vec![TxId(1)]);

        assert_eq!(transaction.id, TxId(3));
        assert_eq!(transaction.recipient, *recipient.address());
        assert_eq!(transaction.amount, 10);
        assert!(!transaction.spent);
        assert!(!transaction.is_reward());
        assert!(transaction.signature.is_none());
    }

    #[test]
    fn test_reward_transaction() {
        let mut store = TransactionStore::new();
        let miner = Actor::new();
        let id = funded(&mut store, miner.address(), 30);
        let reward = store.get(id).unwrap();

        assert!(reward.is_reward());
        assert_eq!(reward.balance(&store), 30);
        assert!(reward.sender(&store).is_none());
    }

    #[test]
    fn test_balance_from_inputs() {
        let mut store = TransactionStore::new();
        let sender = Actor::new();
        let recipient = Actor::new();
        let first = funded(&mut store, sender.address(), 30);
        let second = funded(&mut store, sender.address(), 12);

        let transfer = Transaction::new(
            store.next_id(),
            recipient.address().clone(),
            35,
            vec![first, second],
        );
        assert_eq!(transfer.balance(&store), 7);
        assert_eq!(transfer.sender(&store), Some(sender.address()));

        let overspend = Transaction::new(store.next_id(), recipient.address().clone(), 50, vec![first]);
        assert_eq!(overspend.balance(&store), -20);
    }

    #[test]
    fn test_hash_id_tracks_current_fields() {
        let recipient = Actor::new();
        let mut transaction = Transaction::new(TxId(0), recipient.address().clone(), 10, Vec::new());

        let before = transaction.hash_id().unwrap();
        assert_eq!(before, transaction.hash_id().unwrap());

        transaction.amount = 4;
        assert_ne!(before, transaction.hash_id().unwrap());
    }

    #[test]
    fn test_hash_id_ignores_spent_and_signature() {
        let sender = Actor::new();
        let mut transaction = Transaction::new(TxId(1), sender.address().clone(), 10, vec![TxId(0)]);
        let before = transaction.hash_id().unwrap();

        transaction.spent = true;
        transaction.sign(&sender).unwrap();

        assert_eq!(before, transaction.hash_id().unwrap());
    }

    #[test]
    fn test_sign_and_verify() {
        let sender = Actor::new();
        let recipient = Actor::new();
        let other = Actor::new();
        let mut transaction = Transaction::new(TxId(1), recipient.address().clone(), 10, vec![TxId(0)]);

        assert!(!transaction.verify_signature(sender.address()).unwrap());

        transaction.sign(&sender).unwrap();
        assert!(transaction.signature.is_some());
        assert!(transaction.verify_signature(sender.address()).unwrap());
        assert!(!transaction.verify_signature(other.address()).unwrap());

        transaction.amount = 11;
        assert!(!transaction.verify_signature(sender.address()).unwrap());
    }

    #[test]
    fn test_input_total_reports_unknown_ids() {
        let mut store = TransactionStore::new();
        let owner = Actor::new();
        let first = funded(&mut store, owner.address(), 30);
        let second = funded(&mut store, owner.address(), 12);

        assert_eq!(store.input_total(&[]), Ok(0));
        assert_eq!(store.input_total(&[first, second]), Ok(42));
        assert_eq!(store.input_total(&[first, TxId(7), TxId(9)]), Err(TxId(7)));
    }

    #[test]
    fn test_store_assigns_sequential_ids() {
        let mut store = TransactionStore::new();
        let owner = Actor::new();
        assert!(store.is_empty());

        let a = funded(&mut store, owner.address(), 1);
        let b = funded(&mut store, owner.address(), 2);

        assert_eq!(a, TxId(0));
        assert_eq!(b, TxId(1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b).unwrap().id, b);

        store.get_mut(a).unwrap().spent = true;
        let snapshot = store.snapshot(&[b, a, TxId(9)]);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[1].spent);
    }
}
