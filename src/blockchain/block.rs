use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::crypto::{digest, Address, CryptoError};
use super::transaction::{TransactionStore, TxId};

/// Represents a sealed block in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Proof-of-work digest over the predecessor and `nonce`
    pub previous_hash: String,

    /// Proof of work (nonce)
    pub nonce: u64,

    /// Identity that sealed the block and received its reward
    pub miner: Address,

    /// Timestamp when the block was created
    pub timestamp: DateTime<Utc>,

    /// Transactions sealed in this block, newest first
    pub transactions: Vec<TxId>,
}

/// Fields of a block that its successor's proof of work commits to
#[derive(Debug, Serialize)]
pub struct SealView<'a> {
    previous_hash: &'a str,
    nonce: u64,
    miner: &'a Address,
    timestamp: &'a DateTime<Utc>,
    transactions: Vec<String>,
}

/// What a new block's proof of work is computed over
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Anchor<'a> {
    /// Fixed sentinel standing in for the missing predecessor of the first block
    Genesis(u64),

    /// The newest block of a non-empty chain
    Block(SealView<'a>),
}

impl Block {
    /// Creates a new block
    pub fn new(previous_hash: String, nonce: u64, miner: Address, transactions: Vec<TxId>) -> Self {
        Block {
            previous_hash,
            nonce,
            miner,
            timestamp: Utc::now(),
            transactions,
        }
    }

    /// Resolves this block into the form hashed by its successor.
    ///
    /// Transactions contribute their current hash id, so editing a sealed
    /// transaction changes the view.
    pub fn seal_view<'a>(&'a self, store: &TransactionStore) -> Result<SealView<'a>, CryptoError> {
        let transactions = self
            .transactions
            .iter()
            .map(|id| match store.get(*id) {
                Some(transaction) => transaction.hash_id(),
                None => Err(CryptoError::EncodingError(format!("Unknown transaction {}", id))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SealView {
            previous_hash: &self.previous_hash,
            nonce: self.nonce,
            miner: &self.miner,
            timestamp: &self.timestamp,
            transactions,
        })
    }
}

/// Digest of `anchor` combined with `nonce`
pub fn seal_hash(anchor: &Anchor<'_>, nonce: u64) -> Result<String, CryptoError> {
    digest(&(anchor, nonce))
}

/// Whether `hash` starts with `difficulty` zero characters
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Brute-force search for the lowest nonce whose seal hash meets `difficulty`.
///
/// Returns the winning digest and nonce. There is no upper bound on the
/// search; the expected number of attempts is about 16^difficulty.
pub fn proof_of_work(anchor: &Anchor<'_>, difficulty: usize) -> Result<(String, u64), CryptoError> {
    let mut nonce = 0u64;

    loop {
        let hash = seal_hash(anchor, nonce)?;

        if meets_difficulty(&hash, difficulty) {
            debug!("Proof of work found nonce {} after {} attempts", nonce, nonce + 1);
            return Ok((hash, nonce));
        }

        nonce += 1;
    }
}
