use log::{debug, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use std::collections::VecDeque;
use std::sync::Arc;

use super::actor::Actor;
use super::block::{proof_of_work, seal_hash, Anchor, Block};
use super::config::{ConfigError, LedgerConfig};
use super::crypto::{Address, CryptoError};
use super::transaction::{Transaction, TransactionStore, TxId};
use super::unspent::UnspentIndex;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{sender} overspends: resulting balance would be {attempted_balance}")]
    Overspend { sender: Address, attempted_balance: i128 },

    #[error("There's a modification in block [{block_index}]: expected {expected_hash}, found {actual_hash}")]
    Integrity {
        block_index: usize,
        expected_hash: String,
        actual_hash: String,
    },

    #[error("Invalid signature on {transaction} in block [{block_index}]")]
    Signature { block_index: usize, transaction: TxId },

    #[error("Invalid reward in block [{block_index}]: {reason}")]
    Reward { block_index: usize, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(TxId),

    #[error("Unknown block: {0}")]
    UnknownBlock(usize),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// A block whose successor's proof of work no longer matches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityFailure {
    /// Index of the modified block, counting from the oldest block
    pub block_index: usize,
    pub expected_hash: String,
    pub actual_hash: String,
}

/// A sealed transaction whose signature does not verify against its sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureFailure {
    pub block_index: usize,
    pub transaction: TxId,
}

/// A block that does not carry exactly one reward to its miner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardFailure {
    pub block_index: usize,
    pub reason: String,
}

/// Outcome of walking the chain from newest to oldest block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainAudit {
    /// Blocks whose transactions were checked before the walk ended
    pub blocks_checked: usize,

    /// First broken link; the walk stops there
    pub integrity_failure: Option<IntegrityFailure>,

    /// Blocks issuing value other than their single mining reward
    pub reward_failures: Vec<RewardFailure>,

    /// Every signature failure seen along the way
    pub signature_failures: Vec<SignatureFailure>,
}

impl ChainAudit {
    pub fn is_valid(&self) -> bool {
        self.integrity_failure.is_none()
            && self.reward_failures.is_empty()
            && self.signature_failures.is_empty()
    }

    /// Reduces the audit to its most severe failure
    pub fn into_result(self) -> Result<(), LedgerError> {
        if let Some(failure) = self.integrity_failure {
            return Err(LedgerError::Integrity {
                block_index: failure.block_index,
                expected_hash: failure.expected_hash,
                actual_hash: failure.actual_hash,
            });
        }

        if let Some(failure) = self.reward_failures.into_iter().next() {
            return Err(LedgerError::Reward {
                block_index: failure.block_index,
                reason: failure.reason,
            });
        }

        match self.signature_failures.into_iter().next() {
            Some(failure) => Err(LedgerError::Signature {
                block_index: failure.block_index,
                transaction: failure.transaction,
            }),
            None => Ok(()),
        }
    }
}

/// Mutable state guarded by the ledger's lock
#[derive(Debug, Default)]
struct LedgerState {
    /// Every transaction ever admitted
    store: TransactionStore,

    /// Sealed blocks, newest first
    chain: VecDeque<Block>,

    /// Transactions awaiting the next block, newest first
    pending: VecDeque<TxId>,

    /// Outputs received per identity
    unspent: UnspentIndex,
}

impl LedgerState {
    /// Block at `index`, counting from the oldest block
    fn block_at(&self, index: usize) -> Option<&Block> {
        let position = self.chain.len().checked_sub(index + 1)?;
        self.chain.get(position)
    }

    fn audit(&self, mining_reward: u64) -> ChainAudit {
        let mut audit = ChainAudit::default();
        let height = self.chain.len();

        for (position, block) in self.chain.iter().enumerate() {
            let block_index = height - 1 - position;

            self.check_transactions(block, block_index, mining_reward, &mut audit);
            audit.blocks_checked += 1;

            let predecessor = match self.chain.get(position + 1) {
                Some(predecessor) => predecessor,
                None => break,
            };

            let expected_hash = match predecessor
                .seal_view(&self.store)
                .and_then(|view| seal_hash(&Anchor::Block(view), block.nonce))
            {
                Ok(hash) => hash,
                Err(e) => {
                    warn!("Could not rehash block [{}]: {}", block_index - 1, e);
                    String::new()
                }
            };

            if expected_hash != block.previous_hash {
                warn!("Block [{}] was modified after it was sealed", block_index - 1);
                audit.integrity_failure = Some(IntegrityFailure {
                    block_index: block_index - 1,
                    expected_hash,
                    actual_hash: block.previous_hash.clone(),
                });
                break;
            }
        }

        audit
    }

    /// Checks that `block` mints exactly one reward and that every transfer is signed by its sender
    fn check_transactions(
        &self,
        block: &Block,
        block_index: usize,
        mining_reward: u64,
        audit: &mut ChainAudit,
    ) {
        let mut rewards = 0usize;

        for id in &block.transactions {
            let transaction = match self.store.get(*id) {
                Some(transaction) => transaction,
                None => {
                    warn!("Block [{}] refers to missing {}", block_index, id);
                    audit.signature_failures.push(SignatureFailure {
                        block_index,
                        transaction: *id,
                    });
                    continue;
                }
            };

            if transaction.is_reward() {
                rewards += 1;
                if transaction.recipient != block.miner || transaction.amount != mining_reward {
                    warn!("Block [{}] issues {} outside its mining reward", block_index, id);
                    audit.reward_failures.push(RewardFailure {
                        block_index,
                        reason: format!(
                            "{} issues {} coins to {}, expected {} to the miner",
                            id, transaction.amount, transaction.recipient, mining_reward
                        ),
                    });
                }
                continue;
            }

            let verified = match transaction.sender(&self.store) {
                Some(sender) => transaction.verify_signature(sender).unwrap_or_else(|e| {
                    debug!("Signature of {} could not be decoded: {}", id, e);
                    false
                }),
                None => false,
            };

            if !verified {
                warn!("Invalid signature on {} in block [{}]", id, block_index);
                audit.signature_failures.push(SignatureFailure {
                    block_index,
                    transaction: *id,
                });
            }
        }

        if rewards != 1 {
            warn!("Block [{}] carries {} rewards", block_index, rewards);
            audit.reward_failures.push(RewardFailure {
                block_index,
                reason: format!("expected exactly one reward, found {}", rewards),
            });
        }
    }
}

/// A UTXO-style ledger: chain, pending pool and per-identity unspent index.
///
/// Cloning yields another handle to the same ledger. All operations take
/// the single state lock, so submissions and sealing never interleave.
#[derive(Debug, Clone)]
pub struct Ledger {
    config: LedgerConfig,
    state: Arc<Mutex<LedgerState>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new()
    }
}

impl Ledger {
    /// Creates an empty ledger with the default configuration
    pub fn new() -> Self {
        Ledger {
            config: LedgerConfig::default(),
            state: Arc::new(Mutex::new(LedgerState::default())),
        }
    }

    /// Creates an empty ledger with a validated configuration
    pub fn with_config(config: LedgerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Ledger {
            config,
            state: Arc::new(Mutex::new(LedgerState::default())),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Transfers `amount` from `sender` to `recipient`.
    ///
    /// Consumes every unspent output of the sender and returns the signed
    /// transfer together with the signed change transaction crediting the
    /// remainder back to the sender. Nothing is modified when the request is
    /// rejected.
    pub fn submit_transfer(
        &self,
        sender: &Actor,
        recipient: &Address,
        amount: u64,
    ) -> Result<(Transaction, Transaction), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidRequest("Amount must be positive".to_string()));
        }

        if sender.address() == recipient {
            return Err(LedgerError::InvalidRequest(
                "Sender and recipient must differ".to_string(),
            ));
        }

        recipient
            .to_public_key()
            .map_err(|e| LedgerError::InvalidRequest(format!("Unknown identity {}: {}", recipient, e)))?;

        let mut state = self.state.lock();
        let LedgerState {
            store,
            pending,
            unspent,
            ..
        } = &mut *state;

        let inputs = unspent.unspent(sender.address(), store);
        let available = store
            .input_total(&inputs)
            .map_err(LedgerError::UnknownTransaction)?;

        // Empty inputs sum to zero, so a sender without funds always overspends
        let attempted_balance = available - i128::from(amount);
        if attempted_balance < 0 {
            warn!(
                "{} overspends {} coins (balance would be {})",
                sender.address().short(),
                amount,
                attempted_balance
            );
            return Err(LedgerError::Overspend {
                sender: sender.address().clone(),
                attempted_balance,
            });
        }

        let change_amount = u64::try_from(attempted_balance).map_err(|_| {
            LedgerError::InvalidRequest(format!("Change of {} does not fit a u64", attempted_balance))
        })?;

        let first_id = store.next_id();
        let mut transfer = Transaction::new(first_id, recipient.clone(), amount, inputs.clone());
        let mut change = Transaction::new(
            TxId(first_id.0 + 1),
            sender.address().clone(),
            change_amount,
            inputs.clone(),
        );

        transfer.sign(sender)?;
        change.sign(sender)?;

        for id in &inputs {
            if let Some(input) = store.get_mut(*id) {
                input.spent = true;
            }
        }

        let transfer_id = store.insert_with(|_| transfer);
        pending.push_front(transfer_id);
        unspent.credit(recipient, transfer_id);

        let change_id = store.insert_with(|_| change);
        pending.push_front(change_id);
        unspent.credit(sender.address(), change_id);

        info!(
            "{} -> {} / {} coins ({} inputs, change {})",
            sender.address().short(),
            recipient.short(),
            amount,
            inputs.len(),
            change_amount
        );

        let transfer = store.get(transfer_id).cloned().ok_or(LedgerError::UnknownTransaction(transfer_id))?;
        let change = store.get(change_id).cloned().ok_or(LedgerError::UnknownTransaction(change_id))?;

        Ok((transfer, change))
    }

    /// Seals every pending transaction plus a reward for `miner` into a new block.
    ///
    /// The chain is verified first; sealing on top of a corrupted chain is
    /// refused. The proof-of-work search runs while the ledger lock is held.
    pub fn mine(&self, miner: &Address) -> Result<Block, LedgerError> {
        miner
            .to_public_key()
            .map_err(|e| LedgerError::InvalidRequest(format!("Unknown identity {}: {}", miner, e)))?;

        let mut state = self.state.lock();

        state.audit(self.config.mining_reward).into_result()?;

        let (hash, nonce) = {
            let anchor = match state.chain.front() {
                Some(last) => Anchor::Block(last.seal_view(&state.store)?),
                None => Anchor::Genesis(self.config.genesis_anchor),
            };
            proof_of_work(&anchor, self.config.difficulty)?
        };

        let LedgerState {
            store,
            chain,
            pending,
            unspent,
        } = &mut *state;

        let reward_amount = self.config.mining_reward;
        let reward = store.insert_with(|id| Transaction::new_reward(id, miner.clone(), reward_amount));
        unspent.credit(miner, reward);
        pending.push_front(reward);

        let transactions: Vec<TxId> = pending.drain(..).collect();
        let block = Block::new(hash, nonce, miner.clone(), transactions);
        chain.push_front(block.clone());

        info!(
            "Sealed block [{}] by {} with nonce {} and {} transactions",
            chain.len() - 1,
            miner.short(),
            nonce,
            block.transactions.len()
        );

        Ok(block)
    }

    /// Walks the chain and reports every failure found
    pub fn audit(&self) -> ChainAudit {
        self.state.lock().audit(self.config.mining_reward)
    }

    /// Checks hash linkage and transaction signatures across the chain
    pub fn verify(&self) -> Result<(), LedgerError> {
        let result = self.audit().into_result();
        match &result {
            Ok(()) => debug!("Chain verified"),
            Err(e) => warn!("Chain verification failed: {}", e),
        }
        result
    }

    /// The chain, newest block first
    pub fn chain(&self) -> Vec<Block> {
        self.state.lock().chain.iter().cloned().collect()
    }

    /// Number of sealed blocks
    pub fn height(&self) -> usize {
        self.state.lock().chain.len()
    }

    /// Block whose seal digest equals `hash`
    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.state
            .lock()
            .chain
            .iter()
            .find(|block| block.previous_hash == hash)
            .cloned()
    }

    /// Transactions sealed in the block at `index`
    pub fn block_transactions(&self, index: usize) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.lock();
        let block = state.block_at(index).ok_or(LedgerError::UnknownBlock(index))?;

        Ok(state.store.snapshot(&block.transactions))
    }

    /// One `sender -> recipient / amount coins` line per transaction of the block at `index`
    pub fn describe_block(&self, index: usize) -> Result<Vec<String>, LedgerError> {
        let state = self.state.lock();
        let block = state.block_at(index).ok_or(LedgerError::UnknownBlock(index))?;

        let lines = block
            .transactions
            .iter()
            .filter_map(|id| state.store.get(*id))
            .map(|tx| {
                let sender = tx
                    .sender(&state.store)
                    .map_or_else(|| "reward".to_string(), |sender| sender.to_string());
                format!("{} -> {} / {} coins", sender, tx.recipient, tx.amount)
            })
            .collect();

        Ok(lines)
    }

    /// Transactions waiting for the next block, newest first
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        let state = self.state.lock();
        state.store.snapshot(&state.pending)
    }

    /// Outputs of `owner` that have not been spent yet
    pub fn unspent_transactions(&self, owner: &Address) -> Vec<Transaction> {
        let state = self.state.lock();
        let ids = state.unspent.unspent(owner, &state.store);
        state.store.snapshot(&ids)
    }

    /// Sum of the unspent outputs of `owner`
    pub fn balance(&self, owner: &Address) -> u128 {
        let state = self.state.lock();
        state.unspent.balance(owner, &state.store)
    }

    pub fn transaction(&self, id: TxId) -> Option<Transaction> {
        self.state.lock().store.get(id).cloned()
    }

    /// Current hash id of a stored transaction
    pub fn hash_id(&self, id: TxId) -> Result<String, LedgerError> {
        let state = self.state.lock();
        let transaction = state.store.get(id).ok_or(LedgerError::UnknownTransaction(id))?;

        Ok(transaction.hash_id()?)
    }

    /// Edits a stored transaction in place, wherever it is referenced.
    ///
    /// Exists to replay tampering scenarios against [`Ledger::verify`].
    /// `edit` runs under the ledger lock and must not call back into the ledger.
    pub fn with_transaction_mut<F, R>(&self, id: TxId, edit: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&mut Transaction) -> R,
    {
        let mut state = self.state.lock();
        let transaction = state.store.get_mut(id).ok_or(LedgerError::UnknownTransaction(id))?;

        warn!("Transaction {} edited outside the ledger rules", id);
        Ok(edit(transaction))
    }
}
