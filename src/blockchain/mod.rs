// Blockchain module
//
// This module contains the ledger engine including:
// - Hashing and signing utilities
// - Signing identities
// - Transaction model and store
// - Block structure and proof of work
// - Per-identity unspent index
// - The ledger tying them together

pub mod actor;
pub mod block;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod transaction;
pub mod unspent;

// Re-export main components for easier access
pub use actor::{create_actor, Actor, ActorDirectory};
pub use block::Block;
pub use config::{ConfigError, LedgerConfig};
pub use crypto::{Address, CryptoError, DigitalSignature};
pub use ledger::{ChainAudit, IntegrityFailure, Ledger, LedgerError, RewardFailure, SignatureFailure};
pub use transaction::{Transaction, TransactionStore, TxId};
