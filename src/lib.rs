//! A minimal UTXO-style ledger engine.
//!
//! Transfers consume every unspent output of the sender and credit the
//! remainder back through a signed change transaction. Pending transactions
//! are sealed into blocks by a brute-force proof of work, and
//! [`Ledger::verify`] re-derives every block link and transaction signature.

pub mod blockchain;

pub use blockchain::{
    create_actor, Actor, ActorDirectory, Address, Block, ChainAudit, ConfigError, Ledger,
    LedgerConfig, LedgerError, Transaction, TxId,
};
