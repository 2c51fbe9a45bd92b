use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use log::info;
use rand::rngs::OsRng;

use std::collections::HashMap;
use std::fmt;

use super::crypto::{Address, DigitalSignature};
use super::ledger::{Ledger, LedgerError};
use super::transaction::Transaction;

/// A signing identity taking part in the ledger
#[derive(Clone)]
pub struct Actor {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    address: Address,
}

impl Actor {
    /// Creates a new actor with a freshly generated Ed25519 keypair
    pub fn new() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = Address::from_public_key(&verifying_key);

        Actor {
            signing_key,
            verifying_key,
            address,
        }
    }

    /// Gets the actor's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the actor's public key
    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Signs a message with the actor's private key
    pub fn sign(&self, message: &[u8]) -> DigitalSignature {
        let signature = self.signing_key.sign(message);
        DigitalSignature::from_signature(&signature)
    }

    /// Transfers `amount` to `recipient` through `ledger`.
    ///
    /// Returns the transfer and the change transaction, in that order.
    pub fn send(
        &self,
        ledger: &Ledger,
        recipient: &Address,
        amount: u64,
    ) -> Result<(Transaction, Transaction), LedgerError> {
        ledger.submit_transfer(self, recipient, amount)
    }
}

impl Default for Actor {
    fn default() -> Self {
        Actor::new()
    }
}

// The signing key stays out of debug output.
impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor").field("address", &self.address).finish()
    }
}

/// Creates a new signing identity
pub fn create_actor() -> Actor {
    Actor::new()
}

/// Actors registered under human-readable names
#[derive(Debug, Default)]
pub struct ActorDirectory {
    actors: HashMap<String, Actor>,
}

impl ActorDirectory {
    pub fn new() -> Self {
        ActorDirectory::default()
    }

    /// Creates and registers an actor, rejecting names already in use
    pub fn create(&mut self, name: &str) -> Result<&Actor, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidRequest("Actor name must not be empty".to_string()));
        }
        if self.actors.contains_key(name) {
            return Err(LedgerError::InvalidRequest(format!(
                "The name {} is already used by an existing actor",
                name
            )));
        }

        let actor = Actor::new();
        info!("Registered actor {} as {}", name, actor.address().short());

        Ok(self.actors.entry(name.to_string()).or_insert(actor))
    }

    /// Looks up an actor by name
    pub fn get(&self, name: &str) -> Result<&Actor, LedgerError> {
        self.actors
            .get(name.trim())
            .ok_or_else(|| LedgerError::InvalidRequest(format!("Unknown actor: {}", name)))
    }

    /// Resolves an address back to the name it was registered under
    pub fn name_of(&self, address: &Address) -> Option<&str> {
        self.actors
            .iter()
            .find(|(_, actor)| actor.address() == address)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
