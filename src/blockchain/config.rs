use serde::Deserialize;
use thiserror::Error;

use super::crypto::DIGEST_LEN;

/// Errors that can occur while loading ledger configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables of a ledger instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    /// Number of leading zero characters a seal hash must have
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,

    /// Amount issued to the miner of each block
    #[serde(default = "default_mining_reward")]
    pub mining_reward: u64,

    /// Value hashed in place of a predecessor when sealing the first block
    #[serde(default = "default_genesis_anchor")]
    pub genesis_anchor: u64,
}

fn default_difficulty() -> usize {
    4
}

fn default_mining_reward() -> u64 {
    30
}

fn default_genesis_anchor() -> u64 {
    100
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            genesis_anchor: default_genesis_anchor(),
        }
    }
}

impl LedgerConfig {
    /// Parses a TOML document; missing keys fall back to their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Same as the defaults with a different difficulty
    pub fn with_difficulty(difficulty: usize) -> Result<Self, ConfigError> {
        let config = LedgerConfig {
            difficulty,
            ..LedgerConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty == 0 || self.difficulty > DIGEST_LEN {
            return Err(ConfigError::Invalid(format!(
                "difficulty must be between 1 and {}, got {}",
                DIGEST_LEN, self.difficulty
            )));
        }

        if self.mining_reward == 0 {
            return Err(ConfigError::Invalid("mining_reward must be positive".to_string()));
        }

        Ok(())
    }
}
