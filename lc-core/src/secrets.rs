//! Signing credential storage
//!
//! Credentials are looked up per signing step and handed back as a fresh
//! [`KeyPair`]; callers drop it as soon as the operation is signed.

use crate::crypto::KeyPair;
use crate::types::Address;
use crate::{Error, Result};
use dashmap::DashMap;
use tracing::debug;

/// Prefix of per-signer seed variables (`LC_SIGNER_KEY_<40 HEX DIGITS>`)
pub const SIGNER_KEY_PREFIX: &str = "LC_SIGNER_KEY_";

/// Single-signer fallback variable
pub const PRIVATE_KEY_VAR: &str = "LC_PRIVATE_KEY";

/// Source of signing credentials
pub trait SecretStore: Send + Sync {
    /// Credential controlling `signer`
    fn signing_credential(&self, signer: &Address) -> Result<KeyPair>;

    /// True if a credential for `signer` is held, without handing it out
    fn holds_credential(&self, signer: &Address) -> bool {
        self.signing_credential(signer).is_ok()
    }
}

/// Hex Ed25519 seeds from environment variables (development and container deployments)
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    fallback_var: String,
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvSecretStore {
    /// Read `LC_SIGNER_KEY_*`, falling back to `LC_PRIVATE_KEY`
    pub fn new() -> Self {
        Self::with_fallback_var(PRIVATE_KEY_VAR)
    }

    /// Use a different single-signer fallback variable
    pub fn with_fallback_var(name: impl Into<String>) -> Self {
        Self {
            fallback_var: name.into(),
        }
    }

    /// Variable holding the seed for `signer`
    pub fn variable_for(signer: &Address) -> String {
        format!(
            "{}{}",
            SIGNER_KEY_PREFIX,
            hex::encode_upper(signer.as_bytes())
        )
    }

    /// Address controlled by the fallback key, if one is set
    pub fn fallback_address(&self) -> Result<Option<Address>> {
        match std::env::var(&self.fallback_var) {
            Ok(seed) => Ok(Some(KeyPair::from_seed_hex(&seed)?.address())),
            Err(_) => Ok(None),
        }
    }
}

impl SecretStore for EnvSecretStore {
    fn signing_credential(&self, signer: &Address) -> Result<KeyPair> {
        if let Ok(seed) = std::env::var(Self::variable_for(signer)) {
            let keypair = KeyPair::from_seed_hex(&seed)?;
            if keypair.address() != *signer {
                return Err(Error::Credential(format!(
                    "{} does not hold the key for {}",
                    Self::variable_for(signer),
                    signer
                )));
            }
            return Ok(keypair);
        }

        if let Ok(seed) = std::env::var(&self.fallback_var) {
            let keypair = KeyPair::from_seed_hex(&seed)?;
            if keypair.address() == *signer {
                debug!(%signer, "Using fallback signing key");
                return Ok(keypair);
            }
        }

        Err(Error::Credential(format!("No signing key for {}", signer)))
    }
}

/// In-process seeds, for tests and development mode
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    seeds: DashMap<Address, [u8; 32]>,
}

impl InMemorySecretStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a seed and return the address it controls
    pub fn insert_seed(&self, seed: [u8; 32]) -> Address {
        let address = KeyPair::from_seed(&seed).address();
        self.seeds.insert(address, seed);
        address
    }

    /// Register a random key
    pub fn generate(&self) -> Address {
        self.insert_seed(rand::random())
    }

    /// Number of signers held
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    /// True if no signers are held
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

impl SecretStore for InMemorySecretStore {
    fn signing_credential(&self, signer: &Address) -> Result<KeyPair> {
        self.seeds
            .get(signer)
            .map(|seed| KeyPair::from_seed(seed.value()))
            .ok_or_else(|| Error::Credential(format!("No signing key for {}", signer)))
    }

    fn holds_credential(&self, signer: &Address) -> bool {
        self.seeds.contains_key(signer)
    }
}
