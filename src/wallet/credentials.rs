//! Signing credentials
//!
//! SECURITY: private keys are handed out only as `SecretString`, only to the
//! signer, and only for the duration of one signing call.
//! - Keys are never serialized
//! - Keys are never logged (`Debug` is redacted)
//! - Key parse errors never echo the input

use crate::{Error, Result};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use secrecy::{ExposeSecret, SecretString};

/// Supplies the signing account and, on demand, its private key
pub trait CredentialProvider: Send + Sync {
    /// Public address of the account (safe to share)
    fn address(&self) -> Address;

    /// Hex-encoded private key for exactly one signing operation
    fn signing_key(&self) -> Result<SecretString>;
}

/// Parse a hex key into a signer without exposing the key in errors
pub(crate) fn parse_signer(key: &SecretString) -> Result<PrivateKeySigner> {
    let key_hex = key.expose_secret().trim();
    let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

    key_hex
        .parse::<PrivateKeySigner>()
        .map_err(|_| Error::SigningFailed("credential is not a valid secp256k1 private key".into()))
}

/// Reads the key from an environment variable on every signing call
///
/// The address is derived once at construction; the key itself is not kept.
pub struct EnvCredentials {
    var_name: String,
    address: Address,
}

impl EnvCredentials {
    /// # Arguments
    /// * `var_name` - Name of the environment variable containing the private key
    pub fn new(var_name: impl Into<String>) -> Result<Self> {
        let var_name = var_name.into();
        let key = read_env_key(&var_name).map_err(|e| Error::Config(e.to_string()))?;
        let address = parse_signer(&key)
            .map_err(|_| Error::Config(format!("{} does not hold a valid private key", var_name)))?
            .address();

        Ok(Self { var_name, address })
    }

    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

fn read_env_key(var_name: &str) -> Result<SecretString> {
    std::env::var(var_name)
        .map(SecretString::from)
        .map_err(|_| {
            Error::SigningFailed(format!(
                "Environment variable {} not set. Required for signing.",
                var_name
            ))
        })
}

impl CredentialProvider for EnvCredentials {
    fn address(&self) -> Address {
        self.address
    }

    fn signing_key(&self) -> Result<SecretString> {
        read_env_key(&self.var_name)
    }
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentials")
            .field("var_name", &self.var_name)
            .field("address", &self.address)
            .finish()
    }
}

/// Holds the key in memory, for callers that manage secrets themselves
pub struct StaticCredentials {
    key: SecretString,
    address: Address,
}

impl StaticCredentials {
    pub fn new(key: SecretString) -> Result<Self> {
        let address = parse_signer(&key)?.address();
        Ok(Self { key, address })
    }

    pub fn from_hex(key_hex: &str) -> Result<Self> {
        Self::new(SecretString::from(key_hex.to_string()))
    }
}

impl CredentialProvider for StaticCredentials {
    fn address(&self) -> Address {
        self.address
    }

    fn signing_key(&self) -> Result<SecretString> {
        Ok(self.key.clone())
    }
}

// Implement Debug manually to avoid exposing the key
impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("address", &self.address)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
