//! Argon2id password credentials.
//!
//! A credential is encoded as `$argon2id$<hex salt>$<hex key>` with a 16-byte
//! salt and a 32-byte derived key. Cost parameters are fixed, so the encoding
//! carries no parameter block.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const ARGON2ID_PREFIX: &str = "$argon2id$";
pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

const TIME_COST: u32 = 1;
const MEMORY_COST_KIB: u32 = 64 * 1024;
const PARALLELISM: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashField {
    Salt,
    Key,
}

impl fmt::Display for HashField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Salt => f.write_str("salt"),
            Self::Key => f.write_str("key"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid stored hash format: missing prefix")]
    MissingPrefix,
    #[error("invalid stored hash format: expected 2 parts, found {0}")]
    PartCount(usize),
    #[error("failed to decode {0} from hex")]
    InvalidHex(HashField),
    #[error("invalid {field} length in stored hash: expected {expected} bytes, found {found}")]
    InvalidLength {
        field: HashField,
        expected: usize,
        found: usize,
    },
    #[error("failed to generate salt: {0}")]
    Entropy(#[from] rand::Error),
    #[error("key derivation failed: {0}")]
    Kdf(argon2::Error),
}

impl PasswordError {
    /// True when the stored credential itself is malformed.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::Entropy(_) | Self::Kdf(_))
    }
}

/// Parsed Argon2id credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    salt: [u8; SALT_LEN],
    key: [u8; KEY_LEN],
}

impl Credential {
    /// Derive a credential for `password` under a fresh random salt.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails or key derivation fails.
    pub fn derive(password: &str) -> Result<Self, PasswordError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt)?;
        let key = derive_key(password.as_bytes(), &salt)?;
        Ok(Self { salt, key })
    }

    /// Recompute the key for `password` and compare it in constant time.
    ///
    /// # Errors
    /// Returns an error only if key derivation fails.
    pub fn verify(&self, password: &str) -> Result<bool, PasswordError> {
        let candidate = derive_key(password.as_bytes(), &self.salt)?;
        Ok(bool::from(candidate.ct_eq(&self.key)))
    }

    #[must_use]
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("salt", &hex::encode(self.salt))
            .field("key", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ARGON2ID_PREFIX}{}${}",
            hex::encode(self.salt),
            hex::encode(self.key)
        )
    }
}

impl FromStr for Credential {
    type Err = PasswordError;

    fn from_str(stored: &str) -> Result<Self, Self::Err> {
        let rest = stored
            .strip_prefix(ARGON2ID_PREFIX)
            .ok_or(PasswordError::MissingPrefix)?;

        let parts: Vec<&str> = rest.split('$').collect();
        let [salt_hex, key_hex] = parts.as_slice() else {
            return Err(PasswordError::PartCount(parts.len()));
        };

        Ok(Self {
            salt: decode_field::<SALT_LEN>(salt_hex, HashField::Salt)?,
            key: decode_field::<KEY_LEN>(key_hex, HashField::Key)?,
        })
    }
}

fn decode_field<const N: usize>(hex_str: &str, field: HashField) -> Result<[u8; N], PasswordError> {
    let bytes = hex::decode(hex_str).map_err(|_| PasswordError::InvalidHex(field))?;
    let found = bytes.len();
    bytes.try_into().map_err(|_| PasswordError::InvalidLength {
        field,
        expected: N,
        found,
    })
}

fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN], PasswordError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(KEY_LEN))
        .map_err(PasswordError::Kdf)?;
    let mut key = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password, salt, &mut key)
        .map_err(PasswordError::Kdf)?;
    Ok(key)
}

/// Hash `password` into an encoded credential string.
///
/// # Errors
/// Returns an error if the OS random source fails or key derivation fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Ok(Credential::derive(password)?.to_string())
}

/// Check `password` against an encoded credential.
///
/// A mismatch is `Ok(false)`; errors are reserved for malformed stored data
/// (or a failing KDF).
///
/// # Errors
/// Returns an error if `stored` is not a well-formed credential.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    stored.parse::<Credential>()?.verify(password)
}
