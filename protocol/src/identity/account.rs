//! # Account Identifiers
//!
//! An account on the ledger is a 20-byte identifier derived from the public
//! key that controls it:
//!
//! ```text
//! public_key (33 bytes)
//!     -> SHA256 -> RIPEMD160 -> 20-byte AccountId
//!     -> Base58Check(version 0x00, ripple alphabet) -> rXXXXXXXX...
//! ```
//!
//! The classic address uses the ripple Base58 alphabet, which is why every
//! address starts with `r`. The 4-byte double-SHA256 checksum catches
//! fat-fingered addresses before they reach a signer.
//!
//! Tooling and tests also pass raw account IDs around as 40 hex characters,
//! so [`AccountId::parse`] accepts both forms.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::crypto::{account_hash, PublicKey};

/// Version byte of a classic account address.
const ACCOUNT_ADDRESS_VERSION: u8 = 0x00;

/// Raw account ID length.
pub const ACCOUNT_ID_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while parsing an account.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    /// Base58Check decoding failed (bad alphabet character or checksum).
    #[error("address decode error: {0}")]
    Base58Decode(String),

    /// The address carries a version byte other than the classic one.
    #[error("unexpected address version byte {0:#04x}")]
    InvalidVersion(u8),

    /// Decoded payload is not 20 bytes.
    #[error("invalid account length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A ledger account.
///
/// Serializes as its classic address string, which is what every JSON
/// transaction field (`Account`, `Destination`, `Owner`) expects.
///
/// # Examples
///
/// ```
/// use batch_protocol::identity::AccountId;
///
/// let id = AccountId::from_bytes([0u8; 20]);
/// assert_eq!(id.to_address(), "rrrrrrrrrrrrrrrrrrrrrhoLvTp");
/// assert_eq!(AccountId::parse("rrrrrrrrrrrrrrrrrrrrrhoLvTp").unwrap(), id);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId([u8; ACCOUNT_ID_LENGTH]);

impl AccountId {
    pub fn from_bytes(bytes: [u8; ACCOUNT_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derive the account controlled by a public key.
    pub fn from_public_key(pk: &PublicKey) -> Self {
        Self(account_hash(pk.as_bytes()))
    }

    /// Parse either a classic `r...` address or 40 hex characters.
    pub fn parse(s: &str) -> Result<Self, AccountError> {
        let s = s.trim();
        if s.len() == ACCOUNT_ID_LENGTH * 2 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            let mut bytes = [0u8; ACCOUNT_ID_LENGTH];
            // Length and charset were checked above.
            hex::decode_to_slice(s, &mut bytes)
                .map_err(|e| AccountError::Base58Decode(e.to_string()))?;
            return Ok(Self(bytes));
        }
        Self::from_address(s)
    }

    /// Decode a classic address.
    pub fn from_address(addr: &str) -> Result<Self, AccountError> {
        let decoded = bs58::decode(addr)
            .with_alphabet(bs58::Alphabet::RIPPLE)
            .with_check(None)
            .into_vec()
            .map_err(|e| AccountError::Base58Decode(e.to_string()))?;

        let (version, payload) = decoded
            .split_first()
            .ok_or(AccountError::InvalidLength {
                expected: ACCOUNT_ID_LENGTH,
                got: 0,
            })?;

        if *version != ACCOUNT_ADDRESS_VERSION {
            return Err(AccountError::InvalidVersion(*version));
        }
        if payload.len() != ACCOUNT_ID_LENGTH {
            return Err(AccountError::InvalidLength {
                expected: ACCOUNT_ID_LENGTH,
                got: payload.len(),
            });
        }

        let mut bytes = [0u8; ACCOUNT_ID_LENGTH];
        bytes.copy_from_slice(payload);
        Ok(Self(bytes))
    }

    /// Encode as a classic address.
    pub fn to_address(&self) -> String {
        bs58::encode(self.0)
            .with_alphabet(bs58::Alphabet::RIPPLE)
            .with_check_version(ACCOUNT_ADDRESS_VERSION)
            .into_string()
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LENGTH] {
        &self.0
    }

    /// Uppercase hex of the raw 20 bytes.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_address())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_address())
    }
}

impl FromStr for AccountId {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&PublicKey> for AccountId {
    fn from(pk: &PublicKey) -> Self {
        Self::from_public_key(pk)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_address())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
