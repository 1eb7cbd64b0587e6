//! # Ledger Object Identifiers
//!
//! Tokens and offers created inside a batch get identifiers the caller can
//! predict before the batch is submitted. A later inner transaction (accept
//! an offer, create an offer for a freshly minted token) can reference an
//! object that does not exist yet, because its ID is a pure function of
//! metadata the builder already knows.
//!
//! ```text
//! minted token ID (32 bytes, no hashing):
//!   0x00 | flags | transfer_fee (BE u16) | owner (20) | scrambled taxon (BE u32) | mint seq (BE u32)
//!
//! offer ID:
//!   SHA512Half(0x00 0x71 | owner (20) | creation seq (BE u32))
//! ```
//!
//! Both functions are referentially transparent and touch no shared state.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{OFFER_SPACE_KEY, TAXON_SCRAMBLE_INCREMENT, TAXON_SCRAMBLE_MULTIPLIER};
use crate::crypto::sha512_half;
use crate::identity::AccountId;

/// Errors parsing an object identifier from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectIdError {
    #[error("object id must be 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("object id is not valid hex")]
    InvalidHex,
}

/// A 256-bit ledger object identifier.
///
/// Displays and serializes as 64 uppercase hex characters, the network's
/// object-ID convention.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Parse 64 hex characters (either case).
    pub fn from_hex(s: &str) -> Result<Self, ObjectIdError> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(ObjectIdError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ObjectIdError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Scramble a token taxon with its mint sequence.
///
/// `taxon XOR (384160001 * mint_sequence + 2459)` in wrapping 32-bit
/// arithmetic. Obfuscation only; it keeps tokens minted under one taxon from
/// producing visually sequential IDs.
pub fn scramble_taxon(taxon: u32, mint_sequence: u32) -> u32 {
    taxon
        ^ TAXON_SCRAMBLE_MULTIPLIER
            .wrapping_mul(mint_sequence)
            .wrapping_add(TAXON_SCRAMBLE_INCREMENT)
}

/// Identifier of a token minted by `owner` at `mint_sequence`.
///
/// `mint_sequence` is the issuer's minted-token counter at mint time, not the
/// transaction sequence.
pub fn derive_minted_object_id(
    flags: u8,
    transfer_fee: u16,
    owner: &AccountId,
    mint_sequence: u32,
    taxon: u32,
) -> ObjectId {
    let mut id = [0u8; 32];
    id[1] = flags;
    id[2..4].copy_from_slice(&transfer_fee.to_be_bytes());
    id[4..24].copy_from_slice(owner.as_bytes());
    id[24..28].copy_from_slice(&scramble_taxon(taxon, mint_sequence).to_be_bytes());
    id[28..32].copy_from_slice(&mint_sequence.to_be_bytes());
    ObjectId(id)
}

/// Identifier of the offer created by `creator` with transaction sequence
/// `creation_sequence`.
pub fn derive_offer_object_id(creator: &AccountId, creation_sequence: u32) -> ObjectId {
    let mut preimage = [0u8; 26];
    preimage[..2].copy_from_slice(&OFFER_SPACE_KEY);
    preimage[2..22].copy_from_slice(creator.as_bytes());
    preimage[22..].copy_from_slice(&creation_sequence.to_be_bytes());
    ObjectId(sha512_half(&preimage))
}
