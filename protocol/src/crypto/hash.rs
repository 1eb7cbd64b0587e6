//! # Hashing Utilities
//!
//! The ledger network hashes almost everything with **SHA-512Half**: SHA-512
//! truncated to its first 32 bytes. Transaction identifiers, offer
//! identifiers and the secp256k1 signing digest all use it. Account IDs are
//! the odd one out, using the Bitcoin-style `RIPEMD160(SHA256(pubkey))`.
//!
//! Every function here is pure and allocation-light, so they are safe to call
//! from any number of threads at once.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use crate::config::HASH_PREFIX_TRANSACTION_ID;

/// Compute the SHA-256 hash of the input data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the full 64-byte SHA-512 digest.
///
/// # Example
///
/// ```
/// use batch_protocol::crypto::sha512;
///
/// assert_eq!(sha512(b"batch").len(), 64);
/// ```
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// SHA-512Half: the first 32 bytes of SHA-512.
///
/// This is the network's standard 256-bit hash. Truncating SHA-512 rather
/// than using SHA-256 is a historical choice (it was faster on 64-bit CPUs)
/// and is now baked into every identifier on the ledger.
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let full = sha512(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&full[..32]);
    out
}

/// SHA-512Half over a 4-byte big-endian prefix followed by `data`.
///
/// Fed sequentially into the hasher so callers don't have to build a
/// concatenated buffer first.
pub fn prefixed_sha512_half(prefix: u32, data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512::new();
    hasher.update(prefix.to_be_bytes());
    hasher.update(data);
    let full = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&full[..32]);
    out
}

/// The network's transaction identifier: `SHA512Half("TXN\0" || encoded)`.
///
/// `encoded` must be the full canonical encoding of the transaction as
/// produced by the wire codec.
pub fn transaction_id(encoded: &[u8]) -> [u8; 32] {
    prefixed_sha512_half(HASH_PREFIX_TRANSACTION_ID, encoded)
}

/// `RIPEMD160(SHA256(data))` — the 20-byte account hash of a public key.
pub fn account_hash(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);
    }

    #[test]
    fn test_sha512_known_vector() {
        let hash = sha512(b"abc");
        assert_eq!(hex::encode(&hash[..16]), "ddaf35a193617abacc417349ae204131");
    }

    #[test]
    fn sha512_half_is_prefix_of_sha512() {
        let data = b"batch envelope";
        assert_eq!(&sha512(data)[..32], &sha512_half(data)[..]);
    }

    #[test]
    fn prefixed_hash_matches_manual_concatenation() {
        let data = b"encoded transaction";
        let mut buf = HASH_PREFIX_TRANSACTION_ID.to_be_bytes().to_vec();
        buf.extend_from_slice(data);
        assert_eq!(transaction_id(data), sha512_half(&buf));
    }

    #[test]
    fn different_prefixes_different_hashes() {
        let a = prefixed_sha512_half(1, b"x");
        let b = prefixed_sha512_half(2, b"x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_ripemd160_of_sha256_known_vector() {
        // RIPEMD160(SHA256("")) is a well-known Bitcoin test value.
        assert_eq!(
            hex::encode(account_hash(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }
}
