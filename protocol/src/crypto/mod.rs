//! # Cryptographic Primitives
//!
//! Hashing and signing for batch envelopes. Nothing here is novel: every
//! function is a thin, typed wrapper around an audited implementation.
//!
//! - **SHA-512Half** for identifiers and digests (`sha2`).
//! - **RIPEMD160(SHA256)** for account IDs (`ripemd`, `sha2`).
//! - **Ed25519** signatures (`ed25519-dalek`).
//! - **secp256k1 ECDSA** signatures over SHA-512Half (`k256`).
//!
//! The rest of the crate only sees [`KeyPair::sign`] and
//! [`PublicKey::verify`]; which curve backs a key is decided once, when it is
//! loaded.

pub mod hash;
pub mod keys;

pub use hash::{account_hash, prefixed_sha512_half, sha256, sha512, sha512_half, transaction_id};
pub use keys::{KeyAlgorithm, KeyError, KeyPair, PublicKey, Signature};
