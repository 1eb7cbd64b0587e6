//! # Key Management
//!
//! Signing keys for batch participants. The network accepts two key
//! algorithms and this module hides the difference behind [`KeyPair`]:
//!
//! | Algorithm  | Public key (33 bytes)       | Message signed          | Signature         |
//! |------------|-----------------------------|-------------------------|-------------------|
//! | Ed25519    | `0xED` + 32-byte point      | the message itself      | 64 raw bytes      |
//! | secp256k1  | compressed SEC1 point       | `SHA512Half(message)`   | DER, low-S        |
//!
//! Everything above the crypto layer treats signing as the opaque
//! `sign(message, key) -> signature` primitive, so the two-tier batch signer
//! never needs to know which algorithm a participant uses.
//!
//! Key bytes are never logged. [`KeyPair`]'s `Debug` prints only the public
//! half.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use super::hash::sha512_half;

/// Leading byte that marks a 33-byte public key (or secret) as Ed25519.
pub const ED25519_PREFIX: u8 = 0xED;

/// Length of a public key on the wire, for both algorithms.
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Errors that can occur during key operations.
///
/// A rejected secret is described by a short static reason. The key bytes
/// never appear in the error.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(&'static str),

    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("signing failed")]
    SigningFailed,
}

/// The two signature schemes the network understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    Ed25519,
    Secp256k1,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => write!(f, "ed25519"),
            Self::Secp256k1 => write!(f, "secp256k1"),
        }
    }
}

// ---------------------------------------------------------------------------
// KeyPair
// ---------------------------------------------------------------------------

enum KeyMaterial {
    Ed25519(SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

/// A participant's signing key.
///
/// `KeyPair` intentionally does NOT implement `Serialize`. Loading keys is
/// supported (from hex) so tools can sign; storing them is somebody else's
/// job.
///
/// # Examples
///
/// ```
/// use batch_protocol::crypto::KeyPair;
///
/// let kp = KeyPair::from_ed25519_secret(&[7u8; 32]);
/// let sig = kp.sign(b"batch").unwrap();
/// assert!(kp.public_key().verify(b"batch", &sig));
/// ```
pub struct KeyPair {
    material: KeyMaterial,
}

impl KeyPair {
    /// Generate a fresh Ed25519 key from the OS RNG.
    pub fn generate_ed25519() -> Self {
        Self {
            material: KeyMaterial::Ed25519(SigningKey::generate(&mut OsRng)),
        }
    }

    /// Generate a fresh secp256k1 key from the OS RNG.
    pub fn generate_secp256k1() -> Self {
        Self {
            material: KeyMaterial::Secp256k1(k256::ecdsa::SigningKey::random(&mut OsRng)),
        }
    }

    /// Ed25519 key from its raw 32-byte secret.
    pub fn from_ed25519_secret(secret: &[u8; 32]) -> Self {
        Self {
            material: KeyMaterial::Ed25519(SigningKey::from_bytes(secret)),
        }
    }

    /// secp256k1 key from its 32-byte scalar. Fails for zero or
    /// out-of-range scalars.
    pub fn from_secp256k1_secret(secret: &[u8; 32]) -> Result<Self, KeyError> {
        let key = k256::ecdsa::SigningKey::from_slice(secret)
            .map_err(|_| KeyError::InvalidSecretKey("scalar out of range"))?;
        Ok(Self {
            material: KeyMaterial::Secp256k1(key),
        })
    }

    /// Parse a hex-encoded secret in the network's private key format.
    ///
    /// - `ED` + 64 hex chars: Ed25519.
    /// - `00` + 64 hex chars, or bare 64 hex chars: secp256k1.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey("not hex"))?;

        let mut secret = [0u8; 32];
        match bytes.len() {
            33 if bytes[0] == ED25519_PREFIX => {
                secret.copy_from_slice(&bytes[1..]);
                Ok(Self::from_ed25519_secret(&secret))
            }
            33 if bytes[0] == 0x00 => {
                secret.copy_from_slice(&bytes[1..]);
                Self::from_secp256k1_secret(&secret)
            }
            32 => {
                secret.copy_from_slice(&bytes);
                Self::from_secp256k1_secret(&secret)
            }
            _ => Err(KeyError::InvalidSecretKey("unexpected length or prefix")),
        }
    }

    /// Which scheme this key signs with.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self.material {
            KeyMaterial::Ed25519(_) => KeyAlgorithm::Ed25519,
            KeyMaterial::Secp256k1(_) => KeyAlgorithm::Secp256k1,
        }
    }

    /// The 33-byte public key in wire form.
    pub fn public_key(&self) -> PublicKey {
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        match &self.material {
            KeyMaterial::Ed25519(key) => {
                bytes[0] = ED25519_PREFIX;
                bytes[1..].copy_from_slice(key.verifying_key().as_bytes());
            }
            KeyMaterial::Secp256k1(key) => {
                let point = key.verifying_key().to_encoded_point(true);
                bytes.copy_from_slice(point.as_bytes());
            }
        }
        PublicKey { bytes }
    }

    /// Sign a message the way the network expects for this algorithm.
    ///
    /// Ed25519 signs `message` directly. secp256k1 signs
    /// `SHA512Half(message)` and the signature is normalized to low-S and
    /// DER-encoded; high-S signatures are rejected by the network as
    /// malleable.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, KeyError> {
        match &self.material {
            KeyMaterial::Ed25519(key) => Ok(Signature {
                bytes: key.sign(message).to_bytes().to_vec(),
            }),
            KeyMaterial::Secp256k1(key) => {
                let digest = sha512_half(message);
                let sig: k256::ecdsa::Signature = key
                    .sign_prehash(&digest)
                    .map_err(|_| KeyError::SigningFailed)?;
                let sig = sig.normalize_s().unwrap_or(sig);
                Ok(Signature {
                    bytes: sig.to_der().as_bytes().to_vec(),
                })
            }
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyPair({}, pub={})",
            self.algorithm(),
            self.public_key().to_hex()
        )
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A 33-byte public key as it appears in `SigningPubKey` fields.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_LENGTH],
}

impl PublicKey {
    /// Parse and validate wire-form public key bytes.
    ///
    /// The point itself is checked, not just the length and prefix.
    pub fn from_bytes(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;

        match bytes[0] {
            ED25519_PREFIX => {
                let mut point = [0u8; 32];
                point.copy_from_slice(&bytes[1..]);
                VerifyingKey::from_bytes(&point).map_err(|_| KeyError::InvalidPublicKey)?;
            }
            0x02 | 0x03 => {
                k256::ecdsa::VerifyingKey::from_sec1_bytes(&bytes)
                    .map_err(|_| KeyError::InvalidPublicKey)?;
            }
            _ => return Err(KeyError::InvalidPublicKey),
        }
        Ok(Self { bytes })
    }

    /// Parse a hex-encoded public key (either case).
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    /// Algorithm implied by the leading byte.
    pub fn algorithm(&self) -> KeyAlgorithm {
        if self.bytes[0] == ED25519_PREFIX {
            KeyAlgorithm::Ed25519
        } else {
            KeyAlgorithm::Secp256k1
        }
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.bytes
    }

    /// Uppercase hex, the network's display convention.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.bytes)
    }

    /// Verify a signature produced by [`KeyPair::sign`].
    ///
    /// Returns `false` for any malformed input rather than an error; callers
    /// only need a yes/no answer.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        match self.algorithm() {
            KeyAlgorithm::Ed25519 => {
                let mut point = [0u8; 32];
                point.copy_from_slice(&self.bytes[1..]);
                let Ok(key) = VerifyingKey::from_bytes(&point) else {
                    return false;
                };
                let sig_bytes: [u8; 64] = match signature.bytes.as_slice().try_into() {
                    Ok(b) => b,
                    Err(_) => return false,
                };
                key.verify(message, &DalekSignature::from_bytes(&sig_bytes))
                    .is_ok()
            }
            KeyAlgorithm::Secp256k1 => {
                let Ok(key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.bytes) else {
                    return false;
                };
                let Ok(sig) = k256::ecdsa::Signature::from_der(&signature.bytes) else {
                    return false;
                };
                // High-S signatures are malleable and refused by the network.
                if sig.normalize_s().is_some() {
                    return false;
                }
                key.verify_prehash(&sha512_half(message), &sig).is_ok()
            }
        }
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..18])
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Signature bytes as carried in `TxnSignature` fields.
///
/// Variable length: 64 bytes for Ed25519, 70-72 bytes of DER for secp256k1.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    /// Wrap raw signature bytes. No validation happens until verification.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Parse a hex-encoded signature.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.is_empty() {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Uppercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() > 16 {
            write!(
                f,
                "Signature({}...{})",
                &hex_str[..8],
                &hex_str[hex_str.len() - 8..]
            )
        } else {
            write!(f, "Signature({})", hex_str)
        }
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
