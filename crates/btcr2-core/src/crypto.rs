//! Cryptographic primitives for did:btcr2.
//!
//! Wraps BIP-340 Schnorr signing over secp256k1 with strong types, plus the
//! multibase encodings used inside DID documents and proofs.

use bitcoin::secp256k1::{self, schnorr, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{CoreError, Result};

/// Multicodec prefix for a compressed secp256k1 public key.
const SECP256K1_PUB_MULTICODEC: [u8; 2] = [0xe7, 0x01];

/// Multibase prefix for base58btc.
const BASE58BTC_PREFIX: char = 'z';

pub(crate) fn secp() -> &'static Secp256k1<secp256k1::All> {
    static CONTEXT: OnceLock<Secp256k1<secp256k1::All>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::new)
}

fn decode_base58btc(value: &str) -> Result<Vec<u8>> {
    let encoded = value
        .strip_prefix(BASE58BTC_PREFIX)
        .ok_or_else(|| CoreError::InvalidMultibase(format!("expected 'z' prefix: {value}")))?;
    bitcoin::base58::decode(encoded)
        .map_err(|_| CoreError::InvalidMultibase(format!("invalid base58btc: {value}")))
}

/// A 33-byte compressed secp256k1 public key.
///
/// Construction always checks that the bytes are a point on the curve.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: [u8; 33],
    key: secp256k1::PublicKey,
}

impl PublicKey {
    /// Parse and validate a compressed key.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 33 {
            return Err(CoreError::InvalidPublicKey);
        }
        let key = secp256k1::PublicKey::from_slice(bytes).map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(Self::from_inner(key))
    }

    fn from_inner(key: secp256k1::PublicKey) -> Self {
        Self {
            bytes: key.serialize(),
            key,
        }
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 33] {
        &self.bytes
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidPublicKey)?;
        Self::from_slice(&bytes)
    }

    /// The underlying secp256k1 key.
    pub fn inner(&self) -> secp256k1::PublicKey {
        self.key
    }

    /// The BIP-340 x-only form of this key.
    pub fn x_only(&self) -> XOnlyPublicKey {
        self.key.x_only_public_key().0
    }

    /// Encode as a Multikey `publicKeyMultibase` value.
    pub fn to_multikey(&self) -> String {
        let mut buf = Vec::with_capacity(35);
        buf.extend_from_slice(&SECP256K1_PUB_MULTICODEC);
        buf.extend_from_slice(&self.bytes);
        format!("{BASE58BTC_PREFIX}{}", bitcoin::base58::encode(&buf))
    }

    /// Decode a Multikey `publicKeyMultibase` value.
    pub fn from_multikey(value: &str) -> Result<Self> {
        let bytes = decode_base58btc(value)?;
        let key = bytes
            .strip_prefix(&SECP256K1_PUB_MULTICODEC[..])
            .ok_or_else(|| CoreError::InvalidMultibase(format!("not a secp256k1 multikey: {value}")))?;
        Self::from_slice(key)
    }

    /// Verify a BIP-340 signature over a 32-byte digest.
    pub fn verify(&self, digest: &[u8; 32], signature: &SchnorrSignature) -> Result<()> {
        let sig =
            schnorr::Signature::from_slice(&signature.0).map_err(|_| CoreError::InvalidSignature)?;
        let msg = Message::from_digest(*digest);
        secp()
            .verify_schnorr(&sig, &msg, &self.x_only())
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = CoreError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_slice(bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 64-byte BIP-340 Schnorr signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SchnorrSignature(pub [u8; 64]);

impl SchnorrSignature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Encode as a base58btc multibase `proofValue`.
    pub fn to_multibase(&self) -> String {
        format!("{BASE58BTC_PREFIX}{}", bitcoin::base58::encode(&self.0))
    }

    /// Decode a base58btc multibase `proofValue`.
    pub fn from_multibase(value: &str) -> Result<Self> {
        let bytes = decode_base58btc(value)?;
        let arr: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            CoreError::InvalidMultibase(format!("signature must be 64 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for SchnorrSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchnorrSig({}...)", &self.to_hex()[..16])
    }
}

impl From<[u8; 64]> for SchnorrSignature {
    fn from(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }
}

/// A secp256k1 keypair for signing updates.
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::new(&mut rand::thread_rng());
        Self::from_secret(secret)
    }

    /// Create from 32 secret bytes.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| CoreError::InvalidSecretKey)?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = secp256k1::PublicKey::from_secret_key(secp(), &secret);
        Self {
            secret,
            public: PublicKey::from_inner(public),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Sign a 32-byte digest. Deterministic for a given key and digest.
    pub fn sign(&self, digest: &[u8; 32]) -> SchnorrSignature {
        let keypair = secp256k1::Keypair::from_secret_key(secp(), &self.secret);
        let msg = Message::from_digest(*digest);
        SchnorrSignature(secp().sign_schnorr_no_aux_rand(&msg, &keypair).serialize())
    }

    /// Get the raw secret bytes.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public)
    }
}
