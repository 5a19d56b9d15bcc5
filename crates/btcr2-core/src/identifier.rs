//! The `did:btcr2` identifier codec.
//!
//! An identifier is `did:btcr2:` followed by a Bech32m string:
//!
//! ```text
//! did:btcr2:<hrp>1<data><checksum>
//!           |    | '--- base32(byte0 || genesis_bytes), 6-char Bech32m checksum
//!           |    '----- separator
//!           '---------- "k" (KEY) or "x" (EXTERNAL)
//!
//! byte0 = ((version - 1) << 4) | network
//! ```
//!
//! Encoding is deterministic: identical components always produce an
//! identical string, and `decode(encode(c)) == c` for every valid `c`.

use bitcoin::bech32::primitives::decode::{
    CharError, CheckedHrpstring, CheckedHrpstringError, UncheckedHrpstringError,
};
use bitcoin::bech32::primitives::hrp;
use bitcoin::bech32::{self, Bech32m, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::PublicKey;
use crate::error::IdentifierError;
use crate::types::ContentHash;

/// Method prefix shared by every identifier.
pub const DID_PREFIX: &str = "did:btcr2:";

/// Highest version representable in the version nibble.
pub const MAX_VERSION: u8 = 16;

const HRP_KEY: Hrp = Hrp::parse_unchecked("k");
const HRP_EXTERNAL: Hrp = Hrp::parse_unchecked("x");

/// How the genesis bytes of an identifier are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdType {
    /// Genesis bytes are a 33-byte compressed secp256k1 public key.
    Key,
    /// Genesis bytes are the SHA-256 of a canonicalized genesis document.
    External,
}

impl IdType {
    /// The Bech32 human-readable part for this type.
    pub fn hrp(self) -> &'static str {
        match self {
            IdType::Key => "k",
            IdType::External => "x",
        }
    }

    fn bech32_hrp(self) -> Hrp {
        match self {
            IdType::Key => HRP_KEY,
            IdType::External => HRP_EXTERNAL,
        }
    }

    /// Parse from a Bech32 human-readable part.
    pub fn from_hrp(hrp: &str) -> Option<Self> {
        match hrp {
            "k" => Some(IdType::Key),
            "x" => Some(IdType::External),
            _ => None,
        }
    }

    /// Required length of the genesis bytes.
    pub fn genesis_len(self) -> usize {
        match self {
            IdType::Key => 33,
            IdType::External => 32,
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdType::Key => f.write_str("KEY"),
            IdType::External => f.write_str("EXTERNAL"),
        }
    }
}

/// The Bitcoin network an identifier is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Network {
    Bitcoin = 0,
    Signet = 1,
    Regtest = 2,
    Testnet3 = 3,
    Testnet4 = 4,
    Mutinynet = 5,
}

impl Network {
    /// Every supported network, in nibble order.
    pub const ALL: [Network; 6] = [
        Network::Bitcoin,
        Network::Signet,
        Network::Regtest,
        Network::Testnet3,
        Network::Testnet4,
        Network::Mutinynet,
    ];

    /// Convert to the network nibble.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from a network nibble.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Network::Bitcoin),
            1 => Some(Network::Signet),
            2 => Some(Network::Regtest),
            3 => Some(Network::Testnet3),
            4 => Some(Network::Testnet4),
            5 => Some(Network::Mutinynet),
            _ => None,
        }
    }

    /// Lowercase network name.
    pub fn name(self) -> &'static str {
        match self {
            Network::Bitcoin => "bitcoin",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
            Network::Testnet3 => "testnet3",
            Network::Testnet4 => "testnet4",
            Network::Mutinynet => "mutinynet",
        }
    }

    /// Address parameters used for beacon addresses on this network.
    ///
    /// Both testnets share testnet address encoding; mutinynet is a signet.
    pub fn bitcoin_network(self) -> bitcoin::Network {
        match self {
            Network::Bitcoin => bitcoin::Network::Bitcoin,
            Network::Signet | Network::Mutinynet => bitcoin::Network::Signet,
            Network::Regtest => bitcoin::Network::Regtest,
            Network::Testnet3 | Network::Testnet4 => bitcoin::Network::Testnet,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|n| n.name() == s)
            .ok_or(IdentifierError::UnknownNetwork(0xff))
    }
}

/// The decoded parts of a `did:btcr2` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierComponents {
    pub id_type: IdType,
    pub version: u8,
    pub network: Network,
    #[serde(with = "hex_bytes")]
    pub genesis_bytes: Vec<u8>,
}

impl IdentifierComponents {
    /// Create validated components.
    pub fn new(
        id_type: IdType,
        version: u8,
        network: Network,
        genesis_bytes: Vec<u8>,
    ) -> Result<Self, IdentifierError> {
        let components = Self {
            id_type,
            version,
            network,
            genesis_bytes,
        };
        components.validate()?;
        Ok(components)
    }

    /// Version 1 KEY components for a public key.
    pub fn key(public_key: &PublicKey, network: Network) -> Self {
        Self {
            id_type: IdType::Key,
            version: 1,
            network,
            genesis_bytes: public_key.as_bytes().to_vec(),
        }
    }

    /// Version 1 EXTERNAL components for a genesis document hash.
    pub fn external(genesis_hash: &ContentHash, network: Network) -> Self {
        Self {
            id_type: IdType::External,
            version: 1,
            network,
            genesis_bytes: genesis_hash.as_bytes().to_vec(),
        }
    }

    /// The genesis public key of a KEY identifier.
    pub fn public_key(&self) -> Option<PublicKey> {
        match self.id_type {
            IdType::Key => PublicKey::from_slice(&self.genesis_bytes).ok(),
            IdType::External => None,
        }
    }

    /// The genesis document hash of an EXTERNAL identifier.
    pub fn genesis_hash(&self) -> Option<ContentHash> {
        match self.id_type {
            IdType::External => ContentHash::try_from(self.genesis_bytes.as_slice()).ok(),
            IdType::Key => None,
        }
    }

    /// Encode to the identifier string.
    pub fn encode(&self) -> Result<String, IdentifierError> {
        encode(self)
    }

    /// Decode from an identifier string.
    pub fn decode(identifier: &str) -> Result<Self, IdentifierError> {
        decode(identifier)
    }

    fn validate(&self) -> Result<(), IdentifierError> {
        if self.version == 0 || self.version > MAX_VERSION {
            return Err(IdentifierError::UnsupportedVersion(self.version));
        }

        let expected = self.id_type.genesis_len();
        if self.genesis_bytes.len() != expected {
            return Err(IdentifierError::InvalidGenesisLength {
                id_type: self.id_type,
                expected,
                got: self.genesis_bytes.len(),
            });
        }

        if self.id_type == IdType::Key && PublicKey::from_slice(&self.genesis_bytes).is_err() {
            return Err(IdentifierError::InvalidGenesisKey);
        }

        Ok(())
    }
}

impl FromStr for IdentifierComponents {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// Encode components into a `did:btcr2` identifier.
pub fn encode(components: &IdentifierComponents) -> Result<String, IdentifierError> {
    components.validate()?;

    let mut payload = Vec::with_capacity(1 + components.genesis_bytes.len());
    payload.push(((components.version - 1) << 4) | components.network.to_u8());
    payload.extend_from_slice(&components.genesis_bytes);

    let body = bech32::encode::<Bech32m>(components.id_type.bech32_hrp(), &payload)
        .map_err(|e| IdentifierError::Encoding(e.to_string()))?;
    Ok(format!("{DID_PREFIX}{body}"))
}

/// Decode a `did:btcr2` identifier into its components.
pub fn decode(identifier: &str) -> Result<IdentifierComponents, IdentifierError> {
    let body = identifier
        .strip_prefix(DID_PREFIX)
        .ok_or(IdentifierError::MissingPrefix)?;

    // Bech32 also accepts all-uppercase strings; identifiers are lowercase only.
    if let Some(upper) = body.chars().find(|c| c.is_ascii_uppercase()) {
        if body.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(IdentifierError::MixedCase);
        }
        return Err(IdentifierError::InvalidCharacter(upper));
    }

    let checked = CheckedHrpstring::new::<Bech32m>(body).map_err(bech32_error)?;
    checked
        .validate_segwit_padding()
        .map_err(|_| IdentifierError::InvalidPadding)?;

    let hrp = checked.hrp();
    let id_type = IdType::from_hrp(hrp.as_str())
        .ok_or_else(|| IdentifierError::UnknownIdType(hrp.to_string()))?;

    let payload: Vec<u8> = checked.byte_iter().collect();
    let (&head, genesis) = payload.split_first().ok_or(IdentifierError::EmptyPayload)?;

    let version = (head >> 4) + 1;
    let network = Network::from_u8(head & 0x0f).ok_or(IdentifierError::UnknownNetwork(head & 0x0f))?;

    IdentifierComponents::new(id_type, version, network, genesis.to_vec())
}

fn bech32_error(e: CheckedHrpstringError) -> IdentifierError {
    match e {
        CheckedHrpstringError::Parse(UncheckedHrpstringError::Char(e)) => match e {
            CharError::InvalidChar(c) => IdentifierError::InvalidCharacter(c),
            CharError::MixedCase => IdentifierError::MixedCase,
            CharError::MissingSeparator => IdentifierError::MissingSeparator,
            _ => IdentifierError::InvalidChecksum,
        },
        CheckedHrpstringError::Parse(UncheckedHrpstringError::Hrp(hrp::Error::Empty)) => {
            IdentifierError::MissingSeparator
        }
        CheckedHrpstringError::Parse(UncheckedHrpstringError::Hrp(e)) => {
            IdentifierError::UnknownIdType(e.to_string())
        }
        _ => IdentifierError::InvalidChecksum,
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
