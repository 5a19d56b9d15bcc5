//! The beacon registry: which addresses to watch for a document version.

use bitcoin::{Address, Script, ScriptBuf};
use btcr2_core::{BeaconType, DidDocument, Network};
use tracing::warn;

/// A beacon service resolved to a concrete output script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    /// Absolute service id.
    pub id: String,
    pub beacon_type: BeaconType,
    pub address: Address,
    pub script_pubkey: ScriptBuf,
}

/// The beacons of one document version, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeaconRegistry {
    beacons: Vec<Beacon>,
}

impl BeaconRegistry {
    /// Derive the registry from a document's beacon services.
    ///
    /// Services whose endpoint is not a single address valid on `network`
    /// are skipped.
    pub fn from_document(document: &DidDocument, network: Network) -> Self {
        let mut beacons: Vec<Beacon> = Vec::new();
        for service in document.beacon_services() {
            match service.address(network) {
                Ok(address) => {
                    if beacons.iter().any(|b| b.id == service.id) {
                        warn!(service = %service.id, "skipping duplicate beacon service id");
                        continue;
                    }
                    beacons.push(Beacon {
                        id: service.id,
                        beacon_type: service.beacon_type,
                        script_pubkey: address.script_pubkey(),
                        address,
                    });
                }
                Err(e) => {
                    warn!(service = %service.id, error = %e, "skipping beacon with unusable endpoint");
                }
            }
        }
        Self { beacons }
    }

    /// All beacons.
    pub fn beacons(&self) -> &[Beacon] {
        &self.beacons
    }

    /// Beacon by id.
    pub fn get(&self, id: &str) -> Option<&Beacon> {
        self.beacons.iter().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    /// Beacons locked to `script`, in registry order.
    pub fn match_script(&self, script: &Script) -> Vec<&Beacon> {
        self.beacons
            .iter()
            .filter(|b| b.script_pubkey.as_script() == script)
            .collect()
    }
}
