//! Sparse Merkle tree for SMT aggregate beacons.
//!
//! A 256-level binary tree keyed by `sha256(did)`, read MSB-first: bit 0 of
//! the key picks the child under the root.
//!
//! ```text
//! leaf   = sha256(nonce || updateId)   (sha256(updateId) without a nonce)
//! empty  = 32 zero bytes
//! parent = empty                        if both children are empty
//!        = sha256(left || right)        otherwise
//! ```
//!
//! A proof lists only non-empty siblings, leaf to root; the `collapsed`
//! bitmap marks the depths whose sibling is empty.

use std::collections::BTreeMap;

use btcr2_core::{sha256, ContentHash};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{BeaconError, Result};

/// Depth of the tree, one level per key bit.
pub const TREE_DEPTH: usize = 256;

/// An SMT inclusion (or non-inclusion) proof for one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtProof {
    /// The root this proof is for; also the signal bytes of the beacon.
    pub id: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<ContentHash>,
    /// Hash of the identifier's update; absent when the slot is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_id: Option<ContentHash>,
    /// 256-bit bitmap, hex. Bit `d` set means the sibling at depth `d` is empty.
    pub collapsed: String,
    /// Non-empty siblings, leaf to root.
    pub hashes: Vec<ContentHash>,
}

impl SmtProof {
    /// Verify this proof for `did` and return the committed update hash.
    ///
    /// `Ok(None)` means the proof shows the identifier has no update under
    /// this root.
    pub fn verify(&self, did: &str) -> Result<Option<ContentHash>> {
        let collapsed = decode_bitmap(&self.collapsed)?;
        let key = tree_key(did);

        let mut node = leaf_hash(self.nonce.as_ref(), self.update_id.as_ref());
        let mut siblings = self.hashes.iter();
        for depth in (0..TREE_DEPTH).rev() {
            let sibling = if bit(&collapsed, depth) {
                ContentHash::ZERO
            } else {
                *siblings
                    .next()
                    .ok_or_else(|| BeaconError::InvalidSmtProof("too few hashes".into()))?
            };
            node = if bit(key.as_bytes(), depth) {
                parent(&sibling, &node)
            } else {
                parent(&node, &sibling)
            };
        }

        if siblings.next().is_some() {
            return Err(BeaconError::InvalidSmtProof("too many hashes".into()));
        }
        if node != self.id {
            return Err(BeaconError::InvalidSmtProof(format!(
                "computed root {node} does not match {}",
                self.id
            )));
        }
        Ok(self.update_id)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    nonce: Option<ContentHash>,
    update_id: ContentHash,
    leaf: ContentHash,
}

/// A sparse Merkle tree an aggregator builds for one signal.
#[derive(Debug, Clone, Default)]
pub struct SparseMerkleTree {
    entries: BTreeMap<ContentHash, Entry>,
}

impl SparseMerkleTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit `update_id` for `did`, replacing any previous entry.
    pub fn insert(&mut self, did: &str, update_id: ContentHash, nonce: Option<ContentHash>) {
        let leaf = leaf_hash(nonce.as_ref(), Some(&update_id));
        self.entries.insert(
            tree_key(did),
            Entry {
                nonce,
                update_id,
                leaf,
            },
        );
    }

    /// Commit `update_id` for `did` under a fresh random nonce.
    pub fn insert_with_random_nonce(&mut self, did: &str, update_id: ContentHash) {
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.insert(did, update_id, Some(ContentHash::from_bytes(nonce)));
    }

    /// Number of committed identifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is committed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The root hash.
    pub fn root(&self) -> ContentHash {
        let leaves: Vec<(ContentHash, ContentHash)> =
            self.entries.iter().map(|(k, e)| (*k, e.leaf)).collect();
        subtree(&leaves, 0)
    }

    /// A proof for `did`. Proves absence if `did` was never inserted.
    pub fn proof(&self, did: &str) -> SmtProof {
        let key = tree_key(did);
        let leaves: Vec<(ContentHash, ContentHash)> =
            self.entries.iter().map(|(k, e)| (*k, e.leaf)).collect();

        let mut collapsed = [0u8; 32];
        let mut root_to_leaf = Vec::new();
        let mut slice = leaves.as_slice();
        for depth in 0..TREE_DEPTH {
            let split = slice.partition_point(|(k, _)| !bit(k.as_bytes(), depth));
            let (left, right) = slice.split_at(split);
            let (ours, theirs) = if bit(key.as_bytes(), depth) {
                (right, left)
            } else {
                (left, right)
            };

            let sibling = subtree(theirs, depth + 1);
            if sibling.is_zero() {
                collapsed[depth / 8] |= 0x80 >> (depth % 8);
            } else {
                root_to_leaf.push(sibling);
            }
            slice = ours;
        }

        let entry = self.entries.get(&key);
        root_to_leaf.reverse();
        SmtProof {
            id: self.root(),
            nonce: entry.and_then(|e| e.nonce),
            update_id: entry.map(|e| e.update_id),
            collapsed: hex::encode(collapsed),
            hashes: root_to_leaf,
        }
    }
}

/// `sha256(did)`: the identifier's slot in the tree.
pub fn tree_key(did: &str) -> ContentHash {
    sha256(did.as_bytes())
}

fn leaf_hash(nonce: Option<&ContentHash>, update_id: Option<&ContentHash>) -> ContentHash {
    match (nonce, update_id) {
        (Some(n), Some(u)) => {
            let mut buf = [0u8; 64];
            buf[..32].copy_from_slice(n.as_bytes());
            buf[32..].copy_from_slice(u.as_bytes());
            sha256(&buf)
        }
        (None, Some(u)) => sha256(u.as_bytes()),
        (_, None) => ContentHash::ZERO,
    }
}

fn parent(left: &ContentHash, right: &ContentHash) -> ContentHash {
    if left.is_zero() && right.is_zero() {
        return ContentHash::ZERO;
    }
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_bytes());
    buf[32..].copy_from_slice(right.as_bytes());
    sha256(&buf)
}

/// Hash of the subtree at `depth` holding `leaves`, sorted by key.
fn subtree(leaves: &[(ContentHash, ContentHash)], depth: usize) -> ContentHash {
    match leaves {
        [] => ContentHash::ZERO,
        [(_, leaf)] if depth == TREE_DEPTH => *leaf,
        _ => {
            let split = leaves.partition_point(|(k, _)| !bit(k.as_bytes(), depth));
            let (left, right) = leaves.split_at(split);
            parent(&subtree(left, depth + 1), &subtree(right, depth + 1))
        }
    }
}

fn bit(bytes: &[u8], index: usize) -> bool {
    bytes[index / 8] & (0x80 >> (index % 8)) != 0
}

fn decode_bitmap(hex_str: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| BeaconError::InvalidSmtProof(format!("collapsed: {e}")))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| BeaconError::InvalidSmtProof("collapsed must be 32 bytes".into()))
}
