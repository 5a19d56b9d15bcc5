//! Beacon sets that change over time, and aggregate beacons.

use bitcoin::{Address, CompressedPublicKey};
use btcr2::core::{BeaconService, BeaconType, ContentHash};
use btcr2::{
    CasAnnouncement, DidDocument, Keypair, PatchOperation, Resolution, ResolutionOptions,
    Resolver, ResolverConfig, SparseMerkleTree, UpdateBuilder,
};
use btcr2_testkit::{patched, TestFixture};
use serde_json::json;

fn note(n: u64) -> Vec<PatchOperation> {
    vec![PatchOperation::Add {
        path: format!("/note{n}"),
        value: json!(n),
    }]
}

async fn resolve(fixture: &TestFixture) -> Resolution {
    Resolver::new(fixture.ledger.clone(), ResolverConfig::default())
        .resolve(&fixture.did, &fixture.sidecar, &ResolutionOptions::new())
        .await
        .unwrap()
}

fn regtest_address(keypair: &Keypair) -> Address {
    let key = CompressedPublicKey(keypair.public_key().inner());
    Address::p2wpkh(&key, bitcoin::Network::Regtest)
}

/// Add an aggregate beacon `#cohort` through a singleton update.
fn add_cohort_beacon(fixture: &mut TestFixture, beacon_type: BeaconType) -> DidDocument {
    let service = BeaconService::new(
        format!("{}#cohort", fixture.did),
        beacon_type,
        &regtest_address(&Keypair::generate()),
    );
    let genesis = fixture.genesis.clone();
    let (_, v2) = fixture.publish_update(
        &genesis,
        1,
        vec![PatchOperation::Add {
            path: "/service/-".into(),
            value: service.to_value(),
        }],
        "#initialP2PKH",
    );
    v2
}

#[tokio::test]
async fn test_key_rotation_moves_beacons() {
    let mut fixture = TestFixture::new();
    let genesis = fixture.genesis.clone();
    let new_key = Keypair::generate();

    let method = btcr2::core::VerificationMethod::multikey(
        format!("{}#key-2", fixture.did),
        &fixture.did,
        &new_key.public_key(),
    );
    let beacon = BeaconService::new(
        format!("{}#rotated", fixture.did),
        BeaconType::Singleton,
        &regtest_address(&new_key),
    );
    let mut rotation = vec![
        PatchOperation::Replace {
            path: "/verificationMethod".into(),
            value: json!([method]),
        },
        PatchOperation::Replace {
            path: "/service".into(),
            value: json!([beacon.to_value()]),
        },
    ];
    for relationship in [
        "authentication",
        "assertionMethod",
        "capabilityInvocation",
        "capabilityDelegation",
    ] {
        rotation.push(PatchOperation::Replace {
            path: format!("/{relationship}"),
            value: json!(["#key-2"]),
        });
    }
    let (_, v2) = fixture.publish_update(&genesis, 1, rotation, "#initialP2TR");

    let next = UpdateBuilder::new(&fixture.did, &v2, 2)
        .patch(note(2))
        .sign(&new_key)
        .unwrap();
    fixture.sidecar.push_update(&next);
    let hash = next.hash().unwrap();

    // The retired beacon is no longer watched.
    fixture.announce(&genesis, "#initialP2PKH", &hash);
    let resolution = resolve(&fixture).await;
    assert_eq!(resolution.document, v2);
    assert_eq!(resolution.metadata.rejected_count, 0);

    fixture.announce(&v2, "#rotated", &hash);
    let resolution = resolve(&fixture).await;
    assert_eq!(resolution.document, patched(&v2, &next.patch));
    assert_eq!(resolution.metadata.version_id, 3);

    // The old key lost its capability.
    let refused = UpdateBuilder::new(&fixture.did, &resolution.document, 3)
        .patch(note(3))
        .verification_method("#initialKey")
        .sign(&fixture.keypair);
    assert!(refused.is_err());
}

#[tokio::test]
async fn test_one_transaction_spending_two_beacons() {
    let mut fixture = TestFixture::new();
    let genesis = fixture.genesis.clone();
    let update = fixture.sign_update(&genesis, 1, note(1));
    fixture.sidecar.push_update(&update);
    let hash = update.hash().unwrap();

    let p2pkh = fixture.beacon(&genesis, "#initialP2PKH");
    let p2tr = fixture.beacon(&genesis, "#initialP2TR");
    let inputs = [
        fixture.fund(p2pkh.script_pubkey),
        fixture.fund(p2tr.script_pubkey),
    ];
    fixture.publish(&inputs, &hash);

    let resolution = resolve(&fixture).await;
    assert_eq!(resolution.metadata.version_id, 2);
    assert_eq!(resolution.metadata.update_count, 1);
    assert_eq!(resolution.metadata.rejected_count, 0);
}

#[tokio::test]
async fn test_reannouncement_is_not_a_rejection() {
    let mut fixture = TestFixture::new();
    let genesis = fixture.genesis.clone();
    let (update, v2) = fixture.publish_update(&genesis, 1, note(1), "#initialP2PKH");
    fixture.announce(&genesis, "#initialP2WPKH", &update.hash().unwrap());

    let resolution = resolve(&fixture).await;
    assert_eq!(resolution.document, v2);
    assert_eq!(resolution.metadata.rejected_count, 0);
}

#[tokio::test]
async fn test_cid_aggregate_beacon() {
    let mut fixture = TestFixture::new();
    let v2 = add_cohort_beacon(&mut fixture, BeaconType::CidAggregate);

    let update = fixture.sign_update(&v2, 2, note(2));
    fixture.sidecar.push_update(&update);

    let mut announcement = CasAnnouncement::new();
    announcement.insert(fixture.did.clone(), update.hash().unwrap());
    announcement.insert(
        TestFixture::new().did,
        ContentHash::from_bytes([1; 32]),
    );
    fixture.sidecar.push_announcement(&announcement);
    fixture.announce(&v2, "#cohort", &announcement.hash().unwrap());

    let resolution = resolve(&fixture).await;
    assert_eq!(resolution.document, patched(&v2, &update.patch));
    assert_eq!(resolution.metadata.version_id, 3);
}

#[tokio::test]
async fn test_cid_announcement_without_entry_is_skipped() {
    let mut fixture = TestFixture::new();
    let v2 = add_cohort_beacon(&mut fixture, BeaconType::CidAggregate);

    let mut announcement = CasAnnouncement::new();
    announcement.insert(TestFixture::new().did, ContentHash::from_bytes([1; 32]));
    fixture.sidecar.push_announcement(&announcement);
    fixture.announce(&v2, "#cohort", &announcement.hash().unwrap());

    let resolution = resolve(&fixture).await;
    assert_eq!(resolution.document, v2);
    assert_eq!(resolution.metadata.rejected_count, 0);
}

#[tokio::test]
async fn test_smt_aggregate_beacon() {
    let mut fixture = TestFixture::new();
    let v2 = add_cohort_beacon(&mut fixture, BeaconType::SmtAggregate);

    let update = fixture.sign_update(&v2, 2, note(2));
    fixture.sidecar.push_update(&update);

    let mut tree = SparseMerkleTree::new();
    tree.insert_with_random_nonce(&fixture.did, update.hash().unwrap());
    for _ in 0..4 {
        tree.insert_with_random_nonce(&TestFixture::new().did, ContentHash::from_bytes([2; 32]));
    }
    fixture.sidecar.push_smt_proof(&tree.proof(&fixture.did));
    fixture.announce(&v2, "#cohort", &tree.root());

    let resolution = resolve(&fixture).await;
    assert_eq!(resolution.document, patched(&v2, &update.patch));
    assert_eq!(resolution.metadata.version_id, 3);
}

#[tokio::test]
async fn test_smt_non_inclusion_is_skipped() {
    let mut fixture = TestFixture::new();
    let v2 = add_cohort_beacon(&mut fixture, BeaconType::SmtAggregate);

    let mut tree = SparseMerkleTree::new();
    tree.insert(&TestFixture::new().did, ContentHash::from_bytes([2; 32]), None);
    fixture.sidecar.push_smt_proof(&tree.proof(&fixture.did));
    fixture.announce(&v2, "#cohort", &tree.root());

    let resolution = resolve(&fixture).await;
    assert_eq!(resolution.document, v2);
    assert_eq!(resolution.metadata.rejected_count, 0);
}
