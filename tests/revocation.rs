mod util;

use std::collections::HashSet;
use std::sync::Arc;

use iiot_ca::cert::SerialNumber;
use iiot_ca::crl::CrlFactory;
use iiot_ca::error::CaError;
use iiot_ca::revoker::CertificateRevoker;
use iiot_ca::storage::{CertificateStore, CrlRepository};
use time::{Duration, OffsetDateTime};

#[tokio::test]
async fn test_revoke_intermediate_cascades() {
    // Page size one so the walk has to follow page tokens.
    let engine = util::engine_with(util::test_config(), 1);
    let root = util::new_root(&engine, "rootca", Duration::hours(3)).await;
    let footca = util::new_intermediate(&engine, "rootca", "footca", Duration::hours(1)).await;
    let leaf_a = util::new_leaf(&engine, "footca", "device-a").await;
    let leaf_b = util::new_leaf(&engine, "footca", "device-b").await;
    let barca = util::new_intermediate(&engine, "rootca", "barca", Duration::hours(1)).await;
    let unrelated = util::new_leaf(&engine, "barca", "device-c").await;
    let sibling = util::new_leaf(&engine, "rootca", "device-d").await;

    // Populate the cache for every issuer involved.
    engine.crl_service.get_crl(&root.serial_number()).await.unwrap();
    engine.crl_service.get_crl(&footca.serial_number()).await.unwrap();
    engine.crl_service.get_crl(&barca.serial_number()).await.unwrap();

    let revoked = engine.revoker.revoke(&footca.serial_number()).await.unwrap();
    let revoked: HashSet<SerialNumber> = revoked.into_iter().collect();
    assert_eq!(
        revoked,
        HashSet::from([
            footca.serial_number(),
            leaf_a.serial_number(),
            leaf_b.serial_number()
        ])
    );

    for certificate in [&footca, &leaf_a, &leaf_b] {
        let stored = engine
            .store
            .get_certificate(&certificate.serial_number())
            .await
            .unwrap();
        assert!(stored.revoked.is_some());
    }
    for certificate in [&root, &barca, &unrelated, &sibling] {
        let stored = engine
            .store
            .get_certificate(&certificate.serial_number())
            .await
            .unwrap();
        assert!(stored.revoked.is_none());
    }

    assert!(!engine.crls.contains(&root.serial_number()).await);
    assert!(!engine.crls.contains(&footca.serial_number()).await);
    assert!(engine.crls.contains(&barca.serial_number()).await);

    let footca_key = footca.key_handle.unwrap();
    assert_eq!(engine.keys.is_disabled(&footca_key).await, Some(true));
}

#[tokio::test]
async fn test_revoke_leaf_only_touches_leaf() {
    let engine = util::engine();
    let root = util::new_root(&engine, "rootca", Duration::hours(1)).await;
    let leaf = util::new_leaf(&engine, "rootca", "device-1").await;
    let other = util::new_leaf(&engine, "rootca", "device-2").await;

    let revoked = engine.revoker.revoke(&leaf.serial_number()).await.unwrap();
    assert_eq!(revoked, vec![leaf.serial_number()]);
    let other = engine.store.get_certificate(&other.serial_number()).await.unwrap();
    assert!(!other.is_revoked());
    let root = engine.store.get_certificate(&root.serial_number()).await.unwrap();
    assert!(!root.is_revoked());
}

#[tokio::test]
async fn test_revoke_terminates_on_issuance_cycle() {
    let engine = util::engine();
    let root = util::new_root(&engine, "rootca", Duration::hours(3)).await;
    let footca = util::new_intermediate(&engine, "rootca", "footca", Duration::hours(1)).await;
    let leaf = util::new_leaf(&engine, "footca", "device-a").await;

    // footca claims to have issued its own root.
    let store = Arc::new(util::CyclicStore::new(
        engine.store.clone(),
        footca.serial_number(),
        root.clone(),
    ));
    let revoker = CertificateRevoker::new(store, engine.issuer.clone(), engine.crls.clone());

    let revoked = revoker.revoke(&footca.serial_number()).await.unwrap();
    let unique: HashSet<SerialNumber> = revoked.iter().cloned().collect();
    assert_eq!(unique.len(), revoked.len());
    assert_eq!(
        unique,
        HashSet::from([
            footca.serial_number(),
            leaf.serial_number(),
            root.serial_number()
        ])
    );
    for certificate in [&root, &footca, &leaf] {
        let stored = engine
            .store
            .get_certificate(&certificate.serial_number())
            .await
            .unwrap();
        assert!(stored.is_revoked());
    }
}

#[tokio::test]
async fn test_revoke_root_cascades_through_hierarchy() {
    let engine = util::engine();
    let root = util::new_root(&engine, "rootca", Duration::hours(3)).await;
    util::new_intermediate(&engine, "rootca", "footca", Duration::hours(1)).await;
    util::new_intermediate(&engine, "footca", "deepca", Duration::minutes(30)).await;
    let deep_leaf = util::new_leaf(&engine, "deepca", "device-1").await;

    let revoked = engine.revoker.revoke(&root.serial_number()).await.unwrap();
    assert_eq!(revoked.len(), 4);
    let stored = engine
        .store
        .get_certificate(&deep_leaf.serial_number())
        .await
        .unwrap();
    assert!(stored.is_revoked());

    // A revoked issuer signs nothing more.
    let result = engine
        .issuer
        .create_certificate_and_private_key(
            "rootca",
            "device-2",
            iiot_ca::cert::params::DistinguishedName::with_common_name("device-2"),
            None,
            iiot_ca::key::CreateKeyParams::ec(iiot_ca::key::CurveType::P256),
            None,
        )
        .await;
    assert!(matches!(result, Err(CaError::IssuerRevoked(_))));
}

#[tokio::test]
async fn test_revoke_unknown_serial() {
    let engine = util::engine();
    let serial = SerialNumber::generate();
    assert!(matches!(
        engine.revoker.revoke(&serial).await,
        Err(CaError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_empty_crl_has_placeholder_entry() {
    let engine = util::engine();
    let root = util::new_root(&engine, "rootca", Duration::hours(1)).await;

    let crl = engine.crl_service.get_crl(&root.serial_number()).await.unwrap();
    assert_eq!(
        crl.revoked_serial_numbers(),
        vec![SerialNumber::from_bytes(&[0]).unwrap()]
    );
    assert!(crl.verify_signed_by(&root).is_ok());
    assert!(crl.crl_number().unwrap().is_some());
    assert_eq!(crl.issuer(), root.subject());

    let decoded = iiot_ca::crl::Crl::from_der(crl.as_der()).unwrap();
    assert_eq!(decoded.revoked_serial_numbers().len(), 1);

    let next_update = crl.next_update().unwrap();
    assert!(next_update <= root.not_after());
    assert!(next_update > OffsetDateTime::now_utc() + Duration::hours(23));
}

#[tokio::test]
async fn test_crl_is_regenerated_after_revocation() {
    let engine = util::engine();
    let root = util::new_root(&engine, "rootca", Duration::hours(1)).await;
    let leaf = util::new_leaf(&engine, "rootca", "device-1").await;
    util::new_leaf(&engine, "rootca", "device-2").await;

    let before = engine.crl_service.get_crl(&root.serial_number()).await.unwrap();
    let cached = engine.crl_service.get_crl(&root.serial_number()).await.unwrap();
    assert_eq!(before.as_der(), cached.as_der());

    engine.revoker.revoke(&leaf.serial_number()).await.unwrap();
    let after = engine.crl_service.get_crl(&root.serial_number()).await.unwrap();
    assert_eq!(after.revoked_serial_numbers(), vec![leaf.serial_number()]);
    assert!(after.crl_number().unwrap() > before.crl_number().unwrap());
    assert!(after.verify_signed_by(&root).is_ok());

    let stored = engine.store.get_certificate(&leaf.serial_number()).await.unwrap();
    let entry_date = after.inner().tbs_cert_list.revoked_certificates.as_ref().unwrap()[0]
        .revocation_date
        .to_unix_duration()
        .as_secs();
    assert_eq!(entry_date as i64, stored.revoked.unwrap().unix_timestamp());
}

#[tokio::test]
async fn test_crl_for_leaf_is_rejected() {
    let engine = util::engine();
    util::new_root(&engine, "rootca", Duration::hours(1)).await;
    let leaf = util::new_leaf(&engine, "rootca", "device-1").await;

    assert!(matches!(
        engine.crl_service.get_crl(&leaf.serial_number()).await,
        Err(CaError::NotAnIssuer(_))
    ));

    let factory = CrlFactory::new(engine.keys.clone());
    let result = factory
        .create_crl(&leaf, iiot_ca::cert::SignatureType::ES256, &[], None)
        .await;
    assert!(matches!(result, Err(CaError::NotAnIssuer(_))));
}

#[tokio::test]
async fn test_crl_next_update_defaults_to_issuer_expiry() {
    let engine = util::engine();
    let root = util::new_root(&engine, "rootca", Duration::hours(1)).await;
    let factory = CrlFactory::new(engine.keys.clone());

    let crl = factory
        .create_crl(&root, iiot_ca::cert::SignatureType::ES256, &[], None)
        .await
        .unwrap();
    assert_eq!(crl.next_update(), Some(root.not_after()));
    engine.crls.put(&root.serial_number(), crl).await.unwrap();
    assert!(engine.crls.contains(&root.serial_number()).await);
}

#[tokio::test]
async fn test_oversized_crl_validity_falls_back_to_issuer_expiry() {
    let config = iiot_ca::config::CaConfig::builder()
        .crl_validity(Duration::MAX)
        .build();
    let engine = util::engine_with(config, 100);
    let root = util::new_root(&engine, "rootca", Duration::hours(1)).await;

    let crl = engine.crl_service.get_crl(&root.serial_number()).await.unwrap();
    assert_eq!(crl.next_update(), Some(root.not_after()));
}
