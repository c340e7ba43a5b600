#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use iiot_ca::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
use iiot_ca::cert::{Certificate, IssuerPolicies, SerialNumber, SignatureType};
use iiot_ca::config::CaConfig;
use iiot_ca::crl::{CrlFactory, CrlService};
use iiot_ca::error::{CaError, Result};
use iiot_ca::factory::{CertificateFactory, IssuerRef};
use iiot_ca::issuer::CertificateIssuer;
use iiot_ca::key::memory::MemoryKeyStore;
use iiot_ca::key::{
    CreateKeyParams, CurveType, Key, KeyHandle, KeyPair, KeyStore, KeyStoreProperties,
};
use iiot_ca::revoker::CertificateRevoker;
use iiot_ca::storage::memory::{MemoryCertificateStore, MemoryCrlCache};
use iiot_ca::storage::{
    CertificateCollection, CertificateRepository, CertificateStore,
};
use time::Duration;

/// In-memory backends wired into every engine component.
pub struct Engine {
    pub keys: Arc<MemoryKeyStore>,
    pub store: Arc<MemoryCertificateStore>,
    pub crls: Arc<MemoryCrlCache>,
    pub issuer: Arc<CertificateIssuer>,
    pub revoker: CertificateRevoker,
    pub crl_service: CrlService,
}

pub fn test_config() -> CaConfig {
    CaConfig::builder()
        .crl_root_url("http://ca.local/crl")
        .aia_root_url("http://ca.local/aia")
        .crl_validity(Duration::days(1))
        .build()
}

pub fn engine() -> Engine {
    engine_with(test_config(), 100)
}

pub fn engine_with(config: CaConfig, page_size: usize) -> Engine {
    let keys = Arc::new(MemoryKeyStore::new());
    let store = Arc::new(MemoryCertificateStore::with_page_size(page_size));
    let crls = Arc::new(MemoryCrlCache::new());
    let crl_validity = config.crl_validity;
    let issuer = Arc::new(CertificateIssuer::new(store.clone(), keys.clone(), config));
    let revoker = CertificateRevoker::new(store.clone(), issuer.clone(), crls.clone());
    let crl_service = CrlService::new(
        store.clone(),
        crls.clone(),
        CrlFactory::new(keys.clone()),
        crl_validity,
    );
    Engine {
        keys,
        store,
        crls,
        issuer,
        revoker,
        crl_service,
    }
}

pub fn issuer_policies(issued_lifetime: Duration) -> IssuerPolicies {
    IssuerPolicies::builder()
        .issued_lifetime(issued_lifetime)
        .build()
}

pub async fn new_root(engine: &Engine, name: &str, issued_lifetime: Duration) -> Certificate {
    engine
        .issuer
        .new_root_certificate(
            name,
            DistinguishedName::with_common_name(name),
            None,
            Duration::days(5),
            CreateKeyParams::ec(CurveType::P256),
            Some(issuer_policies(issued_lifetime)),
        )
        .await
        .unwrap()
}

pub async fn new_intermediate(
    engine: &Engine,
    parent: &str,
    name: &str,
    issued_lifetime: Duration,
) -> Certificate {
    engine
        .issuer
        .new_issuer_certificate(
            parent,
            name,
            DistinguishedName::with_common_name(name),
            None,
            CreateKeyParams::ec(CurveType::P256),
            Some(issuer_policies(issued_lifetime)),
        )
        .await
        .unwrap()
}

pub async fn new_leaf(engine: &Engine, parent: &str, name: &str) -> Certificate {
    engine
        .issuer
        .create_certificate_and_private_key(
            parent,
            name,
            DistinguishedName::with_common_name(name),
            None,
            CreateKeyParams::ec(CurveType::P256),
            None,
        )
        .await
        .unwrap()
}

/// A self-signed certificate built outside any engine, with its key.
pub async fn external_root(name: &str) -> (Certificate, KeyPair) {
    let key = KeyPair::generate_ecdsa(CurveType::P256);
    let request = CertificationRequestInfo::builder()
        .subject(DistinguishedName::with_common_name(name))
        .subject_public_key(key.public_key())
        .is_ca(true)
        .build();
    let certificate = CertificateFactory::default()
        .create_certificate(
            &key,
            IssuerRef::SelfSigned,
            &request,
            Validity::for_days(30),
            SignatureType::ES256,
            None,
        )
        .await
        .unwrap();
    (certificate, key)
}

/// Repository that stores nothing and fails every write.
pub struct FailingRepository {
    inner: MemoryCertificateStore,
}

impl FailingRepository {
    pub fn new() -> Self {
        Self {
            inner: MemoryCertificateStore::new(),
        }
    }
}

#[async_trait]
impl CertificateStore for FailingRepository {
    async fn find_latest_certificate(&self, name: &str) -> Result<Option<Certificate>> {
        self.inner.find_latest_certificate(name).await
    }

    async fn get_certificate(&self, serial_number: &SerialNumber) -> Result<Certificate> {
        self.inner.get_certificate(serial_number).await
    }

    async fn get_issued_certificates(
        &self,
        issuer: &Certificate,
        page_token: Option<&str>,
        include_revoked: bool,
        reverse: bool,
    ) -> Result<CertificateCollection> {
        self.inner
            .get_issued_certificates(issuer, page_token, include_revoked, reverse)
            .await
    }
}

#[async_trait]
impl CertificateRepository for FailingRepository {
    async fn add_certificate(
        &self,
        _name: &str,
        _certificate: Certificate,
        _external_id: Option<&str>,
    ) -> Result<Certificate> {
        Err(CaError::Storage("backend unavailable".to_string()))
    }

    async fn disable_certificate(&self, _certificate: &Certificate) -> Result<String> {
        Err(CaError::Storage("backend unavailable".to_string()))
    }
}

/// Store whose issuer listing for `looping_issuer` also names `ancestor`,
/// and which always lists revoked children, so the issuance graph has a
/// cycle.
pub struct CyclicStore {
    inner: Arc<MemoryCertificateStore>,
    looping_issuer: SerialNumber,
    ancestor: Certificate,
}

impl CyclicStore {
    pub fn new(
        inner: Arc<MemoryCertificateStore>,
        looping_issuer: SerialNumber,
        ancestor: Certificate,
    ) -> Self {
        Self {
            inner,
            looping_issuer,
            ancestor,
        }
    }
}

#[async_trait]
impl CertificateStore for CyclicStore {
    async fn find_latest_certificate(&self, name: &str) -> Result<Option<Certificate>> {
        self.inner.find_latest_certificate(name).await
    }

    async fn get_certificate(&self, serial_number: &SerialNumber) -> Result<Certificate> {
        self.inner.get_certificate(serial_number).await
    }

    async fn get_issued_certificates(
        &self,
        issuer: &Certificate,
        page_token: Option<&str>,
        _include_revoked: bool,
        reverse: bool,
    ) -> Result<CertificateCollection> {
        let mut page = self
            .inner
            .get_issued_certificates(issuer, page_token, true, reverse)
            .await?;
        if page_token.is_none() && issuer.serial_number() == self.looping_issuer {
            page.certificates.push(self.ancestor.clone());
        }
        Ok(page)
    }
}

/// Key store whose keys can never be deleted.
pub struct UndeletableKeyStore {
    pub inner: MemoryKeyStore,
}

impl UndeletableKeyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryKeyStore::new(),
        }
    }
}

#[async_trait]
impl KeyStore for UndeletableKeyStore {
    async fn create_key(
        &self,
        name: &str,
        params: &CreateKeyParams,
        properties: KeyStoreProperties,
    ) -> Result<KeyHandle> {
        self.inner.create_key(name, params, properties).await
    }

    async fn import_key(
        &self,
        name: &str,
        key: &Key,
        properties: KeyStoreProperties,
    ) -> Result<KeyHandle> {
        self.inner.import_key(name, key, properties).await
    }

    async fn get_public_key(&self, handle: &KeyHandle) -> Result<Key> {
        self.inner.get_public_key(handle).await
    }

    async fn export_key(&self, handle: &KeyHandle) -> Result<Key> {
        self.inner.export_key(handle).await
    }

    async fn disable_key(&self, handle: &KeyHandle) -> Result<()> {
        self.inner.disable_key(handle).await
    }

    async fn delete_key(&self, _handle: &KeyHandle) -> Result<()> {
        Err(CaError::Conflict("key is locked against deletion".to_string()))
    }

    async fn sign(
        &self,
        handle: &KeyHandle,
        data: &[u8],
        signature_type: SignatureType,
    ) -> Result<Vec<u8>> {
        self.inner.sign(handle, data, signature_type).await
    }
}
