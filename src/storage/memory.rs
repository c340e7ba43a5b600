//! In-memory certificate store and CRL cache.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    CertificateCollection, CertificateRepository, CertificateStore, CrlRepository, is_issued_by,
};
use crate::cert::{Certificate, SerialNumber};
use crate::crl::Crl;
use crate::error::{CaError, Result};

const DEFAULT_PAGE_SIZE: usize = 100;

struct Record {
    name: String,
    version: u32,
    external_id: Option<String>,
    certificate: Certificate,
}

impl Record {
    fn id(&self) -> String {
        self.external_id
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.name, self.version))
    }
}

#[derive(Default)]
struct Records {
    records: Vec<Record>,
    by_serial: HashMap<SerialNumber, usize>,
    latest: HashMap<String, usize>,
}

/// A [`CertificateRepository`] keeping every version of every record in
/// memory. All writes go through a single lock, so concurrent issuance
/// under the same name is serialized.
pub struct MemoryCertificateStore {
    inner: RwLock<Records>,
    page_size: usize,
}

impl Default for MemoryCertificateStore {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl MemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            inner: RwLock::new(Records::default()),
            page_size: page_size.max(1),
        }
    }

    /// Number of stored records, all versions included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

fn parse_page_token(token: Option<&str>) -> Result<usize> {
    match token {
        None => Ok(0),
        Some(token) => token
            .parse()
            .map_err(|_| CaError::InvalidInput(format!("invalid page token {token}"))),
    }
}

#[async_trait]
impl CertificateStore for MemoryCertificateStore {
    async fn find_latest_certificate(&self, name: &str) -> Result<Option<Certificate>> {
        let inner = self.inner.read().await;
        Ok(inner
            .latest
            .get(name)
            .map(|index| inner.records[*index].certificate.clone()))
    }

    async fn get_certificate(&self, serial_number: &SerialNumber) -> Result<Certificate> {
        let inner = self.inner.read().await;
        inner
            .by_serial
            .get(serial_number)
            .map(|index| inner.records[*index].certificate.clone())
            .ok_or_else(|| CaError::NotFound(format!("certificate {serial_number}")))
    }

    async fn get_issued_certificates(
        &self,
        issuer: &Certificate,
        page_token: Option<&str>,
        include_revoked: bool,
        reverse: bool,
    ) -> Result<CertificateCollection> {
        let offset = parse_page_token(page_token)?;
        let inner = self.inner.read().await;
        let mut matching: Vec<&Certificate> = inner
            .records
            .iter()
            .map(|record| &record.certificate)
            .filter(|certificate| include_revoked || !certificate.is_revoked())
            .filter(|certificate| is_issued_by(certificate, issuer))
            .collect();
        if reverse {
            matching.reverse();
        }
        let certificates: Vec<Certificate> = matching
            .iter()
            .skip(offset)
            .take(self.page_size)
            .map(|certificate| (*certificate).clone())
            .collect();
        let next = offset + certificates.len();
        Ok(CertificateCollection {
            certificates,
            next_page_token: (next < matching.len()).then(|| next.to_string()),
        })
    }
}

#[async_trait]
impl CertificateRepository for MemoryCertificateStore {
    async fn add_certificate(
        &self,
        name: &str,
        certificate: Certificate,
        external_id: Option<&str>,
    ) -> Result<Certificate> {
        if name.is_empty() {
            return Err(CaError::InvalidInput("certificate name is required".to_string()));
        }
        let serial = certificate.serial_number();
        let mut inner = self.inner.write().await;
        if inner.by_serial.contains_key(&serial) {
            return Err(CaError::Conflict(format!(
                "certificate with serial number {serial} already exists"
            )));
        }
        let version = inner
            .latest
            .get(name)
            .map_or(1, |index| inner.records[*index].version + 1);
        let index = inner.records.len();
        inner.records.push(Record {
            name: name.to_string(),
            version,
            external_id: external_id.map(str::to_string),
            certificate: certificate.clone(),
        });
        inner.by_serial.insert(serial.clone(), index);
        inner.latest.insert(name.to_string(), index);
        debug!(name, version, serial = %serial, "stored certificate");
        Ok(certificate)
    }

    async fn disable_certificate(&self, certificate: &Certificate) -> Result<String> {
        let serial = certificate.serial_number();
        let mut inner = self.inner.write().await;
        let index = *inner
            .by_serial
            .get(&serial)
            .ok_or_else(|| CaError::NotFound(format!("certificate {serial}")))?;
        let record = &mut inner.records[index];
        if record.certificate.revoked.is_none() {
            record.certificate.revoked = Some(OffsetDateTime::now_utc());
            debug!(name = %record.name, serial = %serial, "revoked certificate");
        }
        Ok(record.id())
    }
}

/// A [`CrlRepository`] holding CRLs in memory.
#[derive(Default)]
pub struct MemoryCrlCache {
    crls: RwLock<HashMap<SerialNumber, Crl>>,
}

impl MemoryCrlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, issuer_serial: &SerialNumber) -> bool {
        self.crls.read().await.contains_key(issuer_serial)
    }
}

#[async_trait]
impl CrlRepository for MemoryCrlCache {
    async fn invalidate(&self, issuer_serial: &SerialNumber) -> Result<()> {
        if self.crls.write().await.remove(issuer_serial).is_some() {
            debug!(issuer = %issuer_serial, "invalidated CRL");
        }
        Ok(())
    }

    async fn get(&self, issuer_serial: &SerialNumber) -> Result<Option<Crl>> {
        Ok(self.crls.read().await.get(issuer_serial).cloned())
    }

    async fn put(&self, issuer_serial: &SerialNumber, crl: Crl) -> Result<()> {
        self.crls.write().await.insert(issuer_serial.clone(), crl);
        Ok(())
    }
}
