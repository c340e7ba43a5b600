//! Persistence contracts consumed by the engine.
//!
//! The engine never assumes a schema. It reads and writes certificate
//! records through [`CertificateStore`] / [`CertificateRepository`] and
//! caches CRLs through [`CrlRepository`]. In-memory implementations live
//! in [`memory`].

pub mod memory;

use async_trait::async_trait;

use crate::cert::{Certificate, SerialNumber};
use crate::crl::Crl;
use crate::error::{CaError, Result};

/// One page of certificates.
#[derive(Debug, Clone, Default)]
pub struct CertificateCollection {
    pub certificates: Vec<Certificate>,
    /// Token for the following page, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Read access to certificate records.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Latest version of the certificate stored under `name`.
    async fn find_latest_certificate(&self, name: &str) -> Result<Option<Certificate>>;

    /// Like [`CertificateStore::find_latest_certificate`] but fails with
    /// `NotFound` when nothing is stored under `name`.
    async fn get_latest_certificate(&self, name: &str) -> Result<Certificate> {
        self.find_latest_certificate(name)
            .await?
            .ok_or_else(|| CaError::NotFound(format!("certificate {name}")))
    }

    async fn get_certificate(&self, serial_number: &SerialNumber) -> Result<Certificate>;

    /// Certificates signed by `issuer`, excluding the issuer itself.
    async fn get_issued_certificates(
        &self,
        issuer: &Certificate,
        page_token: Option<&str>,
        include_revoked: bool,
        reverse: bool,
    ) -> Result<CertificateCollection>;
}

/// Write access to certificate records.
#[async_trait]
pub trait CertificateRepository: CertificateStore {
    /// Persists a new version under `name`. Fails with `Conflict` when
    /// the serial number is already stored.
    async fn add_certificate(
        &self,
        name: &str,
        certificate: Certificate,
        external_id: Option<&str>,
    ) -> Result<Certificate>;

    /// Marks the record revoked and returns its identifier.
    async fn disable_certificate(&self, certificate: &Certificate) -> Result<String>;
}

/// Cache of generated CRLs keyed by issuer serial number.
#[async_trait]
pub trait CrlRepository: Send + Sync {
    /// Drops the cached CRL so that the next fetch rebuilds it.
    async fn invalidate(&self, issuer_serial: &SerialNumber) -> Result<()>;

    async fn get(&self, issuer_serial: &SerialNumber) -> Result<Option<Crl>>;

    async fn put(&self, issuer_serial: &SerialNumber, crl: Crl) -> Result<()>;
}

/// Whether `candidate` was signed by `issuer` according to its names and
/// authority key identifier. Does not verify the signature.
pub fn is_issued_by(candidate: &Certificate, issuer: &Certificate) -> bool {
    if candidate.same_as(issuer) || candidate.issuer() != issuer.subject() {
        return false;
    }
    match candidate.issuer_serial_number() {
        Ok(serial) => serial == issuer.serial_number(),
        Err(_) => false,
    }
}
