//! Cascading revocation.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::cert::SerialNumber;
use crate::error::Result;
use crate::issuer::CertificateIssuer;
use crate::storage::{CertificateStore, CrlRepository};

/// Revokes a certificate and everything it transitively issued.
pub struct CertificateRevoker {
    certificates: Arc<dyn CertificateStore>,
    issuer: Arc<CertificateIssuer>,
    crls: Arc<dyn CrlRepository>,
}

impl CertificateRevoker {
    pub fn new(
        certificates: Arc<dyn CertificateStore>,
        issuer: Arc<CertificateIssuer>,
        crls: Arc<dyn CrlRepository>,
    ) -> Self {
        Self {
            certificates,
            issuer,
            crls,
        }
    }

    /// Revokes the certificate with `serial_number`.
    ///
    /// Each revoked certificate invalidates the cached CRL of the issuer
    /// that signed it. Certificates issued by a revoked issuer are revoked
    /// as well, however deep the hierarchy. Returns the serial numbers
    /// revoked by this call in the order they were processed.
    #[instrument(skip(self), fields(serial = %serial_number))]
    pub async fn revoke(&self, serial_number: &SerialNumber) -> Result<Vec<SerialNumber>> {
        let mut pending = VecDeque::from([serial_number.clone()]);
        let mut seen = HashSet::new();
        let mut revoked = Vec::new();

        while let Some(serial) = pending.pop_front() {
            if !seen.insert(serial.clone()) {
                continue;
            }
            let certificate = self.certificates.get_certificate(&serial).await?;
            self.issuer.disable_certificate(&certificate).await?;
            revoked.push(serial.clone());

            if !certificate.is_self_signed() {
                match certificate.issuer_serial_number() {
                    Ok(issuer_serial) => self.crls.invalidate(&issuer_serial).await?,
                    Err(e) => warn!(serial = %serial, error = %e, "cannot tell which CRL to invalidate"),
                }
            }

            if certificate.issuer_policies.is_none() {
                continue;
            }
            let mut page_token: Option<String> = None;
            loop {
                let page = self
                    .certificates
                    .get_issued_certificates(&certificate, page_token.as_deref(), false, false)
                    .await?;
                pending.extend(page.certificates.iter().map(|child| child.serial_number()));
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }

        info!(count = revoked.len(), "revoked certificates");
        Ok(revoked)
    }
}
