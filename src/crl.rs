//! Certificate revocation lists.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use der::asn1::BitString;
use der::{Decode, Encode};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};

use crate::cert::extensions::{AuthorityKeyIdentifier, CrlNumber, CrlReason, ToAndFromX509Extension};
use crate::cert::params::ExtensionParam;
use crate::cert::{Certificate, SerialNumber, SignatureType};
use crate::error::{CaError, Result};
use crate::key::{CreateKeyParams, KeyStore, KeyStoreSigner, SignatureGenerator};
use crate::policy::default_signature_type;
use crate::storage::{CertificateStore, CrlRepository};
use crate::tbs_certificate::to_x509_time;

/// Last CRL number handed out in this process.
static LAST_CRL_NUMBER: AtomicU64 = AtomicU64::new(0);

/// Next CRL number: the clock in 100ns ticks, bumped past the previous
/// number when the clock stalls or goes backwards.
fn next_crl_number(now: OffsetDateTime) -> u64 {
    let ticks = u64::try_from(now.unix_timestamp_nanos() / 100).unwrap_or(0);
    let mut last = LAST_CRL_NUMBER.load(Ordering::Relaxed);
    loop {
        let next = ticks.max(last.saturating_add(1));
        match LAST_CRL_NUMBER.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

/// A signed, DER-encoded CRL.
#[derive(Debug, Clone)]
pub struct Crl {
    inner: CertificateList,
    raw: Vec<u8>,
}

impl Crl {
    fn new(inner: CertificateList) -> Result<Self> {
        let raw = inner.to_der()?;
        Ok(Self { inner, raw })
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateList::from_der(der)?,
            raw: der.to_vec(),
        })
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.raw.clone()
    }

    pub fn as_der(&self) -> &[u8] {
        &self.raw
    }

    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new("X509 CRL", self.raw.clone()))
    }

    pub fn inner(&self) -> &CertificateList {
        &self.inner
    }

    pub fn issuer(&self) -> &x509_cert::name::Name {
        &self.inner.tbs_cert_list.issuer
    }

    pub fn this_update(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_cert_list.this_update.to_system_time())
    }

    pub fn next_update(&self) -> Option<OffsetDateTime> {
        self.inner
            .tbs_cert_list
            .next_update
            .map(|time| OffsetDateTime::from(time.to_system_time()))
    }

    /// Serial numbers of every entry, the placeholder entry included.
    pub fn revoked_serial_numbers(&self) -> Vec<SerialNumber> {
        self.inner
            .tbs_cert_list
            .revoked_certificates
            .iter()
            .flatten()
            .map(|entry| SerialNumber::from_x509(&entry.serial_number))
            .collect()
    }

    pub fn crl_number(&self) -> Result<Option<u64>> {
        self.inner
            .tbs_cert_list
            .crl_extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == CrlNumber::OID)
            .map(|ext| CrlNumber::from_x509_extension_value(ext.extn_value.as_bytes()).map(|n| n.0))
            .transpose()
    }

    /// Verifies the CRL signature with the issuer's public key.
    pub fn verify_signed_by(&self, issuer: &Certificate) -> Result<()> {
        if self.issuer() != issuer.subject() {
            return Err(CaError::CertificateError(format!(
                "CRL was not issued by {}",
                issuer.subject_name()
            )));
        }
        let tbs = self.inner.tbs_cert_list.to_der()?;
        let signature = self
            .inner
            .signature
            .as_bytes()
            .ok_or_else(|| CaError::DecodingError("signature has unused bits".to_string()))?;
        let signature_type = SignatureType::from_algorithm_identifier(&self.inner.signature_algorithm)?;
        issuer.public_key()?.verify(&tbs, signature, signature_type)
    }
}

fn revoked_entry(
    serial: &SerialNumber,
    revoked: OffsetDateTime,
    reason: x509_cert::ext::pkix::CrlReason,
) -> Result<RevokedCert> {
    Ok(RevokedCert {
        serial_number: serial.to_x509()?,
        revocation_date: to_x509_time(revoked)?,
        crl_entry_extensions: Some(vec![
            ExtensionParam::from_extension(CrlReason(reason), false)?.to_x509()?,
        ]),
    })
}

/// Builds signed CRLs using issuer keys held by a key store.
#[derive(Clone)]
pub struct CrlFactory {
    keys: Arc<dyn KeyStore>,
}

impl CrlFactory {
    pub fn new(keys: Arc<dyn KeyStore>) -> Self {
        Self { keys }
    }

    /// Creates a CRL for `issuer` listing `revoked`.
    ///
    /// An empty list yields a single placeholder entry with serial number
    /// zero. `next_update` defaults to the issuer's expiry.
    pub async fn create_crl(
        &self,
        issuer: &Certificate,
        signature_type: SignatureType,
        revoked: &[Certificate],
        next_update: Option<OffsetDateTime>,
    ) -> Result<Crl> {
        if issuer.issuer_policies.is_none() {
            return Err(CaError::NotAnIssuer(issuer.serial_number().to_string()));
        }
        let handle = issuer.key_handle.clone().ok_or_else(|| {
            CaError::InvalidInput(format!("issuer {} has no key", issuer.serial_number()))
        })?;
        if issuer.is_revoked() {
            return Err(CaError::IssuerRevoked(issuer.serial_number().to_string()));
        }

        let this_update = OffsetDateTime::now_utc();
        let next_update = next_update.unwrap_or_else(|| issuer.not_after());

        let entries = if revoked.is_empty() {
            let placeholder = SerialNumber::from_bytes(&[0])?;
            vec![revoked_entry(
                &placeholder,
                this_update,
                x509_cert::ext::pkix::CrlReason::Unspecified,
            )?]
        } else {
            revoked
                .iter()
                .map(|certificate| {
                    revoked_entry(
                        &certificate.serial_number(),
                        certificate.revoked.unwrap_or(this_update),
                        x509_cert::ext::pkix::CrlReason::PrivilegeWithdrawn,
                    )
                })
                .collect::<Result<Vec<_>>>()?
        };

        let key_identifier = match issuer.subject_key_identifier()? {
            Some(id) => id,
            None => issuer.public_key()?.key_identifier()?,
        };
        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: Some(key_identifier),
            authority_cert_issuer: Some(issuer.issuer_name()),
            authority_cert_serial_number: Some(issuer.serial_number()),
        };
        let crl_number = next_crl_number(this_update);
        let extensions = vec![
            ExtensionParam::from_extension(authority_key_id, false)?.to_x509()?,
            ExtensionParam::from_extension(CrlNumber(crl_number), false)?.to_x509()?,
        ];

        let tbs_cert_list = TbsCertList {
            version: x509_cert::Version::V2,
            signature: signature_type.algorithm_identifier()?,
            issuer: issuer.subject().clone(),
            this_update: to_x509_time(this_update)?,
            next_update: Some(to_x509_time(next_update)?),
            revoked_certificates: Some(entries),
            crl_extensions: Some(extensions),
        };

        let signer = KeyStoreSigner::new(self.keys.clone(), handle);
        let signature = signer.sign(&tbs_cert_list.to_der()?, signature_type).await?;
        let crl = Crl::new(CertificateList {
            tbs_cert_list,
            signature_algorithm: signature_type.algorithm_identifier()?,
            signature: BitString::from_bytes(&signature)?,
        })?;
        debug!(
            issuer = %issuer.serial_number(),
            crl_number,
            entries = revoked.len(),
            "created CRL"
        );
        Ok(crl)
    }
}

/// Serves CRLs from the cache, rebuilding them after invalidation.
pub struct CrlService {
    certificates: Arc<dyn CertificateStore>,
    crls: Arc<dyn CrlRepository>,
    factory: CrlFactory,
    crl_validity: Option<time::Duration>,
}

impl CrlService {
    pub fn new(
        certificates: Arc<dyn CertificateStore>,
        crls: Arc<dyn CrlRepository>,
        factory: CrlFactory,
        crl_validity: Option<time::Duration>,
    ) -> Self {
        Self {
            certificates,
            crls,
            factory,
            crl_validity,
        }
    }

    /// Returns the CRL published by the issuer with `issuer_serial`.
    #[instrument(skip(self), fields(issuer = %issuer_serial))]
    pub async fn get_crl(&self, issuer_serial: &SerialNumber) -> Result<Crl> {
        if let Some(crl) = self.crls.get(issuer_serial).await? {
            return Ok(crl);
        }

        let issuer = self.certificates.get_certificate(issuer_serial).await?;
        if !issuer.is_issuer() {
            return Err(CaError::NotAnIssuer(issuer_serial.to_string()));
        }

        let mut revoked = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .certificates
                .get_issued_certificates(&issuer, page_token.as_deref(), true, false)
                .await?;
            revoked.extend(page.certificates.into_iter().filter(Certificate::is_revoked));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        let signature_type = match issuer.issuer_policies.as_ref().and_then(|p| p.signature_type) {
            Some(signature_type) => signature_type,
            None => default_signature_type(&CreateKeyParams::from_public_key(&issuer.public_key()?)),
        };
        let next_update = self
            .crl_validity
            .and_then(|validity| OffsetDateTime::now_utc().checked_add(validity))
            .map_or(issuer.not_after(), |next| next.min(issuer.not_after()));

        let crl = self
            .factory
            .create_crl(&issuer, signature_type, &revoked, Some(next_update))
            .await?;
        self.crls.put(issuer_serial, crl.clone()).await?;
        debug!(revoked = revoked.len(), "cached CRL");
        Ok(crl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crl_numbers_strictly_increase() {
        let now = OffsetDateTime::now_utc();
        let first = next_crl_number(now);
        let second = next_crl_number(now);
        let earlier = next_crl_number(now - time::Duration::hours(1));
        assert!(second > first);
        assert!(earlier > second);
    }
}
