//! Certificate factory.
//!
//! Turns a certification request into a signed certificate: assigns the
//! serial number, injects the extensions the factory owns, merges the
//! caller's extensions, clamps the validity window to the issuer and signs
//! through a [`SignatureGenerator`].

use der::Encode;
use der::asn1::BitString;
use tracing::debug;
use x509_cert::certificate::CertificateInner;

use crate::cert::extensions::{
    AuthorityInformationAccess, AuthorityKeyIdentifier, BasicConstraints, CrlDistributionPoints,
    ExtensionKind, KeyUsage, SubjectKeyIdentifier,
};
use crate::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use crate::cert::{Certificate, SerialNumber, SignatureType};
use crate::config::CaConfig;
use crate::error::{CaError, Result};
use crate::key::SignatureGenerator;
use crate::tbs_certificate::TbsCertificate;

/// Produces extensions once the serial number of the new certificate is
/// known, so URLs can embed it.
pub type ExtensionCallback<'a> =
    &'a (dyn Fn(&SerialNumber) -> Result<Vec<ExtensionParam>> + Send + Sync);

/// Who signs the certificate being created.
#[derive(Debug, Clone, Copy)]
pub enum IssuerRef<'a> {
    /// An existing issuer certificate.
    Certificate(&'a Certificate),
    /// The new certificate signs itself with the key held by the signer.
    SelfSigned,
}

/// Builds and signs certificates.
#[derive(Debug, Clone, Default)]
pub struct CertificateFactory {
    config: CaConfig,
}

impl CertificateFactory {
    pub fn new(config: CaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaConfig {
        &self.config
    }

    /// Creates a signed certificate.
    ///
    /// The requested validity is clamped to the issuer's own window. A
    /// window that is empty afterwards is rejected with `InvalidValidity`.
    pub async fn create_certificate(
        &self,
        signer: &dyn SignatureGenerator,
        issuer: IssuerRef<'_>,
        request: &CertificationRequestInfo,
        validity: Validity,
        signature_type: SignatureType,
        extensions: Option<ExtensionCallback<'_>>,
    ) -> Result<Certificate> {
        let subject = request.subject.as_x509_name()?;
        let serial_number = SerialNumber::generate();
        let subject_key_id = request.subject_public_key.key_identifier()?;

        let (issuer_name, issuer_serial, authority_key_id, validity) = match issuer {
            IssuerRef::Certificate(issuer) => {
                if issuer.is_revoked() {
                    return Err(CaError::IssuerRevoked(issuer.serial_number().to_string()));
                }
                let key_identifier = match issuer.subject_key_identifier()? {
                    Some(id) => id,
                    None => issuer.public_key()?.key_identifier()?,
                };
                let authority_key_id = AuthorityKeyIdentifier {
                    key_identifier: Some(key_identifier),
                    authority_cert_issuer: Some(issuer.issuer_name()),
                    authority_cert_serial_number: Some(issuer.serial_number()),
                };
                let validity = clamp(validity, &issuer.validity())?;
                (issuer.subject().clone(), issuer.serial_number(), authority_key_id, validity)
            }
            IssuerRef::SelfSigned => {
                let authority_key_id = AuthorityKeyIdentifier {
                    key_identifier: Some(subject_key_id.clone()),
                    authority_cert_issuer: Some(request.subject.clone()),
                    authority_cert_serial_number: Some(serial_number.clone()),
                };
                let validity = clamp(validity, &validity)?;
                (subject.clone(), serial_number.clone(), authority_key_id, validity)
            }
        };

        let mut caller_extensions = request.extensions.clone();
        if let Some(callback) = extensions {
            caller_extensions.extend(callback(&serial_number)?);
        }
        let extensions = self.merge_extensions(
            request.is_ca,
            &serial_number,
            &issuer_serial,
            subject_key_id,
            authority_key_id,
            caller_extensions,
        )?;

        let tbs = TbsCertificate {
            serial_number: serial_number.clone(),
            signature_type,
            issuer: issuer_name,
            validity,
            subject,
            subject_public_key: request.subject_public_key.clone(),
            extensions,
        };
        let tbs_certificate = tbs.to_tbs_certificate_inner()?;
        let signature = signer.sign(&tbs_certificate.to_der()?, signature_type).await?;

        let certificate = Certificate::new(CertificateInner {
            tbs_certificate,
            signature_algorithm: signature_type.algorithm_identifier()?,
            signature: BitString::from_bytes(&signature)?,
        })?;

        let signed_by = match issuer {
            IssuerRef::Certificate(issuer) => issuer,
            IssuerRef::SelfSigned => &certificate,
        };
        certificate
            .verify_signed_by(signed_by)
            .map_err(|e| CaError::Signing(format!("signer does not match issuer: {e}")))?;

        debug!(
            serial = %serial_number,
            subject = %request.subject,
            can_issue = request.is_ca,
            "created certificate"
        );
        Ok(certificate)
    }

    /// Factory-owned extensions first, then whatever the caller supplied
    /// that survives filtering.
    fn merge_extensions(
        &self,
        can_issue: bool,
        serial_number: &SerialNumber,
        issuer_serial: &SerialNumber,
        subject_key_id: Vec<u8>,
        authority_key_id: AuthorityKeyIdentifier,
        caller_extensions: Vec<ExtensionParam>,
    ) -> Result<Vec<ExtensionParam>> {
        let own_crl_url = if can_issue {
            self.config.crl_url(serial_number)
        } else {
            None
        };

        let mut key_usage = if can_issue {
            KeyUsage::issuer()
        } else {
            KeyUsage::leaf()
        };
        let mut passed_through = Vec::new();
        for extension in caller_extensions {
            match ExtensionKind::classify(&extension)? {
                ExtensionKind::BasicConstraints
                | ExtensionKind::SubjectKeyIdentifier
                | ExtensionKind::AuthorityKeyIdentifier => {
                    debug!(oid = %extension.oid, "dropping factory owned extension");
                }
                ExtensionKind::KeyUsage(requested) => key_usage = KeyUsage(key_usage.0 | requested.0),
                ExtensionKind::CrlDistributionPoints if own_crl_url.is_some() => {
                    debug!("replacing caller CRL distribution point");
                }
                ExtensionKind::CrlDistributionPoints | ExtensionKind::Other => {
                    passed_through.push(extension)
                }
            }
        }

        let basic_constraints = BasicConstraints {
            is_ca: can_issue,
            max_path_length: can_issue.then_some(0),
        };
        let mut extensions = vec![
            ExtensionParam::from_extension(basic_constraints, true)?,
            ExtensionParam::from_extension(SubjectKeyIdentifier(subject_key_id), false)?,
            ExtensionParam::from_extension(authority_key_id, false)?,
            ExtensionParam::from_extension(key_usage, true)?,
        ];
        if let Some(url) = own_crl_url {
            let cdp = CrlDistributionPoints { urls: vec![url] };
            extensions.push(ExtensionParam::from_extension(cdp, false)?);
        }
        if let Some(url) = self.config.aia_url(issuer_serial) {
            let aia = AuthorityInformationAccess {
                ca_issuers: vec![url],
            };
            extensions.push(ExtensionParam::from_extension(aia, false)?);
        }
        for extension in passed_through {
            if extensions.iter().any(|existing| existing.oid == extension.oid) {
                debug!(oid = %extension.oid, "dropping duplicate extension");
                continue;
            }
            extensions.push(extension);
        }
        Ok(extensions)
    }
}

/// Narrows `requested` to fit inside `bounds`.
fn clamp(requested: Validity, bounds: &Validity) -> Result<Validity> {
    let not_before = requested.not_before.max(bounds.not_before);
    let not_after = requested.not_after.min(bounds.not_after);
    if not_after <= not_before {
        return Err(CaError::InvalidValidity(format!(
            "window {} - {} does not overlap the issuer window {} - {}",
            requested.not_before, requested.not_after, bounds.not_before, bounds.not_after
        )));
    }
    Ok(Validity::new(not_before, not_after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{KeyUsages, SubjectAltName};
    use crate::cert::params::DistinguishedName;
    use crate::key::{CurveType, KeyPair};
    use time::{Duration, OffsetDateTime};

    fn request(name: &str, key: &KeyPair, is_ca: bool) -> CertificationRequestInfo {
        CertificationRequestInfo::builder()
            .subject(DistinguishedName::with_common_name(name))
            .subject_public_key(key.public_key())
            .is_ca(is_ca)
            .build()
    }

    async fn root(factory: &CertificateFactory, key: &KeyPair) -> Certificate {
        factory
            .create_certificate(
                key,
                IssuerRef::SelfSigned,
                &request("root", key, true),
                Validity::for_days(30),
                SignatureType::ES256,
                None,
            )
            .await
            .unwrap()
            .with_issuer_policies(Some(Default::default()))
    }

    #[tokio::test]
    async fn test_self_signed() {
        let factory = CertificateFactory::default();
        let key = KeyPair::generate_ecdsa(CurveType::P256);
        let cert = root(&factory, &key).await;
        assert!(cert.is_self_signed());
        assert!(cert.is_issuer());
        assert_eq!(cert.issuer_serial_number().unwrap(), cert.serial_number());
        assert_eq!(cert.validity().lifetime(), Duration::days(30));
    }

    #[tokio::test]
    async fn test_leaf_clamped_and_extensions_merged() {
        let config = CaConfig::builder()
            .crl_root_url("https://ca.example")
            .aia_root_url("https://ca.example")
            .build();
        let factory = CertificateFactory::new(config);
        let root_key = KeyPair::generate_ecdsa(CurveType::P256);
        let root = root(&factory, &root_key).await;

        let leaf_key = KeyPair::generate_ecdsa(CurveType::P256);
        let callback = |_: &SerialNumber| -> Result<Vec<ExtensionParam>> {
            Ok(vec![
                ExtensionParam::from_extension(
                    BasicConstraints {
                        is_ca: true,
                        max_path_length: None,
                    },
                    true,
                )?,
                ExtensionParam::from_extension(KeyUsage(KeyUsages::KeyAgreement.into()), true)?,
                ExtensionParam::from_extension(
                    SubjectAltName::builder()
                        .uris(vec!["urn:device".to_string()])
                        .build(),
                    false,
                )?,
            ])
        };
        let leaf = factory
            .create_certificate(
                &root_key,
                IssuerRef::Certificate(&root),
                &request("leaf", &leaf_key, false),
                Validity::for_days(365),
                SignatureType::ES256,
                Some(&callback),
            )
            .await
            .unwrap();

        assert!(leaf.not_after() <= root.not_after());
        assert!(leaf.not_before() >= root.not_before());
        assert!(!leaf.basic_constraints().unwrap().unwrap().is_ca);
        let usage = leaf.key_usage().unwrap().unwrap();
        assert!(usage.contains(KeyUsages::KeyAgreement));
        assert!(usage.contains(KeyUsages::NonRepudiation));
        assert!(leaf.extension::<SubjectAltName>().unwrap().is_some());
        assert!(leaf.extension::<CrlDistributionPoints>().unwrap().is_none());
        let aia = leaf.extension::<AuthorityInformationAccess>().unwrap().unwrap();
        assert_eq!(
            aia.ca_issuers,
            vec![format!("https://ca.example/{}/cert", root.serial_number())]
        );
        assert_eq!(leaf.issuer_serial_number().unwrap(), root.serial_number());
        leaf.verify_signed_by(&root).unwrap();
        assert!(leaf.is_valid_chain(&[root]));
    }

    #[tokio::test]
    async fn test_issuer_gets_own_crl_distribution_point() {
        let factory = CertificateFactory::new(
            CaConfig::builder().crl_root_url("https://ca.example/crl").build(),
        );
        let key = KeyPair::generate_ecdsa(CurveType::P256);
        let callback = |_: &SerialNumber| -> Result<Vec<ExtensionParam>> {
            Ok(vec![ExtensionParam::from_extension(
                CrlDistributionPoints {
                    urls: vec!["https://elsewhere".to_string()],
                },
                false,
            )?])
        };
        let cert = factory
            .create_certificate(
                &key,
                IssuerRef::SelfSigned,
                &request("root", &key, true),
                Validity::for_days(1),
                SignatureType::ES256,
                Some(&callback),
            )
            .await
            .unwrap();
        let cdp = cert.extension::<CrlDistributionPoints>().unwrap().unwrap();
        assert_eq!(
            cdp.urls,
            vec![format!("https://ca.example/crl/{}/crl", cert.serial_number())]
        );
    }

    #[tokio::test]
    async fn test_window_outside_issuer_is_rejected() {
        let factory = CertificateFactory::default();
        let root_key = KeyPair::generate_ecdsa(CurveType::P256);
        let root = root(&factory, &root_key).await;
        let start = OffsetDateTime::now_utc() + Duration::days(60);
        let result = factory
            .create_certificate(
                &root_key,
                IssuerRef::Certificate(&root),
                &request("late", &KeyPair::generate_ecdsa(CurveType::P256), false),
                Validity::starting_at(start, Duration::days(1)),
                SignatureType::ES256,
                None,
            )
            .await;
        assert!(matches!(result, Err(CaError::InvalidValidity(_))));
    }

    #[tokio::test]
    async fn test_wrong_signer_is_rejected() {
        let factory = CertificateFactory::default();
        let root_key = KeyPair::generate_ecdsa(CurveType::P256);
        let root = root(&factory, &root_key).await;
        let other = KeyPair::generate_ecdsa(CurveType::P256);
        let result = factory
            .create_certificate(
                &other,
                IssuerRef::Certificate(&root),
                &request("leaf", &other, false),
                Validity::for_days(1),
                SignatureType::ES256,
                None,
            )
            .await;
        assert!(matches!(result, Err(CaError::Signing(_))));
    }
}
