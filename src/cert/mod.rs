pub mod extensions;
pub mod params;
mod serial;

pub use serial::SerialNumber;

use std::fmt;
use std::str::FromStr;

use bon::Builder;
use der::{Decode, Encode, EncodePem};
use extensions::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, KeyUsages, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use params::{DistinguishedName, ExtensionParam, Validity};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{CaError, Result};
use crate::key::{KeyHandle, PublicKey};

/// Digest algorithms used by the supported signature types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn output_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    fn from_oid(oid: &der::oid::ObjectIdentifier) -> Result<Self> {
        match *oid {
            const_oid::db::rfc5912::ID_SHA_256 => Ok(HashAlgorithm::Sha256),
            const_oid::db::rfc5912::ID_SHA_384 => Ok(HashAlgorithm::Sha384),
            const_oid::db::rfc5912::ID_SHA_512 => Ok(HashAlgorithm::Sha512),
            _ => Err(CaError::DecodingError(format!("Unsupported digest {oid}"))),
        }
    }
}

/// Represents the supported signature algorithms for certificates and CRLs.
///
/// The names follow the JOSE convention: `RS` is RSASSA-PKCS1-v1_5, `PS`
/// is RSASSA-PSS and `ES` is ECDSA, each with the SHA-2 digest of the
/// given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    ES256,
    ES384,
    ES512,
}

impl SignatureType {
    pub fn hash(&self) -> HashAlgorithm {
        match self {
            SignatureType::RS256 | SignatureType::PS256 | SignatureType::ES256 => {
                HashAlgorithm::Sha256
            }
            SignatureType::RS384 | SignatureType::PS384 | SignatureType::ES384 => {
                HashAlgorithm::Sha384
            }
            SignatureType::RS512 | SignatureType::PS512 | SignatureType::ES512 => {
                HashAlgorithm::Sha512
            }
        }
    }

    /// True for both RSA padding schemes.
    pub fn is_rsa(&self) -> bool {
        !self.is_ecdsa()
    }

    pub fn is_pss(&self) -> bool {
        matches!(
            self,
            SignatureType::PS256 | SignatureType::PS384 | SignatureType::PS512
        )
    }

    pub fn is_ecdsa(&self) -> bool {
        matches!(
            self,
            SignatureType::ES256 | SignatureType::ES384 | SignatureType::ES512
        )
    }

    /// Hashes `data` with this signature type's digest.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self.hash() {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// The `AlgorithmIdentifier` placed in certificates and CRLs.
    pub fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        use const_oid::db::rfc5912;

        let rsa_null = || der::Any::new(der::Tag::Null, Vec::<u8>::new());
        let algorithm = match self {
            SignatureType::RS256 => AlgorithmIdentifierOwned {
                oid: rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(rsa_null()?),
            },
            SignatureType::RS384 => AlgorithmIdentifierOwned {
                oid: rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
                parameters: Some(rsa_null()?),
            },
            SignatureType::RS512 => AlgorithmIdentifierOwned {
                oid: rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
                parameters: Some(rsa_null()?),
            },
            SignatureType::PS256 => rsa::pss::get_default_pss_signature_algo_id::<Sha256>()?,
            SignatureType::PS384 => rsa::pss::get_default_pss_signature_algo_id::<Sha384>()?,
            SignatureType::PS512 => rsa::pss::get_default_pss_signature_algo_id::<Sha512>()?,
            SignatureType::ES256 => AlgorithmIdentifierOwned {
                oid: rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
            SignatureType::ES384 => AlgorithmIdentifierOwned {
                oid: rfc5912::ECDSA_WITH_SHA_384,
                parameters: None,
            },
            SignatureType::ES512 => AlgorithmIdentifierOwned {
                oid: rfc5912::ECDSA_WITH_SHA_512,
                parameters: None,
            },
        };
        Ok(algorithm)
    }

    /// Determines the signature type of a decoded `AlgorithmIdentifier`.
    pub fn from_algorithm_identifier(algorithm: &AlgorithmIdentifierOwned) -> Result<Self> {
        use const_oid::db::rfc5912;

        let signature_type = match algorithm.oid {
            rfc5912::SHA_256_WITH_RSA_ENCRYPTION => SignatureType::RS256,
            rfc5912::SHA_384_WITH_RSA_ENCRYPTION => SignatureType::RS384,
            rfc5912::SHA_512_WITH_RSA_ENCRYPTION => SignatureType::RS512,
            rfc5912::ECDSA_WITH_SHA_256 => SignatureType::ES256,
            rfc5912::ECDSA_WITH_SHA_384 => SignatureType::ES384,
            rfc5912::ECDSA_WITH_SHA_512 => SignatureType::ES512,
            rfc5912::ID_RSASSA_PSS => {
                let parameters = algorithm.parameters.as_ref().ok_or_else(|| {
                    CaError::DecodingError("RSASSA-PSS without parameters".to_string())
                })?;
                let encoded = parameters.to_der()?;
                let pss = rsa::pkcs1::RsaPssParams::from_der(&encoded)?;
                match HashAlgorithm::from_oid(&pss.hash.oid)? {
                    HashAlgorithm::Sha256 => SignatureType::PS256,
                    HashAlgorithm::Sha384 => SignatureType::PS384,
                    HashAlgorithm::Sha512 => SignatureType::PS512,
                }
            }
            other => {
                return Err(CaError::DecodingError(format!(
                    "Unsupported signature algorithm {other}"
                )));
            }
        };
        Ok(signature_type)
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for SignatureType {
    type Err = CaError;

    fn from_str(s: &str) -> Result<Self> {
        let signature_type = match s.to_ascii_uppercase().as_str() {
            "RS256" => SignatureType::RS256,
            "RS384" => SignatureType::RS384,
            "RS512" => SignatureType::RS512,
            "PS256" => SignatureType::PS256,
            "PS384" => SignatureType::PS384,
            "PS512" => SignatureType::PS512,
            "ES256" => SignatureType::ES256,
            "ES384" => SignatureType::ES384,
            "ES512" => SignatureType::ES512,
            _ => return Err(CaError::InvalidInput(format!("unknown signature type {s}"))),
        };
        Ok(signature_type)
    }
}

/// Placeholder substituted with a serial number in URL templates.
pub const SERIAL_NUMBER_PLACEHOLDER: &str = "{serial}";

/// Policies of a certificate that may issue other certificates.
///
/// # Fields
/// * `signature_type` - Signature used when this issuer signs certificates and CRLs.
/// * `issued_lifetime` - Lifetime granted to certificates this issuer signs.
/// * `crl_distribution_point` - URL template, `{serial}` is replaced with
///   this issuer's serial number, added to every certificate it signs.
/// * `authority_information_access` - URL template, same substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct IssuerPolicies {
    pub signature_type: Option<SignatureType>,
    pub issued_lifetime: Option<Duration>,
    #[builder(into)]
    pub crl_distribution_point: Option<String>,
    #[builder(into)]
    pub authority_information_access: Option<String>,
}

/// Expands a URL template for the given serial number.
pub fn expand_url_template(template: &str, serial: &SerialNumber) -> String {
    template.replace(SERIAL_NUMBER_PLACEHOLDER, &serial.to_string())
}

/// Represents an X.509 certificate record.
///
/// The encoded certificate never changes once built. The record metadata
/// around it is what the repository tracks: the key handle (present only
/// when a usable private key exists), the issuer policies (present only
/// when the certificate may sign others) and the revocation timestamp.
#[derive(Debug, Clone)]
pub struct Certificate {
    inner: CertificateInner,
    raw: Vec<u8>,
    pub key_handle: Option<KeyHandle>,
    pub issuer_policies: Option<IssuerPolicies>,
    pub revoked: Option<OffsetDateTime>,
}

impl Certificate {
    /// Wraps a signed certificate structure.
    pub fn new(inner: CertificateInner) -> Result<Self> {
        let raw = inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))?;
        Ok(Self {
            inner,
            raw,
            key_handle: None,
            issuer_policies: None,
            revoked: None,
        })
    }

    /// Parses a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)?;
        Ok(Self {
            inner,
            raw: der.to_vec(),
            key_handle: None,
            issuer_policies: None,
            revoked: None,
        })
    }

    /// Parses a PEM-encoded certificate.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let parsed = pem::parse(pem).map_err(|e| CaError::DecodingError(e.to_string()))?;
        if parsed.tag() != "CERTIFICATE" {
            return Err(CaError::DecodingError(format!(
                "expected a CERTIFICATE, found {}",
                parsed.tag()
            )));
        }
        Self::from_der(parsed.contents())
    }

    pub fn with_key_handle(mut self, key_handle: Option<KeyHandle>) -> Self {
        self.key_handle = key_handle;
        self
    }

    pub fn with_issuer_policies(mut self, issuer_policies: Option<IssuerPolicies>) -> Self {
        self.issuer_policies = issuer_policies;
        self
    }

    /// The parsed certificate.
    pub fn inner(&self) -> &CertificateInner {
        &self.inner
    }

    /// The DER encoding.
    pub fn to_der(&self) -> Vec<u8> {
        self.raw.clone()
    }

    pub fn as_der(&self) -> &[u8] {
        &self.raw
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn subject(&self) -> &x509_cert::name::Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &x509_cert::name::Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject_name(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.subject())
    }

    pub fn issuer_name(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.issuer())
    }

    pub fn serial_number(&self) -> SerialNumber {
        SerialNumber::from_x509(&self.inner.tbs_certificate.serial_number)
    }

    pub fn not_before(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_certificate.validity.not_before.to_system_time())
    }

    pub fn not_after(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_certificate.validity.not_after.to_system_time())
    }

    pub fn validity(&self) -> Validity {
        Validity::new(self.not_before(), self.not_after())
    }

    /// SHA-1 over the DER encoding, upper-case hex.
    pub fn thumbprint(&self) -> String {
        <Sha1 as sha1::Digest>::digest(&self.raw)
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect()
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn signature_type(&self) -> Result<SignatureType> {
        SignatureType::from_algorithm_identifier(&self.inner.signature_algorithm)
    }

    /// All extensions in certificate order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_ref()
            .map(|extensions| extensions.iter().map(ExtensionParam::from_x509).collect())
            .unwrap_or_default()
    }

    /// Decodes the first extension of type `E`, if present.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    pub fn basic_constraints(&self) -> Result<Option<BasicConstraints>> {
        self.extension()
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.extension()
    }

    pub fn subject_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.extension::<SubjectKeyIdentifier>()?.map(|ski| ski.0))
    }

    pub fn authority_key_identifier(&self) -> Result<Option<AuthorityKeyIdentifier>> {
        self.extension()
    }

    /// Serial number of the issuing certificate.
    ///
    /// Read from the authority key identifier; a self-issued certificate
    /// without one is its own issuer.
    pub fn issuer_serial_number(&self) -> Result<SerialNumber> {
        if let Some(serial) = self
            .authority_key_identifier()?
            .and_then(|aki| aki.authority_cert_serial_number)
        {
            return Ok(serial);
        }
        if self.subject() == self.issuer() {
            return Ok(self.serial_number());
        }
        Err(CaError::CertificateError(format!(
            "certificate {} does not name its issuer serial number",
            self.serial_number()
        )))
    }

    /// Issuer equals subject and the authority key id, when present,
    /// matches the subject key id.
    pub fn is_self_signed(&self) -> bool {
        if self.subject() != self.issuer() {
            return false;
        }
        let authority_key_id = self
            .authority_key_identifier()
            .ok()
            .flatten()
            .and_then(|aki| aki.key_identifier);
        match authority_key_id {
            None => true,
            Some(id) => self.subject_key_identifier().ok().flatten().as_ref() == Some(&id),
        }
    }

    /// Whether this record may sign other certificates: it carries issuer
    /// policies, a CA basic constraint and certificate signing key usage.
    pub fn is_issuer(&self) -> bool {
        if self.issuer_policies.is_none() {
            return false;
        }
        let is_ca = matches!(self.basic_constraints(), Ok(Some(bc)) if bc.is_ca);
        let can_sign = matches!(
            self.key_usage(),
            Ok(Some(ku)) if ku.contains(KeyUsages::KeyCertSign) && ku.contains(KeyUsages::CRLSign)
        );
        is_ca && can_sign
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.is_some()
    }

    /// Verifies that `issuer` signed this certificate.
    pub fn verify_signed_by(&self, issuer: &Certificate) -> Result<()> {
        if self.issuer() != issuer.subject() {
            return Err(CaError::CertificateError(format!(
                "certificate issuer {} does not match {}",
                self.issuer_name(),
                issuer.subject_name()
            )));
        }
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CaError::DecodingError("signature has unused bits".to_string())
        })?;
        issuer
            .public_key()?
            .verify(&tbs, signature, self.signature_type()?)
    }

    /// Walks from this certificate through `chain` to a self-signed root,
    /// checking every signature and that each validity window nests in
    /// its issuer's.
    pub fn is_valid_chain(&self, chain: &[Certificate]) -> bool {
        match self.validate_chain(chain) {
            Ok(()) => true,
            Err(e) => {
                debug!(serial = %self.serial_number(), error = %e, "chain validation failed");
                false
            }
        }
    }

    fn validate_chain(&self, chain: &[Certificate]) -> Result<()> {
        let mut current = self;
        for _ in 0..=chain.len() {
            if current.is_self_signed() {
                return current.verify_signed_by(current);
            }
            let issuer = chain
                .iter()
                .find(|candidate| {
                    candidate.subject() == current.issuer()
                        && current.verify_signed_by(candidate).is_ok()
                })
                .ok_or_else(|| {
                    CaError::NotFound(format!("issuer of {}", current.serial_number()))
                })?;
            if !issuer.validity().contains(&current.validity()) {
                return Err(CaError::InvalidValidity(format!(
                    "{} outlives its issuer {}",
                    current.serial_number(),
                    issuer.serial_number()
                )));
            }
            current = issuer;
        }
        Err(CaError::CertificateError("chain does not end in a root".to_string()))
    }

    /// Same encoded certificate, regardless of record metadata.
    pub fn same_as(&self, other: &Certificate) -> bool {
        self.raw == other.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_type_properties() {
        assert!(SignatureType::PS384.is_rsa());
        assert!(SignatureType::PS384.is_pss());
        assert!(!SignatureType::RS256.is_pss());
        assert!(SignatureType::ES512.is_ecdsa());
        assert_eq!(SignatureType::ES384.hash(), HashAlgorithm::Sha384);
        assert_eq!(SignatureType::RS512.digest(b"abc").len(), 64);
    }

    #[test]
    fn test_algorithm_identifier_round_trip() {
        for signature_type in [
            SignatureType::RS256,
            SignatureType::RS512,
            SignatureType::PS256,
            SignatureType::PS512,
            SignatureType::ES256,
            SignatureType::ES384,
        ] {
            let algorithm = signature_type.algorithm_identifier().unwrap();
            assert_eq!(
                SignatureType::from_algorithm_identifier(&algorithm).unwrap(),
                signature_type
            );
        }
    }

    #[test]
    fn test_signature_type_from_str() {
        assert_eq!("es256".parse::<SignatureType>().unwrap(), SignatureType::ES256);
        assert!("HS256".parse::<SignatureType>().is_err());
    }

    #[test]
    fn test_expand_url_template() {
        let serial = SerialNumber::from_bytes(&[0x0a, 0xbc]).unwrap();
        assert_eq!(
            expand_url_template("https://ca.example/crl/{serial}.crl", &serial),
            "https://ca.example/crl/0ABC.crl"
        );
    }
}
