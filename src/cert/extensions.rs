use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};

use super::SerialNumber;
use super::params::{DistinguishedName, ExtensionParam};
use crate::error::{CaError, Result};

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use iiot_ca::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName::builder()
///     .dns_names(vec!["plc-7.plant.local".to_string()])
///     .build();
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san, decoded);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

fn ia5(value: &str) -> Result<Ia5String> {
    Ia5String::new(value).map_err(|e| CaError::InvalidInput(format!("{value}: {e}")))
}

fn uri_names(urls: &[String]) -> Result<Vec<GeneralName>> {
    urls.iter()
        .map(|url| ia5(url).map(GeneralName::UniformResourceIdentifier))
        .collect()
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// Application instance certificates carry their application URI here,
/// devices usually add their host names.
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct SubjectAltName {
    #[builder(default)]
    pub dns_names: Vec<String>,
    #[builder(default)]
    pub uris: Vec<String>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let mut names = uri_names(&self.uris)?;
        for name in &self.dns_names {
            names.push(GeneralName::DnsName(ia5(name)?));
        }
        Ok(x509_cert::ext::pkix::SubjectAltName(names).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let mut decoded = Self::default();
        for name in san.0 {
            match name {
                GeneralName::DnsName(dns) => decoded.dns_names.push(dns.to_string()),
                GeneralName::UniformResourceIdentifier(uri) => decoded.uris.push(uri.to_string()),
                _ => {}
            }
        }
        Ok(decoded)
    }
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl KeyUsage {
    /// Usage granted to certificates that sign other certificates and CRLs.
    pub fn issuer() -> Self {
        Self(KeyUsages::DigitalSignature | KeyUsages::KeyCertSign | KeyUsages::CRLSign)
    }

    /// Usage granted to end-entity certificates.
    pub fn leaf() -> Self {
        Self(
            KeyUsages::DigitalSignature
                | KeyUsages::DataEncipherment
                | KeyUsages::NonRepudiation
                | KeyUsages::KeyEncipherment,
        )
    }

    pub fn contains(&self, usage: KeyUsages) -> bool {
        self.0.contains(usage)
    }
}

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Subject Key Identifier extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_slice())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// This extension identifies the public key corresponding to the private key used to sign the certificate.
///
/// # Fields
/// * `key_identifier` - The issuer's subject key identifier.
/// * `authority_cert_issuer` - The name of the issuer's own issuer.
/// * `authority_cert_serial_number` - The issuer's certificate serial number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Option<Vec<u8>>,
    pub authority_cert_issuer: Option<DistinguishedName>,
    pub authority_cert_serial_number: Option<SerialNumber>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let authority_cert_issuer = match &self.authority_cert_issuer {
            Some(name) => Some(vec![GeneralName::DirectoryName(name.as_x509_name()?)]),
            None => None,
        };
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: self
                .key_identifier
                .as_ref()
                .map(|id| OctetString::new(id.as_slice()))
                .transpose()?,
            authority_cert_issuer,
            authority_cert_serial_number: self
                .authority_cert_serial_number
                .as_ref()
                .map(SerialNumber::to_x509)
                .transpose()?,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;

        let authority_cert_issuer = aki.authority_cert_issuer.as_ref().and_then(|names| {
            names.iter().find_map(|name| match name {
                GeneralName::DirectoryName(dn) => Some(DistinguishedName::from_x509_name(dn)),
                _ => None,
            })
        });

        Ok(Self {
            key_identifier: aki.key_identifier.map(|id| id.as_bytes().to_vec()),
            authority_cert_issuer,
            authority_cert_serial_number: aki
                .authority_cert_serial_number
                .as_ref()
                .map(SerialNumber::from_x509),
        })
    }
}

/// Represents the CRL Distribution Points extension as a flat list of
/// URLs, one distribution point per URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrlDistributionPoints {
    pub urls: Vec<String>,
}

impl ToAndFromX509Extension for CrlDistributionPoints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::CrlDistributionPoints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let points = uri_names(&self.urls)?
            .into_iter()
            .map(|name| DistributionPoint {
                distribution_point: Some(DistributionPointName::FullName(vec![name])),
                reasons: None,
                crl_issuer: None,
            })
            .collect();
        Ok(x509_cert::ext::pkix::CrlDistributionPoints(points).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let cdp = x509_cert::ext::pkix::CrlDistributionPoints::from_der(extension)?;
        let urls = cdp
            .0
            .iter()
            .filter_map(|point| match &point.distribution_point {
                Some(DistributionPointName::FullName(names)) => Some(names),
                _ => None,
            })
            .flatten()
            .filter_map(|name| match name {
                GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
                _ => None,
            })
            .collect();
        Ok(Self { urls })
    }
}

/// Represents the Authority Information Access extension, limited to
/// `caIssuers` locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityInformationAccess {
    pub ca_issuers: Vec<String>,
}

impl ToAndFromX509Extension for AuthorityInformationAccess {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityInfoAccessSyntax::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let descriptions = uri_names(&self.ca_issuers)?
            .into_iter()
            .map(|location| x509_cert::ext::pkix::AccessDescription {
                access_method: const_oid::db::rfc5912::ID_AD_CA_ISSUERS,
                access_location: location,
            })
            .collect();
        Ok(x509_cert::ext::pkix::AuthorityInfoAccessSyntax(descriptions).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aia = x509_cert::ext::pkix::AuthorityInfoAccessSyntax::from_der(extension)?;
        let ca_issuers = aia
            .0
            .iter()
            .filter(|d| d.access_method == const_oid::db::rfc5912::ID_AD_CA_ISSUERS)
            .filter_map(|d| match &d.access_location {
                GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
                _ => None,
            })
            .collect();
        Ok(Self { ca_issuers })
    }
}

/// Represents the CRL Number extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CrlNumber(pub u64);

impl ToAndFromX509Extension for CrlNumber {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::CrlNumber::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bytes = self.0.to_be_bytes();
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        let number = der::asn1::Uint::new(&bytes[start..])?;
        Ok(x509_cert::ext::pkix::CrlNumber(number).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let number = x509_cert::ext::pkix::CrlNumber::from_der(extension)?;
        let bytes = number.0.as_bytes();
        let significant = bytes
            .iter()
            .position(|b| *b != 0)
            .map_or(&[][..], |start| &bytes[start..]);
        if significant.len() > 8 {
            return Err(CaError::DecodingError("CRL number exceeds 64 bits".to_string()));
        }
        Ok(Self(significant.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))))
    }
}

/// Represents the CRL entry Reason Code extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrlReason(pub x509_cert::ext::pkix::CrlReason);

impl ToAndFromX509Extension for CrlReason {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::CrlReason::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(self.0.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        Ok(Self(x509_cert::ext::pkix::CrlReason::from_der(extension)?))
    }
}

/// The extension kinds the certificate factory treats specially.
///
/// Basic constraints and both key identifiers are owned by the factory,
/// key usage is merged into the factory's defaults and a CRL distribution
/// point may be replaced. Everything else passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionKind {
    BasicConstraints,
    KeyUsage(KeyUsage),
    SubjectKeyIdentifier,
    AuthorityKeyIdentifier,
    CrlDistributionPoints,
    Other,
}

impl ExtensionKind {
    /// Classifies a raw extension. A key usage extension is decoded so its
    /// bits can be merged.
    pub fn classify(extension: &ExtensionParam) -> Result<Self> {
        let kind = match extension.oid {
            BasicConstraints::OID => ExtensionKind::BasicConstraints,
            KeyUsage::OID => ExtensionKind::KeyUsage(extension.to_extension()?),
            SubjectKeyIdentifier::OID => ExtensionKind::SubjectKeyIdentifier,
            AuthorityKeyIdentifier::OID => ExtensionKind::AuthorityKeyIdentifier,
            CrlDistributionPoints::OID => ExtensionKind::CrlDistributionPoints,
            _ => ExtensionKind::Other,
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_constraints_encoding_decoding() {
        let original = BasicConstraints {
            is_ca: true,
            max_path_length: Some(0),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = BasicConstraints::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_authority_key_identifier_encoding_decoding() {
        let original = AuthorityKeyIdentifier {
            key_identifier: Some(vec![1, 2, 3, 4, 5]),
            authority_cert_issuer: Some(
                DistinguishedName::builder()
                    .common_name("Test CA")
                    .country("US")
                    .organization("Test Org")
                    .build(),
            ),
            authority_cert_serial_number: Some(SerialNumber::from_bytes(&[6, 7, 8, 9, 10]).unwrap()),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = AuthorityKeyIdentifier::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_authority_key_identifier_key_id_only() {
        let original = AuthorityKeyIdentifier {
            key_identifier: Some(vec![9; 20]),
            ..Default::default()
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = AuthorityKeyIdentifier::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(decoded.authority_cert_serial_number, None);
        assert_eq!(decoded.authority_cert_issuer, None);
        assert_eq!(decoded.key_identifier, Some(vec![9; 20]));
    }

    #[test]
    fn test_key_usage_encoding_decoding() {
        let original = KeyUsage::issuer();
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = KeyUsage::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
        assert!(decoded.contains(KeyUsages::KeyCertSign));
        assert!(!KeyUsage::leaf().contains(KeyUsages::CRLSign));
    }

    #[test]
    fn test_crl_distribution_points() {
        let original = CrlDistributionPoints {
            urls: vec!["https://ca.example/v1/crl/0A1B/crl".to_string()],
        };
        let encoded = original.to_x509_extension_value().unwrap();
        assert_eq!(
            CrlDistributionPoints::from_x509_extension_value(&encoded).unwrap(),
            original
        );
    }

    #[test]
    fn test_crl_number() {
        for value in [0u64, 1, 0x80, 0x1234_5678_9abc] {
            let encoded = CrlNumber(value).to_x509_extension_value().unwrap();
            assert_eq!(
                CrlNumber::from_x509_extension_value(&encoded).unwrap(),
                CrlNumber(value)
            );
        }
    }

    #[test]
    fn test_subject_alt_name_keeps_uris() {
        let san = SubjectAltName::builder()
            .uris(vec!["urn:plant:opcua:server".to_string()])
            .dns_names(vec!["plc-7".to_string()])
            .build();
        let encoded = san.to_x509_extension_value().unwrap();
        assert_eq!(SubjectAltName::from_x509_extension_value(&encoded).unwrap(), san);
    }

    #[test]
    fn test_classify() {
        let ku = ExtensionParam::from_extension(KeyUsage::leaf(), true).unwrap();
        assert_eq!(
            ExtensionKind::classify(&ku).unwrap(),
            ExtensionKind::KeyUsage(KeyUsage::leaf())
        );
        let bc = ExtensionParam::from_extension(BasicConstraints::default(), true).unwrap();
        assert_eq!(ExtensionKind::classify(&bc).unwrap(), ExtensionKind::BasicConstraints);
        let san = ExtensionParam::from_extension(SubjectAltName::default(), false).unwrap();
        assert_eq!(ExtensionKind::classify(&san).unwrap(), ExtensionKind::Other);
    }
}
