use std::fmt;
use std::str::FromStr;

use bon::Builder;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519;
use der::asn1::{Ia5StringRef, OctetString, PrintableStringRef};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::name::RdnSequence;

use super::extensions::ToAndFromX509Extension;
use crate::error::{CaError, Result};
use crate::key::PublicKey;

/// Parameters of a certification request: who the certificate is for and
/// the key it binds.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `is_ca` - Indicates if the certificate may issue other certificates.
/// * `extensions` - Additional X.509 extensions.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// This struct represents the subject or issuer name in a certificate.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C).
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    #[builder(into)]
    pub common_name: String,
    #[builder(into)]
    pub country: Option<String>,
    #[builder(into)]
    pub state: Option<String>,
    #[builder(into)]
    pub locality: Option<String>,
    #[builder(into)]
    pub organization: Option<String>,
    #[builder(into)]
    pub organization_unit: Option<String>,
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn attribute_string(value: &der::Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<String>() {
        return Some(s);
    }
    if let Ok(s) = value.decode_as::<PrintableStringRef<'_>>() {
        return Some(s.as_str().to_string());
    }
    value
        .decode_as::<Ia5StringRef<'_>>()
        .ok()
        .map(|s| s.as_str().to_string())
}

impl DistinguishedName {
    /// A name with only a common name set.
    pub fn with_common_name(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Default::default()
        }
    }

    fn attributes(&self) -> Vec<(&'static str, &str)> {
        [
            ("CN", Some(self.common_name.as_str())),
            ("OU", self.organization_unit.as_deref()),
            ("O", self.organization.as_deref()),
            ("L", self.locality.as_deref()),
            ("ST", self.state.as_deref()),
            ("C", self.country.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.filter(|v| !v.is_empty()).map(|v| (key, v)))
        .collect()
    }

    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// Empty attributes are left out.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        if self.common_name.is_empty() {
            return Err(CaError::InvalidInput(
                "distinguished name requires a common name".to_string(),
            ));
        }
        let rfc4514_name = self
            .attributes()
            .into_iter()
            .map(|(key, value)| format!("{key}={}", escape(value)))
            .collect::<Vec<_>>()
            .join(",");
        RdnSequence::from_str(&rfc4514_name).map_err(|e| CaError::InvalidInput(e.to_string()))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes this model does not carry are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Self {
        let mut name = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = attribute_string(&attr.value) else {
                    continue;
                };
                match attr.oid {
                    rfc4519::CN => name.common_name = value,
                    rfc4519::C => name.country = Some(value),
                    rfc4519::ST => name.state = Some(value),
                    rfc4519::L => name.locality = Some(value),
                    rfc4519::O => name.organization = Some(value),
                    rfc4519::OU => name.organization_unit = Some(value),
                    _ => {}
                }
            }
        }
        name
    }
}

impl FromStr for DistinguishedName {
    type Err = CaError;

    /// Parses an RFC 4514 string such as `CN=device,O=Contoso`.
    fn from_str(s: &str) -> Result<Self> {
        let name = RdnSequence::from_str(s).map_err(|e| CaError::InvalidInput(e.to_string()))?;
        let parsed = Self::from_x509_name(&name);
        if parsed.common_name.is_empty() {
            return Err(CaError::InvalidInput(format!("{s} has no common name")));
        }
        Ok(parsed)
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .attributes()
            .into_iter()
            .map(|(key, value)| format!("{key}={}", escape(value)))
            .collect::<Vec<_>>();
        f.write_str(&parts.join(", "))
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    pub fn new(not_before: OffsetDateTime, not_after: OffsetDateTime) -> Self {
        Self {
            not_before,
            not_after,
        }
    }

    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }

    /// Starts at `not_before` and lasts `lifetime`, capped at the latest
    /// representable instant.
    pub fn starting_at(not_before: OffsetDateTime, lifetime: Duration) -> Self {
        let not_after = not_before
            .checked_add(lifetime)
            .unwrap_or_else(max_date_time);
        Self {
            not_before,
            not_after,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.not_after - self.not_before
    }

    pub fn contains(&self, other: &Validity) -> bool {
        other.not_before >= self.not_before && other.not_after <= self.not_after
    }
}

/// Latest instant a certificate may be valid until.
pub fn max_date_time() -> OffsetDateTime {
    time::PrimitiveDateTime::MAX.assume_utc()
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }

    pub fn from_x509(extension: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: extension.extn_id,
            critical: extension.critical,
            value: extension.extn_value.as_bytes().to_vec(),
        }
    }

    pub fn to_x509(&self) -> Result<x509_cert::ext::Extension> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_name_round_trip() {
        let name = DistinguishedName::builder()
            .common_name("opc.tcp device")
            .organization("Contoso, Ltd")
            .country("US")
            .build();
        let x509 = name.as_x509_name().unwrap();
        assert_eq!(DistinguishedName::from_x509_name(&x509), name);
    }

    #[test]
    fn test_parse_rfc4514() {
        let name: DistinguishedName = "CN=me,O=Plant 4".parse().unwrap();
        assert_eq!(name.common_name, "me");
        assert_eq!(name.organization.as_deref(), Some("Plant 4"));
        assert!("O=Only Org".parse::<DistinguishedName>().is_err());
    }

    #[test]
    fn test_empty_common_name_rejected() {
        assert!(DistinguishedName::default().as_x509_name().is_err());
    }

    #[test]
    fn test_validity_is_capped() {
        let start = OffsetDateTime::now_utc();
        let validity = Validity::starting_at(start, Duration::MAX);
        assert_eq!(validity.not_after, max_date_time());
        assert!(Validity::for_days(10).lifetime() == Duration::days(10));
    }
}
