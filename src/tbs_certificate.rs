use der::Encode;
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;

use crate::cert::params::{ExtensionParam, Validity};
use crate::cert::{SerialNumber, SignatureType};
use crate::error::{CaError, Result};
use crate::key::PublicKey;

/// First year that has to be written as `GeneralizedTime` (RFC 5280 4.1.2.5).
const GENERALIZED_TIME_YEAR: i32 = 2050;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// Names are kept in their encoded X.509 form so that a child's issuer is
/// byte-for-byte the parent's subject.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_type` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: SerialNumber,
    pub signature_type: SignatureType,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: self.serial_number.to_x509()?,
            signature: self.signature_type.algorithm_identifier()?,
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}

/// Converts a timestamp to the X.509 time encoding, truncated to whole
/// seconds: `UTCTime` through 2049 and `GeneralizedTime` from 2050 on.
pub(crate) fn to_x509_time(instant: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let instant = instant
        .replace_nanosecond(0)
        .map_err(|e| CaError::EncodingError(e.to_string()))?;
    let system_time = std::time::SystemTime::from(instant);
    let time = if instant.year() < GENERALIZED_TIME_YEAR {
        x509_cert::time::Time::UtcTime(der::asn1::UtcTime::from_system_time(system_time)?)
    } else {
        x509_cert::time::Time::GeneralTime(der::asn1::GeneralizedTime::from_system_time(
            system_time,
        )?)
    };
    Ok(time)
}
