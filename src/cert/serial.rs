use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::{CaError, Result};

/// Number of random bytes in a generated serial number.
const SERIAL_NUMBER_LENGTH: usize = 16;

/// A certificate serial number (big-endian, positive).
///
/// Generated serials are 128 random bits with the sign bit cleared and a
/// non-zero leading byte, so the DER encoding stays minimal and never
/// exceeds the 20 octets RFC 5280 allows.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerialNumber(Vec<u8>);

impl SerialNumber {
    /// Generates a fresh random serial number.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SERIAL_NUMBER_LENGTH];
        rand::rng().fill(&mut bytes[..]);
        bytes[0] = (bytes[0] & 0x7f).max(1);
        Self(bytes.to_vec())
    }

    /// Wraps raw big-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() > 20 {
            return Err(CaError::InvalidInput(format!(
                "serial number must be 1 to 20 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Converts into the X.509 representation.
    pub fn to_x509(&self) -> Result<x509_cert::serial_number::SerialNumber> {
        Ok(x509_cert::serial_number::SerialNumber::new(&self.0)?)
    }

    pub fn from_x509(serial: &x509_cert::serial_number::SerialNumber) -> Self {
        Self(serial.as_bytes().to_vec())
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerialNumber({self})")
    }
}

impl FromStr for SerialNumber {
    type Err = CaError;

    /// Parses the upper- or lower-case hex form produced by `Display`.
    fn from_str(s: &str) -> Result<Self> {
        if !s.is_ascii() || s.len() % 2 != 0 {
            return Err(CaError::InvalidInput(format!("malformed serial number {s}")));
        }
        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&s[i..i + 2], 16)
                    .map_err(|e| CaError::InvalidInput(format!("invalid serial number {s}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_serials_are_positive_and_unique() {
        let serials: HashSet<SerialNumber> = (0..1000).map(|_| SerialNumber::generate()).collect();
        assert_eq!(serials.len(), 1000);
        for serial in &serials {
            assert_eq!(serial.as_bytes().len(), SERIAL_NUMBER_LENGTH);
            assert!(serial.as_bytes()[0] > 0 && serial.as_bytes()[0] < 0x80);
            serial.to_x509().unwrap();
        }
    }

    #[test]
    fn test_hex_form() {
        let serial = SerialNumber::from_bytes(&[0x01, 0xab, 0x7f]).unwrap();
        assert_eq!(serial.to_string(), "01AB7F");
        assert_eq!("01ab7f".parse::<SerialNumber>().unwrap(), serial);
        assert!("1ab".parse::<SerialNumber>().is_err());
        assert!("zz".parse::<SerialNumber>().is_err());
    }

    #[test]
    fn test_rejects_oversized_serial() {
        assert!(SerialNumber::from_bytes(&[1u8; 21]).is_err());
        assert!(SerialNumber::from_bytes(&[]).is_err());
    }
}
