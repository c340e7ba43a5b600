//! Engine configuration.

use std::str::FromStr;

use bon::Builder;
use time::Duration;

use crate::cert::SerialNumber;

/// Configuration of the certificate authority engine.
///
/// # Fields
/// * `crl_root_url` - Root of CRL distribution point URLs placed in
///   issuing certificates, `{root}/{serial}/crl`.
/// * `aia_root_url` - Root of authority information access URLs,
///   `{root}/{issuer serial}/cert`.
/// * `default_issued_lifetime` - Lifetime granted by a root that sets none.
/// * `min_rsa_key_size` - Smallest RSA modulus accepted by the default policy.
/// * `crl_validity` - Offset of a CRL's `nextUpdate`; the issuer's expiry
///   when unset.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct CaConfig {
    #[builder(into)]
    pub crl_root_url: Option<String>,
    #[builder(into)]
    pub aia_root_url: Option<String>,
    #[builder(default = default_issued_lifetime())]
    pub default_issued_lifetime: Duration,
    #[builder(default = default_min_rsa_key_size())]
    pub min_rsa_key_size: u32,
    pub crl_validity: Option<Duration>,
}

fn default_issued_lifetime() -> Duration {
    Duration::days(365)
}

fn default_min_rsa_key_size() -> u32 {
    2048
}

fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| value.trim().parse().ok())
}

/// A positive count of `unit_seconds` as a duration; `None` when it does
/// not fit.
fn positive_duration(count: i64, unit_seconds: i64) -> Option<Duration> {
    if count <= 0 {
        return None;
    }
    count.checked_mul(unit_seconds).map(Duration::seconds)
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            crl_root_url: None,
            aia_root_url: None,
            default_issued_lifetime: default_issued_lifetime(),
            min_rsa_key_size: default_min_rsa_key_size(),
            crl_validity: None,
        }
    }
}

impl CaConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `IIOT_CA_CRL_ROOT_URL`, `IIOT_CA_AIA_ROOT_URL`,
    /// `IIOT_CA_ISSUED_LIFETIME_DAYS`, `IIOT_CA_MIN_RSA_KEY_SIZE` and
    /// `IIOT_CA_CRL_VALIDITY_HOURS`. Unset or unparsable values fall back
    /// to the defaults, and so do lifetimes too large to represent.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`CaConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            crl_root_url: parse_env(&lookup, "IIOT_CA_CRL_ROOT_URL"),
            aia_root_url: parse_env(&lookup, "IIOT_CA_AIA_ROOT_URL"),
            default_issued_lifetime: parse_env(&lookup, "IIOT_CA_ISSUED_LIFETIME_DAYS")
                .and_then(|days| positive_duration(days, 86_400))
                .unwrap_or_else(default_issued_lifetime),
            min_rsa_key_size: parse_env(&lookup, "IIOT_CA_MIN_RSA_KEY_SIZE")
                .unwrap_or_else(default_min_rsa_key_size),
            crl_validity: parse_env(&lookup, "IIOT_CA_CRL_VALIDITY_HOURS")
                .and_then(|hours| positive_duration(hours, 3_600)),
        }
    }

    /// CRL distribution point for the CRL published by `serial`.
    pub fn crl_url(&self, serial: &SerialNumber) -> Option<String> {
        self.crl_root_url
            .as_deref()
            .map(|root| format!("{}/{serial}/crl", root.trim_end_matches('/')))
    }

    /// Where the certificate `serial` can be downloaded.
    pub fn aia_url(&self, serial: &SerialNumber) -> Option<String> {
        self.aia_root_url
            .as_deref()
            .map(|root| format!("{}/{serial}/cert", root.trim_end_matches('/')))
    }
}
