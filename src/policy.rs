//! Issuance policy checks.
//!
//! Before any key is created the issuer asks an [`IssuancePolicy`] to fill
//! in unset issuer policies and to reject parameters that do not fit the
//! requested key.

use time::Duration;

use crate::cert::{IssuerPolicies, SignatureType};
use crate::config::CaConfig;
use crate::error::{CaError, Result};
use crate::key::{CreateKeyParams, CurveType, KeyType};

const MAX_RSA_KEY_SIZE: u32 = 16384;

/// Pluggable validation of keys and issuer policies.
pub trait IssuancePolicy: Send + Sync {
    /// Rejects key parameters the deployment does not accept.
    fn check_key(&self, key: &CreateKeyParams) -> Result<()>;

    /// Completes and validates the policies of a new issuer.
    ///
    /// `parent` is `None` for a root. `lifetime` is the validity of the
    /// certificate being created, which bounds what it may grant others.
    fn validate(
        &self,
        parent: Option<&IssuerPolicies>,
        key: &CreateKeyParams,
        requested: Option<&IssuerPolicies>,
        lifetime: Duration,
    ) -> Result<IssuerPolicies>;
}

/// The policy used unless the caller plugs in another one.
#[derive(Debug, Clone)]
pub struct DefaultIssuancePolicy {
    min_rsa_key_size: u32,
    default_issued_lifetime: Duration,
}

impl DefaultIssuancePolicy {
    pub fn new(config: &CaConfig) -> Self {
        Self {
            min_rsa_key_size: config.min_rsa_key_size,
            default_issued_lifetime: config.default_issued_lifetime,
        }
    }
}

impl Default for DefaultIssuancePolicy {
    fn default() -> Self {
        Self::new(&CaConfig::default())
    }
}

/// Signature type matching a key when the caller did not choose one.
pub fn default_signature_type(key: &CreateKeyParams) -> SignatureType {
    match key.key_type {
        KeyType::Rsa => SignatureType::RS256,
        KeyType::Ec => match key.ec_curve() {
            CurveType::P256 => SignatureType::ES256,
            CurveType::P384 => SignatureType::ES384,
            CurveType::P521 => SignatureType::ES512,
        },
    }
}

impl IssuancePolicy for DefaultIssuancePolicy {
    fn check_key(&self, key: &CreateKeyParams) -> Result<()> {
        if key.key_type == KeyType::Rsa {
            let size = key.rsa_key_size();
            if size < self.min_rsa_key_size || size > MAX_RSA_KEY_SIZE || size % 8 != 0 {
                return Err(CaError::PolicyViolation(format!(
                    "RSA key size {size} is not allowed (minimum {})",
                    self.min_rsa_key_size
                )));
            }
        }
        Ok(())
    }

    fn validate(
        &self,
        parent: Option<&IssuerPolicies>,
        key: &CreateKeyParams,
        requested: Option<&IssuerPolicies>,
        lifetime: Duration,
    ) -> Result<IssuerPolicies> {
        self.check_key(key)?;
        if lifetime <= Duration::ZERO {
            return Err(CaError::InvalidValidity(format!(
                "certificate lifetime {lifetime} must be positive"
            )));
        }

        let mut policies = requested.cloned().unwrap_or_default();

        let signature_type = policies
            .signature_type
            .unwrap_or_else(|| default_signature_type(key));
        match key.key_type {
            KeyType::Rsa if !signature_type.is_rsa() => {
                return Err(CaError::PolicyViolation(format!(
                    "{signature_type} cannot be used with an RSA key"
                )));
            }
            KeyType::Ec if !signature_type.is_ecdsa() => {
                return Err(CaError::PolicyViolation(format!(
                    "{signature_type} cannot be used with an EC key"
                )));
            }
            KeyType::Ec => {
                let curve = key.ec_curve();
                if signature_type.hash().output_size() * 2 < curve.field_size() {
                    return Err(CaError::PolicyViolation(format!(
                        "{signature_type} digest is too short for {curve:?}"
                    )));
                }
            }
            KeyType::Rsa => {}
        }
        policies.signature_type = Some(signature_type);

        let issued_lifetime = match policies.issued_lifetime {
            Some(requested) => {
                if requested <= Duration::ZERO {
                    return Err(CaError::PolicyViolation(format!(
                        "issued lifetime {requested} must be positive"
                    )));
                }
                if requested > lifetime {
                    return Err(CaError::PolicyViolation(format!(
                        "issued lifetime {requested} exceeds the certificate lifetime {lifetime}"
                    )));
                }
                requested
            }
            None => parent
                .and_then(|p| p.issued_lifetime)
                .unwrap_or(self.default_issued_lifetime)
                .min(lifetime),
        };
        policies.issued_lifetime = Some(issued_lifetime);

        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DefaultIssuancePolicy {
        DefaultIssuancePolicy::default()
    }

    #[test]
    fn test_root_defaults() {
        let policies = policy()
            .validate(None, &CreateKeyParams::rsa(2048), None, Duration::days(3650))
            .unwrap();
        assert_eq!(policies.signature_type, Some(SignatureType::RS256));
        assert_eq!(policies.issued_lifetime, Some(Duration::days(365)));
    }

    #[test]
    fn test_signature_type_follows_curve_not_parent() {
        let parent = IssuerPolicies::builder()
            .signature_type(SignatureType::RS512)
            .issued_lifetime(Duration::hours(3))
            .build();
        let policies = policy()
            .validate(
                Some(&parent),
                &CreateKeyParams::ec(CurveType::P384),
                None,
                Duration::hours(3),
            )
            .unwrap();
        assert_eq!(policies.signature_type, Some(SignatureType::ES384));
        assert_eq!(policies.issued_lifetime, Some(Duration::hours(3)));
    }

    #[test]
    fn test_inherited_lifetime_is_capped() {
        let parent = IssuerPolicies::builder()
            .issued_lifetime(Duration::days(30))
            .build();
        let policies = policy()
            .validate(
                Some(&parent),
                &CreateKeyParams::ec(CurveType::P256),
                None,
                Duration::days(7),
            )
            .unwrap();
        assert_eq!(policies.issued_lifetime, Some(Duration::days(7)));
    }

    #[test]
    fn test_rejections() {
        let p = policy();
        let ec = CreateKeyParams::ec(CurveType::P256);
        let rs = IssuerPolicies::builder().signature_type(SignatureType::RS256).build();
        assert!(matches!(
            p.validate(None, &ec, Some(&rs), Duration::days(1)),
            Err(CaError::PolicyViolation(_))
        ));

        let es = IssuerPolicies::builder().signature_type(SignatureType::ES256).build();
        assert!(p
            .validate(None, &CreateKeyParams::rsa(2048), Some(&es), Duration::days(1))
            .is_err());
        assert!(p
            .validate(None, &CreateKeyParams::ec(CurveType::P521), Some(&es), Duration::days(1))
            .is_err());

        assert!(p.check_key(&CreateKeyParams::rsa(1024)).is_err());
        assert!(p.check_key(&CreateKeyParams::rsa(2049)).is_err());
        assert!(p.check_key(&CreateKeyParams::rsa(3072)).is_ok());

        let too_long = IssuerPolicies::builder().issued_lifetime(Duration::days(2)).build();
        assert!(p.validate(None, &ec, Some(&too_long), Duration::days(1)).is_err());
        let negative = IssuerPolicies::builder().issued_lifetime(Duration::hours(-1)).build();
        assert!(p.validate(None, &ec, Some(&negative), Duration::days(1)).is_err());
        assert!(matches!(
            p.validate(None, &ec, None, Duration::ZERO),
            Err(CaError::InvalidValidity(_))
        ));
    }
}
