//! Certificate issuance workflows.
//!
//! [`CertificateIssuer`] validates policies, asks the key store for keys,
//! has the [`CertificateFactory`] build and sign certificates and
//! persists them. A key created for a certificate that then fails to be
//! built or stored is deleted again.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};

use crate::cert::extensions::{AuthorityInformationAccess, CrlDistributionPoints};
use crate::cert::params::{CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity};
use crate::cert::{Certificate, IssuerPolicies, SignatureType, expand_url_template};
use crate::config::CaConfig;
use crate::error::{CaError, Result};
use crate::factory::{CertificateFactory, ExtensionCallback, IssuerRef};
use crate::key::{
    CreateKeyParams, Key, KeyHandle, KeyStore, KeyStoreProperties, KeyStoreSigner, PublicKey,
};
use crate::policy::{DefaultIssuancePolicy, IssuancePolicy, default_signature_type};
use crate::storage::CertificateRepository;

/// Everything needed to sign and store one certificate.
struct Issuance<'a> {
    name: &'a str,
    subject: DistinguishedName,
    parent: Option<&'a Certificate>,
    validity: Validity,
    signature_type: SignatureType,
    policies: Option<IssuerPolicies>,
    extensions: Option<ExtensionCallback<'a>>,
}

/// Issues, imports and disables certificates.
pub struct CertificateIssuer {
    repo: Arc<dyn CertificateRepository>,
    keys: Arc<dyn KeyStore>,
    factory: CertificateFactory,
    policy: Arc<dyn IssuancePolicy>,
}

impl CertificateIssuer {
    /// Creates an issuer using the [`DefaultIssuancePolicy`].
    pub fn new(
        repo: Arc<dyn CertificateRepository>,
        keys: Arc<dyn KeyStore>,
        config: CaConfig,
    ) -> Self {
        let policy = Arc::new(DefaultIssuancePolicy::new(&config));
        Self {
            repo,
            keys,
            factory: CertificateFactory::new(config),
            policy,
        }
    }

    /// Replaces the issuance policy.
    pub fn with_policy(mut self, policy: Arc<dyn IssuancePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &CaConfig {
        self.factory.config()
    }

    /// Creates a self-signed root with a new, non-exportable key.
    ///
    /// The certificate is valid for `lifetime` from `not_before` (now when
    /// unset), capped at the latest representable date.
    #[instrument(skip(self))]
    pub async fn new_root_certificate(
        &self,
        certificate_name: &str,
        subject: DistinguishedName,
        not_before: Option<OffsetDateTime>,
        lifetime: Duration,
        key_params: CreateKeyParams,
        policies: Option<IssuerPolicies>,
    ) -> Result<Certificate> {
        require_name(certificate_name)?;
        subject.as_x509_name()?;
        let policies = self
            .policy
            .validate(None, &key_params, policies.as_ref(), lifetime)?;
        let signature_type = signature_type_of(&policies, &key_params);

        let validity = Validity::starting_at(
            not_before.unwrap_or_else(OffsetDateTime::now_utc),
            lifetime,
        );
        let issuance = Issuance {
            name: certificate_name,
            subject,
            parent: None,
            validity,
            signature_type,
            policies: Some(policies),
            extensions: None,
        };
        let certificate = self
            .issue_with_new_key(&key_params, KeyStoreProperties::non_exportable(), issuance)
            .await?;
        info!(name = certificate_name, serial = %certificate.serial_number(), "created root certificate");
        Ok(certificate)
    }

    /// Creates a subordinate issuer signed by the latest certificate named
    /// `root_certificate`.
    #[instrument(skip(self))]
    pub async fn new_issuer_certificate(
        &self,
        root_certificate: &str,
        certificate_name: &str,
        subject: DistinguishedName,
        not_before: Option<OffsetDateTime>,
        key_params: CreateKeyParams,
        policies: Option<IssuerPolicies>,
    ) -> Result<Certificate> {
        require_name(certificate_name)?;
        subject.as_x509_name()?;
        let parent = self.load_issuer(root_certificate).await?;
        let validity = self.child_validity(&parent, not_before);
        let policies = self.policy.validate(
            parent.issuer_policies.as_ref(),
            &key_params,
            policies.as_ref(),
            validity.lifetime(),
        )?;

        let issuance = Issuance {
            name: certificate_name,
            subject,
            parent: Some(&parent),
            validity,
            signature_type: parent_signature_type(&parent)?,
            policies: Some(policies),
            extensions: None,
        };
        let certificate = self
            .issue_with_new_key(&key_params, KeyStoreProperties::non_exportable(), issuance)
            .await?;
        info!(
            name = certificate_name,
            serial = %certificate.serial_number(),
            issuer = %parent.serial_number(),
            "created issuer certificate"
        );
        Ok(certificate)
    }

    /// Issues an end-entity certificate together with a new key the
    /// subject can later export.
    #[instrument(skip(self, extensions))]
    pub async fn create_certificate_and_private_key(
        &self,
        root_certificate: &str,
        certificate_name: &str,
        subject: DistinguishedName,
        not_before: Option<OffsetDateTime>,
        key_params: CreateKeyParams,
        extensions: Option<ExtensionCallback<'_>>,
    ) -> Result<Certificate> {
        require_name(certificate_name)?;
        subject.as_x509_name()?;
        self.policy.check_key(&key_params)?;
        let parent = self.load_issuer(root_certificate).await?;
        let validity = require_window(self.child_validity(&parent, not_before))?;

        let issuance = Issuance {
            name: certificate_name,
            subject,
            parent: Some(&parent),
            validity,
            signature_type: parent_signature_type(&parent)?,
            policies: None,
            extensions,
        };
        let certificate = self
            .issue_with_new_key(&key_params, KeyStoreProperties::exportable(), issuance)
            .await?;
        info!(name = certificate_name, serial = %certificate.serial_number(), "created certificate and key");
        Ok(certificate)
    }

    /// Issues an end-entity certificate for a public key the engine does
    /// not hold. The record has no key handle.
    #[instrument(skip(self, extensions))]
    pub async fn create_signed_certificate(
        &self,
        root_certificate: &str,
        certificate_name: &str,
        public_key: &Key,
        subject: DistinguishedName,
        not_before: Option<OffsetDateTime>,
        extensions: Option<ExtensionCallback<'_>>,
    ) -> Result<Certificate> {
        require_name(certificate_name)?;
        subject.as_x509_name()?;
        let public_key = public_key.to_public_key()?;
        self.policy
            .check_key(&CreateKeyParams::from_public_key(&public_key))?;
        let parent = self.load_issuer(root_certificate).await?;
        let validity = require_window(self.child_validity(&parent, not_before))?;

        let issuance = Issuance {
            name: certificate_name,
            subject,
            parent: Some(&parent),
            validity,
            signature_type: parent_signature_type(&parent)?,
            policies: None,
            extensions,
        };
        let certificate = self.issue(issuance, public_key, None).await?;
        info!(name = certificate_name, serial = %certificate.serial_number(), "created signed certificate");
        Ok(certificate)
    }

    /// Stores a certificate produced elsewhere.
    ///
    /// With a private key, the key is imported as non-exportable and
    /// attached to the record. Without one the record can never sign, so
    /// its issuer policies are dropped.
    #[instrument(skip(self, certificate, private_key), fields(serial = %certificate.serial_number()))]
    pub async fn import_certificate(
        &self,
        certificate_name: &str,
        certificate: Certificate,
        private_key: Option<&Key>,
    ) -> Result<Certificate> {
        require_name(certificate_name)?;
        let Some(private_key) = private_key else {
            let certificate = certificate.with_key_handle(None).with_issuer_policies(None);
            return self.repo.add_certificate(certificate_name, certificate, None).await;
        };

        if private_key.to_public_key()? != certificate.public_key()? {
            return Err(CaError::InvalidInput(
                "private key does not belong to the certificate".to_string(),
            ));
        }
        let handle = self
            .keys
            .import_key(certificate_name, private_key, KeyStoreProperties::non_exportable())
            .await?;
        let certificate = certificate.with_key_handle(Some(handle.clone()));
        match self.repo.add_certificate(certificate_name, certificate, None).await {
            Ok(certificate) => {
                info!(name = certificate_name, key = %handle, "imported certificate with key");
                Ok(certificate)
            }
            Err(e) => {
                self.delete_key_after_failure(&handle, &e).await;
                Err(e)
            }
        }
    }

    /// Marks the certificate revoked and disables its key.
    ///
    /// Disabling the key is best effort: a failure is logged and the
    /// record identifier is still returned.
    #[instrument(skip(self, certificate), fields(serial = %certificate.serial_number()))]
    pub async fn disable_certificate(&self, certificate: &Certificate) -> Result<String> {
        let id = self.repo.disable_certificate(certificate).await?;
        if let Some(handle) = &certificate.key_handle {
            if let Err(e) = self.keys.disable_key(handle).await {
                warn!(key = %handle, error = %e, "failed to disable key of revoked certificate");
            }
        }
        debug!(id = %id, "disabled certificate");
        Ok(id)
    }

    /// Latest certificate named `name` that is allowed to sign.
    async fn load_issuer(&self, name: &str) -> Result<Certificate> {
        let parent = self.repo.get_latest_certificate(name).await?;
        if parent.is_revoked() {
            return Err(CaError::IssuerRevoked(name.to_string()));
        }
        if !parent.is_issuer() || parent.key_handle.is_none() {
            return Err(CaError::NotAnIssuer(name.to_string()));
        }
        Ok(parent)
    }

    /// `issued_lifetime` of the parent from `not_before`, clamped to the
    /// parent's window.
    fn child_validity(&self, parent: &Certificate, not_before: Option<OffsetDateTime>) -> Validity {
        let lifetime = parent
            .issuer_policies
            .as_ref()
            .and_then(|p| p.issued_lifetime)
            .unwrap_or(self.config().default_issued_lifetime);
        let requested = Validity::starting_at(
            not_before.unwrap_or_else(OffsetDateTime::now_utc),
            lifetime,
        );
        Validity::new(
            requested.not_before.max(parent.not_before()),
            requested.not_after.min(parent.not_after()),
        )
    }

    /// Extensions the parent's policies ask to be placed in everything it signs.
    fn parent_extensions(&self, parent: &Certificate) -> Result<Vec<ExtensionParam>> {
        let Some(policies) = &parent.issuer_policies else {
            return Ok(Vec::new());
        };
        let serial = parent.serial_number();
        let mut extensions = Vec::new();
        if let Some(template) = &policies.crl_distribution_point {
            let cdp = CrlDistributionPoints {
                urls: vec![expand_url_template(template, &serial)],
            };
            extensions.push(ExtensionParam::from_extension(cdp, false)?);
        }
        if let Some(template) = &policies.authority_information_access {
            let aia = AuthorityInformationAccess {
                ca_issuers: vec![expand_url_template(template, &serial)],
            };
            extensions.push(ExtensionParam::from_extension(aia, false)?);
        }
        Ok(extensions)
    }

    async fn issue_with_new_key(
        &self,
        key_params: &CreateKeyParams,
        properties: KeyStoreProperties,
        issuance: Issuance<'_>,
    ) -> Result<Certificate> {
        let handle = self
            .keys
            .create_key(issuance.name, key_params, properties)
            .await?;
        let result = async {
            let public_key = self.keys.get_public_key(&handle).await?.to_public_key()?;
            self.issue(issuance, public_key, Some(handle.clone())).await
        }
        .await;
        if let Err(e) = &result {
            self.delete_key_after_failure(&handle, e).await;
        }
        result
    }

    async fn issue(
        &self,
        issuance: Issuance<'_>,
        public_key: PublicKey,
        key_handle: Option<KeyHandle>,
    ) -> Result<Certificate> {
        let (issuer, signer_handle, extensions) = match issuance.parent {
            Some(parent) => {
                let handle = parent
                    .key_handle
                    .clone()
                    .ok_or_else(|| CaError::NotAnIssuer(parent.serial_number().to_string()))?;
                (IssuerRef::Certificate(parent), handle, self.parent_extensions(parent)?)
            }
            None => {
                let handle = key_handle.clone().ok_or_else(|| {
                    CaError::InvalidInput("a self-signed certificate needs its own key".to_string())
                })?;
                (IssuerRef::SelfSigned, handle, Vec::new())
            }
        };

        let request = CertificationRequestInfo::builder()
            .subject(issuance.subject)
            .subject_public_key(public_key)
            .is_ca(issuance.policies.is_some())
            .extensions(extensions)
            .build();
        let signer = KeyStoreSigner::new(self.keys.clone(), signer_handle);
        let certificate = self
            .factory
            .create_certificate(
                &signer,
                issuer,
                &request,
                issuance.validity,
                issuance.signature_type,
                issuance.extensions,
            )
            .await?
            .with_key_handle(key_handle)
            .with_issuer_policies(issuance.policies);
        self.repo
            .add_certificate(issuance.name, certificate, None)
            .await
    }

    async fn delete_key_after_failure(&self, handle: &KeyHandle, cause: &CaError) {
        match self.keys.delete_key(handle).await {
            Ok(()) => debug!(key = %handle, cause = %cause, "deleted key after failed issuance"),
            Err(e) => warn!(
                key = %handle,
                error = %e,
                cause = %cause,
                "failed to delete key after failed issuance"
            ),
        }
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CaError::InvalidInput("certificate name is required".to_string()));
    }
    Ok(())
}

fn require_window(validity: Validity) -> Result<Validity> {
    if validity.not_after <= validity.not_before {
        return Err(CaError::InvalidValidity(format!(
            "{} - {} is outside the issuer window",
            validity.not_before, validity.not_after
        )));
    }
    Ok(validity)
}

fn signature_type_of(policies: &IssuerPolicies, key_params: &CreateKeyParams) -> SignatureType {
    policies
        .signature_type
        .unwrap_or_else(|| default_signature_type(key_params))
}

/// Signature the parent uses for what it signs.
fn parent_signature_type(parent: &Certificate) -> Result<SignatureType> {
    match parent.issuer_policies.as_ref().and_then(|p| p.signature_type) {
        Some(signature_type) => Ok(signature_type),
        None => Ok(default_signature_type(&CreateKeyParams::from_public_key(
            &parent.public_key()?,
        ))),
    }
}
