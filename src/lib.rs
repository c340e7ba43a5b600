//! # iiot-ca - An embeddable certificate authority engine
//!
//! iiot-ca issues and revokes X.509 certificates for industrial devices
//! and services. It keeps a hierarchy of root and intermediate issuers,
//! issues end-entity certificates with or without a server-held private
//! key, cascades revocation down the hierarchy and publishes CRLs.
//!
//! The engine is built on the RustCrypto crates. Key material and
//! certificate records stay behind two contracts:
//!
//! - [`key::KeyStore`] creates keys and signs with them. Callers only
//!   ever see a [`key::KeyHandle`].
//! - [`storage::CertificateRepository`] persists versioned certificate
//!   records under a name.
//!
//! In-memory implementations of both are provided for tests and
//! single-process use.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048 bits and up, signed with PKCS#1 v1.5 or PSS
//! - **ECDSA**: P-256, P-384 and P-521
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use iiot_ca::cert::params::DistinguishedName;
//! use iiot_ca::cert::IssuerPolicies;
//! use iiot_ca::config::CaConfig;
//! use iiot_ca::issuer::CertificateIssuer;
//! use iiot_ca::key::{CreateKeyParams, CurveType, memory::MemoryKeyStore};
//! use iiot_ca::storage::memory::MemoryCertificateStore;
//!
//! # async fn run() -> iiot_ca::error::Result<()> {
//! let issuer = CertificateIssuer::new(
//!     Arc::new(MemoryCertificateStore::new()),
//!     Arc::new(MemoryKeyStore::new()),
//!     CaConfig::default(),
//! );
//!
//! let root = issuer
//!     .new_root_certificate(
//!         "rootca",
//!         DistinguishedName::with_common_name("Root CA"),
//!         None,
//!         time::Duration::days(3650),
//!         CreateKeyParams::ec(CurveType::P384),
//!         Some(IssuerPolicies::builder().issued_lifetime(time::Duration::days(365)).build()),
//!     )
//!     .await?;
//!
//! let device = issuer
//!     .create_certificate_and_private_key(
//!         "rootca",
//!         "device-1",
//!         DistinguishedName::with_common_name("device-1"),
//!         None,
//!         CreateKeyParams::ec(CurveType::P256),
//!         None,
//!     )
//!     .await?;
//!
//! assert!(device.is_valid_chain(&[root]));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: key types, key handles and the key store contract
//! - [`cert`]: certificates, names, extensions and signature algorithms
//! - [`factory`]: builds and signs certificates
//! - [`issuer`]: root, intermediate and end-entity issuance workflows
//! - [`revoker`]: cascading revocation
//! - [`crl`]: CRL generation and the CRL cache service
//! - [`policy`]: issuance policy checks
//! - [`storage`]: certificate record and CRL cache contracts
//! - [`config`]: engine configuration
//! - [`error`]: error type shared by every module

pub mod cert;
pub mod config;
pub mod crl;
pub mod error;
pub mod factory;
pub mod issuer;
pub mod key;
pub mod policy;
pub mod revoker;
pub mod storage;
pub mod tbs_certificate;
