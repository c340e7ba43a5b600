//! use iiot_ca::error::CaError;

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, CaError>;

/// Represents errors that can occur in the certificate authority engine.
///
/// Argument and policy errors are raised by the engine itself before any
/// key material is created. Backend errors are whatever the key store or
/// certificate repository reported and are passed through unchanged.
#[derive(Debug, Error, Clone)]
pub enum CaError {
    /// A required argument was missing or malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The referenced certificate cannot sign other certificates.
    #[error("Certificate {0} is not an issuer")]
    NotAnIssuer(String),

    /// Requested parameters are incompatible with the issuer policy.
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// The validity window is empty once clamped to the issuer window.
    #[error("Invalid validity: {0}")]
    InvalidValidity(String),

    /// The issuer has been revoked and must not sign anything.
    #[error("Issuer {0} is revoked")]
    IssuerRevoked(String),

    /// A certificate, key or CRL was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record with the same identity already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The key store refused to hand out private key material.
    #[error("Key {0} is not exportable")]
    KeyNotExportable(String),

    /// The key has been disabled and cannot be used.
    #[error("Key {0} is disabled")]
    KeyDisabled(String),

    /// Error reported by a storage backend.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error while producing or checking a signature.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Error related to certificate operations.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    RsaError(String),

    /// Error from RSA PKCS1 operations.
    #[error("RSA PKCS1 error: {0}")]
    RsaPkcs1Error(String),
}

impl From<der::Error> for CaError {
    /// Converts a `der::Error` into a `CaError`.
    fn from(err: der::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CaError {
    fn from(err: rsa::Error) -> Self {
        CaError::RsaError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CaError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CaError::RsaPkcs1Error(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CaError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CaError::EncodingError(err.to_string())
    }
}

impl From<ecdsa::Error> for CaError {
    fn from(err: ecdsa::Error) -> Self {
        CaError::Signing(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CaError {
    fn from(err: tokio::task::JoinError) -> Self {
        CaError::KeyGenerationError(err.to_string())
    }
}
