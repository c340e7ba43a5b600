//! Key model, in-process key pairs and the key store contract.
//!
//! Keys are either RSA or elliptic-curve (NIST P-256, P-384, P-521).
//! [`Key`] is the portable, backend-neutral form used for import and
//! export; [`PublicKey`] and [`KeyPair`] are the typed RustCrypto keys
//! used for encoding, signing and verification.

mod handle;
pub mod memory;
mod store;

use std::fmt;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::BitString;
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::NistP256;
use p384::NistP384;
use p521::NistP521;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

pub use handle::KeyHandle;
pub use store::{KeyStore, KeyStoreProperties, KeyStoreSigner, SignatureGenerator};

use crate::cert::{HashAlgorithm, SignatureType};
use crate::error::{CaError, Result};

/// Asymmetric key families supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Ec,
}

/// Named elliptic curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveType {
    P256,
    P384,
    P521,
}

impl CurveType {
    /// Size of a field element (and of each point coordinate) in bytes.
    pub fn field_size(&self) -> usize {
        match self {
            CurveType::P256 => 32,
            CurveType::P384 => 48,
            CurveType::P521 => 66,
        }
    }

    /// The named-curve OID used in `id-ecPublicKey` parameters.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            CurveType::P256 => const_oid::db::rfc5912::SECP_256_R_1,
            CurveType::P384 => const_oid::db::rfc5912::SECP_384_R_1,
            CurveType::P521 => const_oid::db::rfc5912::SECP_521_R_1,
        }
    }

    fn from_oid(oid: &ObjectIdentifier) -> Result<Self> {
        match *oid {
            const_oid::db::rfc5912::SECP_256_R_1 => Ok(CurveType::P256),
            const_oid::db::rfc5912::SECP_384_R_1 => Ok(CurveType::P384),
            const_oid::db::rfc5912::SECP_521_R_1 => Ok(CurveType::P521),
            _ => Err(CaError::DecodingError(format!("Unsupported curve {oid}"))),
        }
    }
}

/// Parameters for creating a new key in a key store.
#[derive(Clone, Debug, Builder)]
pub struct CreateKeyParams {
    pub key_type: KeyType,
    /// RSA modulus size in bits; ignored for EC keys.
    pub key_size: Option<u32>,
    /// Curve for EC keys; defaults to P-256.
    pub curve: Option<CurveType>,
}

impl CreateKeyParams {
    pub fn rsa(key_size: u32) -> Self {
        Self {
            key_type: KeyType::Rsa,
            key_size: Some(key_size),
            curve: None,
        }
    }

    pub fn ec(curve: CurveType) -> Self {
        Self {
            key_type: KeyType::Ec,
            key_size: None,
            curve: Some(curve),
        }
    }

    /// Describes an existing public key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        match key {
            PublicKey::Rsa(public) => Self::rsa((public.size() * 8) as u32),
            _ => Self::ec(key.curve().unwrap_or(CurveType::P256)),
        }
    }

    /// RSA key size, defaulting to 2048 bits.
    pub fn rsa_key_size(&self) -> u32 {
        self.key_size.unwrap_or(2048)
    }

    pub fn ec_curve(&self) -> CurveType {
        self.curve.unwrap_or(CurveType::P256)
    }
}

/// Private RSA components (big-endian unsigned integers).
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPrivateParts {
    pub d: Vec<u8>,
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub dp: Vec<u8>,
    pub dq: Vec<u8>,
    pub qi: Vec<u8>,
}

/// RSA key parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaKey {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
    pub private: Option<RsaPrivateParts>,
}

/// Elliptic-curve key parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct EcKey {
    pub curve: CurveType,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
    /// Private scalar.
    pub d: Option<Vec<u8>>,
}

/// A public key, and its private half when the owner allowed export.
#[derive(Clone, PartialEq, Eq)]
pub enum Key {
    Rsa(RsaKey),
    Ec(EcKey),
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Rsa(rsa) => f
                .debug_struct("Key::Rsa")
                .field("bits", &(rsa.n.len() * 8))
                .field("has_private", &rsa.private.is_some())
                .finish(),
            Key::Ec(ec) => f
                .debug_struct("Key::Ec")
                .field("curve", &ec.curve)
                .field("has_private", &ec.d.is_some())
                .finish(),
        }
    }
}

impl Key {
    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Rsa(_) => KeyType::Rsa,
            Key::Ec(_) => KeyType::Ec,
        }
    }

    pub fn has_private_key(&self) -> bool {
        match self {
            Key::Rsa(rsa) => rsa.private.is_some(),
            Key::Ec(ec) => ec.d.is_some(),
        }
    }

    /// Returns a copy of this key with all private material removed.
    pub fn to_public(&self) -> Key {
        match self {
            Key::Rsa(rsa) => Key::Rsa(RsaKey {
                private: None,
                ..rsa.clone()
            }),
            Key::Ec(ec) => Key::Ec(EcKey { d: None, ..ec.clone() }),
        }
    }

    /// Converts the public half into a typed public key.
    pub fn to_public_key(&self) -> Result<PublicKey> {
        match self {
            Key::Rsa(rsa) => {
                let public = RsaPublicKey::new(
                    BigUint::from_bytes_be(&rsa.n),
                    BigUint::from_bytes_be(&rsa.e),
                )?;
                Ok(PublicKey::Rsa(public))
            }
            Key::Ec(ec) => {
                let mut point = Vec::with_capacity(1 + ec.x.len() + ec.y.len());
                point.push(0x04);
                point.extend_from_slice(&ec.x);
                point.extend_from_slice(&ec.y);
                PublicKey::from_sec1(ec.curve, &point)
            }
        }
    }
}

/// A typed public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(ecdsa::VerifyingKey<NistP256>),
    EcdsaP384(ecdsa::VerifyingKey<NistP384>),
    EcdsaP521(ecdsa::VerifyingKey<NistP521>),
}

impl PublicKey {
    /// Extracts the public key of a key pair.
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { signing_key } => {
                PublicKey::EcdsaP256(*signing_key.verifying_key())
            }
            KeyPair::EcdsaP384 { signing_key } => {
                PublicKey::EcdsaP384(*signing_key.verifying_key())
            }
            KeyPair::EcdsaP521 { verifying_key, .. } => PublicKey::EcdsaP521(*verifying_key),
        }
    }

    fn from_sec1(curve: CurveType, point: &[u8]) -> Result<Self> {
        let key = match curve {
            CurveType::P256 => PublicKey::EcdsaP256(ecdsa::VerifyingKey::from_sec1_bytes(point)?),
            CurveType::P384 => PublicKey::EcdsaP384(ecdsa::VerifyingKey::from_sec1_bytes(point)?),
            CurveType::P521 => PublicKey::EcdsaP521(ecdsa::VerifyingKey::from_sec1_bytes(point)?),
        };
        Ok(key)
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Rsa(_) => KeyType::Rsa,
            _ => KeyType::Ec,
        }
    }

    /// Curve of an EC key, `None` for RSA.
    pub fn curve(&self) -> Option<CurveType> {
        match self {
            PublicKey::Rsa(_) => None,
            PublicKey::EcdsaP256(_) => Some(CurveType::P256),
            PublicKey::EcdsaP384(_) => Some(CurveType::P384),
            PublicKey::EcdsaP521(_) => Some(CurveType::P521),
        }
    }

    /// Uncompressed SEC1 point of an EC key.
    fn sec1_point(&self) -> Option<Vec<u8>> {
        match self {
            PublicKey::Rsa(_) => None,
            PublicKey::EcdsaP256(key) => Some(key.to_encoded_point(false).as_bytes().to_vec()),
            PublicKey::EcdsaP384(key) => Some(key.to_encoded_point(false).as_bytes().to_vec()),
            PublicKey::EcdsaP521(key) => Some(key.to_encoded_point(false).as_bytes().to_vec()),
        }
    }

    /// Bytes carried in the `subjectPublicKey` BIT STRING.
    pub fn subject_public_key_bytes(&self) -> Result<Vec<u8>> {
        match self {
            PublicKey::Rsa(public) => Ok(public.to_pkcs1_der()?.as_bytes().to_vec()),
            _ => self
                .sec1_point()
                .ok_or_else(|| CaError::EncodingError("missing EC point".to_string())),
        }
    }

    /// Encodes the key as a `SubjectPublicKeyInfo`.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let algorithm = match self.curve() {
            None => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::RSA_ENCRYPTION,
                parameters: Some(der::Any::new(der::Tag::Null, Vec::new())?),
            },
            Some(curve) => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ID_EC_PUBLIC_KEY,
                parameters: Some(der::Any::new(
                    der::Tag::ObjectIdentifier,
                    curve.oid().as_bytes(),
                )?),
            },
        };
        Ok(SubjectPublicKeyInfoOwned {
            algorithm,
            subject_public_key: BitString::from_bytes(&self.subject_public_key_bytes()?)?,
        })
    }

    /// Decodes a key from a `SubjectPublicKeyInfo`.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let bits = spki.subject_public_key.raw_bytes();
        match spki.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => {
                Ok(PublicKey::Rsa(RsaPublicKey::from_pkcs1_der(bits)?))
            }
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                let curve_oid = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or_else(|| CaError::DecodingError("missing curve parameters".into()))?
                    .decode_as::<ObjectIdentifier>()?;
                PublicKey::from_sec1(CurveType::from_oid(&curve_oid)?, bits)
            }
            other => Err(CaError::DecodingError(format!(
                "Unsupported public key algorithm {other}"
            ))),
        }
    }

    /// SHA-1 over the subject public key bits (RFC 5280 method 1).
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        let bits = self.subject_public_key_bytes()?;
        Ok(<Sha1 as sha1::Digest>::digest(&bits).to_vec())
    }

    /// Converts into the portable key model.
    pub fn to_key(&self) -> Result<Key> {
        match self {
            PublicKey::Rsa(public) => Ok(Key::Rsa(RsaKey {
                n: public.n().to_bytes_be(),
                e: public.e().to_bytes_be(),
                private: None,
            })),
            _ => {
                let curve = self.curve().unwrap_or(CurveType::P256);
                let point = self.sec1_point().unwrap_or_default();
                ec_key_from_point(curve, &point, None)
            }
        }
    }

    /// Verifies `signature` over `data`.
    pub fn verify(&self, data: &[u8], signature: &[u8], signature_type: SignatureType) -> Result<()> {
        let result = match (self, signature_type.hash()) {
            (PublicKey::Rsa(public), hash) if signature_type.is_pss() => match hash {
                HashAlgorithm::Sha256 => verify_pss::<Sha256>(public, data, signature),
                HashAlgorithm::Sha384 => verify_pss::<Sha384>(public, data, signature),
                HashAlgorithm::Sha512 => verify_pss::<Sha512>(public, data, signature),
            },
            (PublicKey::Rsa(public), hash) if signature_type.is_rsa() => match hash {
                HashAlgorithm::Sha256 => verify_pkcs1v15::<Sha256>(public, data, signature),
                HashAlgorithm::Sha384 => verify_pkcs1v15::<Sha384>(public, data, signature),
                HashAlgorithm::Sha512 => verify_pkcs1v15::<Sha512>(public, data, signature),
            },
            (PublicKey::EcdsaP256(key), _) if signature_type.is_ecdsa() => {
                let signature = ecdsa::Signature::<NistP256>::from_der(signature)?;
                key.verify_prehash(&signature_type.digest(data), &signature)
            }
            (PublicKey::EcdsaP384(key), _) if signature_type.is_ecdsa() => {
                let signature = ecdsa::Signature::<NistP384>::from_der(signature)?;
                key.verify_prehash(&signature_type.digest(data), &signature)
            }
            (PublicKey::EcdsaP521(key), _) if signature_type.is_ecdsa() => {
                let signature = ecdsa::Signature::<NistP521>::from_der(signature)?;
                key.verify_prehash(&signature_type.digest(data), &signature)
            }
            _ => {
                return Err(CaError::Signing(format!(
                    "{signature_type:?} cannot be used with a {:?} key",
                    self.key_type()
                )));
            }
        };
        result.map_err(|e| CaError::Signing(format!("signature verification failed: {e}")))
    }
}

fn verify_pkcs1v15<D>(
    public: &RsaPublicKey,
    data: &[u8],
    signature: &[u8],
) -> std::result::Result<(), ecdsa::Error>
where
    D: sha2::Digest + const_oid::AssociatedOid,
{
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<D>::new(public.clone());
    let signature = rsa::pkcs1v15::Signature::try_from(signature)?;
    verifying_key.verify(data, &signature)
}

fn verify_pss<D>(
    public: &RsaPublicKey,
    data: &[u8],
    signature: &[u8],
) -> std::result::Result<(), ecdsa::Error>
where
    D: sha2::Digest + sha2::digest::FixedOutputReset,
{
    let verifying_key = rsa::pss::VerifyingKey::<D>::new(public.clone());
    let signature = rsa::pss::Signature::try_from(signature)?;
    verifying_key.verify(data, &signature)
}

fn ec_key_from_point(curve: CurveType, point: &[u8], d: Option<Vec<u8>>) -> Result<Key> {
    let size = curve.field_size();
    if point.len() != 1 + 2 * size || point[0] != 0x04 {
        return Err(CaError::EncodingError(
            "expected an uncompressed EC point".to_string(),
        ));
    }
    Ok(Key::Ec(EcKey {
        curve,
        x: point[1..=size].to_vec(),
        y: point[1 + size..].to_vec(),
        d,
    }))
}

/// Supported key types for certificate operations.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: ecdsa::SigningKey<NistP256>,
    },
    EcdsaP384 {
        signing_key: ecdsa::SigningKey<NistP384>,
    },
    /// P-521 signs through the curve crate's own key type; the generic
    /// verifying key is kept alongside for encoding and comparison.
    EcdsaP521 {
        signing_key: p521::ecdsa::SigningKey,
        verifying_key: ecdsa::VerifyingKey<NistP521>,
    },
}

impl KeyPair {
    /// Generate a key pair matching the requested parameters.
    pub fn generate(params: &CreateKeyParams) -> Result<Self> {
        match params.key_type {
            KeyType::Rsa => Self::generate_rsa(params.rsa_key_size() as usize),
            KeyType::Ec => Ok(Self::generate_ecdsa(params.ec_curve())),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CaError::KeyGenerationError(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA key pair on the given curve.
    pub fn generate_ecdsa(curve: CurveType) -> Self {
        let mut rng = rand_core::OsRng;
        match curve {
            CurveType::P256 => KeyPair::EcdsaP256 {
                signing_key: ecdsa::SigningKey::random(&mut rng),
            },
            CurveType::P384 => KeyPair::EcdsaP384 {
                signing_key: ecdsa::SigningKey::random(&mut rng),
            },
            CurveType::P521 => Self::ecdsa_p521(ecdsa::SigningKey::random(&mut rng)),
        }
    }

    fn ecdsa_p521(inner: ecdsa::SigningKey<NistP521>) -> Self {
        let verifying_key = *inner.verifying_key();
        KeyPair::EcdsaP521 {
            signing_key: p521::ecdsa::SigningKey::from(inner),
            verifying_key,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyPair::Rsa { .. } => KeyType::Rsa,
            _ => KeyType::Ec,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// Signs `data` with the given signature type.
    ///
    /// RSA keys hash internally; ECDSA keys sign the prehash so that any
    /// digest can be paired with any curve the digest is long enough for.
    pub fn sign_data(&self, data: &[u8], signature_type: SignatureType) -> Result<Vec<u8>> {
        let signature = match (self, signature_type.hash()) {
            (KeyPair::Rsa { private, .. }, hash) if signature_type.is_pss() => match hash {
                HashAlgorithm::Sha256 => sign_pss::<Sha256>(private, data)?,
                HashAlgorithm::Sha384 => sign_pss::<Sha384>(private, data)?,
                HashAlgorithm::Sha512 => sign_pss::<Sha512>(private, data)?,
            },
            (KeyPair::Rsa { private, .. }, hash) if signature_type.is_rsa() => match hash {
                HashAlgorithm::Sha256 => sign_pkcs1v15::<Sha256>(private, data)?,
                HashAlgorithm::Sha384 => sign_pkcs1v15::<Sha384>(private, data)?,
                HashAlgorithm::Sha512 => sign_pkcs1v15::<Sha512>(private, data)?,
            },
            (KeyPair::EcdsaP256 { signing_key }, _) if signature_type.is_ecdsa() => {
                let signature: ecdsa::Signature<NistP256> =
                    signing_key.sign_prehash(&signature_type.digest(data))?;
                signature.to_der().as_bytes().to_vec()
            }
            (KeyPair::EcdsaP384 { signing_key }, _) if signature_type.is_ecdsa() => {
                let signature: ecdsa::Signature<NistP384> =
                    signing_key.sign_prehash(&signature_type.digest(data))?;
                signature.to_der().as_bytes().to_vec()
            }
            (KeyPair::EcdsaP521 { signing_key, .. }, _) if signature_type.is_ecdsa() => {
                let signature: p521::ecdsa::Signature =
                    signing_key.sign_prehash(&signature_type.digest(data))?;
                signature.to_der().as_bytes().to_vec()
            }
            _ => {
                return Err(CaError::Signing(format!(
                    "{signature_type:?} cannot be used with a {:?} key",
                    self.key_type()
                )));
            }
        };
        Ok(signature)
    }

    /// Exports the full key, private half included.
    pub fn to_key(&self) -> Result<Key> {
        match self {
            KeyPair::Rsa { private, public } => {
                let primes = private.primes();
                if primes.len() != 2 {
                    return Err(CaError::EncodingError(
                        "multi-prime RSA keys are not supported".to_string(),
                    ));
                }
                Ok(Key::Rsa(RsaKey {
                    n: public.n().to_bytes_be(),
                    e: public.e().to_bytes_be(),
                    private: Some(RsaPrivateParts {
                        d: private.d().to_bytes_be(),
                        p: primes[0].to_bytes_be(),
                        q: primes[1].to_bytes_be(),
                        dp: private.dp().map(|v| v.to_bytes_be()).unwrap_or_default(),
                        dq: private.dq().map(|v| v.to_bytes_be()).unwrap_or_default(),
                        qi: private
                            .crt_coefficient()
                            .map(|v| v.to_bytes_be())
                            .unwrap_or_default(),
                    }),
                }))
            }
            KeyPair::EcdsaP256 { signing_key } => {
                let point = signing_key.verifying_key().to_encoded_point(false);
                let d = signing_key.to_bytes().to_vec();
                ec_key_from_point(CurveType::P256, point.as_bytes(), Some(d))
            }
            KeyPair::EcdsaP384 { signing_key } => {
                let point = signing_key.verifying_key().to_encoded_point(false);
                let d = signing_key.to_bytes().to_vec();
                ec_key_from_point(CurveType::P384, point.as_bytes(), Some(d))
            }
            KeyPair::EcdsaP521 {
                signing_key,
                verifying_key,
            } => {
                let point = verifying_key.to_encoded_point(false);
                let d = signing_key.to_bytes().to_vec();
                ec_key_from_point(CurveType::P521, point.as_bytes(), Some(d))
            }
        }
    }

    /// Imports a key that carries private material.
    pub fn from_key(key: &Key) -> Result<Self> {
        match key {
            Key::Rsa(rsa) => {
                let parts = rsa.private.as_ref().ok_or_else(|| {
                    CaError::InvalidInput("RSA key has no private components".to_string())
                })?;
                let private = RsaPrivateKey::from_components(
                    BigUint::from_bytes_be(&rsa.n),
                    BigUint::from_bytes_be(&rsa.e),
                    BigUint::from_bytes_be(&parts.d),
                    vec![
                        BigUint::from_bytes_be(&parts.p),
                        BigUint::from_bytes_be(&parts.q),
                    ],
                )?;
                private.validate()?;
                let public = RsaPublicKey::from(&private);
                Ok(KeyPair::Rsa {
                    private: Box::new(private),
                    public,
                })
            }
            Key::Ec(ec) => {
                let d = ec.d.as_deref().ok_or_else(|| {
                    CaError::InvalidInput("EC key has no private scalar".to_string())
                })?;
                let key_pair = match ec.curve {
                    CurveType::P256 => KeyPair::EcdsaP256 {
                        signing_key: ecdsa::SigningKey::from_slice(d)?,
                    },
                    CurveType::P384 => KeyPair::EcdsaP384 {
                        signing_key: ecdsa::SigningKey::from_slice(d)?,
                    },
                    CurveType::P521 => Self::ecdsa_p521(ecdsa::SigningKey::from_slice(d)?),
                };
                if key_pair.public_key() != key.to_public_key()? {
                    return Err(CaError::InvalidInput(
                        "EC private scalar does not match the public point".to_string(),
                    ));
                }
                Ok(key_pair)
            }
        }
    }
}

fn sign_pkcs1v15<D>(private: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>>
where
    D: sha2::Digest + const_oid::AssociatedOid,
{
    let signing_key = rsa::pkcs1v15::SigningKey::<D>::new(private.clone());
    Ok(signing_key.try_sign(data)?.to_vec())
}

fn sign_pss<D>(private: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>>
where
    D: sha2::Digest + sha2::digest::FixedOutputReset,
{
    let signing_key = rsa::pss::BlindedSigningKey::<D>::new(private.clone());
    let mut rng = rand_core::OsRng;
    Ok(signing_key.try_sign_with_rng(&mut rng, data)?.to_vec())
}
