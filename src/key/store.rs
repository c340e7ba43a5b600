use std::sync::Arc;

use async_trait::async_trait;

use super::{CreateKeyParams, Key, KeyHandle, KeyPair};
use crate::cert::SignatureType;
use crate::error::Result;

/// Storage properties requested when a key is created or imported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStoreProperties {
    /// Whether the private key may later be exported.
    pub exportable: bool,
}

impl KeyStoreProperties {
    pub fn exportable() -> Self {
        Self { exportable: true }
    }

    pub fn non_exportable() -> Self {
        Self { exportable: false }
    }
}

/// Key management backend.
///
/// The store owns all key material. Callers hold [`KeyHandle`]s and ask
/// the store to sign on their behalf; private bytes only leave the store
/// through [`KeyStore::export_key`] and only for exportable keys.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Creates a new key pair under `name`.
    async fn create_key(
        &self,
        name: &str,
        params: &CreateKeyParams,
        properties: KeyStoreProperties,
    ) -> Result<KeyHandle>;

    /// Imports a key that carries private material.
    async fn import_key(
        &self,
        name: &str,
        key: &Key,
        properties: KeyStoreProperties,
    ) -> Result<KeyHandle>;

    /// Returns the public half of a key.
    async fn get_public_key(&self, handle: &KeyHandle) -> Result<Key>;

    /// Returns the full key. Fails with `KeyNotExportable` otherwise.
    async fn export_key(&self, handle: &KeyHandle) -> Result<Key>;

    async fn disable_key(&self, handle: &KeyHandle) -> Result<()>;

    async fn delete_key(&self, handle: &KeyHandle) -> Result<()>;

    /// Signs `data` with the key behind `handle`.
    async fn sign(
        &self,
        handle: &KeyHandle,
        data: &[u8],
        signature_type: SignatureType,
    ) -> Result<Vec<u8>>;
}

/// The single signing capability used to sign certificates and CRLs.
#[async_trait]
pub trait SignatureGenerator: Send + Sync {
    async fn sign(&self, data: &[u8], signature_type: SignatureType) -> Result<Vec<u8>>;
}

#[async_trait]
impl SignatureGenerator for KeyPair {
    async fn sign(&self, data: &[u8], signature_type: SignatureType) -> Result<Vec<u8>> {
        self.sign_data(data, signature_type)
    }
}

/// Signs through a key store using a key handle.
#[derive(Clone)]
pub struct KeyStoreSigner {
    store: Arc<dyn KeyStore>,
    handle: KeyHandle,
}

impl KeyStoreSigner {
    pub fn new(store: Arc<dyn KeyStore>, handle: KeyHandle) -> Self {
        Self { store, handle }
    }

    pub fn handle(&self) -> &KeyHandle {
        &self.handle
    }
}

#[async_trait]
impl SignatureGenerator for KeyStoreSigner {
    async fn sign(&self, data: &[u8], signature_type: SignatureType) -> Result<Vec<u8>> {
        self.store.sign(&self.handle, data, signature_type).await
    }
}
