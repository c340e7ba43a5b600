//! In-memory key store.
//!
//! Holds keys in process memory. Useful for tests, tooling and
//! single-node deployments where keys do not need to survive a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CreateKeyParams, Key, KeyHandle, KeyPair, KeyStore, KeyStoreProperties};
use crate::cert::SignatureType;
use crate::error::{CaError, Result};

struct StoredKey {
    name: String,
    key_pair: KeyPair,
    exportable: bool,
    disabled: bool,
}

/// A [`KeyStore`] keeping all keys in memory.
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<KeyHandle, StoredKey>>,
    next_id: AtomicU64,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held, disabled ones included.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }

    /// Whether the key behind `handle` exists and has been disabled.
    pub async fn is_disabled(&self, handle: &KeyHandle) -> Option<bool> {
        self.keys.read().await.get(handle).map(|k| k.disabled)
    }

    async fn insert(&self, name: &str, key_pair: KeyPair, properties: KeyStoreProperties) -> KeyHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = KeyHandle::new(format!("{name}#{id}"));
        self.keys.write().await.insert(
            handle.clone(),
            StoredKey {
                name: name.to_string(),
                key_pair,
                exportable: properties.exportable,
                disabled: false,
            },
        );
        handle
    }
}

fn not_found(handle: &KeyHandle) -> CaError {
    CaError::NotFound(format!("key {handle}"))
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn create_key(
        &self,
        name: &str,
        params: &CreateKeyParams,
        properties: KeyStoreProperties,
    ) -> Result<KeyHandle> {
        if name.is_empty() {
            return Err(CaError::InvalidInput("key name is required".to_string()));
        }
        let params = params.clone();
        let key_pair = tokio::task::spawn_blocking(move || KeyPair::generate(&params)).await??;
        let handle = self.insert(name, key_pair, properties).await;
        debug!(key = %handle, exportable = properties.exportable, "created key");
        Ok(handle)
    }

    async fn import_key(
        &self,
        name: &str,
        key: &Key,
        properties: KeyStoreProperties,
    ) -> Result<KeyHandle> {
        if name.is_empty() {
            return Err(CaError::InvalidInput("key name is required".to_string()));
        }
        let key_pair = KeyPair::from_key(key)?;
        let handle = self.insert(name, key_pair, properties).await;
        debug!(key = %handle, exportable = properties.exportable, "imported key");
        Ok(handle)
    }

    async fn get_public_key(&self, handle: &KeyHandle) -> Result<Key> {
        let keys = self.keys.read().await;
        let stored = keys.get(handle).ok_or_else(|| not_found(handle))?;
        stored.key_pair.public_key().to_key()
    }

    async fn export_key(&self, handle: &KeyHandle) -> Result<Key> {
        let keys = self.keys.read().await;
        let stored = keys.get(handle).ok_or_else(|| not_found(handle))?;
        if !stored.exportable {
            return Err(CaError::KeyNotExportable(stored.name.clone()));
        }
        stored.key_pair.to_key()
    }

    async fn disable_key(&self, handle: &KeyHandle) -> Result<()> {
        let mut keys = self.keys.write().await;
        let stored = keys.get_mut(handle).ok_or_else(|| not_found(handle))?;
        stored.disabled = true;
        debug!(key = %handle, "disabled key");
        Ok(())
    }

    async fn delete_key(&self, handle: &KeyHandle) -> Result<()> {
        self.keys
            .write()
            .await
            .remove(handle)
            .ok_or_else(|| not_found(handle))?;
        debug!(key = %handle, "deleted key");
        Ok(())
    }

    async fn sign(
        &self,
        handle: &KeyHandle,
        data: &[u8],
        signature_type: SignatureType,
    ) -> Result<Vec<u8>> {
        let key_pair = {
            let keys = self.keys.read().await;
            let stored = keys.get(handle).ok_or_else(|| not_found(handle))?;
            if stored.disabled {
                return Err(CaError::KeyDisabled(stored.name.clone()));
            }
            stored.key_pair.clone()
        };
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || key_pair.sign_data(&data, signature_type)).await?
    }
}
