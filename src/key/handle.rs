use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{CaError, Result};

/// Opaque reference to a key held by a key store.
///
/// A handle never carries key material. Only the store that issued it can
/// resolve it, so it is safe to persist next to a certificate record.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyHandle {
    id: String,
}

impl KeyHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Backend specific identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Serializes the handle into a URL-safe token.
    pub fn to_token(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.id.as_bytes())
    }

    /// Restores a handle from a token produced by [`KeyHandle::to_token`].
    pub fn from_token(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| CaError::DecodingError(e.to_string()))?;
        let id = String::from_utf8(bytes).map_err(|e| CaError::DecodingError(e.to_string()))?;
        if id.is_empty() {
            return Err(CaError::InvalidInput("empty key handle".to_string()));
        }
        Ok(Self { id })
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHandle({})", self.id)
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
