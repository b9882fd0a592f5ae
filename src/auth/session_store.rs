//! Session state shared between the login, logout and callback phases.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::RwLock;

/// Key holding [`SamlSessionState`].
pub const SAML_SESSION_KEY: &str = "saml";

/// Key holding the id of the pending AuthnRequest.
pub const AUTHN_REQUEST_ID_KEY: &str = "AuthNRequestID";

/// Key holding the id of the pending LogoutRequest.
pub const LOGOUT_REQUEST_ID_KEY: &str = "LogoutRequestID";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Identifiers needed to log the user out from the IdP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamlSessionState {
    #[serde(rename = "samlSessionIndex")]
    pub session_index: Option<String>,
    #[serde(rename = "samlNameId")]
    pub name_id: Option<String>,
}

/// Key-value session storage.
///
/// Implementations must be thread-safe and handle concurrent access.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> SessionResult<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value) -> SessionResult<()>;

    /// Drop every key of the session.
    async fn invalidate(&self) -> SessionResult<()>;
}

/// Read a typed value.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn SessionStore,
    key: &str,
) -> SessionResult<Option<T>> {
    store
        .get(key)
        .await?
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|e| SessionError::Serialization(format!("{key}: {e}")))
        })
        .transpose()
}

/// Write a typed value.
pub async fn set_typed<T: Serialize>(
    store: &dyn SessionStore,
    key: &str,
    value: &T,
) -> SessionResult<()> {
    let value = serde_json::to_value(value)
        .map_err(|e| SessionError::Serialization(format!("{key}: {e}")))?;
    store.set(key, value).await
}

/// In-memory session store.
///
/// Holds a single user session; state is lost on restart.
pub struct MemorySessionStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> SessionResult<Option<serde_json::Value>> {
        let values = self.values.read().await;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> SessionResult<()> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value);
        Ok(())
    }

    async fn invalidate(&self) -> SessionResult<()> {
        self.values.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_saml_state_wire_names() {
        let store = MemorySessionStore::new();
        let state = SamlSessionState {
            session_index: Some("_idx".into()),
            name_id: Some("jdoe@idp".into()),
        };
        set_typed(&store, SAML_SESSION_KEY, &state).await.unwrap();

        let raw = store.get(SAML_SESSION_KEY).await.unwrap().unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"samlSessionIndex": "_idx", "samlNameId": "jdoe@idp"})
        );

        let read: Option<SamlSessionState> =
            get_typed(&store, SAML_SESSION_KEY).await.unwrap();
        assert_eq!(read, Some(state));
    }

    #[tokio::test]
    async fn test_invalidate_clears_everything() {
        let store = MemorySessionStore::new();
        store
            .set(AUTHN_REQUEST_ID_KEY, serde_json::json!("_req"))
            .await
            .unwrap();
        store
            .set(LOGOUT_REQUEST_ID_KEY, serde_json::json!("_logout"))
            .await
            .unwrap();

        store.invalidate().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_typed_read_of_wrong_shape_fails() {
        let store = MemorySessionStore::new();
        store
            .set(SAML_SESSION_KEY, serde_json::json!(42))
            .await
            .unwrap();

        let result: SessionResult<Option<SamlSessionState>> =
            get_typed(&store, SAML_SESSION_KEY).await;
        assert!(matches!(result, Err(SessionError::Serialization(_))));
    }
}
