//! The per-request session mapping.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum_core::extract::FromRequestParts;
use http::{StatusCode, request::Parts};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{
    codec::Signer,
    config::SessionConfig,
    error::{Error, Result},
};

/// Key holding the authentication flag.
pub const IS_AUTHENTICATED: &str = "is_authenticated";

/// Key holding the ordered list of granted permissions.
pub const PERMISSIONS: &str = "permissions";

/// Session contents: string keys mapped to JSON values.
pub type SessionData = Map<String, Value>;

/// Handle to the session of the request being handled.
///
/// Clones share the same mapping. Every mutation made during the request is serialized into the
/// session cookie when the response is emitted.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    data: Mutex<SessionData>,
    was_empty: bool,
}

impl Session {
    pub fn new(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Inner {
                was_empty: data.is_empty(),
                data: Mutex::new(data),
            }),
        }
    }

    /// Materialize a session from a cookie token.
    ///
    /// Past the revalidation window the `is_authenticated` flag is forced to `false`; every other
    /// key is kept.
    pub fn decode(
        token: &str,
        signer: &Signer,
        config: &SessionConfig,
        now: OffsetDateTime,
    ) -> Result<Self> {
        let (mut data, signed_at) = signer.decode_at::<SessionData>(token, config.max_age, now)?;

        if config.needs_revalidation(signed_at, now)
            && let Some(flag) = data.get_mut(IS_AUTHENTICATED)
        {
            tracing::debug!(%signed_at, "session past revalidation window");
            *flag = Value::Bool(false);
        }

        Ok(Self::new(data))
    }

    fn data_mut(&self) -> MutexGuard<'_, SessionData> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_value(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::Decode)
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.data_mut().get(key).cloned()
    }

    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.insert_value(key, value);
        Ok(())
    }

    /// Insert a raw value, returning the previous one.
    pub fn insert_value(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data_mut().insert(key.into(), value)
    }

    pub fn remove<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.remove_value(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::Decode)
    }

    pub fn remove_value(&self, key: &str) -> Option<Value> {
        self.data_mut().remove(key)
    }

    /// Merge `data` into the session, overwriting existing keys.
    pub fn update(&self, data: SessionData) {
        self.data_mut().extend(data);
    }

    pub fn clear(&self) {
        self.data_mut().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data_mut().is_empty()
    }

    pub fn len(&self) -> usize {
        self.data_mut().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.data_mut().keys().cloned().collect()
    }

    /// Snapshot of the current contents.
    pub fn data(&self) -> SessionData {
        self.data_mut().clone()
    }

    /// Whether the session was empty when the request started.
    pub fn was_empty(&self) -> bool {
        self.inner.was_empty
    }

    pub fn is_authenticated(&self) -> bool {
        self.data_mut()
            .get(IS_AUTHENTICATED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn permissions(&self) -> Vec<String> {
        match self.data_mut().get(PERMISSIONS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether every permission in `required` is granted.
    pub fn has_permissions<P: AsRef<str>>(&self, required: &[P]) -> bool {
        let granted = self.permissions();
        required
            .iter()
            .all(|permission| granted.iter().any(|g| g == permission.as_ref()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Can't extract session. Is `SessionManagerLayer` enabled?",
        ))
    }
}
