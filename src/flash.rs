//! One-shot messages carried from one response to the next request.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum_core::extract::FromRequestParts;
use http::{StatusCode, request::Parts};

use crate::{codec::Signer, context, error::Result};

/// Salt separating flash tokens from session tokens.
pub(crate) const FLASH_SALT: &str = "mojito.flash";

/// Flash queue of the request being handled.
///
/// `incoming` holds the messages queued by the previous response and is decoded on first read.
/// `outgoing` collects messages for the next request.
#[derive(Debug, Clone)]
pub struct Flash {
    inner: Arc<Mutex<FlashState>>,
}

#[derive(Debug)]
struct FlashState {
    signer: Signer,
    token: Option<String>,
    incoming: Option<Vec<String>>,
    outgoing: Vec<String>,
}

impl Flash {
    pub fn new(token: Option<String>, signer: Signer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FlashState {
                signer,
                token,
                incoming: None,
                outgoing: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FlashState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `message` for the next request.
    pub fn push(&self, message: impl Into<String>) {
        self.state().outgoing.push(message.into());
    }

    /// Messages queued by the previous response. A missing or invalid cookie yields none.
    pub fn messages(&self) -> Vec<String> {
        let mut state = self.state();
        if let Some(incoming) = &state.incoming {
            return incoming.clone();
        }

        let incoming = match state.token.as_deref() {
            Some(token) => state
                .signer
                .decode::<Vec<String>>(token, None)
                .unwrap_or_else(|err| {
                    tracing::warn!(err = %err, "flash cookie rejected");
                    Vec::new()
                }),
            None => Vec::new(),
        };
        state.incoming = Some(incoming.clone());
        incoming
    }

    pub fn outgoing(&self) -> Vec<String> {
        self.state().outgoing.clone()
    }

    pub fn has_outgoing(&self) -> bool {
        !self.state().outgoing.is_empty()
    }

    /// Whether a flash cookie arrived with the request, read or not.
    pub(crate) fn has_incoming(&self) -> bool {
        self.state().token.is_some()
    }
}

/// Queue `message` on the current request's flash queue.
pub fn flash(message: impl Into<String>) -> Result<()> {
    context::current()?.flash().push(message);
    Ok(())
}

/// Messages flashed by the previous response of the current client.
pub fn get_flashed_messages() -> Result<Vec<String>> {
    Ok(context::current()?.flash().messages())
}

impl<S: Send + Sync> FromRequestParts<S> for Flash {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Flash>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Can't extract flash messages. Is `SessionManagerLayer` enabled?",
        ))
    }
}
