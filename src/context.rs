//! Request-scoped context reachable without threading parameters through call chains.
//!
//! The slot is a `tokio` task-local, so concurrently handled requests never observe each other.
//! It does not follow work into `tokio::spawn`; re-enter it with [`scope`] there.

use std::{future::Future, sync::Arc};

use axum_core::extract::FromRequestParts;
use http::{HeaderMap, Method, Request, StatusCode, Uri, request::Parts};

use crate::{
    error::{Error, Result},
    flash::Flash,
    session::Session,
};

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// The request being handled together with its session and flash queue.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    session: Session,
    flash: Flash,
}

impl RequestContext {
    /// Capture `request` with its session and a fresh flash queue.
    pub fn bind<B>(request: &Request<B>, session: Session, flash: Flash) -> Self {
        Self {
            inner: Arc::new(Inner {
                method: request.method().clone(),
                uri: request.uri().clone(),
                headers: request.headers().clone(),
                session,
                flash,
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn flash(&self) -> &Flash {
        &self.inner.flash
    }
}

/// Run `future` with `context` bound as the current request.
pub async fn scope<F: Future>(context: RequestContext, future: F) -> F::Output {
    CURRENT.scope(context, future).await
}

/// The request bound to the current task.
///
/// Fails with [`Error::NoActiveRequest`] outside [`scope`], which means the session layer is not
/// wrapping the caller.
pub fn current() -> Result<RequestContext> {
    CURRENT
        .try_with(RequestContext::clone)
        .map_err(|_| Error::NoActiveRequest)
}

pub fn try_current() -> Option<RequestContext> {
    CURRENT.try_with(RequestContext::clone).ok()
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .or_else(try_current)
            .ok_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Can't extract request context. Is `SessionManagerLayer` enabled?",
            ))
    }
}
