//! Session based authentication and authorization.
//!
//! [`AuthPolicy`] decides whether a request may proceed. It is applied either to a whole route
//! group through [`AuthGateLayer`] or inside a single handler through [`AuthPolicy::guard`]; both
//! go through [`AuthPolicy::decide`] and therefore agree.

use std::{
    borrow::Cow,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use axum_core::response::{IntoResponse, Response as AxumResponse};
use http::{HeaderValue, Request, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    context::{self, RequestContext},
    error::Result,
    session::{IS_AUTHENTICATED, PERMISSIONS, Session, SessionData},
};

/// Default login path requests are redirected to.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Redirect to the contained location instead of running the handler.
    Redirected(String),
}

#[derive(Debug, Clone)]
pub struct AuthPolicy {
    login_path: Cow<'static, str>,
    skip_paths: Vec<Cow<'static, str>>,
    required_permissions: Vec<String>,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PATH)
    }
}

impl AuthPolicy {
    pub fn new<P: Into<Cow<'static, str>>>(login_path: P) -> Self {
        Self {
            login_path: login_path.into(),
            skip_paths: Vec::new(),
            required_permissions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_login_path<P: Into<Cow<'static, str>>>(mut self, login_path: P) -> Self {
        self.login_path = login_path.into();
        self
    }

    /// Exempt `path` from the check. Matched exactly against the request path.
    #[must_use]
    pub fn with_skip_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.skip_paths.push(path.into());
        self
    }

    #[must_use]
    pub fn with_skip_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Cow<'static, str>>,
    {
        self.skip_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_required_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permissions.push(permission.into());
        self
    }

    #[must_use]
    pub fn with_required_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.required_permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn decide(&self, path: &str, session: &Session) -> Decision {
        if path == self.login_path || self.skip_paths.iter().any(|skip| skip == path) {
            return Decision::Allowed;
        }

        if session.is_authenticated()
            && session.has_permissions(self.required_permissions.as_slice())
        {
            Decision::Allowed
        } else {
            tracing::debug!(path, login_path = %self.login_path, "redirecting to login");
            Decision::Redirected(self.login_path.to_string())
        }
    }

    /// Decide for the request bound to the current task.
    pub fn check_current(&self) -> Result<Decision> {
        let ctx = context::current()?;
        Ok(self.decide(ctx.path(), ctx.session()))
    }

    /// Per-handler form of the gate.
    ///
    /// ```ignore
    /// async fn admin() -> Result<&'static str, AuthRejection> {
    ///     AuthPolicy::default().with_required_permission("admin").guard()?;
    ///     Ok("secret")
    /// }
    /// ```
    pub fn guard(&self) -> Result<(), AuthRejection> {
        match self
            .check_current()
            .map_err(|_| AuthRejection::NoActiveRequest)?
        {
            Decision::Allowed => Ok(()),
            Decision::Redirected(location) => Err(AuthRejection::Redirect(location)),
        }
    }
}

/// Why [`AuthPolicy::guard`] refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    Redirect(String),
    /// The guard ran outside the session layer.
    NoActiveRequest,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> AxumResponse {
        match self {
            AuthRejection::Redirect(location) => redirect_to(&location),
            AuthRejection::NoActiveRequest => {
                tracing::error!("auth guard used outside of SessionManagerLayer");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// A `302 Found` response pointing at `location`.
pub fn redirect_to<B: Default>(location: &str) -> Response<B> {
    let mut res = Response::default();
    *res.status_mut() = StatusCode::FOUND;
    match HeaderValue::try_from(location) {
        Ok(value) => {
            res.headers_mut().insert(header::LOCATION, value);
        }
        Err(err) => {
            tracing::error!(err = %err, location, "invalid redirect location");
            *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }
    res
}

/// Layer gating every request of the wrapped routes behind an [`AuthPolicy`].
///
/// Must sit inside [`SessionManagerLayer`](crate::SessionManagerLayer).
#[derive(Debug, Clone, Default)]
pub struct AuthGateLayer {
    policy: AuthPolicy,
}

impl AuthGateLayer {
    pub fn new(policy: AuthPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for AuthGateLayer {
    type Service = AuthGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthGate {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthGate<S> {
    inner: S,
    policy: AuthPolicy,
}

impl<ReqBody, ResBody, S> Service<Request<ReqBody>> for AuthGate<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Nested routers strip their prefix from `req.uri()`; the bound context keeps the full
        // path, which is also what `AuthPolicy::guard` decides on.
        let decision = match req.extensions().get::<RequestContext>() {
            Some(ctx) => self.policy.decide(ctx.path(), ctx.session()),
            None => {
                tracing::warn!("no request context; is SessionManagerLayer enabled?");
                self.policy.decide(req.uri().path(), &Session::default())
            }
        };

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match decision {
                Decision::Allowed => inner.call(req).await,
                Decision::Redirected(location) => Ok(redirect_to(&location)),
            }
        })
    }
}

/// What an [`Authenticator`] stores on the session after a successful login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSessionData {
    pub is_authenticated: bool,
    /// Arbitrary user details. Anyone holding the cookie can read them, so never store secrets.
    #[serde(default)]
    pub user: Value,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl AuthSessionData {
    pub fn into_session_data(self) -> SessionData {
        let mut data = SessionData::new();
        data.insert(IS_AUTHENTICATED.into(), Value::Bool(self.is_authenticated));
        data.insert("user".into(), self.user);
        data.insert(
            PERMISSIONS.into(),
            Value::Array(self.permissions.into_iter().map(Value::String).collect()),
        );
        data
    }
}

/// A way of proving who the client is, e.g. a password check against a user table.
#[async_trait]
pub trait Authenticator: Send + Sync {
    type Credentials: Send;
    type Error: Send;

    /// Returns `None` when the credentials are not accepted.
    async fn authenticate(
        &self,
        request: &RequestContext,
        credentials: Self::Credentials,
    ) -> Result<Option<AuthSessionData>, Self::Error>;
}

/// Authenticate and, on success, merge the result into the request's session.
pub async fn login<A>(
    request: &RequestContext,
    authenticator: &A,
    credentials: A::Credentials,
) -> Result<Option<AuthSessionData>, A::Error>
where
    A: Authenticator + ?Sized,
{
    let Some(data) = authenticator.authenticate(request, credentials).await? else {
        return Ok(None);
    };

    request.session().update(data.clone().into_session_data());
    Ok(Some(data))
}

/// End the session; the layer then expires the cookie.
pub fn logout(session: &Session) {
    session.clear();
}

/// Hex-encoded SHA-256 of `password`.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}
