use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use http::{Request, Response, StatusCode};
use time::OffsetDateTime;
use tower_cookies::{Cookie, CookieManager, Cookies};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    codec::Signer,
    config::SessionConfig,
    context::{self, RequestContext},
    error::{Error, Result},
    flash::{FLASH_SALT, Flash},
    session::Session,
};

/// Layer that materializes the [`Session`], [`Flash`] queue and [`RequestContext`] for every
/// request and writes them back as signed cookies.
#[derive(Debug, Clone)]
pub struct SessionManagerLayer {
    config: SessionConfig,
    signer: Signer,
}

impl SessionManagerLayer {
    /// Build a layer signing cookies with `secret`.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_signer(Signer::new(secret))
    }

    #[must_use]
    pub fn with_signer(signer: Signer) -> Self {
        Self {
            config: SessionConfig::default(),
            signer,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SessionManager<S> {
    inner: S,
    config: SessionConfig,
    session_signer: Signer,
    flash_signer: Signer,
}

impl<S> Layer<S> for SessionManagerLayer {
    type Service = CookieManager<SessionManager<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieManager::new(SessionManager {
            inner,
            config: self.config.clone(),
            flash_signer: self.signer.with_salt(FLASH_SALT),
            session_signer: self.signer.clone(),
        })
    }
}

impl<ReqBody, ResBody, S> Service<Request<ReqBody>> for SessionManager<S>
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

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let session_signer = self.session_signer.clone();
        let flash_signer = self.flash_signer.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(cookies) = req.extensions().get::<Cookies>().cloned() else {
                return Ok(internal_server_error());
            };

            let now = OffsetDateTime::now_utc();
            let mut session_rejected = false;
            let session = match cookies.get(&config.name) {
                Some(cookie) => {
                    match Session::decode(cookie.value(), &session_signer, &config, now) {
                        Ok(session) => session,
                        Err(err) => {
                            tracing::warn!(err = %err, "session cookie rejected");
                            session_rejected = true;
                            Session::default()
                        }
                    }
                }
                None => Session::default(),
            };

            let flash_token = cookies
                .get(&config.flash_name)
                .map(|cookie| cookie.value().to_owned());
            let flash = Flash::new(flash_token, flash_signer.clone());

            let ctx = RequestContext::bind(&req, session.clone(), flash.clone());
            req.extensions_mut().insert(session.clone());
            req.extensions_mut().insert(flash.clone());
            req.extensions_mut().insert(ctx.clone());

            let res = context::scope(ctx, inner.call(req)).await?;

            let updates = session_update(&config, &session_signer, &session, session_rejected)
                .and_then(|session_cookie| {
                    Ok([session_cookie, flash_update(&config, &flash_signer, &flash)?])
                });
            match updates {
                Ok(updates) => {
                    for update in updates.into_iter().flatten() {
                        update.apply(&cookies);
                    }
                }
                Err(err) => {
                    tracing::error!(err = %err, "cookie session save failed");
                    return Ok(internal_server_error());
                }
            }

            Ok(res)
        })
    }
}

/// A pending change to the cookie jar, applied only once every cookie encoded successfully.
enum CookieUpdate {
    Add(Cookie<'static>),
    Remove(Cookie<'static>),
}

impl CookieUpdate {
    fn apply(self, cookies: &Cookies) {
        match self {
            CookieUpdate::Add(cookie) => cookies.add(cookie),
            CookieUpdate::Remove(cookie) => cookies.remove(cookie),
        }
    }
}

fn session_update(
    config: &SessionConfig,
    signer: &Signer,
    session: &Session,
    rejected: bool,
) -> Result<Option<CookieUpdate>> {
    if session.is_empty() {
        let update = (!session.was_empty() || rejected)
            .then(|| CookieUpdate::Remove(config.removal_cookie(config.name.clone())));
        return Ok(update);
    }

    let value = signer.encode(&session.data())?;
    check_size(config, &value)?;
    Ok(Some(CookieUpdate::Add(config.build_session_cookie(value))))
}

// The flash cookie is a one-shot carrier: whatever arrived is expired unless replaced.
fn flash_update(
    config: &SessionConfig,
    signer: &Signer,
    flash: &Flash,
) -> Result<Option<CookieUpdate>> {
    let outgoing = flash.outgoing();
    if outgoing.is_empty() {
        let update = flash
            .has_incoming()
            .then(|| CookieUpdate::Remove(config.removal_cookie(config.flash_name.clone())));
        return Ok(update);
    }

    let value = signer.encode(&outgoing)?;
    check_size(config, &value)?;
    Ok(Some(CookieUpdate::Add(config.build_flash_cookie(value))))
}

fn check_size(config: &SessionConfig, value: &str) -> Result<()> {
    if value.len() > config.max_cookie_bytes {
        return Err(Error::CookieTooLarge {
            len: value.len(),
            max: config.max_cookie_bytes,
        });
    }
    Ok(())
}

fn internal_server_error<B: Default>() -> Response<B> {
    let mut res = Response::default();
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res
}
