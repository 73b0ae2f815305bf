use std::borrow::Cow;

use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::SameSite;

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "session";

/// Default name of the flash message cookie.
pub const DEFAULT_FLASH_COOKIE_NAME: &str = "flash_messages";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) flash_name: Cow<'static, str>,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) max_age: Option<Duration>,
    pub(crate) revalidate_after: Option<Duration>,
    pub(crate) secure: bool,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) max_cookie_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            flash_name: DEFAULT_FLASH_COOKIE_NAME.into(),
            http_only: true,
            same_site: SameSite::Strict,
            max_age: Some(Duration::weeks(2)),
            revalidate_after: Some(Duration::days(1)),
            secure: false,
            path: "/".into(),
            domain: None,
            max_cookie_bytes: 4096,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_flash_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.flash_name = name.into();
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Maximum token age, also emitted as the cookie `Max-Age`. `None` never expires.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    /// After this long since the token was signed, `is_authenticated` is forced to `false`.
    /// `None` disables revalidation.
    #[must_use]
    pub fn with_revalidate_after(mut self, revalidate_after: Option<Duration>) -> Self {
        self.revalidate_after = revalidate_after;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    #[must_use]
    pub fn with_max_cookie_bytes(mut self, max_cookie_bytes: usize) -> Self {
        self.max_cookie_bytes = max_cookie_bytes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flash_name(&self) -> &str {
        &self.flash_name
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    pub fn revalidate_after(&self) -> Option<Duration> {
        self.revalidate_after
    }

    /// Whether a token signed at `signed_at` is past its revalidation window at `now`.
    pub(crate) fn needs_revalidation(
        &self,
        signed_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> bool {
        self.revalidate_after
            .is_some_and(|window| now > signed_at + window)
    }

    pub(crate) fn build_session_cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie = self.build_cookie(self.name.clone(), value);
        if let Some(max_age) = self.max_age {
            cookie.set_max_age(max_age);
        }
        cookie
    }

    // Flash cookies live for the browser session only.
    pub(crate) fn build_flash_cookie(&self, value: String) -> Cookie<'static> {
        self.build_cookie(self.flash_name.clone(), value)
    }

    fn build_cookie(&self, name: Cow<'static, str>, value: String) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((name, value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone());

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }

    pub(crate) fn removal_cookie(&self, name: Cow<'static, str>) -> Cookie<'static> {
        let mut cookie = Cookie::new(name, "");
        cookie.set_path(self.path.clone());
        if let Some(domain) = self.domain.clone() {
            cookie.set_domain(domain);
        }
        cookie
    }
}
