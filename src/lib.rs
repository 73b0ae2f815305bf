//! Signed-cookie sessions, flash messages, a request-scoped context and an auth gate for
//! `tower`/`axum` applications.
//!
//! [`SessionManagerLayer`] decodes the session and flash cookies of every request, exposes them
//! through request extensions, axum extractors and the task-local [`context`], and writes them
//! back as timestamped HMAC-signed cookies when the response is emitted.
//!
//! # Security
//! Cookies are signed, not encrypted. Clients can read everything stored in the session, so never
//! put secrets in it.

pub mod auth;
pub mod codec;
mod config;
pub mod context;
mod error;
pub mod flash;
pub mod layer;
mod session;
pub mod templating;

pub use tower_cookies::cookie::SameSite;

pub use crate::auth::{AuthGateLayer, AuthPolicy, AuthRejection, Authenticator, Decision};
pub use crate::codec::Signer;
pub use crate::config::{DEFAULT_COOKIE_NAME, DEFAULT_FLASH_COOKIE_NAME, SessionConfig};
pub use crate::context::RequestContext;
pub use crate::error::{Error, Result};
pub use crate::flash::{Flash, flash, get_flashed_messages};
pub use crate::layer::SessionManagerLayer;
pub use crate::session::{IS_AUTHENTICATED, PERMISSIONS, Session, SessionData};
