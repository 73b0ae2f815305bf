/// Errors produced by the session, flash and context machinery.
///
/// `InvalidSignature` and `Expired` are recovered inside
/// [`SessionManager`](crate::layer::SessionManager) and never reach handlers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("signed token failed verification")]
    InvalidSignature,

    #[error("signed token expired ({age} > {max_age})")]
    Expired {
        age: time::Duration,
        max_age: time::Duration,
    },

    #[error("no request is bound to the current task")]
    NoActiveRequest,

    #[error("block {block:?} not found in template {template:?}")]
    BlockNotFound {
        block: String,
        template: String,
    },

    #[error("cannot sign a token dated before the unix epoch ({0})")]
    TimestampOutOfRange(time::OffsetDateTime),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to decode session value: {0}")]
    Decode(serde_json::Error),

    #[error("cookie value exceeds max_cookie_bytes ({len} > {max})")]
    CookieTooLarge { len: usize, max: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
