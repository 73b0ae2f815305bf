#![allow(dead_code)]

// Shared helpers for integration tests.
//
// These helpers use `tower_cookies::Cookie` parsing/encoding to match what the middleware emits
// in `Set-Cookie` and what browsers send back in `Cookie`.
use std::convert::Infallible;

use axum::body::Body;
use http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt as _;
use mojito_sessions::{SessionConfig, SessionManagerLayer, Signer, context};
use serde_json::{Map, Value};
use tower_cookies::Cookie;

pub const SECRET: &str = "integration-tests-secret-key";

pub async fn body_string(body: Body) -> String {
    // Collect an Axum body into a UTF-8 string for assertions.
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Basic handler used by many tests: write a single key into the session.
    let ctx = context::current().expect("request is bound");
    ctx.session()
        .insert("foo", 42)
        .expect("session insert succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn noop_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Handler that does not access the session at all.
    Ok(Response::new(Body::empty()))
}

pub async fn clearing_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Handler that drops every session key.
    let ctx = context::current().expect("request is bound");
    ctx.session().clear();

    Ok(Response::new(Body::empty()))
}

pub fn make_layer(config: SessionConfig) -> SessionManagerLayer {
    SessionManagerLayer::new(SECRET).with_config(config)
}

pub fn signer() -> Signer {
    Signer::new(SECRET)
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn set_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    // Parse every `Set-Cookie` header of a response.
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| {
            let value = value.to_str().expect("set-cookie header is valid utf-8");
            Cookie::parse_encoded(value)
                .expect("set-cookie parses successfully")
                .into_owned()
        })
        .collect()
}

pub fn find_cookie(headers: &HeaderMap, name: &str) -> Option<Cookie<'static>> {
    set_cookies(headers)
        .into_iter()
        .find(|cookie| cookie.name() == name)
}

pub fn get_session_cookie(res: &Response<Body>) -> Cookie<'static> {
    // Convenience: parse the session cookie from a response.
    find_cookie(res.headers(), mojito_sessions::DEFAULT_COOKIE_NAME)
        .expect("response sets the session cookie")
}

pub fn is_removal(cookie: &Cookie<'_>) -> bool {
    // Removal cookies carry `Max-Age=0` and/or an `Expires` in the past.
    cookie.max_age().is_some_and(|age| age.is_zero())
        || cookie
            .expires_datetime()
            .is_some_and(|at| at < time::OffsetDateTime::now_utc())
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    // Encode a cookie for use in a `Cookie` request header.
    format!("{}={}", cookie.name(), cookie.value())
}

pub fn cookie_header(cookies: &[Cookie<'_>]) -> String {
    cookies
        .iter()
        .map(cookie_header_value)
        .collect::<Vec<_>>()
        .join("; ")
}
