// Tests for how `SessionConfig` maps to emitted cookie attributes and for the session cookie
// lifecycle: when a `Set-Cookie` is emitted, refreshed or expired.
mod common;

use axum::body::Body;
use http::{Request, header};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tower::{ServiceBuilder, ServiceExt as _};

use mojito_sessions::{DEFAULT_COOKIE_NAME, SameSite, SessionConfig};

#[tokio::test]
async fn no_set_cookie_when_unused() {
    // Exercise: no prior cookie and the handler never touches the session.
    // Expectation: no `Set-Cookie` at all.
    let layer = common::make_layer(SessionConfig::default());
    let svc = ServiceBuilder::new()
        .layer(layer)
        .service_fn(common::noop_handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");

    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn non_empty_session_is_reissued() {
    // Exercise: first request writes to the session, the second only sends the cookie back.
    // Expectation: every response with a non-empty session carries a freshly signed cookie.
    let layer = common::make_layer(SessionConfig::default());
    let svc = ServiceBuilder::new()
        .layer(layer.clone())
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    let svc = ServiceBuilder::new()
        .layer(layer)
        .service_fn(common::noop_handler);
    let req = Request::builder()
        .header(header::COOKIE, common::cookie_header_value(&session_cookie))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let reissued = common::get_session_cookie(&res);

    let data: mojito_sessions::SessionData = common::signer()
        .decode(reissued.value(), None)
        .expect("reissued cookie verifies");
    assert_eq!(data, common::object(json!({"foo": 42})));
}

#[tokio::test]
async fn cleared_session_expires_cookie() {
    // Exercise: a valid non-empty session cookie arrives and the handler clears every key.
    // Expectation: an expiring `Set-Cookie` instructs the client to drop the cookie.
    let token = common::signer()
        .encode(&common::object(json!({"user": "alice"})))
        .expect("encode succeeds");
    let layer = common::make_layer(SessionConfig::default());
    let svc = ServiceBuilder::new()
        .layer(layer)
        .service_fn(common::clearing_handler);

    let req = Request::builder()
        .header(header::COOKIE, format!("{DEFAULT_COOKIE_NAME}={token}"))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let cookie = common::get_session_cookie(&res);

    assert!(common::is_removal(&cookie));
    assert_eq!(cookie.value(), "");
}

#[tokio::test]
async fn bogus_cookie_is_cleared() {
    // Exercise: the client sends a session cookie that cannot be verified.
    // Expectation: the handler sees an empty session and the broken cookie is expired.
    let layer = common::make_layer(SessionConfig::default());
    let svc = ServiceBuilder::new()
        .layer(layer)
        .service_fn(common::noop_handler);

    let req = Request::builder()
        .header(header::COOKIE, "session=bogus")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let cookie = common::get_session_cookie(&res);

    assert!(common::is_removal(&cookie));
}

#[tokio::test]
async fn expired_cookie_degrades_to_anonymous() {
    // Exercise: a correctly signed cookie older than `max_age`.
    // Expectation: the handler sees an empty session.
    let signed_at = OffsetDateTime::now_utc() - Duration::hours(2);
    let token = common::signer()
        .encode_at(&common::object(json!({"user": "alice"})), signed_at)
        .expect("encode succeeds");
    let layer = common::make_layer(SessionConfig::default().with_max_age(Some(Duration::hours(1))));
    let svc = ServiceBuilder::new()
        .layer(layer)
        .service_fn(|_: Request<Body>| async move {
            let ctx = mojito_sessions::context::current().expect("request is bound");
            Ok::<_, std::convert::Infallible>(http::Response::new(Body::from(format!(
                "{}",
                ctx.session().len()
            ))))
        });

    let req = Request::builder()
        .header(header::COOKIE, format!("session={token}"))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");

    assert_eq!(common::body_string(res.into_body()).await, "0");
}

#[tokio::test]
async fn name() {
    let config = SessionConfig::default().with_name("my.sid");
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");

    assert!(common::find_cookie(res.headers(), "my.sid").is_some());
}

#[tokio::test]
async fn http_only() {
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(SessionConfig::default()))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    assert_eq!(session_cookie.http_only(), Some(true));

    let config = SessionConfig::default().with_http_only(false);
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    assert_eq!(session_cookie.http_only(), None);
}

#[tokio::test]
async fn same_site() {
    for same_site in [SameSite::Strict, SameSite::Lax, SameSite::None] {
        let config = SessionConfig::default().with_same_site(same_site);
        let svc = ServiceBuilder::new()
            .layer(common::make_layer(config))
            .service_fn(common::handler);

        let req = Request::builder()
            .body(Body::empty())
            .expect("request builds successfully");
        let res = svc.oneshot(req).await.expect("service call succeeds");
        let session_cookie = common::get_session_cookie(&res);

        assert_eq!(session_cookie.same_site(), Some(same_site));
    }
}

#[tokio::test]
async fn max_age() {
    let config = SessionConfig::default().with_max_age(Some(Duration::hours(3)));
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    assert_eq!(session_cookie.max_age(), Some(Duration::hours(3)));

    let config = SessionConfig::default().with_max_age(None);
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    assert!(session_cookie.max_age().is_none());
}

#[tokio::test]
async fn secure() {
    let config = SessionConfig::default().with_secure(true);
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    assert_eq!(session_cookie.secure(), Some(true));

    let svc = ServiceBuilder::new()
        .layer(common::make_layer(SessionConfig::default()))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    assert_eq!(session_cookie.secure(), None);
}

#[tokio::test]
async fn path_and_domain() {
    let config = SessionConfig::default()
        .with_path("/foo/bar")
        .with_domain("example.com");
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    assert_eq!(session_cookie.path(), Some("/foo/bar"));
    assert_eq!(session_cookie.domain(), Some("example.com"));
}
