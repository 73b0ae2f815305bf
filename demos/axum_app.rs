use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    Form, Router,
    response::{IntoResponse, Redirect},
    routing::get,
};
use mojito_sessions::{
    AuthGateLayer, AuthPolicy, AuthRejection, Authenticator, RequestContext, SameSite, Session,
    SessionConfig, SessionManagerLayer,
    auth::{AuthSessionData, hash_password, login, logout},
    flash, get_flashed_messages,
};
use serde::Deserialize;
use serde_json::json;
use time::Duration;

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

struct StaticUsers;

#[async_trait]
impl Authenticator for StaticUsers {
    type Credentials = Credentials;
    type Error = std::convert::Infallible;

    async fn authenticate(
        &self,
        _request: &RequestContext,
        credentials: Credentials,
    ) -> Result<Option<AuthSessionData>, Self::Error> {
        let stored = hash_password("hunter2");
        if credentials.username == "alice" && hash_password(&credentials.password) == stored {
            Ok(Some(AuthSessionData {
                is_authenticated: true,
                user: json!({"name": credentials.username}),
                permissions: vec!["admin".into()],
            }))
        } else {
            Ok(None)
        }
    }
}

async fn index(session: Session) -> String {
    let messages = get_flashed_messages().expect("request is bound");
    let n: usize = session
        .get("n")
        .expect("session get succeeds")
        .unwrap_or(0);
    session.insert("n", n + 1).expect("session insert succeeds");
    format!("n={n} messages={messages:?}")
}

async fn login_form() -> &'static str {
    "POST username & password to /login"
}

async fn login_submit(ctx: RequestContext, Form(credentials): Form<Credentials>) -> Redirect {
    match login(&ctx, &StaticUsers, credentials).await {
        Ok(Some(_)) => {
            flash("logged in").expect("request is bound");
            Redirect::to("/admin")
        }
        _ => {
            flash("invalid credentials").expect("request is bound");
            Redirect::to("/login")
        }
    }
}

async fn logout_handler(session: Session) -> Redirect {
    logout(&session);
    flash("logged out").expect("request is bound");
    Redirect::to("/")
}

async fn admin() -> Result<impl IntoResponse, AuthRejection> {
    AuthPolicy::default()
        .with_required_permission("admin")
        .guard()?;
    Ok("admin area")
}

#[tokio::main]
async fn main() {
    let session_config = SessionConfig::default()
        // Default: "session"
        .with_name("session")
        // Default: "flash_messages"
        .with_flash_name("flash_messages")
        // Default: SameSite::Strict
        .with_same_site(SameSite::Lax)
        // Default: 14 days
        .with_max_age(Some(Duration::days(7)))
        // Default: 1 day
        .with_revalidate_after(Some(Duration::hours(1)))
        // Default: false (set to true behind HTTPS)
        .with_secure(false);
    let session_layer = SessionManagerLayer::new("change-me-to-a-long-random-secret")
        .with_config(session_config);

    let members = Router::new()
        .route("/members", get(|| async { "members only" }))
        .route_layer(AuthGateLayer::new(AuthPolicy::new("/login")));

    let app = Router::new()
        .route("/", get(index))
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", get(logout_handler))
        .route("/admin", get(admin))
        .merge(members)
        .layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
