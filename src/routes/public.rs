use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable with no credential: health, the login/register/logout API
/// and the two pages an anonymous or under-privileged visitor is sent to.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. No database access.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/login
        // Verifies email + password and sets the `auth-token` cookie.
        .route("/api/auth/login", post(handlers::auth::login))
        // POST /api/auth/register
        // Creates a USER account and signs it in.
        .route("/api/auth/register", post(handlers::auth::register))
        // POST /api/auth/logout
        // Clears the cookie. Succeeds without a session.
        .route("/api/auth/logout", post(handlers::auth::logout))
        // GET /auth/signin?redirect=...
        .route("/auth/signin", get(handlers::pages::sign_in_page))
        // GET /unauthorized?role=...&redirect=...
        .route("/unauthorized", get(handlers::pages::unauthorized_page))
}
