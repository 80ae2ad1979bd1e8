#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, Response, header},
};
use eventplanner::{
    AppConfig, AppState, create_router,
    geocoding::{GeocoderState, MockGeocoder},
    models::{Category, NewUser, Role, User},
    password::hash_password,
    repository::{MemoryRepository, Repository, RepositoryState},
    token::TokenService,
};
use serde::de::DeserializeOwned;
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";

/// Hashing is deliberately slow; seed every account with the same precomputed hash.
fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap())
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub tokens: TokenService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(
            Arc::new(MemoryRepository::new()),
            Arc::new(MockGeocoder::resolving(53.35, -6.26)),
        )
    }

    pub fn with(repo: Arc<MemoryRepository>, geocoder: GeocoderState) -> Self {
        let config = AppConfig::default();
        let tokens = TokenService::new(&config.jwt_secret);
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            tokens: tokens.clone(),
            geocoder,
            config,
        };
        Self {
            router: create_router(state),
            repo,
            tokens,
        }
    }

    pub async fn seed_user(&self, email: &str, role: Role) -> User {
        self.repo
            .create_user(NewUser {
                email: email.to_string(),
                name: Some(email.split('@').next().unwrap_or_default().to_string()),
                role,
                password_hash: password_hash().to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn seed_category(&self, name: &str) -> Category {
        let slug = eventplanner::models::slugify(name);
        self.repo.create_category(name, &slug).await.unwrap()
    }

    pub fn token_for(&self, user: &User) -> String {
        self.tokens.issue(user.id, &user.email, user.role).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// A request carrying the credential in the `auth-token` cookie, as a browser would.
pub fn request(method: Method, path: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("auth-token={}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get(path: &str, token: Option<&str>) -> Request<Body> {
    request(Method::GET, path, token, None)
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
