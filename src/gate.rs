use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    error::ApiError,
    models::Role,
    token::{Identity, TokenService, VerifyCredential},
};

/// Name of the HTTP-only cookie carrying the credential.
pub const AUTH_COOKIE: &str = "auth-token";
pub const SIGN_IN_PATH: &str = "/auth/signin";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// RouteClass
///
/// The access tier a request path requires. Derived from path prefixes on every
/// request; nothing about it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Authenticated,
    AdminPage,
    AdminApi,
}

// Public prefixes. Assets and the login/logout/register endpoints never need a credential.
const PUBLIC_PREFIXES: &[&str] = &[
    "/_next/",
    "/favicon.ico",
    "/images/",
    "/icons/",
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/logout",
    "/auth/",
    "/swagger-ui",
    "/api-docs",
];

const PUBLIC_EXACT: &[&str] = &[UNAUTHORIZED_PATH, "/health"];

/// classify
///
/// First match wins: public patterns (including any path with a file extension),
/// then `/api/admin`, then `/admin`, then everything else needs a signed-in user.
pub fn classify(path: &str) -> RouteClass {
    if path.contains('.')
        || PUBLIC_EXACT.contains(&path)
        || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
    {
        RouteClass::Public
    } else if path.starts_with("/api/admin") {
        RouteClass::AdminApi
    } else if path.starts_with("/admin") {
        RouteClass::AdminPage
    } else {
        RouteClass::Authenticated
    }
}

/// Programmatic routes get status codes, never redirects.
pub fn is_api_path(path: &str) -> bool {
    path.starts_with("/api/")
}

/// extract_credential
///
/// Prefers the `auth-token` cookie and falls back to `Authorization: Bearer <token>`.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(AUTH_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// GateDecision
///
/// What the access gate does with a request. Missing and invalid credentials produce
/// the same decision so the caller cannot tell which one occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Public path: passed through without looking at credentials.
    Allow,
    AllowAuthenticated(Identity),
    /// Admin page for an admin: passed through with hardening headers.
    AllowAdminPage(Identity),
    SignIn { redirect: String },
    Unauthorized { required: Role, redirect: String },
    ApiUnauthenticated,
    ApiForbidden,
}

/// evaluate
///
/// The gate as a pure function of (path, headers). Public paths return before any
/// credential is extracted or verified.
pub fn evaluate<V>(path: &str, headers: &HeaderMap, verifier: &V) -> GateDecision
where
    V: VerifyCredential + ?Sized,
{
    let class = classify(path);
    if class == RouteClass::Public {
        return GateDecision::Allow;
    }

    let identity = extract_credential(headers).and_then(|credential| verifier.verify(&credential));

    match (class, identity) {
        (RouteClass::AdminApi, Some(identity)) if identity.role.satisfies(Role::Admin) => {
            GateDecision::AllowAuthenticated(identity)
        }
        (RouteClass::AdminApi, _) => GateDecision::ApiForbidden,
        (_, None) if is_api_path(path) => GateDecision::ApiUnauthenticated,
        (_, None) => GateDecision::SignIn {
            redirect: path.to_string(),
        },
        (RouteClass::AdminPage, Some(identity)) if identity.role.satisfies(Role::Admin) => {
            GateDecision::AllowAdminPage(identity)
        }
        (RouteClass::AdminPage, Some(_)) => GateDecision::Unauthorized {
            required: Role::Admin,
            redirect: path.to_string(),
        },
        (_, Some(identity)) => GateDecision::AllowAuthenticated(identity),
    }
}

/// access_gate
///
/// Middleware applied to the whole router. Runs `evaluate`, answers rejections itself,
/// and hands the verified `Identity` to downstream handlers through request extensions.
pub async fn access_gate(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let decision = evaluate(&path, request.headers(), &tokens);

    match decision {
        GateDecision::Allow => next.run(request).await,
        GateDecision::AllowAuthenticated(identity) => {
            tracing::debug!(%path, user_id = %identity.user_id, "gate: allow");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        GateDecision::AllowAdminPage(identity) => {
            tracing::debug!(%path, user_id = %identity.user_id, "gate: allow admin page");
            request.extensions_mut().insert(identity);
            let mut response = next.run(request).await;
            harden(response.headers_mut());
            response
        }
        GateDecision::SignIn { redirect } => {
            tracing::debug!(%path, "gate: no valid credential, redirecting to sign-in");
            sign_in_redirect(&redirect)
        }
        GateDecision::Unauthorized { required, redirect } => {
            tracing::warn!(%path, required = %required, "gate: insufficient role for page");
            unauthorized_redirect(required, &redirect)
        }
        GateDecision::ApiUnauthenticated => {
            tracing::debug!(%path, "gate: no valid credential for API route");
            ApiError::Unauthenticated.into_response()
        }
        GateDecision::ApiForbidden => {
            tracing::warn!(%path, "gate: admin API denied");
            ApiError::AdminRequired.into_response()
        }
    }
}

// --- Redirect Contracts ---

/// `/auth/signin?redirect=<path>`
pub fn sign_in_location(path: &str) -> String {
    format!("{}?redirect={}", SIGN_IN_PATH, urlencoding::encode(path))
}

/// `/unauthorized?role=<role>&redirect=<path>`
pub fn unauthorized_location(required: Role, path: &str) -> String {
    format!(
        "{}?role={}&redirect={}",
        UNAUTHORIZED_PATH,
        required.as_str(),
        urlencoding::encode(path)
    )
}

pub fn sign_in_redirect(path: &str) -> Response {
    found(&sign_in_location(path))
}

/// Redirect to the unauthorized page. The answer is marked uncacheable so that
/// back-navigation cannot replay admin HTML from the browser cache.
pub fn unauthorized_redirect(required: Role, path: &str) -> Response {
    let mut response = found(&unauthorized_location(required, path));
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(
        HeaderName::from_static("surrogate-control"),
        HeaderValue::from_static("no-store"),
    );
    response
}

fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        // Percent-encoding keeps every location header-safe; fall back to sign-in anyway.
        Err(_) => (
            StatusCode::FOUND,
            [(header::LOCATION, HeaderValue::from_static(SIGN_IN_PATH))],
        )
            .into_response(),
    }
}

fn harden(headers: &mut HeaderMap) {
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
}
