use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    AppState,
    config::AppConfig,
    error::ApiError,
    gate::AUTH_COOKIE,
    models::{
        AuthResponse, ErrorBody, LoginRequest, MeResponse, MessageResponse, NewUser,
        RegisterRequest, Role, UserProfile, ValidateAdminResponse, normalize_email,
    },
    password::{MIN_PASSWORD_LEN, hash_password, verify_password},
    session::{ApiUser, CurrentUser, refresh_user},
    token::TokenService,
};

/// Builds the session cookie: HTTP-only, `SameSite=Lax`, path `/`, lifetime equal to
/// the token's, `Secure` in production.
fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .http_only(true)
        .secure(config.secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(TokenService::TTL_DAYS))
        .path("/")
        .build()
}

/// The expired counterpart of `session_cookie`. Same name, path and flags so the
/// browser replaces the session cookie instead of adding a second one.
fn removal_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, ""))
        .http_only(true)
        .secure(config.secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .path("/")
        .build()
}

/// login
///
/// [Public Route] Exchanges email and password for a session cookie.
///
/// Unknown email and wrong password produce the same 401 so the response does not
/// reveal which accounts exist.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, cookie set", body = AuthResponse),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 401, description = "Bad credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .filter(|user| verify_password(&payload.password, &user.password_hash));

    let Some(user) = user else {
        tracing::info!("rejected login attempt");
        return Err(ApiError::InvalidCredentials);
    };

    let token = state.tokens.issue(user.id, &user.email, user.role)?;
    tracing::info!(user_id = %user.id, role = %user.role, "user logged in");

    Ok((
        jar.add(session_cookie(token, &state.config)),
        Json(AuthResponse {
            success: true,
            user: UserProfile::from(&user),
            message: "Login successful".to_string(),
        }),
    ))
}

/// register
///
/// [Public Route] Creates a `USER` account and signs it in immediately.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered, cookie set", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email taken", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| ApiError::internal("password hashing failed", e))?;

    let user = state
        .repo
        .create_user(NewUser {
            email,
            name: payload
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            role: Role::User,
            password_hash,
        })
        .await?;

    let token = state.tokens.issue(user.id, &user.email, user.role)?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        jar.add(session_cookie(token, &state.config)),
        Json(AuthResponse {
            success: true,
            user: UserProfile::from(&user),
            message: "Registration successful".to_string(),
        }),
    ))
}

/// logout
///
/// [Public Route] Clears the session cookie. Always succeeds, with or without a session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Cookie cleared", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    // `add`, not `remove`: the jar only emits a removal for cookies the request carried.
    (
        jar.add(removal_cookie(&state.config)),
        Json(MessageResponse {
            success: true,
            message: "Logout successful".to_string(),
        }),
    )
}

/// me
///
/// [Authenticated Route] The caller's current profile, re-read from the store so the
/// client sees role changes and deleted accounts.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "No valid session", body = ErrorBody)
    )
)]
pub async fn me(
    ApiUser(identity): ApiUser,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, ApiError> {
    match refresh_user(&state.repo, &identity).await? {
        Some(user) => Ok(Json(MeResponse {
            user: UserProfile::from(&user),
        })),
        None => {
            tracing::info!(user_id = %identity.user_id, "token outlived its account");
            Err(ApiError::Unauthenticated)
        }
    }
}

/// validate_admin
///
/// [Authenticated Route] Online admin check used by the client before showing admin
/// screens. Any failure, including a store error, is answered with the 403 body.
#[utoipa::path(
    get,
    path = "/api/auth/validate-admin",
    responses(
        (status = 200, description = "Caller is an admin", body = ValidateAdminResponse),
        (status = 403, description = "Caller is not an admin", body = ValidateAdminResponse)
    )
)]
pub async fn validate_admin(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
) -> Response {
    let user = match identity {
        Some(identity) => refresh_user(&state.repo, &identity)
            .await
            .map_err(|e| tracing::error!("admin validation lookup failed: {}", e))
            .ok()
            .flatten(),
        None => None,
    };

    match user {
        Some(user) if user.role.satisfies(Role::Admin) => Json(ValidateAdminResponse {
            valid: true,
            user: Some(UserProfile::from(&user)),
            error: None,
        })
        .into_response(),
        _ => (
            StatusCode::FORBIDDEN,
            Json(ValidateAdminResponse {
                valid: false,
                user: None,
                error: Some("Admin access required".to_string()),
            }),
        )
            .into_response(),
    }
}
