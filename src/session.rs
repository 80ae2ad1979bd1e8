use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};

use crate::{
    error::ApiError,
    gate::{extract_credential, sign_in_redirect, unauthorized_redirect},
    models::{Role, User},
    repository::{RepoError, RepositoryState},
    token::{Identity, TokenService},
};

// --- Offline Tier (signature + expiry only) ---

/// get_current_user
///
/// Resolves "who is calling" from the request credential. Trusts the token claims without
/// a database round-trip. Any failure (absent, malformed, expired) yields `None`.
pub fn get_current_user(parts: &Parts, tokens: &TokenService) -> Option<Identity> {
    if let Some(identity) = parts.extensions.get::<Identity>() {
        return Some(identity.clone());
    }
    extract_credential(&parts.headers).and_then(|credential| tokens.verify(&credential))
}

// --- Online Tier (re-fetch from the persistence collaborator) ---

/// refresh_user
///
/// Re-reads the account behind a verified identity so that role changes and deletions
/// are observed before the token expires. `None` means the account no longer exists.
pub async fn refresh_user(
    repo: &RepositoryState,
    identity: &Identity,
) -> Result<Option<User>, RepoError> {
    repo.get_user(identity.user_id).await
}

/// PageRejection
///
/// How page extractors stop a render: a redirect, mirroring the access gate.
#[derive(Debug)]
pub enum PageRejection {
    SignIn { redirect: String },
    Unauthorized { required: Role, redirect: String },
}

impl IntoResponse for PageRejection {
    fn into_response(self) -> Response {
        match self {
            PageRejection::SignIn { redirect } => sign_in_redirect(&redirect),
            PageRejection::Unauthorized { required, redirect } => {
                unauthorized_redirect(required, &redirect)
            }
        }
    }
}

/// CurrentUser
///
/// Optional identity. Never rejects.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);
        Ok(CurrentUser(get_current_user(parts, &tokens)))
    }
}

/// RequireAuth Extractor
///
/// Page extractor for anything a signed-in USER may see. Page loaders take it as their
/// first argument so the render body only ever runs with a known caller.
///
/// The process:
/// 1. Dependency Resolution: pulls the `TokenService` out of the application state.
/// 2. Credential Resolution: reuses the identity the gate stored in the request
///    extensions, or verifies the cookie/bearer credential itself when mounted
///    without the gate.
/// 3. Offline Trust: the token claims are used as-is, with no database round-trip.
///
/// Rejection: a 302 to `/auth/signin?redirect=<path>`, the same answer the gate gives,
/// so the UI sees one behaviour whichever layer stopped the request.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = PageRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);
        get_current_user(parts, &tokens)
            .map(RequireAuth)
            .ok_or_else(|| PageRejection::SignIn {
                redirect: parts.uri.path().to_string(),
            })
    }
}

/// RequireAdmin Extractor
///
/// Page extractor for the `/admin` screens. Repeats the gate's admin check at handler
/// level, so the handler stays protected if the gate's path rules change.
///
/// The process:
/// 1. Credential Resolution: as `RequireAuth`.
/// 2. Role Check: the token's role must satisfy `Role::Admin`.
///
/// Rejection:
/// - No usable credential: 302 to sign-in, carrying the attempted path.
/// - Signed in without the role: 302 to `/unauthorized?role=ADMIN&redirect=<path>`,
///   with the no-store headers of the gate's own redirect.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = PageRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);
        let path = parts.uri.path().to_string();
        match get_current_user(parts, &tokens) {
            None => Err(PageRejection::SignIn { redirect: path }),
            Some(identity) if identity.role.satisfies(Role::Admin) => Ok(RequireAdmin(identity)),
            Some(identity) => {
                tracing::warn!(user_id = %identity.user_id, %path, "non-admin reached admin page handler");
                Err(PageRejection::Unauthorized {
                    required: Role::Admin,
                    redirect: path,
                })
            }
        }
    }
}

/// ApiUser Extractor
///
/// The API counterpart of `RequireAuth`. Programmatic clients expect status codes,
/// so this extractor never redirects.
///
/// Rejection: `ApiError::Unauthenticated` (401, `{"error":"Authentication required"}`).
#[derive(Debug, Clone)]
pub struct ApiUser(pub Identity);

impl<S> FromRequestParts<S> for ApiUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);
        get_current_user(parts, &tokens)
            .map(ApiUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// ApiAdmin
///
/// API extractor: admin according to the token claims, else 403 JSON.
#[derive(Debug, Clone)]
pub struct ApiAdmin(pub Identity);

impl<S> FromRequestParts<S> for ApiAdmin
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);
        match get_current_user(parts, &tokens) {
            Some(identity) if identity.role.satisfies(Role::Admin) => Ok(ApiAdmin(identity)),
            _ => Err(ApiError::AdminRequired),
        }
    }
}

/// VerifiedAdmin Extractor
///
/// The online tier, used by every admin mutation. A token stays valid for its whole
/// lifetime whatever happens to the account, so the role it claims is not trusted
/// for writes.
///
/// The process:
/// 1. Dependency Resolution: `TokenService` and `RepositoryState` from the state.
/// 2. Token Validation: as `ApiUser`, via `get_current_user`.
/// 3. DB Lookup: `refresh_user` re-reads the account; its stored role decides.
///
/// Rejection: `ApiError::AdminRequired` (403) for a missing credential, a demoted
/// account or a deleted one. A store failure surfaces as 500.
#[derive(Debug, Clone)]
pub struct VerifiedAdmin(pub User);

impl<S> FromRequestParts<S> for VerifiedAdmin
where
    S: Send + Sync,
    TokenService: FromRef<S>,
    RepositoryState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);
        let repo = RepositoryState::from_ref(state);

        let identity = get_current_user(parts, &tokens).ok_or(ApiError::AdminRequired)?;
        match refresh_user(&repo, &identity).await? {
            Some(user) if user.role.satisfies(Role::Admin) => Ok(VerifiedAdmin(user)),
            Some(user) => {
                tracing::warn!(user_id = %user.id, "stale admin token refused by online check");
                Err(ApiError::AdminRequired)
            }
            None => Err(ApiError::AdminRequired),
        }
    }
}
