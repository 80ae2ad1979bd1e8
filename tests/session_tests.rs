use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
    response::IntoResponse,
};
use eventplanner::{
    AppConfig, AppState,
    geocoding::{GeocoderState, MockGeocoder},
    models::{NewUser, Role},
    repository::{MemoryRepository, Repository, RepositoryState},
    session::{
        ApiAdmin, ApiUser, CurrentUser, PageRejection, RequireAdmin, RequireAuth, VerifiedAdmin,
    },
    token::{Identity, TokenService},
};
use std::sync::Arc;
use uuid::Uuid;

fn state_with(repo: Arc<MemoryRepository>) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        tokens: TokenService::new("session-test-secret"),
        geocoder: Arc::new(MockGeocoder::new_failing()) as GeocoderState,
        config: AppConfig::default(),
    }
}

fn parts(path: &str, token: Option<&str>) -> Parts {
    let mut builder = Request::builder().uri(path);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("auth-token={}", token));
    }
    builder.body(()).unwrap().into_parts().0
}

fn token(state: &AppState, id: Uuid, role: Role) -> String {
    state.tokens.issue(id, "person@example.com", role).unwrap()
}

async fn seed(repo: &MemoryRepository, email: &str, role: Role) -> Uuid {
    repo.create_user(NewUser {
        email: email.to_string(),
        name: None,
        role,
        password_hash: "unused".to_string(),
    })
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn current_user_is_none_without_credential() {
    let state = state_with(Arc::new(MemoryRepository::new()));
    let CurrentUser(identity) = CurrentUser::from_request_parts(&mut parts("/", None), &state)
        .await
        .unwrap();
    assert!(identity.is_none());

    let CurrentUser(identity) =
        CurrentUser::from_request_parts(&mut parts("/", Some("garbage")), &state)
            .await
            .unwrap();
    assert!(identity.is_none());
}

#[tokio::test]
async fn current_user_trusts_token_claims_without_the_store() {
    // Empty store: the offline tier must not care.
    let state = state_with(Arc::new(MemoryRepository::new()));
    let id = Uuid::new_v4();
    let t = token(&state, id, Role::Admin);

    let CurrentUser(identity) = CurrentUser::from_request_parts(&mut parts("/", Some(&t)), &state)
        .await
        .unwrap();
    let identity = identity.unwrap();
    assert_eq!(identity.user_id, id);
    assert_eq!(identity.role, Role::Admin);
}

#[tokio::test]
async fn gate_identity_in_extensions_is_reused() {
    let state = state_with(Arc::new(MemoryRepository::new()));
    let mut p = parts("/", None);
    let identity = Identity {
        user_id: Uuid::new_v4(),
        email: "from-gate@example.com".to_string(),
        role: Role::User,
    };
    p.extensions.insert(identity.clone());

    let RequireAuth(resolved) = RequireAuth::from_request_parts(&mut p, &state).await.unwrap();
    assert_eq!(resolved, identity);
}

#[tokio::test]
async fn require_auth_redirects_to_sign_in_with_the_path() {
    let state = state_with(Arc::new(MemoryRepository::new()));
    let rejection = RequireAuth::from_request_parts(&mut parts("/user-events", None), &state)
        .await
        .unwrap_err();
    assert!(matches!(&rejection, PageRejection::SignIn { redirect } if redirect == "/user-events"));

    let response = rejection.into_response();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/signin?redirect=%2Fuser-events"
    );
}

#[tokio::test]
async fn require_admin_distinguishes_anonymous_from_wrong_role() {
    let state = state_with(Arc::new(MemoryRepository::new()));

    let anonymous = RequireAdmin::from_request_parts(&mut parts("/admin", None), &state)
        .await
        .unwrap_err();
    assert!(matches!(anonymous, PageRejection::SignIn { .. }));

    let user_token = token(&state, Uuid::new_v4(), Role::User);
    let wrong_role = RequireAdmin::from_request_parts(&mut parts("/admin", Some(&user_token)), &state)
        .await
        .unwrap_err();
    let response = wrong_role.into_response();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/unauthorized?role=ADMIN&redirect=%2Fadmin"
    );
    assert!(response.headers().contains_key(header::CACHE_CONTROL));

    let admin_token = token(&state, Uuid::new_v4(), Role::Admin);
    assert!(
        RequireAdmin::from_request_parts(&mut parts("/admin", Some(&admin_token)), &state)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn api_extractors_answer_with_status_codes() {
    let state = state_with(Arc::new(MemoryRepository::new()));

    let err = ApiUser::from_request_parts(&mut parts("/api/events", None), &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

    let user_token = token(&state, Uuid::new_v4(), Role::User);
    let err = ApiAdmin::from_request_parts(&mut parts("/api/admin/stats", Some(&user_token)), &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
    assert!(err.into_response().headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn verified_admin_rechecks_the_stored_role() {
    let repo = Arc::new(MemoryRepository::new());
    let state = state_with(repo.clone());

    // Stored as USER, token still claims ADMIN (demoted after issuance).
    let demoted = seed(&repo, "demoted@example.com", Role::User).await;
    let stale = token(&state, demoted, Role::Admin);
    assert!(
        ApiAdmin::from_request_parts(&mut parts("/api/admin/events", Some(&stale)), &state)
            .await
            .is_ok(),
        "offline tier trusts the claim"
    );
    let err = VerifiedAdmin::from_request_parts(&mut parts("/api/admin/events", Some(&stale)), &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    // Deleted account.
    let ghost = token(&state, Uuid::new_v4(), Role::Admin);
    assert!(
        VerifiedAdmin::from_request_parts(&mut parts("/api/admin/events", Some(&ghost)), &state)
            .await
            .is_err()
    );

    let admin = seed(&repo, "admin@example.com", Role::Admin).await;
    let fresh = token(&state, admin, Role::Admin);
    let VerifiedAdmin(user) =
        VerifiedAdmin::from_request_parts(&mut parts("/api/admin/events", Some(&fresh)), &state)
            .await
            .unwrap();
    assert_eq!(user.id, admin);
}

#[tokio::test]
async fn verified_admin_store_failure_is_a_500() {
    let state = state_with(Arc::new(MemoryRepository::new_failing()));
    let t = token(&state, Uuid::new_v4(), Role::Admin);
    let err = VerifiedAdmin::from_request_parts(&mut parts("/api/admin/events", Some(&t)), &state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
