use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Security core: credentials, the path-based gate, per-handler session resolution.
pub mod gate;
pub mod session;
pub mod token;

// Client-side mirror of the session, driven over the HTTP auth contract.
pub mod client;

// Application services and components.
pub mod config;
pub mod error;
pub mod geocoding;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;

// Route groups by access tier (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use geocoding::{GeocoderState, MockGeocoder, NominatimGeocoder};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use token::{Identity, TokenService};

/// ApiDoc
///
/// OpenAPI document for every JSON endpoint, served at `/api-docs/openapi.json`.
/// Page loaders are left out; they are consumed by the UI layer, not API clients.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login, handlers::auth::register, handlers::auth::logout,
        handlers::auth::me, handlers::auth::validate_admin,
        handlers::events::list_events, handlers::events::get_event,
        handlers::events::list_categories, handlers::events::list_my_events,
        handlers::events::create_my_event, handlers::events::update_my_event,
        handlers::events::delete_my_event,
        handlers::geocode::lookup_location, handlers::geocode::reverse_location,
        handlers::admin::get_admin_stats, handlers::admin::create_event,
        handlers::admin::update_event, handlers::admin::delete_event,
        handlers::admin::create_category, handlers::admin::update_category,
        handlers::admin::delete_category
    ),
    components(
        schemas(
            models::Role, models::UserProfile, models::LoginRequest, models::RegisterRequest,
            models::AuthResponse, models::MessageResponse, models::MeResponse,
            models::ValidateAdminResponse, models::ErrorBody, models::Event, models::Category,
            models::EventInput, models::CategoryInput, models::AdminDashboardStats,
            models::AddressResponse, geocoding::GeoPoint,
        )
    ),
    tags(
        (name = "eventplanner", description = "Event Planner API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration. Cloned per request;
/// every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Persistence collaborator (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Issues and verifies credentials. Holds the signing secret.
    pub tokens: TokenService,
    /// Best-effort address lookup for event locations.
    pub geocoder: GeocoderState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Extractors and the gate pull only the component they need out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for GeocoderState {
    fn from_ref(app_state: &AppState) -> GeocoderState {
        app_state.geocoder.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles all route groups behind the access gate, then wraps the result in the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Routes + Access Gate
    // The gate wraps every route and the fallback: unknown paths are classified too.
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::access_gate,
        ))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer (outermost)
        .layer(cors)
}

async fn not_found() -> error::ApiError {
    error::ApiError::NotFound("Not found".to_string())
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, uri and the `x-request-id` set by `SetRequestIdLayer`,
/// so all log lines of one request correlate. Cookies and the Authorization header are
/// deliberately not recorded.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
