use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Everything a signed-in USER may reach. The gate has already rejected requests
/// without a valid credential (401 for `/api/*`, sign-in redirect for pages);
/// handlers still resolve the caller through the session extractors and apply
/// ownership checks (`update_my_event`, `delete_my_event`).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Session ---
        // GET /api/auth/me
        // Current profile, re-read from the store.
        .route("/api/auth/me", get(handlers::auth::me))
        // GET|POST /api/auth/validate-admin
        // Online admin check for the client before it shows admin screens.
        .route(
            "/api/auth/validate-admin",
            get(handlers::auth::validate_admin).post(handlers::auth::validate_admin),
        )
        // --- Events & Categories (read) ---
        .route("/api/events", get(handlers::events::list_events))
        .route("/api/events/{id}", get(handlers::events::get_event))
        .route("/api/categories", get(handlers::events::list_categories))
        // --- The caller's own events ---
        // GET lists, POST creates with the caller as organizer.
        .route(
            "/api/user-events",
            get(handlers::events::list_my_events).post(handlers::events::create_my_event),
        )
        // PUT/DELETE: organizer or admin only.
        .route(
            "/api/user-events/{id}",
            put(handlers::events::update_my_event).delete(handlers::events::delete_my_event),
        )
        // --- Location lookups ---
        .route("/api/geocode", get(handlers::geocode::lookup_location))
        .route("/api/geocode/reverse", get(handlers::geocode::reverse_location))
        // --- Pages ---
        .route("/", get(handlers::pages::events_page))
        .route("/events", get(handlers::pages::events_page))
        .route("/events/{id}", get(handlers::pages::event_detail_page))
        .route("/user-events", get(handlers::pages::user_events_page))
}
