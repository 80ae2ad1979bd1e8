use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Routes restricted to the ADMIN role. The gate answers non-admins before these
/// handlers run (403 JSON for `/api/admin*`, redirect to `/unauthorized` for pages).
/// Each handler checks the role again: `RequireAdmin` on pages, `ApiAdmin` on the
/// statistics read and `VerifiedAdmin` (role re-read from the store) on mutations.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/stats
        // Event, user and category counters for the dashboard.
        .route("/api/admin/stats", get(handlers::admin::get_admin_stats))
        // POST /api/admin/events
        // Create an event for any organizer.
        .route("/api/admin/events", post(handlers::admin::create_event))
        // PUT/DELETE /api/admin/events/{id}
        // No ownership check: admins manage every event.
        .route(
            "/api/admin/events/{id}",
            put(handlers::admin::update_event).delete(handlers::admin::delete_event),
        )
        // POST /api/admin/categories
        .route("/api/admin/categories", post(handlers::admin::create_category))
        // PUT/DELETE /api/admin/categories/{id}
        // Delete is refused (409) while events still reference the category.
        .route(
            "/api/admin/categories/{id}",
            put(handlers::admin::update_category).delete(handlers::admin::delete_category),
        )
        // --- Pages ---
        // GET /admin
        // Dashboard: counters plus database connectivity.
        .route("/admin", get(handlers::pages::admin_dashboard_page))
        .route(
            "/admin/categories",
            get(handlers::pages::admin_categories_page),
        )
}
