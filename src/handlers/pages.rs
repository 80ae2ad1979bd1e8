use axum::{
    Json,
    extract::{Path, Query, State, rejection::PathRejection},
};
use serde::Deserialize;
use uuid::Uuid;

use super::events::can_manage;
use crate::{
    AppState,
    error::ApiError,
    models::{
        AdminCategoriesPage, AdminDashboardPage, EventDetailPage, EventFilter, EventsPage,
        Role, SignInPage, UnauthorizedPage, UserEventsPage,
    },
    session::{RequireAdmin, RequireAuth},
};

// Page loaders use the redirecting extractors (`RequireAuth`, `RequireAdmin`); a
// missing session never reaches the body of these functions.

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnauthorizedQuery {
    pub role: Option<String>,
    pub redirect: Option<String>,
}

/// Accepts only same-site absolute paths, so `redirect` cannot bounce to another origin.
fn local_path(candidate: Option<String>) -> String {
    candidate
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| "/".to_string())
}

/// events_page
///
/// `GET /` and `GET /events`: the event listing with the category filter.
pub async fn events_page(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<EventsPage>, ApiError> {
    let events = state.repo.list_events(filter.category.as_deref()).await?;
    let categories = state.repo.list_categories().await?;
    Ok(Json(EventsPage {
        user,
        events,
        categories,
        selected_category: filter.category,
    }))
}

/// event_detail_page
pub async fn event_detail_page(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<EventDetailPage>, ApiError> {
    let Path(id) = id?;
    let event = state
        .repo
        .get_event(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;
    Ok(Json(EventDetailPage {
        can_manage: can_manage(&user, &event),
        user,
        event,
    }))
}

/// user_events_page
pub async fn user_events_page(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<UserEventsPage>, ApiError> {
    let events = state.repo.list_events_by_organizer(user.user_id).await?;
    Ok(Json(UserEventsPage { user, events }))
}

/// sign_in_page
///
/// Echoes where to go after a successful login.
pub async fn sign_in_page(Query(query): Query<RedirectQuery>) -> Json<SignInPage> {
    Json(SignInPage {
        redirect: local_path(query.redirect),
    })
}

/// unauthorized_page
///
/// Explains which role was missing. The "go home" target never leads back into
/// `/admin`, which would only bounce here again.
pub async fn unauthorized_page(Query(query): Query<UnauthorizedQuery>) -> Json<UnauthorizedPage> {
    let attempted_path = local_path(query.redirect);
    let home_path = if attempted_path.starts_with("/admin") {
        "/".to_string()
    } else {
        attempted_path.clone()
    };
    Json(UnauthorizedPage {
        required_role: query
            .role
            .filter(|role| !role.is_empty())
            .unwrap_or_else(|| Role::Admin.to_string()),
        attempted_path,
        home_path,
    })
}

/// admin_dashboard_page
///
/// Counters plus a database connectivity flag. A store failure shows up as
/// `database_connected: false` with zeroed counters rather than an error page.
pub async fn admin_dashboard_page(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
) -> Json<AdminDashboardPage> {
    let database_connected = match state.repo.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("database status check failed: {}", e);
            false
        }
    };
    let stats = state.repo.get_stats().await.unwrap_or_default();
    Json(AdminDashboardPage {
        user,
        stats,
        database_connected,
    })
}

/// admin_categories_page
pub async fn admin_categories_page(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<AdminCategoriesPage>, ApiError> {
    let categories = state.repo.list_categories().await?;
    Ok(Json(AdminCategoriesPage { user, categories }))
}
