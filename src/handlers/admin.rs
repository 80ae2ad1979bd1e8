use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use uuid::Uuid;

use super::events::{build_draft, validate_event};
use crate::{
    AppState,
    error::ApiError,
    models::{AdminDashboardStats, Category, CategoryInput, ErrorBody, Event, EventInput, slugify},
    repository::RepoError,
    session::{ApiAdmin, VerifiedAdmin},
};

// Every mutation here re-checks the caller's role against the store (`VerifiedAdmin`);
// the read-only statistics trust the token (`ApiAdmin`).

/// get_admin_stats
///
/// [Admin Route] Dashboard counters.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminDashboardStats),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn get_admin_stats(
    ApiAdmin(_admin): ApiAdmin,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, ApiError> {
    Ok(Json(state.repo.get_stats().await?))
}

/// create_event
///
/// [Admin Route] Creates an event for any organizer (defaults to the calling admin).
#[utoipa::path(
    post,
    path = "/api/admin/events",
    request_body = EventInput,
    responses(
        (status = 201, description = "Created", body = Event),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 409, description = "Duplicate title", body = ErrorBody)
    )
)]
pub async fn create_event(
    VerifiedAdmin(admin): VerifiedAdmin,
    State(state): State<AppState>,
    payload: Result<Json<EventInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let Json(payload) = payload?;
    let organizer_id = payload.organizer_id.unwrap_or(admin.id);
    let valid = validate_event(payload)?;
    let draft = build_draft(state.geocoder.as_ref(), valid, organizer_id, None).await;
    let event = state.repo.create_event(draft).await?;
    tracing::info!(event_id = %event.id, admin_id = %admin.id, "admin created event");
    Ok((StatusCode::CREATED, Json(event)))
}

/// update_event
///
/// [Admin Route] Replaces any event. The organizer is kept unless the body names another.
#[utoipa::path(
    put,
    path = "/api/admin/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = EventInput,
    responses(
        (status = 200, description = "Updated", body = Event),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_event(
    VerifiedAdmin(admin): VerifiedAdmin,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<EventInput>, JsonRejection>,
) -> Result<Json<Event>, ApiError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let existing = state
        .repo
        .get_event(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;
    let organizer_id = payload.organizer_id.unwrap_or(existing.organizer_id);
    let valid = validate_event(payload)?;
    let draft = build_draft(state.geocoder.as_ref(), valid, organizer_id, Some(&existing)).await;
    let event = state.repo.update_event(id, draft).await?;
    tracing::info!(event_id = %id, admin_id = %admin.id, "admin updated event");
    Ok(Json(event))
}

/// delete_event
///
/// [Admin Route] Deletes any event.
#[utoipa::path(
    delete,
    path = "/api/admin/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_event(
    VerifiedAdmin(admin): VerifiedAdmin,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.repo.delete_event(id).await.map_err(|e| match e {
        RepoError::NotFound => ApiError::NotFound("Event not found".to_string()),
        other => other.into(),
    })?;
    tracing::info!(event_id = %id, admin_id = %admin.id, "admin deleted event");
    Ok(StatusCode::NO_CONTENT)
}

fn category_name(input: CategoryInput) -> Result<(String, String), ApiError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Category name is required".to_string()));
    }
    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(ApiError::BadRequest(
            "Category name must contain letters or digits".to_string(),
        ));
    }
    Ok((name, slug))
}

/// create_category
///
/// [Admin Route] Adds a category; the slug is derived from the name.
#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 409, description = "Duplicate name", body = ErrorBody)
    )
)]
pub async fn create_category(
    VerifiedAdmin(admin): VerifiedAdmin,
    State(state): State<AppState>,
    payload: Result<Json<CategoryInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let Json(payload) = payload?;
    let (name, slug) = category_name(payload)?;
    let category = state.repo.create_category(&name, &slug).await?;
    tracing::info!(category_id = %category.id, admin_id = %admin.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Admin Route] Renames a category (and its slug).
#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryInput,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_category(
    VerifiedAdmin(_admin): VerifiedAdmin,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CategoryInput>, JsonRejection>,
) -> Result<Json<Category>, ApiError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let (name, slug) = category_name(payload)?;
    Ok(Json(state.repo.update_category(id, &name, &slug).await?))
}

/// delete_category
///
/// [Admin Route] Removes an unused category. Refused with 409 while events reference it.
#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 409, description = "Category still has events", body = ErrorBody)
    )
)]
pub async fn delete_category(
    VerifiedAdmin(admin): VerifiedAdmin,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.repo.delete_category(id).await?;
    tracing::info!(category_id = %id, admin_id = %admin.id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}
