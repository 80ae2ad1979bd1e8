use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    geocoding::Geocoder,
    models::{Category, ErrorBody, Event, EventDraft, EventFilter, EventInput, Role, slugify},
    repository::RepositoryState,
    session::{ApiUser, refresh_user},
    token::Identity,
};

// --- Shared Event Validation ---

/// ValidEvent
///
/// An `EventInput` whose required fields are present and consistent.
pub(crate) struct ValidEvent {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: String,
    pub category_id: Uuid,
    pub image_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// validate_event
///
/// Title, start, end, location and category are required; the end may not precede
/// the start; the title must yield a non-empty slug.
pub(crate) fn validate_event(input: EventInput) -> Result<ValidEvent, ApiError> {
    let (Some(title), Some(starts_at), Some(ends_at), Some(location), Some(category_id)) = (
        non_empty(input.title),
        input.starts_at,
        input.ends_at,
        non_empty(input.location),
        input.category_id,
    ) else {
        return Err(ApiError::BadRequest(
            "All required fields must be filled".to_string(),
        ));
    };

    if ends_at < starts_at {
        return Err(ApiError::BadRequest(
            "End time must be after start time".to_string(),
        ));
    }
    if slugify(&title).is_empty() {
        return Err(ApiError::BadRequest(
            "Title must contain letters or digits".to_string(),
        ));
    }

    Ok(ValidEvent {
        title,
        description: non_empty(input.description),
        starts_at,
        ends_at,
        location,
        category_id,
        image_url: non_empty(input.image_url),
    })
}

/// build_draft
///
/// Turns a validated event into a write payload. The location is geocoded best-effort;
/// when editing, coordinates are only looked up again if the location text changed.
pub(crate) async fn build_draft(
    geocoder: &dyn Geocoder,
    event: ValidEvent,
    organizer_id: Uuid,
    previous: Option<&Event>,
) -> EventDraft {
    let (latitude, longitude) = match previous {
        Some(prev) if prev.location == event.location => (prev.latitude, prev.longitude),
        _ => match geocoder.geocode(&event.location).await {
            Some(point) => (Some(point.latitude), Some(point.longitude)),
            None => {
                tracing::info!(location = %event.location, "location did not geocode; keeping raw text");
                (None, None)
            }
        },
    };

    EventDraft {
        slug: slugify(&event.title),
        title: event.title,
        description: event.description,
        starts_at: event.starts_at,
        ends_at: event.ends_at,
        location: event.location,
        latitude,
        longitude,
        category_id: event.category_id,
        organizer_id,
        image_url: event.image_url,
    }
}

/// Organizer or admin, judged from the token claims. Good enough for rendering.
pub(crate) fn can_manage(identity: &Identity, event: &Event) -> bool {
    event.organizer_id == identity.user_id || identity.is_admin()
}

/// ensure_can_manage
///
/// Authorization for edits and deletes of someone's event.
///
/// 1. The organizer is always allowed; ownership is fixed in the event row.
/// 2. Anyone else needs the ADMIN role *as stored now*, not as claimed by the token:
///    a demoted or deleted admin keeps an ADMIN token for up to its full lifetime.
/// 3. Everything else is a 403 carrying `refusal`.
pub(crate) async fn ensure_can_manage(
    repo: &RepositoryState,
    identity: &Identity,
    event: &Event,
    refusal: &str,
) -> Result<(), ApiError> {
    if event.organizer_id == identity.user_id {
        return Ok(());
    }
    if identity.is_admin() {
        match refresh_user(repo, identity).await? {
            Some(user) if user.role.satisfies(Role::Admin) => return Ok(()),
            _ => {
                tracing::warn!(user_id = %identity.user_id, event_id = %event.id, "stale admin token refused by online check");
            }
        }
    } else {
        tracing::warn!(event_id = %event.id, user_id = %identity.user_id, "refused: not organizer");
    }
    Err(ApiError::Forbidden(refusal.to_string()))
}

fn event_not_found() -> ApiError {
    ApiError::NotFound("Event not found".to_string())
}

// --- Handlers ---

/// list_events
///
/// [Authenticated Route] All events ordered by start time, optionally for one category.
#[utoipa::path(
    get,
    path = "/api/events",
    params(EventFilter),
    responses((status = 200, description = "Events", body = [Event]))
)]
pub async fn list_events(
    ApiUser(_caller): ApiUser,
    State(state): State<AppState>,
    filter: Result<Query<EventFilter>, QueryRejection>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let Query(filter) = filter?;
    let events = state.repo.list_events(filter.category.as_deref()).await?;
    Ok(Json(events))
}

/// get_event
///
/// [Authenticated Route] One event by id.
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Found", body = Event),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_event(
    ApiUser(_caller): ApiUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Event>, ApiError> {
    let Path(id) = id?;
    state
        .repo
        .get_event(id)
        .await?
        .map(Json)
        .ok_or_else(event_not_found)
}

/// list_categories
///
/// [Authenticated Route] Categories with their event counts.
#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(
    ApiUser(_caller): ApiUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.repo.list_categories().await?))
}

/// list_my_events
///
/// [Authenticated Route] Events organized by the caller.
#[utoipa::path(
    get,
    path = "/api/user-events",
    responses((status = 200, description = "My events", body = [Event]))
)]
pub async fn list_my_events(
    ApiUser(identity): ApiUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(
        state.repo.list_events_by_organizer(identity.user_id).await?,
    ))
}

/// create_my_event
///
/// [Authenticated Route] Creates an event organized by the caller. Any `organizer_id`
/// in the body is ignored.
#[utoipa::path(
    post,
    path = "/api/user-events",
    request_body = EventInput,
    responses(
        (status = 201, description = "Created", body = Event),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Duplicate title", body = ErrorBody)
    )
)]
pub async fn create_my_event(
    ApiUser(identity): ApiUser,
    State(state): State<AppState>,
    payload: Result<Json<EventInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let Json(payload) = payload?;
    let valid = validate_event(payload)?;
    let draft = build_draft(state.geocoder.as_ref(), valid, identity.user_id, None).await;
    let event = state.repo.create_event(draft).await?;
    tracing::info!(event_id = %event.id, organizer_id = %identity.user_id, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

/// update_my_event
///
/// [Authenticated Route] Replaces an event's details.
///
/// *Authorization*: the organizer, or an account whose stored role is ADMIN. The
/// organizer never changes here.
#[utoipa::path(
    put,
    path = "/api/user-events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = EventInput,
    responses(
        (status = 200, description = "Updated", body = Event),
        (status = 403, description = "Not the organizer", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_my_event(
    ApiUser(identity): ApiUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<EventInput>, JsonRejection>,
) -> Result<Json<Event>, ApiError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let existing = state.repo.get_event(id).await?.ok_or_else(event_not_found)?;
    ensure_can_manage(&state.repo, &identity, &existing, "You can only edit your own events").await?;

    let valid = validate_event(payload)?;
    let draft = build_draft(
        state.geocoder.as_ref(),
        valid,
        existing.organizer_id,
        Some(&existing),
    )
    .await;
    Ok(Json(state.repo.update_event(id, draft).await?))
}

/// delete_my_event
///
/// [Authenticated Route] Deletes an event. Same authorization as `update_my_event`.
#[utoipa::path(
    delete,
    path = "/api/user-events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the organizer", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_my_event(
    ApiUser(identity): ApiUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let existing = state.repo.get_event(id).await?.ok_or_else(event_not_found)?;
    ensure_can_manage(&state.repo, &identity, &existing, "You can only delete your own events").await?;

    state.repo.delete_event(id).await?;
    tracing::info!(event_id = %id, "event deleted");
    Ok(StatusCode::NO_CONTENT)
}
