use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};

use crate::{
    AppState,
    error::ApiError,
    geocoding::GeoPoint,
    models::{AddressResponse, CoordinatesQuery, ErrorBody, LocationQuery},
    session::ApiUser,
};

// Location helpers for event forms. The geocoder is best-effort, so "nothing found"
// and "service unavailable" are both a 404 here.

/// lookup_location
///
/// [Authenticated Route] Resolves free-text address input to coordinates, so a form
/// can show the place before the event is saved.
#[utoipa::path(
    get,
    path = "/api/geocode",
    params(LocationQuery),
    responses(
        (status = 200, description = "Resolved", body = GeoPoint),
        (status = 400, description = "Missing address", body = ErrorBody),
        (status = 404, description = "No match", body = ErrorBody)
    )
)]
pub async fn lookup_location(
    ApiUser(_caller): ApiUser,
    State(state): State<AppState>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<Json<GeoPoint>, ApiError> {
    let Query(query) = query?;
    let address = query.address.trim();
    if address.is_empty() {
        return Err(ApiError::BadRequest("Address is required".to_string()));
    }
    state
        .geocoder
        .geocode(address)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Location not found".to_string()))
}

/// reverse_location
///
/// [Authenticated Route] The address nearest to a point picked on a map.
#[utoipa::path(
    get,
    path = "/api/geocode/reverse",
    params(CoordinatesQuery),
    responses(
        (status = 200, description = "Address", body = AddressResponse),
        (status = 400, description = "Coordinates out of range", body = ErrorBody),
        (status = 404, description = "No match", body = ErrorBody)
    )
)]
pub async fn reverse_location(
    ApiUser(_caller): ApiUser,
    State(state): State<AppState>,
    query: Result<Query<CoordinatesQuery>, QueryRejection>,
) -> Result<Json<AddressResponse>, ApiError> {
    let Query(CoordinatesQuery { lat, lon }) = query?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(ApiError::BadRequest(
            "Coordinates are out of range".to_string(),
        ));
    }
    state
        .geocoder
        .reverse(lat, lon)
        .await
        .map(|address| Json(AddressResponse { address }))
        .ok_or_else(|| ApiError::NotFound("Location not found".to_string()))
}
