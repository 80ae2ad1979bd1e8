use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ts_rs::TS;
use utoipa::ToSchema;

/// GeoPoint
///
/// A resolved address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: Option<String>,
}

// 1. Geocoder Contract
/// Geocoder
///
/// Address lookups against a third-party service. Every failure mode (network,
/// non-2xx status, empty result, unparsable coordinates) is reported as `None`:
/// callers treat geocoding as best-effort and keep the raw location text.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Option<GeoPoint>;
    async fn reverse(&self, latitude: f64, longitude: f64) -> Option<String>;
}

/// GeocoderState
///
/// The concrete type used to share the geocoder across the application state.
pub type GeocoderState = Arc<dyn Geocoder>;

// 2. The Real Implementation (Nominatim)

const USER_AGENT: &str = "EventPlannerApp/1.0";

#[derive(Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct ReverseHit {
    display_name: Option<String>,
}

/// NominatimGeocoder
///
/// Talks to a Nominatim-compatible API (`/search` and `/reverse`, JSON format).
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Option<T> {
        let response = match self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(query)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Geocoding request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!("Geocoding API error: {}", response.status());
            return None;
        }

        response
            .json::<T>()
            .await
            .map_err(|e| tracing::error!("Geocoding response unreadable: {}", e))
            .ok()
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Option<GeoPoint> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }

        let hits: Vec<SearchHit> = self
            .get_json(
                "/search",
                &[
                    ("format", "json".to_string()),
                    ("q", address.to_string()),
                    ("limit", "1".to_string()),
                    ("addressdetails", "1".to_string()),
                ],
            )
            .await?;

        let hit = hits.into_iter().next()?;
        Some(GeoPoint {
            latitude: hit.lat.parse().ok()?,
            longitude: hit.lon.parse().ok()?,
            formatted_address: hit.display_name,
        })
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Option<String> {
        let hit: ReverseHit = self
            .get_json(
                "/reverse",
                &[
                    ("format", "json".to_string()),
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("addressdetails", "1".to_string()),
                ],
            )
            .await?;
        hit.display_name
    }
}

// 3. The Mock Implementation (For Tests & Offline Runs)
/// MockGeocoder
///
/// Resolves every address to a fixed point, or to nothing when constructed failing.
#[derive(Clone)]
pub struct MockGeocoder {
    pub point: Option<GeoPoint>,
}

impl MockGeocoder {
    pub fn resolving(latitude: f64, longitude: f64) -> Self {
        Self {
            point: Some(GeoPoint {
                latitude,
                longitude,
                formatted_address: None,
            }),
        }
    }

    pub fn new_failing() -> Self {
        Self { point: None }
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Option<GeoPoint> {
        if address.trim().is_empty() {
            return None;
        }
        self.point.clone().map(|p| GeoPoint {
            formatted_address: Some(address.trim().to_string()),
            ..p
        })
    }

    async fn reverse(&self, _latitude: f64, _longitude: f64) -> Option<String> {
        self.point.as_ref().map(|_| "Mock Address".to_string())
    }
}
